//! Edge-level invariants: every edge is mirrored, and severing a node leaves
//! nothing behind on either side.

use neurograph::buffer::pull;
use neurograph::{Graph, Id, Node, Port};
use proptest::prelude::*;

type C = pull::Single<f32>;

fn nodes(graph: &Graph<C>, n: usize) -> Vec<Node<C>> {
    (0..n).map(|_| graph.node(0.0).unwrap()).collect()
}

#[test]
fn successful_add_is_mirrored() {
    let graph = Graph::<C>::new();
    let ns = nodes(&graph, 2);
    let (a, b) = (&ns[0], &ns[1]);

    assert!(a.add(b.id(), 0.5));
    let inputs = a.inputs();
    let outputs = b.outputs();
    let input = inputs.find(b.id()).unwrap();
    let mirror = outputs.find(a.id()).unwrap();
    assert!(input.shares_link(mirror));
    assert_eq!(mirror.value(), 0.5);
}

#[test]
fn clear_leaves_no_mirrors() {
    let graph = Graph::<C>::new();
    let ns = nodes(&graph, 4);
    let hub = &ns[0];
    for other in &ns[1..] {
        hub.add_default(other.id());
        hub.add_output(other.id(), 1.0);
    }
    assert_eq!(graph.edge_count(), 6);

    hub.clear();
    hub.clear();
    for other in &ns[1..] {
        assert!(!hub.contains_input(other.id()));
        assert!(!hub.contains_output(other.id()));
        assert!(!other.contains_input(hub.id()));
        assert!(!other.contains_output(hub.id()));
    }
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.verify());
}

#[test]
fn dropping_a_node_cleans_its_peers() {
    let graph = Graph::<C>::new();
    let keep = graph.node(0.0).unwrap();
    let gone_id;
    {
        let gone = graph.node(0.0).unwrap();
        gone_id = gone.id();
        keep.add_default(gone_id);
        gone.add_default(keep.id());
        assert_eq!(graph.edge_count(), 2);
    }
    assert!(!graph.contains(gone_id));
    assert_eq!(keep.input_ids(), Vec::<Id>::new());
    assert_eq!(keep.output_ids(), Vec::<Id>::new());
    assert!(graph.verify());
}

#[test]
fn ghost_after_remote_detaches_its_port() {
    let graph = Graph::<C>::new();
    let ns = nodes(&graph, 2);
    let (a, b) = (&ns[0], &ns[1]);
    a.add_default(b.id());

    let port = b.outputs().take(a.id()).unwrap();
    assert!(!a.inputs().find(b.id()).unwrap().is_ghost());
    drop(port);
    assert!(a.inputs().find(b.id()).unwrap().is_ghost());
    assert_eq!(a.prune_ghosts(), 1);
}

#[test]
fn messages_and_weights_are_independent() {
    let graph = Graph::<C>::new();
    let ns = nodes(&graph, 2);
    let (src, dst) = (&ns[0], &ns[1]);
    dst.add(src.id(), 0.25);

    assert!(src.push_to(dst.id(), 8.0));
    dst.inputs().find(src.id()).unwrap().set_value(4.0);
    assert_eq!(src.outputs().find(dst.id()).unwrap().value(), 4.0);
    assert_eq!(dst.pull_from(src.id()), Some(8.0));
}

proptest! {
    #[test]
    fn random_topologies_stay_mirrored(
        edges in prop::collection::vec((0usize..6, 0usize..6, any::<bool>()), 0..40),
        cleared in prop::collection::vec(0usize..6, 0..4),
    ) {
        let graph = Graph::<C>::new();
        let ns = nodes(&graph, 6);
        for (to, from, inbound) in &edges {
            let linked = if *inbound {
                ns[*to].add_default(ns[*from].id())
            } else {
                ns[*from].add_output(ns[*to].id(), 0.0)
            };
            if linked {
                prop_assert!(ns[*to].contains_input(ns[*from].id()));
                prop_assert!(ns[*from].contains_output(ns[*to].id()));
            }
        }
        prop_assert!(graph.verify());

        for i in &cleared {
            ns[*i].clear();
            prop_assert_eq!(ns[*i].input_count() + ns[*i].output_count(), 0);
            for other in &ns {
                prop_assert!(!other.contains_input(ns[*i].id()));
                prop_assert!(!other.contains_output(ns[*i].id()));
            }
        }
        prop_assert!(graph.verify());
    }
}
