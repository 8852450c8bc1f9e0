//! Registry laws: bijection, conserved moves, merges and swaps, and the
//! drop-time relocation policy.

use neurograph::buffer::pull;
use neurograph::{Graph, Id, Index, IndexConfig, Node, RegistryError, Vertex};
use proptest::prelude::*;

type C = pull::Single<f32>;

fn bijection_holds(index: &Index<Vertex<C>>) -> bool {
    let ids = index.ids();
    ids.len() == index.size()
        && ids.iter().all(|id| {
            index.contains(*id)
                && index
                    .find(*id)
                    .is_some_and(|v| v.id() == *id && index.check(*id, &v))
        })
}

#[derive(Debug, Clone)]
enum Op {
    Create(bool),
    Move(usize, bool),
    Remove(usize),
    Merge(bool),
    Swap,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Create),
        (0usize..16, any::<bool>()).prop_map(|(i, d)| Op::Move(i, d)),
        (0usize..16).prop_map(Op::Remove),
        any::<bool>().prop_map(Op::Merge),
        Just(Op::Swap),
    ]
}

proptest! {
    #[test]
    fn random_relocations_keep_the_bijection(ops in prop::collection::vec(op(), 1..40)) {
        let a = Graph::<C>::new();
        let b = Graph::<C>::new();
        let mut owned: Vec<Node<C>> = Vec::new();

        for op in ops {
            match op {
                Op::Create(left) => {
                    let target = if left { &a } else { &b };
                    let n = target.node(0.0).unwrap();
                    if let Some(prev) = owned.last() {
                        n.add_default(prev.id());
                    }
                    owned.push(n);
                }
                Op::Move(i, flip) => {
                    let (src, dst) = if flip { (&b, &a) } else { (&a, &b) };
                    if let Some(id) = src.ids().get(i % src.size().max(1)).copied() {
                        let total = src.size() + dst.size();
                        prop_assert!(src.move_to(dst, id));
                        prop_assert!(!src.contains(id));
                        prop_assert!(dst.contains(id));
                        prop_assert_eq!(src.size() + dst.size(), total);
                    }
                }
                Op::Remove(i) => {
                    if !owned.is_empty() {
                        owned.swap_remove(i % owned.len());
                    }
                }
                Op::Merge(flip) => {
                    let (src, dst) = if flip { (&b, &a) } else { (&a, &b) };
                    let total = src.size() + dst.size();
                    let edges = src.edge_count() + dst.edge_count();
                    src.merge_into(dst);
                    prop_assert!(src.is_empty());
                    prop_assert_eq!(dst.size(), total);
                    prop_assert_eq!(dst.edge_count(), edges);
                }
                Op::Swap => {
                    let (left, right) = (a.ids(), b.ids());
                    a.swap_with(&b);
                    prop_assert_eq!(a.ids(), right);
                    prop_assert_eq!(b.ids(), left);
                }
            }
            prop_assert!(bijection_holds(&a));
            prop_assert!(bijection_holds(&b));
            prop_assert!(a.verify() && b.verify());
            prop_assert_eq!(a.size() + b.size(), owned.len());
        }
    }
}

#[test]
fn merge_keeps_edges_and_ids() {
    let a = Graph::<C>::new();
    let b = Graph::<C>::new();
    let x = a.node(0.0).unwrap();
    let y = a.node(0.0).unwrap();
    let z = b.node(0.0).unwrap();
    x.add(y.id(), 0.5);
    let former = a.ids();

    a.merge_into(&b);
    assert!(a.is_empty());
    for id in former {
        assert!(b.contains(id));
    }
    assert!(x.contains_input(y.id()));
    assert!(x.belongs_to(&b) && y.belongs_to(&b) && z.belongs_to(&b));
    assert_eq!(b.edge_count(), 1);
}

#[test]
fn merge_rekeys_colliding_ids() {
    let a = Graph::<C>::new();
    let b = Graph::<C>::new();
    let shared = Id(u64::MAX - 100);
    let left = Node::<C>::with_id(&a, shared, 0.0).unwrap();
    let partner = a.node(0.0).unwrap();
    left.add_default(partner.id());
    let right = Node::<C>::with_id(&b, shared, 0.0).unwrap();

    a.merge_into(&b);
    assert_eq!(b.size(), 3);
    assert_eq!(right.id(), shared);
    assert_ne!(left.id(), shared);
    assert!(left.belongs_to(&b));
    // The re-keyed node lost its edges; the others kept theirs.
    assert_eq!(left.input_count(), 0);
    assert_eq!(partner.output_count(), 0);
    assert!(b.verify());
}

#[test]
fn swap_repoints_every_member() {
    let a = Graph::<C>::new();
    let b = Graph::<C>::new();
    let xs: Vec<_> = (0..3).map(|_| a.node(0.0).unwrap()).collect();
    let ys: Vec<_> = (0..2).map(|_| b.node(0.0).unwrap()).collect();
    xs[0].add_default(xs[1].id());

    a.swap_with(&b);
    assert!(xs.iter().all(|x| x.belongs_to(&b) && x.is_managed()));
    assert!(ys.iter().all(|y| y.belongs_to(&a)));
    assert!(xs[0].contains_input(xs[1].id()));
    // Edges still resolve through the new index.
    assert!(xs[0].remove(xs[1].id()));
    assert_eq!(xs[1].output_count(), 0);
}

#[test]
fn capacity_bounds_add_and_move() {
    let small = Graph::<C>::with_config(IndexConfig::new("small").with_capacity(2));
    let big = Graph::<C>::new();
    let _a = small.node(0.0).unwrap();
    let _b = small.node(0.0).unwrap();
    assert_eq!(
        small.node(0.0).unwrap_err(),
        RegistryError::Full {
            label: "small".into(),
            capacity: 2
        }
    );

    let c = big.node(0.0).unwrap();
    let before = c.id();
    assert!(!big.move_to(&small, before));
    assert!(c.belongs_to(&big));
    assert_eq!(c.id(), before);

    // Swap and merge move whole tables regardless of capacity.
    big.swap_with(&small);
    assert_eq!(big.size(), 2);
    big.merge_into(&small);
    assert_eq!(small.size(), 3);
}

#[test]
fn dropped_index_relocates_to_fallback() {
    let fallback = Graph::<C>::with_config(IndexConfig::new("fallback"));
    let (a, b);
    {
        let scoped = Graph::<C>::new().with_fallback(&fallback);
        a = scoped.node(0.0).unwrap();
        b = scoped.node(0.0).unwrap();
        a.add_default(b.id());
    }
    assert!(a.belongs_to(&fallback));
    assert!(b.belongs_to(&fallback));
    assert!(a.contains_input(b.id()));
    assert!(fallback.verify());
}

#[test]
fn dropped_index_without_fallback_orphans() {
    let (a, b);
    {
        let scoped = Graph::<C>::new();
        a = scoped.node(0.0).unwrap();
        b = scoped.node(0.0).unwrap();
        a.add_default(b.id());
    }
    assert!(!a.is_managed());
    assert!(!b.is_managed());
    assert_eq!(a.input_count(), 0);
    assert_eq!(b.output_count(), 0);
    assert!(!a.add_default(b.id()));
}

#[test]
fn purge_forgets_dropped_vertices() {
    let graph = Graph::<C>::new();
    let n = graph.node(0.0).unwrap();
    let shared = std::sync::Arc::clone(n.vertex());
    drop(n);
    // The owner released its registration on drop.
    assert!(graph.is_empty());
    assert!(!shared.is_managed());
    assert_eq!(graph.purge(), 0);
}
