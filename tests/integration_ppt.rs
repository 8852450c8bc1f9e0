//! Contract test: driving the public API must enforce every structural
//! invariant at least once.
//!
//! Kept as a single test so nothing else in this binary races on the
//! invariant log.

use neurograph::buffer::pull;
use neurograph::invariant_ppt::{
    clear_invariant_log, contract_test, invariant_name, BACKREF_REPOINTED, FALLBACK_RELOCATION,
    GRAPH_MIRRORED, ID_COLLISION_RESOLVED, MERGE_EMPTIES_SOURCE, MIRROR_CONSISTENT,
    MOVE_CONSERVES_MEMBERS, REGISTRY_BIJECTION, RELEASED_ON_DROP, SEVERANCE_COMPLETE,
};
use neurograph::{Graph, Id, Node};

type C = pull::Single<f32>;

#[test]
fn structural_operations_enforce_their_invariants() {
    clear_invariant_log();

    let home = Graph::<C>::new();
    let away = Graph::<C>::new();
    let a = home.node(1.0).unwrap();
    let b = home.node(2.0).unwrap();
    a.add(b.id(), 0.5);
    home.assert_mirrored();
    a.clear();

    assert!(home.move_to(&away, b.id()));
    home.swap_with(&away);

    let first = Node::<C>::with_id(&home, Id(u64::MAX - 500), 0.0).unwrap();
    let second = Node::<C>::with_id(&home, Id(u64::MAX - 500), 0.0).unwrap();
    assert_ne!(first.id(), second.id());

    home.merge_into(&away);
    let relocated;
    {
        let scoped = Graph::<C>::new().with_fallback(&away);
        relocated = scoped.node(0.0).unwrap();
    }
    assert!(relocated.belongs_to(&away));
    drop(first);

    let required = [
        MIRROR_CONSISTENT,
        SEVERANCE_COMPLETE,
        REGISTRY_BIJECTION,
        MOVE_CONSERVES_MEMBERS,
        MERGE_EMPTIES_SOURCE,
        BACKREF_REPOINTED,
        ID_COLLISION_RESOLVED,
        FALLBACK_RELOCATION,
        RELEASED_ON_DROP,
        GRAPH_MIRRORED,
    ];
    for id in required {
        assert_ne!(invariant_name(id), "UNKNOWN");
    }
    contract_test("structural_operations", &required);
}
