//! PPT Invariant System: Runtime invariant enforcement with contract tracking.
//!
//! Structural operations (linking, relocation, merging) assert their
//! post-conditions here. Failures panic: they indicate a bug in this crate or
//! a broken single-writer contract, never a recoverable condition. With the
//! `ppt` feature every asserted id is also logged so contract tests can check
//! that a code path really enforced what it claims.

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use std::collections::HashSet;
#[cfg(feature = "ppt")]
use std::sync::Mutex;

// Invariant ids for contract tracking
pub const MIRROR_CONSISTENT: u32 = 1;
pub const SEVERANCE_COMPLETE: u32 = 2;
pub const REGISTRY_BIJECTION: u32 = 3;
pub const MOVE_CONSERVES_MEMBERS: u32 = 4;
pub const MERGE_EMPTIES_SOURCE: u32 = 5;
pub const BACKREF_REPOINTED: u32 = 6;
pub const ID_COLLISION_RESOLVED: u32 = 7;
pub const FALLBACK_RELOCATION: u32 = 8;
pub const RELEASED_ON_DROP: u32 = 9;
pub const GRAPH_MIRRORED: u32 = 10;

#[cfg(feature = "ppt")]
lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
}

#[cfg(feature = "ppt")]
/// Assert an invariant: logs it and panics on failure.
pub(crate) fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let full_message = if let Some(ctx) = context {
            format!("Invariant {} failed: {} (context: {})", id, message, ctx)
        } else {
            format!("Invariant {} failed: {}", id, message)
        };
        tracing::error!("{}", full_message);
        panic!("{}", full_message);
    }
    INVARIANT_LOG
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(id);
}

#[cfg(not(feature = "ppt"))]
/// Assert an invariant: checks condition and panics on failure.
pub(crate) fn assert_invariant(_id: u32, condition: bool, message: &str, _context: Option<&str>) {
    if !condition {
        panic!("Invariant failed: {}", message);
    }
}

#[cfg(feature = "ppt")]
/// Contract test: checks that specified invariants were asserted.
pub fn contract_test(test_name: &str, required_invariants: &[u32]) {
    let log = INVARIANT_LOG
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let missing: Vec<u32> = required_invariants
        .iter()
        .copied()
        .filter(|inv| !log.contains(inv))
        .collect();
    drop(log); // Drop the lock before panicking
    if !missing.is_empty() {
        panic!(
            "Contract test '{}' failed: invariants not enforced: {:?}",
            test_name, missing
        );
    }
}

#[cfg(not(feature = "ppt"))]
/// Contract test: no-op when PPT feature is disabled.
pub fn contract_test(_test_name: &str, _required_invariants: &[u32]) {}

#[cfg(feature = "ppt")]
/// Clear invariant log (for between test runs).
pub fn clear_invariant_log() {
    INVARIANT_LOG
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clear();
}

#[cfg(not(feature = "ppt"))]
/// Clear invariant log: no-op when PPT feature is disabled.
pub fn clear_invariant_log() {}

/// Human-readable name of an invariant id (diagnostics only).
pub const fn invariant_name(id: u32) -> &'static str {
    match id {
        MIRROR_CONSISTENT => "MIRROR_CONSISTENT",
        SEVERANCE_COMPLETE => "SEVERANCE_COMPLETE",
        REGISTRY_BIJECTION => "REGISTRY_BIJECTION",
        MOVE_CONSERVES_MEMBERS => "MOVE_CONSERVES_MEMBERS",
        MERGE_EMPTIES_SOURCE => "MERGE_EMPTIES_SOURCE",
        BACKREF_REPOINTED => "BACKREF_REPOINTED",
        ID_COLLISION_RESOLVED => "ID_COLLISION_RESOLVED",
        FALLBACK_RELOCATION => "FALLBACK_RELOCATION",
        RELEASED_ON_DROP => "RELEASED_ON_DROP",
        GRAPH_MIRRORED => "GRAPH_MIRRORED",
        _ => "UNKNOWN",
    }
}
