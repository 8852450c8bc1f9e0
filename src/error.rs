//! Error types behind the boolean convenience methods.
//!
//! Everything here is recoverable: the boolean API (`Node::add`,
//! `Index::move_to`, ...) collapses these into `bool`, while the `try_*`
//! variants hand back the reason.

use crate::registry::Id;
use thiserror::Error;

/// Why an edge could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// An edge between the two nodes already exists in this direction.
    #[error("node {node} already has an edge with {remote}")]
    DuplicateEdge {
        /// Node the edge was requested on.
        node: Id,
        /// The other endpoint.
        remote: Id,
    },
    /// The remote id is not tracked by the node's index.
    #[error("node {0} is not registered in this index")]
    UnknownNode(Id),
    /// The node itself no longer belongs to any index.
    #[error("node {0} is not attached to any index")]
    Detached(Id),
    /// The two nodes are managed by different indices.
    #[error("nodes {0} and {1} belong to different indices")]
    CrossIndex(Id, Id),
}

/// Why a registry operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The target index has reached its configured capacity.
    #[error("index `{label}` is full ({capacity} members)")]
    Full {
        /// Label of the full index.
        label: String,
        /// Its configured capacity.
        capacity: usize,
    },
    /// No live member with that id.
    #[error("no member with id {0}")]
    NotFound(Id),
    /// The member is not tracked by any index.
    #[error("{0} is not attached to any index")]
    Detached(Id),
    /// A member was registered but its edges could not be rebuilt.
    #[error(transparent)]
    Link(#[from] LinkError),
}
