//! Graph: an index of vertices plus whole-topology queries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::buffer::Channel;
use crate::error::RegistryError;
use crate::invariant_ppt::{assert_invariant, GRAPH_MIRRORED};
use crate::node::{Node, Vertex};
use crate::port::Port;
use crate::registry::{Id, Index, IndexConfig};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A registry of [`Vertex`]es.
///
/// Dereferences to [`Index`], so the whole registry vocabulary (find,
/// move_to, swap_with, merge_into, ...) is available directly, and a
/// `&Graph` can be passed wherever node constructors take an index.
pub struct Graph<C: Channel> {
    index: Index<Vertex<C>>,
}

impl<C: Channel> Graph<C> {
    /// An empty, unbounded graph.
    pub fn new() -> Self {
        Self::with_config(IndexConfig::new("graph"))
    }

    /// An empty graph built from `config`.
    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            index: Index::with_config(config),
        }
    }

    /// Hand remaining vertices to `fallback` when this graph is dropped.
    pub fn with_fallback(self, fallback: &Graph<C>) -> Self {
        Self {
            index: self.index.with_fallback(&fallback.index),
        }
    }

    /// The underlying index.
    pub fn index(&self) -> &Index<Vertex<C>> {
        &self.index
    }

    /// Create a node in this graph.
    pub fn node(&self, value: C::Item) -> Result<Node<C>, RegistryError> {
        Node::with_value(&self.index, value)
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.index.members().iter().map(|v| v.input_count()).sum()
    }

    /// Every edge as `(source, target)`, sorted.
    pub fn edges(&self) -> Vec<(Id, Id)> {
        let mut edges: Vec<(Id, Id)> = self
            .index
            .members()
            .iter()
            .flat_map(|v| {
                let target = v.id();
                v.input_ids().into_iter().map(move |source| (source, target))
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// True if every port in the graph has a mirror on the addressed vertex
    /// sharing its link.
    pub fn verify(&self) -> bool {
        self.index.members().iter().all(|v| self.mirrored(v))
    }

    /// Panic unless [`Graph::verify`] holds.
    pub fn assert_mirrored(&self) {
        assert_invariant(
            GRAPH_MIRRORED,
            self.verify(),
            "every port has a mirror sharing its link",
            Some("Graph::assert_mirrored"),
        );
    }

    fn mirrored(&self, vertex: &Arc<Vertex<C>>) -> bool {
        let own = vertex.id();
        // Collect first: checking a peer's side while holding ours would
        // break the input-before-output lock order.
        let inbound: Vec<_> = vertex
            .inputs()
            .iter()
            .map(|p| (p.address(), Arc::clone(p.link())))
            .collect();
        let outbound: Vec<_> = vertex
            .outputs()
            .iter()
            .map(|p| (p.address(), Arc::clone(p.link())))
            .collect();

        let inbound_ok = inbound.iter().all(|(remote, link)| match self.index.find(*remote) {
            Some(peer) => {
                let ports = peer.outputs();
                ports.find(own).is_some_and(|m| Arc::ptr_eq(m.link(), link))
            }
            None => false,
        });
        inbound_ok
            && outbound.iter().all(|(remote, link)| match self.index.find(*remote) {
                Some(peer) => {
                    let ports = peer.inputs();
                    ports.find(own).is_some_and(|m| Arc::ptr_eq(m.link(), link))
                }
                None => false,
            })
    }

    /// Sever every edge, keeping all vertices.
    pub fn clear_edges(&self) {
        for vertex in self.index.members() {
            vertex.clear();
        }
    }
}

impl<C: Channel> Default for Graph<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Channel> Deref for Graph<C> {
    type Target = Index<Vertex<C>>;

    fn deref(&self) -> &Index<Vertex<C>> {
        &self.index
    }
}

impl<C: Channel> fmt::Debug for Graph<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("label", &self.index.label())
            .field("nodes", &self.index.size())
            .field("edges", &self.edge_count())
            .finish()
    }
}
