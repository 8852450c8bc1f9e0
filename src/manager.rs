//! Per-node, per-direction edge containers.
//!
//! A node owns one [`LinkManager`] of [`InPort`](crate::port::InPort)s and one
//! of [`OutPort`](crate::port::OutPort)s. Every port in one manager addresses
//! a distinct remote node. Edges are created and destroyed pairwise: `add`
//! and `remove` take the remote node's complementary manager and update both
//! sides together.

#![forbid(unsafe_code)]

use crate::buffer::Channel;
use crate::invariant_ppt::{assert_invariant, MIRROR_CONSISTENT, SEVERANCE_COMPLETE};
use crate::port::Port;
use crate::registry::Id;
use std::fmt;

type Item<P> = <<P as Port>::Channel as Channel>::Item;

/// Ordered collection of same-direction ports, unique per remote id.
pub struct LinkManager<P> {
    ports: Vec<P>,
}

impl<P: Port> LinkManager<P> {
    /// An empty manager.
    pub fn new() -> Self {
        Self { ports: Vec::new() }
    }

    /// Port addressing `remote`.
    pub fn find(&self, remote: Id) -> Option<&P> {
        self.ports.iter().find(|p| p.address() == remote)
    }

    /// Position of the port addressing `remote`.
    pub fn position(&self, remote: Id) -> Option<usize> {
        self.ports.iter().position(|p| p.address() == remote)
    }

    /// True if a port addresses `remote`.
    pub fn contains(&self, remote: Id) -> bool {
        self.position(remote).is_some()
    }

    /// Create an edge between `own` (holder of this manager) and `remote`
    /// (holder of `complement`), carrying `value` as its link value.
    ///
    /// Both ports are inserted or neither: returns false when either side
    /// already has a port for the other.
    pub fn add(
        &mut self,
        own: Id,
        remote: Id,
        complement: &mut LinkManager<P::Complement>,
        value: Item<P>,
    ) -> bool {
        if self.contains(remote) || complement.contains(own) {
            return false;
        }
        let (local, mirror) = P::open(own, remote, value);
        assert_invariant(
            MIRROR_CONSISTENT,
            local.shares_link(&mirror) && local.address() == remote && mirror.address() == own,
            "edge endpoints share one link and address each other",
            Some("LinkManager::add"),
        );
        self.ports.push(local);
        complement.ports.push(mirror);
        true
    }

    /// Remove the edge between `own` and `remote` from both managers.
    /// Returns false when this side had no such edge.
    pub fn remove(
        &mut self,
        own: Id,
        remote: Id,
        complement: &mut LinkManager<P::Complement>,
    ) -> bool {
        let Some(local) = self.take(remote) else {
            return false;
        };
        let mirror = complement.take(own);
        assert_invariant(
            SEVERANCE_COMPLETE,
            mirror.as_ref().map_or(true, |m| local.shares_link(m))
                && !self.contains(remote)
                && !complement.contains(own),
            "both endpoints of the edge are gone",
            Some("LinkManager::remove"),
        );
        true
    }

    /// Detach the port addressing `remote` without touching its mirror.
    pub fn take(&mut self, remote: Id) -> Option<P> {
        let pos = self.position(remote)?;
        Some(self.ports.remove(pos))
    }

    /// Remote ids in insertion order.
    pub fn addresses(&self) -> Vec<Id> {
        self.ports.iter().map(Port::address).collect()
    }

    /// Iterate the ports in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, P> {
        self.ports.iter()
    }

    /// Number of ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// True if there are no ports.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Drop every port, returning their addresses. Mirrors are untouched.
    pub fn drain_addresses(&mut self) -> Vec<Id> {
        self.ports.drain(..).map(|p| p.address()).collect()
    }

    /// Remote ids and link values of every port, with `owner` replaced by
    /// `new_owner` so self-loops stay self-loops on a copy.
    pub fn cloned_addresses(&self, owner: Id, new_owner: Id) -> Vec<(Id, Item<P>)>
    where
        Item<P>: Clone,
    {
        self.ports
            .iter()
            .map(|p| {
                let remote = if p.address() == owner {
                    new_owner
                } else {
                    p.address()
                };
                (remote, p.link().value())
            })
            .collect()
    }

    /// Drop ports whose other endpoint no longer exists, returning their
    /// addresses.
    pub fn prune_ghosts(&mut self) -> Vec<Id> {
        let mut pruned = Vec::new();
        self.ports.retain(|p| {
            if p.is_ghost() {
                pruned.push(p.address());
                false
            } else {
                true
            }
        });
        pruned
    }
}

impl<P: Port> Default for LinkManager<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, P: Port> IntoIterator for &'a LinkManager<P> {
    type Item = &'a P;
    type IntoIter = std::slice::Iter<'a, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.ports.iter()
    }
}

impl<P: Port + fmt::Debug> fmt::Debug for LinkManager<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ports.iter()).finish()
    }
}
