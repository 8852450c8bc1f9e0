//! Nodes: identity-bearing vertices with inbound and outbound edges.
//!
//! The shared state of a node lives in a [`Vertex`], which an index tracks
//! weakly. A [`Node`] is the owning handle: dropping it severs every edge and
//! deregisters the vertex.
//!
//! Edges only connect vertices of the same index, and peers are always
//! resolved through that index. Lock order: peers are looked up before any
//! edge manager is locked, and an input manager is always locked before an
//! output manager. No registry lock is held while a manager is locked.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::buffer::Channel;
use crate::error::{LinkError, RegistryError};
use crate::invariant_ppt::{assert_invariant, SEVERANCE_COMPLETE};
use crate::manager::LinkManager;
use crate::port::{InPort, OutPort};
use crate::registry::{release, Id, Index, IndexBase, Member, Membership};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Shared state of a node.
pub struct Vertex<C: Channel> {
    membership: Membership<Vertex<C>>,
    value: Mutex<C::Item>,
    inputs: Mutex<LinkManager<InPort<C>>>,
    outputs: Mutex<LinkManager<OutPort<C>>>,
}

impl<C: Channel> Vertex<C> {
    fn new(id: Id, value: C::Item) -> Self {
        Self {
            membership: Membership::new(id),
            value: Mutex::new(value),
            inputs: Mutex::new(LinkManager::new()),
            outputs: Mutex::new(LinkManager::new()),
        }
    }

    /// Current id.
    #[inline]
    pub fn id(&self) -> Id {
        self.membership.id()
    }

    /// The index tracking this vertex, if any.
    pub fn index(&self) -> Option<Arc<IndexBase<Vertex<C>>>> {
        self.membership.index()
    }

    /// True if an index tracks this vertex under its current id.
    pub fn is_managed(&self) -> bool {
        self.index().is_some_and(|index| index.check(self.id(), self))
    }

    /// True if `index` tracks this vertex.
    pub fn belongs_to(&self, index: &Index<Vertex<C>>) -> bool {
        index.tracks(self)
    }

    fn home(&self) -> Result<Arc<IndexBase<Vertex<C>>>, LinkError> {
        let own = self.id();
        self.index()
            .filter(|index| index.check(own, self))
            .ok_or(LinkError::Detached(own))
    }

    fn peer(&self, remote: Id) -> Result<Arc<Vertex<C>>, LinkError> {
        self.home()?
            .find(remote)
            .ok_or(LinkError::UnknownNode(remote))
    }

    /// Create an inbound edge from `remote` carrying `weight`.
    pub fn try_add(&self, remote: Id, weight: C::Item) -> Result<(), LinkError> {
        let peer = self.peer(remote)?;
        let own = self.id();
        let mut inputs = self.inputs.lock();
        let mut outputs = peer.outputs.lock();
        if !inputs.add(own, remote, &mut outputs, weight) {
            return Err(LinkError::DuplicateEdge { node: own, remote });
        }
        tracing::debug!("node_link: {remote} -> {own}");
        Ok(())
    }

    /// Boolean form of [`Vertex::try_add`].
    pub fn add(&self, remote: Id, weight: C::Item) -> bool {
        self.try_add(remote, weight).is_ok()
    }

    /// Inbound edge from `remote` with a default weight.
    pub fn add_default(&self, remote: Id) -> bool {
        self.add(remote, C::Item::default())
    }

    /// Create an outbound edge to `remote` carrying `weight`.
    pub fn try_add_output(&self, remote: Id, weight: C::Item) -> Result<(), LinkError> {
        let peer = self.peer(remote)?;
        let own = self.id();
        let mut inputs = peer.inputs.lock();
        let mut outputs = self.outputs.lock();
        if !outputs.add(own, remote, &mut inputs, weight) {
            return Err(LinkError::DuplicateEdge { node: own, remote });
        }
        tracing::debug!("node_link: {own} -> {remote}");
        Ok(())
    }

    /// Boolean form of [`Vertex::try_add_output`].
    pub fn add_output(&self, remote: Id, weight: C::Item) -> bool {
        self.try_add_output(remote, weight).is_ok()
    }

    /// Drop the inbound edge from `remote` and its mirror. False if there
    /// was none.
    pub fn remove(&self, remote: Id) -> bool {
        let own = self.id();
        let removed = match self.index().and_then(|index| index.find(remote)) {
            Some(peer) => {
                let mut inputs = self.inputs.lock();
                let mut outputs = peer.outputs.lock();
                inputs.remove(own, remote, &mut outputs)
            }
            None => self.inputs.lock().take(remote).is_some(),
        };
        if removed {
            tracing::debug!("node_unlink: {remote} -> {own}");
        }
        removed
    }

    /// Drop the outbound edge to `remote` and its mirror.
    pub fn remove_output(&self, remote: Id) -> bool {
        let own = self.id();
        let removed = match self.index().and_then(|index| index.find(remote)) {
            Some(peer) => {
                let mut inputs = peer.inputs.lock();
                let mut outputs = self.outputs.lock();
                outputs.remove(own, remote, &mut inputs)
            }
            None => self.outputs.lock().take(remote).is_some(),
        };
        if removed {
            tracing::debug!("node_unlink: {own} -> {remote}");
        }
        removed
    }

    /// Sever every edge in both directions. Idempotent.
    pub fn clear(&self) {
        let inbound = self.input_ids();
        let outbound = self.output_ids();
        if inbound.is_empty() && outbound.is_empty() {
            return;
        }
        for remote in &inbound {
            self.remove(*remote);
        }
        for remote in &outbound {
            self.remove_output(*remote);
        }
        assert_invariant(
            SEVERANCE_COMPLETE,
            self.input_count() == 0 && self.output_count() == 0,
            "cleared node holds no ports",
            Some("Vertex::clear"),
        );
        tracing::debug!(
            "node_clear: {} severed {} edges",
            self.id(),
            inbound.len() + outbound.len()
        );
    }

    /// True if an inbound edge from `remote` exists.
    pub fn contains_input(&self, remote: Id) -> bool {
        self.inputs.lock().contains(remote)
    }

    /// True if an outbound edge to `remote` exists.
    pub fn contains_output(&self, remote: Id) -> bool {
        self.outputs.lock().contains(remote)
    }

    /// Sources of the inbound edges, in creation order.
    pub fn input_ids(&self) -> Vec<Id> {
        self.inputs.lock().addresses()
    }

    /// Targets of the outbound edges, in creation order.
    pub fn output_ids(&self) -> Vec<Id> {
        self.outputs.lock().addresses()
    }

    /// Number of inbound edges.
    pub fn input_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Number of outbound edges.
    pub fn output_count(&self) -> usize {
        self.outputs.lock().len()
    }

    /// Scoped access to the inbound ports.
    ///
    /// Edge operations on any node may deadlock while this guard or the one
    /// from [`Vertex::outputs`] is held.
    pub fn inputs(&self) -> MutexGuard<'_, LinkManager<InPort<C>>> {
        self.inputs.lock()
    }

    /// Scoped access to the outbound ports.
    pub fn outputs(&self) -> MutexGuard<'_, LinkManager<OutPort<C>>> {
        self.outputs.lock()
    }

    /// Next message on the edge from `remote`, or the default when none is
    /// waiting. `None` when there is no such edge.
    pub fn pull_from(&self, remote: Id) -> Option<C::Item> {
        self.inputs.lock().find(remote).map(InPort::pull)
    }

    /// Send `message` along the edge to `remote`. False when there is no
    /// such edge or a pull-oriented buffer is full.
    pub fn push_to(&self, remote: Id, message: C::Item) -> bool {
        self.outputs
            .lock()
            .find(remote)
            .is_some_and(|port| port.push(message))
    }

    /// Send `message` along every outbound edge. Returns how many accepted it.
    pub fn broadcast(&self, message: C::Item) -> usize
    where
        C::Item: Clone,
    {
        self.outputs
            .lock()
            .iter()
            .filter(|port| port.push(message.clone()))
            .count()
    }

    /// The node's own value (bias).
    pub fn value(&self) -> C::Item
    where
        C::Item: Clone,
    {
        self.value.lock().clone()
    }

    /// Replace the node's value, returning the previous one.
    pub fn set_value(&self, value: C::Item) -> C::Item {
        std::mem::replace(&mut *self.value.lock(), value)
    }

    /// Drop ports whose other endpoint has gone away. Returns how many.
    pub fn prune_ghosts(&self) -> usize {
        let inbound = self.inputs.lock().prune_ghosts();
        let outbound = self.outputs.lock().prune_ghosts();
        inbound.len() + outbound.len()
    }

    /// Enter `index`, leaving (and clearing edges in) any previous one.
    pub fn join_index(self: &Arc<Self>, index: &Index<Vertex<C>>) -> bool {
        index.add(self)
    }
}

impl<C: Channel> Vertex<C>
where
    C::Item: Clone,
{
    /// Replace this vertex's edges with copies of `other`'s.
    ///
    /// Both vertices must be managed by the same index. Edges of `other`
    /// that address `other` itself are redirected to this vertex. Link
    /// values are copied, buffered messages are not.
    pub fn try_clone_edges_from(&self, other: &Vertex<C>) -> Result<(), LinkError> {
        if std::ptr::eq(self, other) {
            return Ok(());
        }
        let (mine, theirs) = (self.home()?, other.home()?);
        if !Arc::ptr_eq(&mine, &theirs) {
            return Err(LinkError::CrossIndex(self.id(), other.id()));
        }
        self.clear();
        let (own, source) = (self.id(), other.id());
        let inbound = other.inputs.lock().cloned_addresses(source, own);
        let outbound = other.outputs.lock().cloned_addresses(source, own);
        for (remote, weight) in inbound {
            self.add(remote, weight);
        }
        for (remote, weight) in outbound {
            // A self-loop was already created from the inbound side.
            if remote != own {
                self.add_output(remote, weight);
            }
        }
        Ok(())
    }

    /// Boolean form of [`Vertex::try_clone_edges_from`].
    pub fn clone_edges_from(&self, other: &Vertex<C>) -> bool {
        self.try_clone_edges_from(other).is_ok()
    }
}

impl<C: Channel> Member for Vertex<C> {
    fn membership(&self) -> &Membership<Self> {
        &self.membership
    }

    fn detach(&self) {
        self.clear();
    }
}

impl<C: Channel> fmt::Debug for Vertex<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vertex")
            .field("id", &self.id())
            .field("inputs", &self.input_ids())
            .field("outputs", &self.output_ids())
            .finish_non_exhaustive()
    }
}

/// Owning handle of a vertex.
///
/// Dereferences to [`Vertex`] for every edge operation. Not `Clone`: a node
/// has exactly one owner, and moving the handle moves the identity.
pub struct Node<C: Channel> {
    vertex: Arc<Vertex<C>>,
}

impl<C: Channel> Node<C> {
    /// A node with a fresh id and default value, registered in `index`.
    pub fn new(index: &Index<Vertex<C>>) -> Result<Self, RegistryError> {
        Self::with_value(index, C::Item::default())
    }

    /// A node with a fresh id and the given value.
    pub fn with_value(index: &Index<Vertex<C>>, value: C::Item) -> Result<Self, RegistryError> {
        Self::with_id(index, Id::next(), value)
    }

    /// A node requesting `id`. The index picks a fresh id if `id` is taken.
    pub fn with_id(index: &Index<Vertex<C>>, id: Id, value: C::Item) -> Result<Self, RegistryError> {
        Self::register(index.base(), Vertex::new(id, value))
    }

    fn register(
        index: &Arc<IndexBase<Vertex<C>>>,
        vertex: Vertex<C>,
    ) -> Result<Self, RegistryError> {
        let vertex = Arc::new(vertex);
        index.admit(&vertex)?;
        Ok(Self { vertex })
    }

    /// The shared vertex, for handing to other threads or comparing with
    /// [`Index::find`] results.
    pub fn vertex(&self) -> &Arc<Vertex<C>> {
        &self.vertex
    }

    /// See [`Vertex::join_index`].
    pub fn join_index(&self, index: &Index<Vertex<C>>) -> bool {
        self.vertex.join_index(index)
    }
}

impl<C: Channel> Node<C>
where
    C::Item: Clone,
{
    /// A new node in the same index with this node's value and a copy of
    /// its edges. Fails, dropping the half-built copy, if either node is
    /// relocated before the edges are copied.
    pub fn duplicate(&self) -> Result<Node<C>, RegistryError> {
        let index = self
            .vertex
            .index()
            .filter(|_| self.is_managed())
            .ok_or(RegistryError::Detached(self.id()))?;
        let copy = Self::register(&index, Vertex::new(Id::next(), self.value()))?;
        copy.try_clone_edges_from(&self.vertex)?;
        Ok(copy)
    }
}

impl<C: Channel> Deref for Node<C> {
    type Target = Vertex<C>;

    fn deref(&self) -> &Vertex<C> {
        &self.vertex
    }
}

impl<C: Channel> Drop for Node<C> {
    fn drop(&mut self) {
        self.vertex.clear();
        release(&*self.vertex);
    }
}

impl<C: Channel> fmt::Debug for Node<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.vertex, f)
    }
}
