//! Ports: directional handles onto a shared [`Link`].
//!
//! An [`InPort`] can only read (pull/pop) and an [`OutPort`] can only write
//! (push), so reading a write-only endpoint is a compile error rather than a
//! runtime one. The two endpoints of an edge are created together: an
//! `InPort` always allocates a fresh link and an `OutPort` can only be made by
//! attaching to an existing `InPort`.

#![forbid(unsafe_code)]

use crate::buffer::{Channel, Overwrite};
use crate::link::Link;
use crate::registry::Id;
use std::fmt;
use std::sync::Arc;

/// Behaviour shared by both port directions.
pub trait Port: Sized + Send + Sync {
    /// Channel type of the underlying link.
    type Channel: Channel;
    /// The opposite direction.
    type Complement: Port<Channel = Self::Channel, Complement = Self>;

    /// Identity of the node at the other end of the edge.
    fn address(&self) -> Id;

    /// The shared link.
    fn link(&self) -> &Arc<Link<Self::Channel>>;

    /// Build both endpoints of a new edge.
    ///
    /// `own` is the node that will hold `Self`, `remote` the node that will
    /// hold the complement.
    fn open(
        own: Id,
        remote: Id,
        value: <Self::Channel as Channel>::Item,
    ) -> (Self, Self::Complement);

    /// Best-effort check that the other endpoint is gone.
    ///
    /// Based on the link's reference count: true when this port is the only
    /// holder left. A clone of the `Arc` obtained through [`Port::link`] keeps
    /// the count up, so treat a `false` as "probably alive".
    fn is_ghost(&self) -> bool {
        Arc::strong_count(self.link()) < 2
    }

    /// True iff an unread message is waiting on the link.
    fn is_ready(&self) -> bool {
        self.link().is_ready()
    }

    /// True if both ports refer to the same link.
    fn shares_link<P: Port<Channel = Self::Channel>>(&self, other: &P) -> bool {
        Arc::ptr_eq(self.link(), other.link())
    }
}

/// Read side of an edge.
pub struct InPort<C: Channel> {
    remote: Id,
    link: Arc<Link<C>>,
}

impl<C: Channel> InPort<C> {
    /// A fresh edge endpoint reading from `remote`, with a new link holding `value`.
    pub fn new(remote: Id, value: C::Item) -> Self {
        Self {
            remote,
            link: Arc::new(Link::new(value)),
        }
    }

    /// Take the next message, or the default when none is waiting.
    #[inline]
    pub fn pull(&self) -> C::Item {
        self.link.pull()
    }

    /// Take the next message if one is waiting.
    #[inline]
    pub fn try_pull(&self) -> Option<C::Item> {
        self.link.try_pull()
    }

    /// Link value (weight).
    pub fn value(&self) -> C::Item
    where
        C::Item: Clone,
    {
        self.link.value()
    }

    /// Replace the link value, returning the previous one.
    pub fn set_value(&self, value: C::Item) -> C::Item {
        self.link.set_value(value)
    }
}

impl<C: Overwrite> InPort<C> {
    /// Freshest message; see [`Overwrite::pop`].
    #[inline]
    pub fn pop(&self) -> C::Item {
        self.link.pop()
    }
}

/// Write side of an edge.
pub struct OutPort<C: Channel> {
    remote: Id,
    link: Arc<Link<C>>,
}

impl<C: Channel> OutPort<C> {
    /// Attach to the link of `complement`, writing towards `remote`.
    pub fn attach(complement: &InPort<C>, remote: Id) -> Self {
        Self {
            remote,
            link: Arc::clone(&complement.link),
        }
    }

    /// Offer a message. False only when a pull-oriented link is full.
    #[inline]
    pub fn push(&self, message: C::Item) -> bool {
        self.link.push(message)
    }

    /// Link value (weight).
    pub fn value(&self) -> C::Item
    where
        C::Item: Clone,
    {
        self.link.value()
    }

    /// Replace the link value, returning the previous one.
    pub fn set_value(&self, value: C::Item) -> C::Item {
        self.link.set_value(value)
    }
}

impl<C: Channel> Port for InPort<C> {
    type Channel = C;
    type Complement = OutPort<C>;

    #[inline]
    fn address(&self) -> Id {
        self.remote
    }

    #[inline]
    fn link(&self) -> &Arc<Link<C>> {
        &self.link
    }

    fn open(own: Id, remote: Id, value: C::Item) -> (Self, OutPort<C>) {
        let input = InPort::new(remote, value);
        let output = OutPort::attach(&input, own);
        (input, output)
    }
}

impl<C: Channel> Port for OutPort<C> {
    type Channel = C;
    type Complement = InPort<C>;

    #[inline]
    fn address(&self) -> Id {
        self.remote
    }

    #[inline]
    fn link(&self) -> &Arc<Link<C>> {
        &self.link
    }

    fn open(own: Id, remote: Id, value: C::Item) -> (Self, InPort<C>) {
        let input = InPort::new(own, value);
        let output = OutPort::attach(&input, remote);
        (output, input)
    }
}

impl<C: Channel> PartialEq for InPort<C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.link, &other.link)
    }
}

impl<C: Channel> Eq for InPort<C> {}

impl<C: Channel> PartialEq for OutPort<C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.link, &other.link)
    }
}

impl<C: Channel> Eq for OutPort<C> {}

impl<C: Channel> PartialEq<OutPort<C>> for InPort<C> {
    fn eq(&self, other: &OutPort<C>) -> bool {
        Arc::ptr_eq(&self.link, &other.link)
    }
}

impl<C: Channel> PartialEq<InPort<C>> for OutPort<C> {
    fn eq(&self, other: &InPort<C>) -> bool {
        Arc::ptr_eq(&self.link, &other.link)
    }
}

impl<C: Channel> fmt::Debug for InPort<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InPort")
            .field("from", &self.remote)
            .field("link", &self.link)
            .finish()
    }
}

impl<C: Channel> fmt::Debug for OutPort<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutPort")
            .field("to", &self.remote)
            .field("link", &self.link)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{pull, push};

    type In = InPort<pull::Single<f32>>;
    type Out = OutPort<pull::Single<f32>>;

    #[test]
    fn attached_ports_share_one_link() {
        let input = In::new(Id(1), 2.0);
        let output = Out::attach(&input, Id(2));
        assert!(input == output);
        assert!(input.shares_link(&output));
        assert_eq!(input.address(), Id(1));
        assert_eq!(output.address(), Id(2));

        assert!(output.push(4.0));
        assert!(input.is_ready());
        assert!(output.is_ready());
        assert_eq!(input.pull(), 4.0);

        output.set_value(8.0);
        assert_eq!(input.value(), 8.0);
    }

    #[test]
    fn equality_is_link_identity() {
        let a = In::new(Id(1), 0.0);
        let b = In::new(Id(1), 0.0);
        assert!(a != b);
    }

    #[test]
    fn ghost_after_remote_drops() {
        let (input, output) = In::open(Id(10), Id(20), 1.0);
        assert!(!input.is_ghost());
        assert!(!output.is_ghost());
        drop(output);
        assert!(input.is_ghost());
    }

    #[test]
    fn open_addresses_each_side_at_the_other() {
        let (output, input) = Out::open(Id(3), Id(4), 0.0);
        assert_eq!(output.address(), Id(4));
        assert_eq!(input.address(), Id(3));
        assert!(output == input);
    }

    #[test]
    fn push_oriented_in_port_pops() {
        let input = InPort::<push::Double<u32>>::new(Id(1), 0);
        let output = OutPort::attach(&input, Id(2));
        output.push(1);
        output.push(2);
        output.push(3);
        assert_eq!(input.pop(), 3);
        assert_eq!(input.pull(), 2);
    }
}
