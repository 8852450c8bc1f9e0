//! Links: the shared storage behind one directed edge.
//!
//! A [`Link`] owns the edge's message [`Channel`] plus a settable `value`
//! (a weight or bias) that is independent of the streamed messages. Links are
//! only ever reached through a pair of ports; see [`crate::port`].

#![forbid(unsafe_code)]

use crate::buffer::{pull, push, Channel, Overwrite};
use parking_lot::Mutex;
use std::fmt;

/// Shared edge storage: a message channel and a settable value.
pub struct Link<C: Channel> {
    value: Mutex<C::Item>,
    channel: C,
}

/// Single-slot link where reading consumes and a full slot rejects writes.
pub type PullLink<T> = Link<pull::Single<T>>;

/// Single-slot link where writes always land and reads see the latest value.
pub type PushLink<T> = Link<push::Single<T>>;

impl<C: Channel> Link<C> {
    /// A link with the given value and an empty channel.
    pub fn new(value: C::Item) -> Self {
        Self {
            value: Mutex::new(value),
            channel: C::default(),
        }
    }

    /// Current value.
    pub fn value(&self) -> C::Item
    where
        C::Item: Clone,
    {
        self.value.lock().clone()
    }

    /// Replace the value, returning the previous one.
    pub fn set_value(&self, value: C::Item) -> C::Item {
        std::mem::replace(&mut *self.value.lock(), value)
    }

    /// The underlying channel.
    #[inline]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// See [`Channel::push`].
    #[inline]
    pub fn push(&self, message: C::Item) -> bool {
        self.channel.push(message)
    }

    /// See [`Channel::pull`].
    #[inline]
    pub fn pull(&self) -> C::Item {
        self.channel.pull()
    }

    /// See [`Channel::try_pull`].
    #[inline]
    pub fn try_pull(&self) -> Option<C::Item> {
        self.channel.try_pull()
    }

    /// See [`Channel::is_ready`].
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.channel.is_ready()
    }

    /// See [`Channel::flush`].
    pub fn flush(&self) {
        self.channel.flush();
    }

    /// See [`Channel::capacity`].
    pub fn capacity(&self) -> usize {
        self.channel.capacity()
    }
}

impl<C: Overwrite> Link<C> {
    /// See [`Overwrite::pop`].
    #[inline]
    pub fn pop(&self) -> C::Item {
        self.channel.pop()
    }
}

impl<C: Channel> Default for Link<C> {
    fn default() -> Self {
        Self::new(C::Item::default())
    }
}

impl<C: Channel> fmt::Debug for Link<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("capacity", &self.channel.capacity())
            .field("ready", &self.channel.is_ready())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_independent_of_messages() {
        let link = PullLink::<f32>::new(3.0);
        assert!(link.push(19.0));
        assert_eq!(link.value(), 3.0);
        assert_eq!(link.set_value(5.0), 3.0);
        assert_eq!(link.pull(), 19.0);
        assert_eq!(link.value(), 5.0);
    }

    #[test]
    fn pull_link_rejects_when_full() {
        let link = PullLink::<u32>::default();
        assert!(link.push(1));
        assert!(!link.push(2));
        assert_eq!(link.pull(), 1);
        assert_eq!(link.pull(), 0);
        assert_eq!(link.capacity(), 1);
    }

    #[test]
    fn push_link_overwrites() {
        let link = PushLink::<f64>::new(0.5);
        assert!(link.push(1.0));
        assert!(link.push(2.0));
        assert!(link.is_ready());
        assert_eq!(link.pop(), 2.0);
        assert!(!link.is_ready());
        assert_eq!(link.pop(), 2.0);
    }

    #[test]
    fn ring_links_are_supported() {
        let link = Link::<pull::Ring<i32, 4>>::new(1);
        for i in 0..4 {
            assert!(link.push(i));
        }
        assert!(!link.push(4));
        link.flush();
        assert!(!link.is_ready());
        assert_eq!(link.capacity(), 4);
    }
}
