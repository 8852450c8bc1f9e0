//! Fixed-capacity message buffers built from [`FrameCell`]s.
//!
//! Two overflow policies, kept as separate type families:
//!
//! - [`pull`]: pull-oriented. A push into a full buffer fails and changes
//!   nothing; the producer decides what to do.
//! - [`push`]: push-oriented. A push never fails; overflowing evicts the
//!   oldest unread item. [`Overwrite::pop`] reads the freshest value.
//!
//! Each family has a capacity-1 (`Single`), capacity-2 (`Double`) and
//! capacity-N (`Ring`) implementation. Full and empty are told apart by the
//! per-slot ready flag, never by cursor equality.
//!
//! All buffers assume one producer and one consumer per edge. Concurrent
//! producers (or consumers) on one buffer stay memory-safe but their
//! ordering is unspecified.

// IMPORTANT: Do not call assert_invariant or any PPT logging here; push/pull is the hot path.

#![forbid(unsafe_code)]

pub mod pull;
pub mod push;

use crate::frame::{FrameCell, Signal};

/// A single-producer/single-consumer message buffer.
pub trait Channel: Default + Send + Sync + 'static {
    /// Payload type.
    type Item: Signal;

    /// Maximum number of unread items held at once.
    const CAPACITY: usize;

    /// Offer a value. Returns false only for a pull-oriented buffer that is full.
    fn push(&self, value: Self::Item) -> bool;

    /// Take the next unread value, if any.
    fn try_pull(&self) -> Option<Self::Item>;

    /// Take the next unread value, or the default when there is none.
    #[inline]
    fn pull(&self) -> Self::Item {
        self.try_pull().unwrap_or_default()
    }

    /// True iff the next readable slot holds an unread value.
    fn is_ready(&self) -> bool;

    /// Reset every slot and both cursors.
    ///
    /// Meant for quiescent buffers; racing a flush against push/pull loses
    /// data but cannot corrupt memory.
    fn flush(&self);

    /// Same as [`Channel::CAPACITY`].
    #[inline]
    fn capacity(&self) -> usize {
        Self::CAPACITY
    }
}

/// Push-oriented buffers additionally expose the freshest value.
pub trait Overwrite: Channel {
    /// Return the most recently pushed value and mark its slot read.
    ///
    /// Older unread slots are left alone, so a following [`Channel::pull`]
    /// may still return them. Repeated pops return the same value until the
    /// next push.
    fn pop(&self) -> Self::Item;
}

pub(crate) fn frames<T: Signal, const N: usize>() -> [T::Cell; N] {
    std::array::from_fn(|_| T::Cell::default())
}

pub(crate) fn reset_all<T: Signal>(frames: &[T::Cell]) {
    for frame in frames {
        frame.reset();
    }
}
