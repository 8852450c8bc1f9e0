//! Push-oriented buffers: pushes always land, overflow drops the oldest item.
//!
//! `Double` and `Ring` keep the unread bit of every slot together with a push
//! counter in one `AtomicU64` mark word. The write position is the counter
//! modulo the capacity; the slot under it holds the oldest of the last N
//! pushes, so the oldest unread item is the first marked slot at or after the
//! write position. Empty means no marked slot, never cursor equality.
//!
//! A push is two atomic steps on the mark word: unmark the write slot (an
//! eviction when it was marked), store the payload, then mark it and bump the
//! counter. Consumers read a payload first and then claim it with a
//! compare-exchange against the word they read, so an eviction or publish in
//! between forces a retry instead of handing out a value out of order. The
//! counter makes a full lap of pushes visible to that compare-exchange.

use super::{frames, reset_all, Channel, Overwrite};
use crate::frame::{FrameCell, Signal};
use std::sync::atomic::{AtomicU64, Ordering};

/// Capacity-1 push-oriented buffer: the slot always holds the latest write.
pub struct Single<T: Signal> {
    frame: T::Cell,
}

impl<T: Signal> Default for Single<T> {
    fn default() -> Self {
        Self {
            frame: T::Cell::default(),
        }
    }
}

impl<T: Signal + Clone> Channel for Single<T> {
    type Item = T;
    const CAPACITY: usize = 1;

    #[inline]
    fn push(&self, value: T) -> bool {
        self.frame.put(value);
        true
    }

    #[inline]
    fn try_pull(&self) -> Option<T> {
        self.frame.consume()
    }

    #[inline]
    fn is_ready(&self) -> bool {
        self.frame.is_ready()
    }

    fn flush(&self) {
        self.frame.reset();
    }
}

impl<T: Signal + Clone> Overwrite for Single<T> {
    #[inline]
    fn pop(&self) -> T {
        self.frame.latest()
    }
}

const MARKS: u64 = u32::MAX as u64;
const COUNT_SHIFT: u32 = 32;

#[inline]
fn bit(slot: usize) -> u64 {
    1 << slot
}

#[inline]
fn marked(word: u64) -> u64 {
    word & MARKS
}

#[inline]
fn count(word: u64) -> usize {
    (word >> COUNT_SHIFT) as usize
}

/// Unread bits in the low half, push counter in the high half.
#[derive(Default)]
struct MarkWord(AtomicU64);

impl MarkWord {
    #[inline]
    fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Unmark the slot about to be overwritten; true if it held an unread item.
    #[inline]
    fn evict(&self, slot: usize) -> bool {
        self.0.fetch_and(!bit(slot), Ordering::AcqRel) & bit(slot) != 0
    }

    /// Consumer step: unmark `slot` if the word is still `seen`.
    #[inline]
    fn claim(&self, seen: u64, slot: usize) -> bool {
        self.0
            .compare_exchange(seen, seen & !bit(slot), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

/// Capacity-2 push-oriented buffer.
///
/// The write slot is the low bit of the push counter and the freshest slot
/// is the other one. The counter wraps at 2^32, an even number, so a plain
/// `fetch_add` publishes.
pub struct Double<T: Signal> {
    frames: [T::Cell; 2],
    marks: MarkWord,
}

impl<T: Signal> Default for Double<T> {
    fn default() -> Self {
        Self {
            frames: frames::<T, 2>(),
            marks: MarkWord::default(),
        }
    }
}

impl<T: Signal> Double<T> {
    #[inline]
    fn oldest(word: u64) -> Option<usize> {
        let w = count(word) & 1;
        match marked(word) {
            0 => None,
            m if m & bit(w) != 0 => Some(w),
            _ => Some(w ^ 1),
        }
    }
}

impl<T: Signal + Clone> Channel for Double<T> {
    type Item = T;
    const CAPACITY: usize = 2;

    fn push(&self, value: T) -> bool {
        let w = count(self.marks.load()) & 1;
        self.marks.evict(w);
        self.frames[w].put(value);
        self.marks
            .0
            .fetch_add((1 << COUNT_SHIFT) | bit(w), Ordering::AcqRel);
        true
    }

    fn try_pull(&self) -> Option<T> {
        loop {
            let word = self.marks.load();
            let slot = Self::oldest(word)?;
            let value = self.frames[slot].snapshot().data;
            if self.marks.claim(word, slot) {
                return Some(value);
            }
        }
    }

    #[inline]
    fn is_ready(&self) -> bool {
        marked(self.marks.load()) != 0
    }

    fn flush(&self) {
        reset_all::<T>(&self.frames);
        self.marks.reset();
    }
}

impl<T: Signal + Clone> Overwrite for Double<T> {
    fn pop(&self) -> T {
        loop {
            let word = self.marks.load();
            let slot = (count(word) & 1) ^ 1;
            let value = self.frames[slot].snapshot().data;
            if self.marks.claim(word, slot) {
                return value;
            }
        }
    }
}

/// Capacity-N push-oriented ring, `2 <= N <= 32`. Capacity 1 is [`Single`].
pub struct Ring<T: Signal, const N: usize> {
    frames: [T::Cell; N],
    marks: MarkWord,
}

impl<T: Signal, const N: usize> Ring<T, N> {
    const SLOTS: () = assert!(
        N >= 2 && N <= 32,
        "push-oriented ring capacity must be within 2..=32"
    );

    /// The counter restarts at this multiple of N so `count % N` stays
    /// continuous across the wrap.
    const WRAP: usize = N * (u32::MAX as usize / N);

    #[inline]
    fn write_slot(word: u64) -> usize {
        count(word) % N
    }

    #[inline]
    fn freshest(word: u64) -> usize {
        (count(word) + N - 1) % N
    }

    fn oldest(word: u64) -> Option<usize> {
        let m = marked(word);
        if m == 0 {
            return None;
        }
        let w = Self::write_slot(word);
        (0..N).map(|i| (w + i) % N).find(|&slot| m & bit(slot) != 0)
    }

    fn publish(&self, slot: usize) {
        let _ = self
            .marks
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let next = match count(word) + 1 {
                    c if c == Self::WRAP => 0,
                    c => c,
                };
                Some(((next as u64) << COUNT_SHIFT) | marked(word) | bit(slot))
            });
    }
}

impl<T: Signal, const N: usize> Default for Ring<T, N> {
    fn default() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SLOTS;
        Self {
            frames: frames::<T, N>(),
            marks: MarkWord::default(),
        }
    }
}

impl<T: Signal + Clone, const N: usize> Channel for Ring<T, N> {
    type Item = T;
    const CAPACITY: usize = N;

    fn push(&self, value: T) -> bool {
        let w = Self::write_slot(self.marks.load());
        self.marks.evict(w);
        self.frames[w].put(value);
        self.publish(w);
        true
    }

    fn try_pull(&self) -> Option<T> {
        loop {
            let word = self.marks.load();
            let slot = Self::oldest(word)?;
            let value = self.frames[slot].snapshot().data;
            if self.marks.claim(word, slot) {
                return Some(value);
            }
        }
    }

    #[inline]
    fn is_ready(&self) -> bool {
        marked(self.marks.load()) != 0
    }

    fn flush(&self) {
        reset_all::<T>(&self.frames);
        self.marks.reset();
    }
}

impl<T: Signal + Clone, const N: usize> Overwrite for Ring<T, N> {
    fn pop(&self) -> T {
        loop {
            let word = self.marks.load();
            let slot = Self::freshest(word);
            let value = self.frames[slot].snapshot().data;
            if self.marks.claim(word, slot) {
                return value;
            }
        }
    }
}
