//! Pull-oriented buffers: a full buffer rejects new pushes.

use super::{frames, reset_all, Channel};
use crate::frame::{FrameCell, Signal};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Capacity-1 pull-oriented buffer. One frame, no cursors.
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

impl<T: Signal> Channel for Single<T> {
    type Item = T;
    const CAPACITY: usize = 1;

    #[inline]
    fn push(&self, value: T) -> bool {
        self.frame.try_put(value).is_ok()
    }

    #[inline]
    fn try_pull(&self) -> Option<T> {
        self.frame.take()
    }

    #[inline]
    fn is_ready(&self) -> bool {
        self.frame.is_ready()
    }

    fn flush(&self) {
        self.frame.reset();
    }
}

/// Capacity-2 pull-oriented buffer. Cursors are single bits flipped with `^ 1`.
pub struct Double<T: Signal> {
    frames: [T::Cell; 2],
    write: AtomicUsize,
    read: AtomicUsize,
}

impl<T: Signal> Default for Double<T> {
    fn default() -> Self {
        Self {
            frames: frames::<T, 2>(),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
        }
    }
}

impl<T: Signal> Channel for Double<T> {
    type Item = T;
    const CAPACITY: usize = 2;

    #[inline]
    fn push(&self, value: T) -> bool {
        let w = self.write.load(Ordering::Relaxed);
        if self.frames[w].try_put(value).is_err() {
            return false;
        }
        self.write.store(w ^ 1, Ordering::Relaxed);
        true
    }

    #[inline]
    fn try_pull(&self) -> Option<T> {
        let r = self.read.load(Ordering::Relaxed);
        let value = self.frames[r].take()?;
        self.read.store(r ^ 1, Ordering::Relaxed);
        Some(value)
    }

    #[inline]
    fn is_ready(&self) -> bool {
        self.frames[self.read.load(Ordering::Relaxed)].is_ready()
    }

    fn flush(&self) {
        reset_all::<T>(&self.frames);
        self.write.store(0, Ordering::Relaxed);
        self.read.store(0, Ordering::Relaxed);
    }
}

/// Capacity-N pull-oriented ring. Cursors advance modulo `N`.
pub struct Ring<T: Signal, const N: usize> {
    frames: [T::Cell; N],
    write: AtomicUsize,
    read: AtomicUsize,
}

impl<T: Signal, const N: usize> Ring<T, N> {
    const NON_EMPTY: () = assert!(N > 0, "ring capacity must be at least 1");

    #[inline]
    fn next(i: usize) -> usize {
        (i + 1) % N
    }
}

impl<T: Signal, const N: usize> Default for Ring<T, N> {
    fn default() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NON_EMPTY;
        Self {
            frames: frames::<T, N>(),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
        }
    }
}

impl<T: Signal, const N: usize> Channel for Ring<T, N> {
    type Item = T;
    const CAPACITY: usize = N;

    fn push(&self, value: T) -> bool {
        let w = self.write.load(Ordering::Relaxed);
        if self.frames[w].try_put(value).is_err() {
            return false;
        }
        self.write.store(Self::next(w), Ordering::Relaxed);
        true
    }

    fn try_pull(&self) -> Option<T> {
        let r = self.read.load(Ordering::Relaxed);
        let value = self.frames[r].take()?;
        self.read.store(Self::next(r), Ordering::Relaxed);
        Some(value)
    }

    #[inline]
    fn is_ready(&self) -> bool {
        self.frames[self.read.load(Ordering::Relaxed)].is_ready()
    }

    fn flush(&self) {
        reset_all::<T>(&self.frames);
        self.write.store(0, Ordering::Relaxed);
        self.read.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_then_drain<C: Channel<Item = u32>>() {
        let buf = C::default();
        assert!(!buf.is_ready());
        assert_eq!(buf.pull(), 0);
        for i in 0..C::CAPACITY as u32 {
            assert!(buf.push(i + 1), "push {i} should fit");
        }
        assert!(!buf.push(99), "full buffer must reject");
        assert!(buf.is_ready());
        assert_eq!(buf.pull(), 1);
        assert!(buf.push(100));
        assert!(!buf.push(101));
        let mut drained = Vec::new();
        while let Some(v) = buf.try_pull() {
            drained.push(v);
        }
        let mut expected: Vec<u32> = (2..=C::CAPACITY as u32).collect();
        expected.push(100);
        assert_eq!(drained, expected);
        assert!(!buf.is_ready());
    }

    #[test]
    fn single_capacity_law() {
        fill_then_drain::<Single<u32>>();
    }

    #[test]
    fn double_capacity_law() {
        fill_then_drain::<Double<u32>>();
    }

    #[test]
    fn ring_capacity_law() {
        fill_then_drain::<Ring<u32, 1>>();
        fill_then_drain::<Ring<u32, 3>>();
        fill_then_drain::<Ring<u32, 8>>();
    }

    #[test]
    fn flush_resets_cursors() {
        let buf = Ring::<f32, 4>::default();
        buf.push(1.0);
        buf.push(2.0);
        buf.pull();
        buf.flush();
        assert!(!buf.is_ready());
        for i in 0..4 {
            assert!(buf.push(i as f32));
        }
        assert_eq!(buf.pull(), 0.0);
        assert_eq!(buf.pull(), 1.0);
    }

    #[test]
    fn move_only_payloads_are_taken() {
        let buf = Double::<Vec<String>>::default();
        assert!(buf.push(vec!["a".to_string()]));
        assert!(buf.push(vec!["b".to_string()]));
        assert!(!buf.push(vec!["c".to_string()]));
        assert_eq!(buf.pull(), vec!["a".to_string()]);
        assert_eq!(buf.pull(), vec!["b".to_string()]);
        assert!(buf.pull().is_empty());
    }
}
