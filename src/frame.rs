//! Frames: one buffered message slot, a payload plus an unread flag.
//!
//! The frame representation is chosen at compile time from the payload type
//! through [`Signal::Cell`]:
//!
//! - [`PackedFrame`] stores `ready << 32 | bits` in one `AtomicU64`, so every
//!   read-and-replace is a single hardware atomic. Used for payloads that fit
//!   in 32 bits ([`Packed`]).
//! - [`LockedFrame`] guards a [`Frame`] with a `parking_lot::Mutex`. Used for
//!   wide scalars, heap payloads and move-only types. The critical section is
//!   the whole operation; nothing ever waits on a condition.
//!
//! Both satisfy the same [`FrameCell`] contract, so buffers never see the
//! difference.

#![forbid(unsafe_code)]

use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// A plain `(ready, data)` pair.
///
/// `ready` is true iff `data` has not been consumed yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame<T> {
    /// Unread flag.
    pub ready: bool,
    /// Payload.
    pub data: T,
}

impl<T> Frame<T> {
    /// An unread frame holding `data`.
    pub fn unread(data: T) -> Self {
        Self { ready: true, data }
    }
}

/// Indivisible operations on one message slot.
pub trait FrameCell<T>: Default + Send + Sync {
    /// Store `value` only if the slot has been consumed. Hands the value back
    /// when the slot is still unread.
    fn try_put(&self, value: T) -> Result<(), T>;

    /// Store `value` unconditionally. Returns true if an unread value was
    /// overwritten.
    fn put(&self, value: T) -> bool;

    /// Consume the slot by move if it is unread.
    fn take(&self) -> Option<T>;

    /// Consume the slot by clone if it is unread; the payload stays in place.
    fn consume(&self) -> Option<T>
    where
        T: Clone;

    /// Mark the slot read and return its payload, whether or not it was unread.
    fn latest(&self) -> T
    where
        T: Clone;

    /// True iff the slot holds an unread value.
    fn is_ready(&self) -> bool;

    /// Back to `{ ready: false, data: default }`.
    fn reset(&self);

    /// Copy of the current state, for inspection.
    fn snapshot(&self) -> Frame<T>
    where
        T: Clone;
}

/// Payloads that round-trip through 32 bits.
pub trait Packed: Copy + Default + Send + 'static {
    /// Encode into the low word.
    fn pack(self) -> u32;
    /// Decode from the low word.
    fn unpack(bits: u32) -> Self;
}

const READY: u64 = 1 << 32;

#[inline]
fn encode<T: Packed>(value: T, ready: bool) -> u64 {
    u64::from(value.pack()) | if ready { READY } else { 0 }
}

#[inline]
fn decode<T: Packed>(word: u64) -> T {
    T::unpack(word as u32)
}

/// Lock-free frame for [`Packed`] payloads.
#[derive(Debug)]
pub struct PackedFrame<T> {
    word: AtomicU64,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Packed> Default for PackedFrame<T> {
    fn default() -> Self {
        Self {
            word: AtomicU64::new(encode(T::default(), false)),
            _payload: PhantomData,
        }
    }
}

impl<T: Packed> FrameCell<T> for PackedFrame<T> {
    fn try_put(&self, value: T) -> Result<(), T> {
        let word = encode(value, true);
        self.word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (cur & READY == 0).then_some(word)
            })
            .map(|_| ())
            .map_err(|_| value)
    }

    #[inline]
    fn put(&self, value: T) -> bool {
        self.word.swap(encode(value, true), Ordering::AcqRel) & READY != 0
    }

    fn take(&self) -> Option<T> {
        self.word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (cur & READY != 0).then_some(cur & !READY)
            })
            .ok()
            .map(decode)
    }

    #[inline]
    fn consume(&self) -> Option<T> {
        self.take()
    }

    #[inline]
    fn latest(&self) -> T {
        decode(self.word.fetch_and(!READY, Ordering::AcqRel))
    }

    #[inline]
    fn is_ready(&self) -> bool {
        self.word.load(Ordering::Acquire) & READY != 0
    }

    fn reset(&self) {
        self.word
            .store(encode(T::default(), false), Ordering::Release);
    }

    fn snapshot(&self) -> Frame<T> {
        let word = self.word.load(Ordering::Acquire);
        Frame {
            ready: word & READY != 0,
            data: decode(word),
        }
    }
}

/// Mutex-guarded frame for payloads that cannot be exchanged atomically.
#[derive(Debug, Default)]
pub struct LockedFrame<T> {
    inner: Mutex<Frame<T>>,
}

impl<T: Default + Send> FrameCell<T> for LockedFrame<T> {
    fn try_put(&self, value: T) -> Result<(), T> {
        let mut frame = self.inner.lock();
        if frame.ready {
            return Err(value);
        }
        *frame = Frame::unread(value);
        Ok(())
    }

    fn put(&self, value: T) -> bool {
        let mut frame = self.inner.lock();
        let evicted = frame.ready;
        *frame = Frame::unread(value);
        evicted
    }

    fn take(&self) -> Option<T> {
        let mut frame = self.inner.lock();
        if !frame.ready {
            return None;
        }
        frame.ready = false;
        Some(std::mem::take(&mut frame.data))
    }

    fn consume(&self) -> Option<T>
    where
        T: Clone,
    {
        let mut frame = self.inner.lock();
        if !frame.ready {
            return None;
        }
        frame.ready = false;
        Some(frame.data.clone())
    }

    fn latest(&self) -> T
    where
        T: Clone,
    {
        let mut frame = self.inner.lock();
        frame.ready = false;
        frame.data.clone()
    }

    fn is_ready(&self) -> bool {
        self.inner.lock().ready
    }

    fn reset(&self) {
        *self.inner.lock() = Frame::default();
    }

    fn snapshot(&self) -> Frame<T>
    where
        T: Clone,
    {
        self.inner.lock().clone()
    }
}

/// A payload type that can travel over a link.
///
/// The associated [`Cell`](Signal::Cell) picks the frame representation. Custom
/// payloads usually pick `LockedFrame<Self>`; a `Copy` type that also
/// implements [`Packed`] can use `PackedFrame<Self>` and go lock-free.
pub trait Signal: Default + Send + 'static {
    /// Frame representation for this payload.
    type Cell: FrameCell<Self>;
}

macro_rules! packed_signal {
    ($($t:ty => |$v:ident| $pack:expr, |$b:ident| $unpack:expr;)*) => {$(
        impl Packed for $t {
            #[inline]
            fn pack(self) -> u32 {
                let $v = self;
                $pack
            }
            #[inline]
            fn unpack($b: u32) -> Self {
                $unpack
            }
        }

        impl Signal for $t {
            type Cell = PackedFrame<$t>;
        }
    )*};
}

packed_signal! {
    u8 => |v| u32::from(v), |b| b as u8;
    u16 => |v| u32::from(v), |b| b as u16;
    u32 => |v| v, |b| b;
    i8 => |v| u32::from(v as u8), |b| b as u8 as i8;
    i16 => |v| u32::from(v as u16), |b| b as u16 as i16;
    i32 => |v| v as u32, |b| b as i32;
    f32 => |v| v.to_bits(), |b| f32::from_bits(b);
    bool => |v| u32::from(v), |b| b != 0;
    char => |v| u32::from(v), |b| char::from_u32(b).unwrap_or_default();
}

macro_rules! locked_signal {
    ($($t:ty),* $(,)?) => {$(
        impl Signal for $t {
            type Cell = LockedFrame<$t>;
        }
    )*};
}

locked_signal!(u64, i64, f64, usize, isize, u128, i128, String);

impl<T: Send + 'static> Signal for Vec<T> {
    type Cell = LockedFrame<Vec<T>>;
}

impl<T: Send + 'static> Signal for Option<T> {
    type Cell = LockedFrame<Option<T>>;
}
