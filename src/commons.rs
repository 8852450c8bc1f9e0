//! Commons: readers-writer locking with scoped guards.
//!
//! Registries are multi-reader/single-writer resources. Queries take a
//! [`ReadScope`], structural changes take a [`WriteScope`] for the whole
//! mutation. Operations spanning two registries go through [`write_pair`],
//! which always acquires the lower key first so two threads moving members in
//! opposite directions cannot deadlock.

#![forbid(unsafe_code)]

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared (reader) guard. Released when dropped.
pub type ReadScope<'a, T> = RwLockReadGuard<'a, T>;

/// Exclusive (writer) guard. Released when dropped.
pub type WriteScope<'a, T> = RwLockWriteGuard<'a, T>;

static NEXT_LOCK_KEY: AtomicU64 = AtomicU64::new(1);

/// A readers-writer lock carrying a process-unique ordering key.
#[derive(Debug)]
pub struct SharedLock<T> {
    key: u64,
    inner: RwLock<T>,
}

impl<T> SharedLock<T> {
    /// Wrap `value` in a new lock with a fresh key.
    pub fn new(value: T) -> Self {
        Self {
            key: NEXT_LOCK_KEY.fetch_add(1, Ordering::Relaxed),
            inner: RwLock::new(value),
        }
    }

    /// Ordering key; unique per lock for the lifetime of the process.
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Acquire shared access for the current scope.
    #[inline]
    pub fn read(&self) -> ReadScope<'_, T> {
        self.inner.read()
    }

    /// Acquire exclusive access for the current scope.
    #[inline]
    pub fn write(&self) -> WriteScope<'_, T> {
        self.inner.write()
    }

    /// Non-blocking shared acquire.
    pub fn try_read(&self) -> Option<ReadScope<'_, T>> {
        self.inner.try_read()
    }

    /// Non-blocking exclusive acquire.
    pub fn try_write(&self) -> Option<WriteScope<'_, T>> {
        self.inner.try_write()
    }

    /// True if the lock is held by anyone, reader or writer.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

impl<T: Default> Default for SharedLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Acquire writer access on two distinct locks in key order.
///
/// Guards come back in argument order regardless of acquisition order.
/// Returns `None` when both arguments are the same lock, which would
/// otherwise self-deadlock.
pub fn write_pair<'a, T>(
    first: &'a SharedLock<T>,
    second: &'a SharedLock<T>,
) -> Option<(WriteScope<'a, T>, WriteScope<'a, T>)> {
    if first.key == second.key {
        return None;
    }
    if first.key < second.key {
        let a = first.write();
        let b = second.write();
        Some((a, b))
    } else {
        let b = second.write();
        let a = first.write();
        Some((a, b))
    }
}
