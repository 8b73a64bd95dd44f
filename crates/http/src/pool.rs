//! A bounded, thread-safe object pool.
//!
//! Buffers and whole messages are acquired around one request/response lifecycle and handed
//! back afterwards, so a steady-state connection performs no heap allocation. The free-list is
//! a lock-free [`ArrayQueue`]; everything acquired from it is exclusively owned by the caller
//! until it is released, either explicitly or by dropping the [`Pooled`] guard.

use bytes::BytesMut;
use crossbeam::queue::ArrayQueue;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::trace;

/// Objects that can be put back into a [`Pool`].
///
/// `recycle` must bring the value back to its freshly constructed state while keeping any
/// allocated capacity around for the next user.
pub trait Recycle {
    fn recycle(&mut self);
}

impl Recycle for BytesMut {
    #[inline]
    fn recycle(&mut self) {
        self.clear();
    }
}

impl Recycle for Vec<u8> {
    #[inline]
    fn recycle(&mut self) {
        self.clear();
    }
}

/// A shareable handle to a bounded free-list of `T`.
///
/// Cloning the handle is cheap; all clones share the same free-list.
pub struct Pool<T> {
    slots: Arc<ArrayQueue<T>>,
}

/// The pool of plain byte buffers used by readers, writers and compression helpers.
pub type BufferPool = Pool<BytesMut>;

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self { slots: Arc::clone(&self.slots) }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("idle", &self.slots.len()).field("capacity", &self.slots.capacity()).finish()
    }
}

impl<T: Recycle + Default> Pool<T> {
    /// Creates a pool keeping at most `capacity` idle objects.
    pub fn new(capacity: usize) -> Self {
        Self { slots: Arc::new(ArrayQueue::new(capacity.max(1))) }
    }

    /// Takes an idle object, or constructs a new one when the pool is empty.
    pub fn acquire(&self) -> Pooled<T> {
        let value = self.slots.pop().unwrap_or_default();
        Pooled { value, pool: Some(self.clone()) }
    }

    /// Recycles `value` and stores it for reuse. It is dropped when the pool is full.
    pub fn release(&self, mut value: T) {
        value.recycle();
        if self.slots.push(value).is_err() {
            trace!(capacity = self.slots.capacity(), "pool is full, dropping released object");
        }
    }

    /// Number of idle objects currently stored.
    pub fn idle(&self) -> usize {
        self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }
}

/// An object borrowed from a [`Pool`]; returned to it on drop.
pub struct Pooled<T: Recycle + Default> {
    value: T,
    pool: Option<Pool<T>>,
}

impl<T: Recycle + Default> Pooled<T> {
    /// Wraps a value that does not belong to any pool. Dropping it simply drops the value.
    pub fn detached(value: T) -> Self {
        Self { value, pool: None }
    }

    /// Takes the value out, so it is never returned to the pool.
    pub fn into_inner(mut self) -> T {
        self.pool = None;
        std::mem::take(&mut self.value)
    }
}

impl<T: Recycle + Default> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T: Recycle + Default> Default for Pooled<T> {
    fn default() -> Self {
        Self::detached(T::default())
    }
}

impl<T: Recycle + Default> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

impl<T: Recycle + Default + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled").field("value", &self.value).field("pooled", &self.pool.is_some()).finish()
    }
}

impl<T: Recycle + Default> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(std::mem::take(&mut self.value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_reuse_keeps_capacity() {
        let pool = BufferPool::new(4);

        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(&[b'a'; 1024]);
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 1024);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_full_pool_drops_objects() {
        let pool = BufferPool::new(1);
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn test_detached_and_into_inner() {
        let pool = BufferPool::new(2);

        let mut buf = pool.acquire();
        buf.extend_from_slice(b"keep me");
        let owned = buf.into_inner();
        assert_eq!(&owned[..], b"keep me");
        assert_eq!(pool.idle(), 0);

        let detached = Pooled::detached(BytesMut::from(&b"xyz"[..]));
        assert_eq!(&detached[..], b"xyz");
        drop(detached);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = BufferPool::new(8);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let mut buf = pool.acquire();
                        assert!(buf.is_empty());
                        buf.extend_from_slice(&[i; 16]);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(pool.idle() <= 8);
        assert!(pool.idle() > 0);
    }
}
