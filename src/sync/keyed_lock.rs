//! Per-key asynchronous mutual exclusion.
//!
//! At most one holder per key at a time; holders of different keys never
//! block each other. Entries are reference counted in a concurrent map:
//! each waiter increments its key's counter before awaiting the mutex and
//! decrements on release, and an entry is removed only when the counter
//! reaches zero. Removal compares both the key and the entry identity, so
//! a fresh entry created for the same key concurrently with removal of the
//! old one is never discarded.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct LockEntry {
    waiters: AtomicUsize,
    mutex: Arc<Mutex<()>>,
}

/// Keyed asynchronous mutex.
#[derive(Debug, Default)]
pub struct KeyedLock<K: Eq + Hash + Clone> {
    entries: DashMap<K, Arc<LockEntry>>,
}

impl<K: Eq + Hash + Clone> KeyedLock<K> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Acquire the lock for `key`, waiting until any current holder of the
    /// same key releases it.
    ///
    /// Cancellation-safe: a waiter whose future is dropped before acquiring
    /// still decrements the reference count, so abandoned waits never leak
    /// entries or poison the lock.
    pub async fn lock(&self, key: K) -> KeyedLockGuard<'_, K> {
        let registration = self.register(key);
        let permit = registration.entry.mutex.clone().lock_owned().await;
        KeyedLockGuard {
            _permit: permit,
            _registration: registration,
        }
    }

    /// Number of keys currently tracked (holders plus waiters).
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn register(&self, key: K) -> Registration<'_, K> {
        // The increment happens under the shard lock of the entry API, so a
        // concurrent conditional removal can never observe this waiter as
        // absent.
        let entry = {
            let slot = self.entries.entry(key.clone()).or_default();
            slot.waiters.fetch_add(1, Ordering::SeqCst);
            slot.value().clone()
        };
        Registration {
            lock: self,
            key,
            entry,
        }
    }
}

/// RAII record of one waiter. Dropping it releases the waiter's reference
/// and removes the map entry once nobody else holds or awaits the key.
struct Registration<'a, K: Eq + Hash + Clone> {
    lock: &'a KeyedLock<K>,
    key: K,
    entry: Arc<LockEntry>,
}

impl<K: Eq + Hash + Clone> Drop for Registration<'_, K> {
    fn drop(&mut self) {
        if self.entry.waiters.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Conditional remove: only this exact entry, and only if no new
            // waiter registered between the decrement and here.
            self.lock.entries.remove_if(&self.key, |_, current| {
                Arc::ptr_eq(current, &self.entry)
                    && current.waiters.load(Ordering::SeqCst) == 0
            });
        }
    }
}

/// Exclusive hold on one key of a [`KeyedLock`]; releases on drop.
pub struct KeyedLockGuard<'a, K: Eq + Hash + Clone> {
    // Field order matters: the mutex guard must drop before the
    // registration decrements the reference count.
    _permit: OwnedMutexGuard<()>,
    _registration: Registration<'a, K>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let lock = KeyedLock::new();
        {
            let _guard = lock.lock("x").await;
            assert_eq!(lock.entry_count(), 1);
        }
        assert_eq!(lock.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_reentrant_after_release() {
        let lock = KeyedLock::new();
        drop(lock.lock("x").await);
        drop(lock.lock("x").await);
        assert_eq!(lock.entry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_excludes_concurrent_holders() {
        let lock = Arc::new(KeyedLock::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = lock.clone();
            let concurrent = concurrent.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = lock.lock("shared").await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(lock.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_leak() {
        let lock = Arc::new(KeyedLock::new());
        let guard = lock.lock("x").await;

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move {
                let _guard = lock.lock("x").await;
            })
        };
        tokio::task::yield_now().await;
        waiter.abort();
        let _ = waiter.await;

        drop(guard);
        // The abandoned wait must have released its reference; the key can
        // be acquired again and the table drains.
        drop(lock.lock("x").await);
        assert_eq!(lock.entry_count(), 0);
    }
}
