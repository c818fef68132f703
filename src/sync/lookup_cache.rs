//! Single-flight lookup cache for expensive remote identifier resolution.
//!
//! The fast path is a plain lock-free read. On a miss, callers serialize on
//! a keyed lock per concurrency key (typically the remote scope, e.g. a
//! workspace), re-check the cache, and only then run the population
//! closure. One population may write many entries: resolving one scope
//! usually returns identifiers for everything in it, which amortizes the
//! remote call across later lookups. Entries carry an absolute expiry and
//! there is no proactive invalidation; a renamed remote resource is only
//! noticed on the first lookup after expiry.

use crate::sync::keyed_lock::KeyedLock;
use dashmap::DashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Process-wide single-flight cache, keyed by application-defined strings.
#[derive(Debug)]
pub struct LookupCache<V: Clone> {
    entries: DashMap<String, CacheEntry<V>>,
    locks: KeyedLock<String>,
    ttl: Duration,
}

impl<V: Clone> LookupCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            locks: KeyedLock::new(),
            ttl,
        }
    }

    /// Lock-free read; expired entries are dropped lazily.
    pub fn get(&self, cache_key: &str) -> Option<V> {
        let now = Instant::now();
        // The read guard must be released before the conditional removal
        // below takes a write lock on the same shard.
        let (value, expired) = match self.entries.get(cache_key) {
            Some(entry) if entry.expires_at > now => (Some(entry.value.clone()), false),
            Some(_) => (None, true),
            None => (None, false),
        };
        if expired {
            self.entries
                .remove_if(cache_key, |_, entry| entry.expires_at <= now);
        }
        value
    }

    /// Resolve `cache_key`, running `populate` under the `concurrency_key`
    /// lock if the cache cannot answer.
    ///
    /// `populate` returns every entry the remote call produced, not just
    /// the requested one; all of them are stored before the requested value
    /// is returned. The value may legitimately still be absent afterwards
    /// (the remote side does not know the name) — that absence is the
    /// caller's answer, not an error.
    pub async fn get_or_populate<F, Fut, E>(
        &self,
        concurrency_key: &str,
        cache_key: &str,
        populate: F,
    ) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<(String, V)>, E>>,
    {
        if let Some(value) = self.get(cache_key) {
            return Ok(Some(value));
        }

        let _guard = self.locks.lock(concurrency_key.to_string()).await;

        // Another caller may have populated the key while this one waited.
        if let Some(value) = self.get(cache_key) {
            return Ok(Some(value));
        }

        let produced = populate().await?;
        let expires_at = Instant::now() + self.ttl;
        for (key, value) in produced {
            self.entries.insert(key, CacheEntry { value, expires_at });
        }

        Ok(self.get(cache_key))
    }

    pub fn insert(&self, cache_key: impl Into<String>, value: V) {
        self.entries.insert(
            cache_key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
