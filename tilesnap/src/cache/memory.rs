//! Entry-bounded in-memory cache with LRU eviction.

use super::stats::CacheStats;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;

struct Inner<K: Hash + Eq, V> {
    /// `None` when caching is disabled
    entries: Option<lru::LruCache<K, V>>,
    stats: CacheStats,
}

/// Thread-safe cache holding at most `capacity` entries.
///
/// Reads refresh recency; inserting past capacity drops the least recently
/// used entry. A capacity of zero disables caching.
pub struct LruCache<K: Hash + Eq, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: NonZeroUsize::new(capacity).map(lru::LruCache::new),
                stats: CacheStats::default(),
            }),
            capacity,
        }
    }

    /// Returns a clone of the cached value and marks it as most recent.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let Inner { entries, stats } = &mut *inner;

        match entries.as_mut().and_then(|cache| cache.get(key)) {
            Some(value) => {
                stats.hits += 1;
                Some(value.clone())
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Inserts or replaces a value, evicting the oldest entry when full.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        let Inner { entries, stats } = &mut *inner;
        let Some(cache) = entries.as_mut() else {
            return;
        };

        // `push` hands back either the replaced entry or the evicted one
        if let Some((old_key, _)) = cache.push(key.clone(), value) {
            if old_key != key {
                stats.evictions += 1;
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner
            .lock()
            .entries
            .as_ref()
            .is_some_and(|cache| cache.contains(key))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.as_ref().map_or(0, |cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every entry. Statistics are kept.
    pub fn clear(&self) {
        if let Some(cache) = self.inner.lock().entries.as_mut() {
            cache.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.as_ref().map_or(0, |cache| cache.len()),
            ..inner.stats.clone()
        }
    }
}
