use crate::error::{PipelineError, Result};
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Fixed-capacity key/value store with least-recently-used eviction.
///
/// A join keeps one of these per input side to hold values still waiting
/// for a partner from the other side.
pub struct CorrelationCache<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
    evictions: u64,
}

impl<K: Hash + Eq, V> CorrelationCache<K, V> {
    /// Create a cache holding at most `capacity` keys
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            PipelineError::ConfigError("correlation cache capacity must be non-zero".into())
        })?;
        Ok(Self {
            entries: LruCache::new(capacity),
            evictions: 0,
        })
    }

    /// Look up a key, marking it as most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Check for a key without touching its recency
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Store a value.
    ///
    /// An existing key has its value replaced and becomes most recently
    /// used. A new key inserted at capacity evicts the least recently used
    /// entry, which is returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.entries.contains(&key) {
            self.entries.put(key, value);
            return None;
        }
        let evicted = self.entries.push(key, value);
        if evicted.is_some() {
            self.evictions += 1;
        }
        evicted
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no key is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of keys retained before eviction
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Number of entries dropped because the cache was full
    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        let result = CorrelationCache::<u32, u32>::new(0);
        assert!(matches!(result, Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = CorrelationCache::new(2).unwrap();
        assert!(cache.insert(1, "a").is_none());
        assert!(cache.insert(2, "b").is_none());

        // Touch 1 so that 2 becomes the eviction candidate
        assert_eq!(cache.get(&1), Some(&"a"));

        assert_eq!(cache.insert(3, "c"), Some((2, "b")));
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert_eq!(cache.evictions(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reinsert_replaces_without_eviction() {
        let mut cache = CorrelationCache::new(2).unwrap();
        cache.insert(1, 10);
        cache.insert(2, 20);
        assert!(cache.insert(1, 11).is_none());
        assert_eq!(cache.evictions(), 0);

        // 1 was refreshed by the re-insert, so 2 goes first
        assert_eq!(cache.insert(3, 30), Some((2, 20)));
        assert_eq!(cache.get(&1), Some(&11));
    }

    #[test]
    fn test_capacity() {
        let cache: CorrelationCache<u8, u8> = CorrelationCache::new(42).unwrap();
        assert_eq!(cache.capacity(), 42);
        assert!(cache.is_empty());
    }
}
