//! Cache Store Module
//!
//! Fixed-capacity LRU cache: a hash index over a doubly linked recency
//! ordering, serialized by a single mutex per instance.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::cache::{CacheStats, RecencyList};

// == LRU Core ==
/// Unsynchronized LRU state. Index size == ordering length <= capacity.
#[derive(Debug)]
struct LruCore<K, V> {
    /// Key -> slot in the recency ordering
    index: HashMap<K, usize>,
    /// Recency ordering, head = most recently used
    order: RecencyList<K, V>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl<K, V> LruCore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            order: RecencyList::with_capacity(capacity),
            stats: CacheStats::new(capacity),
            capacity,
        }
    }

    fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.index.get(key).copied() {
            Some(idx) => {
                self.order.move_to_front(idx);
                self.stats.record_hit();
                self.order.get(idx).map(|entry| entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    fn put(&mut self, key: K, value: V) -> Option<K> {
        // Overwrite case: update in place and promote
        if let Some(idx) = self.index.get(&key).copied() {
            if let Some(entry) = self.order.get_mut(idx) {
                entry.value = value;
            }
            self.order.move_to_front(idx);
            return None;
        }

        let idx = self.order.push_front(key.clone(), value);
        self.index.insert(key, idx);

        let evicted = if self.order.len() > self.capacity {
            self.order.pop_back().map(|(evicted_key, _)| {
                self.index.remove(&evicted_key);
                self.stats.record_eviction();
                evicted_key
            })
        } else {
            None
        };

        self.stats.set_total_entries(self.index.len());
        evicted
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.index.remove(key)?;
        let removed = self.order.remove(idx).map(|(_, value)| value);
        self.stats.set_total_entries(self.index.len());
        removed
    }

    fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.index.get(key)?;
        self.order.get(*idx).map(|entry| entry.value.clone())
    }

    fn clear(&mut self) {
        self.index.clear();
        self.order.clear();
        self.stats.set_total_entries(0);
    }
}

// == Eviction Cache ==
/// Thread-safe fixed-capacity cache with least-recently-used eviction.
///
/// Every `get`/`put` takes the instance mutex: promotion re-links two
/// neighbours, which cannot be done atomically without it.
///
/// # Example
/// ```
/// use grade_runtime::cache::EvictionCache;
///
/// let cache = EvictionCache::new(2);
/// cache.put("A", 1);
/// cache.put("B", 2);
/// cache.get("A");
/// assert_eq!(cache.put("C", 3), Some("B"));
/// ```
#[derive(Debug)]
pub struct EvictionCache<K, V> {
    inner: Mutex<LruCore<K, V>>,
}

impl<K, V> EvictionCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCore::new(capacity.max(1))),
        }
    }

    // == Get ==
    /// Returns a clone of the cached value and promotes the entry to most
    /// recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().get(key)
    }

    // == Put ==
    /// Inserts or updates `key`, promoting it to most recently used.
    ///
    /// Returns the key evicted to make room, if any. Updating an existing
    /// key never evicts.
    pub fn put(&self, key: K, value: V) -> Option<K> {
        self.inner.lock().put(key, value)
    }

    // == Remove ==
    /// Removes an entry, returning its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().remove(key)
    }

    // == Peek ==
    /// Returns a clone of the value without touching recency or stats.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().peek(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().index.contains_key(key)
    }

    // == Keys ==
    /// Returns keys ordered from most to least recently used.
    pub fn keys(&self) -> Vec<K> {
        let core = self.inner.lock();
        core.order.iter().map(|entry| entry.key.clone()).collect()
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let core = self.inner.lock();
        let mut stats = core.stats.clone();
        stats.set_total_entries(core.index.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_cache_new() {
        let cache: EvictionCache<String, String> = EvictionCache::new(100);
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 100);
    }

    #[test]
    fn test_zero_capacity_holds_one_entry() {
        let cache = EvictionCache::new(0);
        assert_eq!(cache.capacity(), 1);

        assert_eq!(cache.put("a", 1), None);
        assert_eq!(cache.put("b", 2), Some("a"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_and_get() {
        let cache = EvictionCache::new(100);

        cache.put("key1".to_string(), "value1".to_string());

        assert_eq!(cache.get("key1"), Some("value1".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let cache: EvictionCache<String, u32> = EvictionCache::new(100);
        assert_eq!(cache.get("nonexistent"), None);
    }

    #[test]
    fn test_overwrite_promotes_without_evicting() {
        let cache = EvictionCache::new(2);

        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.put("a", 10), None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys(), vec!["a", "b"]);
        // b is now least recently used
        assert_eq!(cache.put("c", 3), Some("b"));
        assert_eq!(cache.get("a"), Some(10));
    }

    #[test]
    fn test_get_promotes_entry() {
        // capacity=2; put(A,1), put(B,2), get(A), put(C,3) => B evicted
        let cache = EvictionCache::new(2);

        cache.put("A", 1);
        cache.put("B", 2);
        assert_eq!(cache.get("A"), Some(1));
        let evicted = cache.put("C", 3);

        assert_eq!(evicted, Some("B"));
        assert!(cache.contains("A"));
        assert!(cache.contains("C"));
        assert!(!cache.contains("B"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lru_eviction_order() {
        let cache = EvictionCache::new(3);

        cache.put("key1", 1);
        cache.put("key2", 2);
        cache.put("key3", 3);

        // Cache is full, adding key4 should evict key1 (oldest)
        assert_eq!(cache.put("key4", 4), Some("key1"));
        assert_eq!(cache.put("key5", 5), Some("key2"));
        assert_eq!(cache.keys(), vec!["key5", "key4", "key3"]);
    }

    #[test]
    fn test_peek_does_not_promote() {
        let cache = EvictionCache::new(2);

        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.peek("a"), Some(1));

        assert_eq!(cache.put("c", 3), Some("a"));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_remove() {
        let cache = EvictionCache::new(4);

        cache.put("a", 1);
        cache.put("b", 2);

        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.remove("a"), None);
        assert_eq!(cache.keys(), vec!["b"]);
    }

    #[test]
    fn test_stats() {
        let cache = EvictionCache::new(1);

        cache.put("key1", "value1");
        cache.get("key1"); // hit
        cache.get("nonexistent"); // miss
        cache.put("key2", "value2"); // eviction

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.capacity, 1);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache = EvictionCache::new(4);
        cache.put(1, 1);
        cache.get(&1);

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.put(2, 2), None);
    }

    #[test]
    fn test_concurrent_access_respects_capacity() {
        let cache = Arc::new(EvictionCache::new(32));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500u32 {
                        cache.put(t * 1000 + i, i);
                        cache.get(&(t * 1000 + i / 2));
                        assert!(cache.len() <= 32);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 32);
        assert_eq!(cache.keys().len(), 32);
    }
}
