//! Cache Entry Module
//!
//! Defines a single node of the recency ordering.

// == Cache Entry ==
/// A key/value pair plus its position in the recency ordering.
///
/// `prev` points towards the most recently used end, `next` towards the
/// least recently used end. Links are slot indices into the owning
/// [`RecencyList`](super::RecencyList).
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// The cached key
    pub key: K,
    /// The cached value
    pub value: V,
    /// Neighbour closer to the head (more recently used)
    pub(crate) prev: Option<usize>,
    /// Neighbour closer to the tail (less recently used)
    pub(crate) next: Option<usize>,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a detached entry.
    pub fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            prev: None,
            next: None,
        }
    }

    // == Is Detached ==
    /// Returns true when the entry has no neighbours.
    pub fn is_detached(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }
}
