//! LRU Ordering Module
//!
//! Doubly linked recency ordering backed by a slab of slots, so promotion,
//! insertion and tail eviction are constant time given a slot index.

use super::CacheEntry;

// == Recency List ==
/// Recency ordering of cache entries.
///
/// - Head = most recently used
/// - Tail = least recently used
///
/// Removed slots are recycled through a free list; indices handed out by
/// [`push_front`](Self::push_front) stay valid until the entry is removed.
#[derive(Debug)]
pub struct RecencyList<K, V> {
    /// Slot storage; `None` marks a free slot
    slots: Vec<Option<CacheEntry<K, V>>>,
    /// Free slot indices available for reuse
    free: Vec<usize>,
    /// Most recently used slot
    head: Option<usize>,
    /// Least recently used slot
    tail: Option<usize>,
    /// Number of linked entries
    len: usize,
}

impl<K, V> Default for RecencyList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecencyList<K, V> {
    // == Constructor ==
    /// Creates a new empty ordering.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty ordering with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    // == Push Front ==
    /// Inserts a new entry as most recently used and returns its slot.
    pub fn push_front(&mut self, key: K, value: V) -> usize {
        let entry = CacheEntry::new(key, value);
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(entry);
                idx
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        self.attach_front(idx);
        self.len += 1;
        idx
    }

    // == Move To Front ==
    /// Promotes the entry at `idx` to most recently used.
    pub fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.attach_front(idx);
    }

    // == Pop Back ==
    /// Removes and returns the least recently used entry.
    ///
    /// Returns None if the ordering is empty.
    pub fn pop_back(&mut self) -> Option<(K, V)> {
        let idx = self.tail?;
        self.remove(idx)
    }

    // == Remove ==
    /// Unlinks the entry at `idx` and frees its slot.
    pub fn remove(&mut self, idx: usize) -> Option<(K, V)> {
        if self.slots.get(idx).map_or(true, Option::is_none) {
            return None;
        }
        self.detach(idx);
        let entry = self.slots[idx].take()?;
        self.free.push(idx);
        self.len -= 1;
        Some((entry.key, entry.value))
    }

    // == Accessors ==
    /// Returns the entry stored at `idx`.
    pub fn get(&self, idx: usize) -> Option<&CacheEntry<K, V>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    /// Returns the entry stored at `idx` mutably.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut CacheEntry<K, V>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Returns the least recently used entry without removing it.
    pub fn peek_back(&self) -> Option<&CacheEntry<K, V>> {
        self.tail.and_then(|idx| self.get(idx))
    }

    /// Returns the number of linked entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    // == Linking ==
    fn detach(&mut self, idx: usize) {
        let (prev, next) = match self.get(idx) {
            Some(entry) => (entry.prev, entry.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(entry) = self.get_mut(p) {
                    entry.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(entry) = self.get_mut(n) {
                    entry.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(entry) = self.get_mut(idx) {
            entry.prev = None;
            entry.next = None;
        }
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(entry) = self.get_mut(idx) {
            entry.prev = None;
            entry.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(entry) = self.get_mut(h) {
                    entry.prev = Some(idx);
                }
            }
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }
}

// == Iterator ==
/// Iterator over entries from head to tail.
pub struct Iter<'a, K, V> {
    list: &'a RecencyList<K, V>,
    cursor: Option<usize>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = &'a CacheEntry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let list = self.list;
        let entry = list.get(self.cursor?)?;
        self.cursor = entry.next;
        Some(entry)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &RecencyList<&'static str, u32>) -> Vec<&'static str> {
        list.iter().map(|e| e.key).collect()
    }

    #[test]
    fn test_list_new() {
        let list: RecencyList<&str, u32> = RecencyList::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert!(list.peek_back().is_none());
    }

    #[test]
    fn test_push_front_orders_newest_first() {
        let mut list = RecencyList::new();

        list.push_front("key1", 1);
        list.push_front("key2", 2);
        list.push_front("key3", 3);

        assert_eq!(list.len(), 3);
        assert_eq!(keys(&list), vec!["key3", "key2", "key1"]);
        // key1 is oldest (added first)
        assert_eq!(list.peek_back().map(|e| e.key), Some("key1"));
    }

    #[test]
    fn test_move_to_front() {
        let mut list = RecencyList::new();

        let a = list.push_front("a", 1);
        list.push_front("b", 2);
        list.push_front("c", 3);

        list.move_to_front(a);

        assert_eq!(keys(&list), vec!["a", "c", "b"]);
        assert_eq!(list.peek_back().map(|e| e.key), Some("b"));
    }

    #[test]
    fn test_move_head_to_front_is_noop() {
        let mut list = RecencyList::new();

        list.push_front("a", 1);
        let b = list.push_front("b", 2);
        list.move_to_front(b);

        assert_eq!(keys(&list), vec!["b", "a"]);
    }

    #[test]
    fn test_pop_back() {
        let mut list = RecencyList::new();

        list.push_front("key1", 1);
        list.push_front("key2", 2);
        list.push_front("key3", 3);

        assert_eq!(list.pop_back(), Some(("key1", 1)));
        assert_eq!(list.len(), 2);
        assert_eq!(list.pop_back(), Some(("key2", 2)));
        assert_eq!(list.pop_back(), Some(("key3", 3)));
        assert_eq!(list.pop_back(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_middle() {
        let mut list = RecencyList::new();

        list.push_front("key1", 1);
        let middle = list.push_front("key2", 2);
        list.push_front("key3", 3);

        assert_eq!(list.remove(middle), Some(("key2", 2)));
        assert_eq!(keys(&list), vec!["key3", "key1"]);

        // Removing twice is harmless
        assert_eq!(list.remove(middle), None);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut list = RecencyList::new();

        let first = list.push_front("a", 1);
        list.remove(first);
        let second = list.push_front("b", 2);

        assert_eq!(first, second);
        assert_eq!(keys(&list), vec!["b"]);
    }

    #[test]
    fn test_order_after_multiple_touches() {
        let mut list = RecencyList::new();

        let a = list.push_front("a", 1);
        let b = list.push_front("b", 2);
        let c = list.push_front("c", 3);

        list.move_to_front(a);
        list.move_to_front(c);
        list.move_to_front(b);

        // front=[b, c, a]=back
        assert_eq!(list.pop_back().map(|(k, _)| k), Some("a"));
        assert_eq!(list.pop_back().map(|(k, _)| k), Some("c"));
        assert_eq!(list.pop_back().map(|(k, _)| k), Some("b"));
    }

    #[test]
    fn test_clear() {
        let mut list = RecencyList::new();
        list.push_front("a", 1);
        list.push_front("b", 2);

        list.clear();

        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);
    }
}
