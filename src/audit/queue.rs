use crossbeam::queue::ArrayQueue;

use super::entry::AuditEntry;

/// Bounded lock-free FIFO between producers and the audit writer.
///
/// A push into a full queue displaces the oldest unwritten entry instead of
/// waiting for room.
#[derive(Debug)]
pub struct AuditQueue {
    entries: ArrayQueue<AuditEntry>,
}

impl AuditQueue {
    /// Capacity 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Enqueues `entry`, returning the entry it displaced if the queue was full.
    pub fn push(&self, entry: AuditEntry) -> Option<AuditEntry> {
        self.entries.force_push(entry)
    }

    pub fn pop(&self) -> Option<AuditEntry> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(details: &str) -> AuditEntry {
        AuditEntry::new("test", "push", 0, true, details)
    }

    #[test]
    fn test_fifo_order() {
        let queue = AuditQueue::new(4);
        queue.push(entry("1"));
        queue.push(entry("2"));

        assert_eq!(queue.pop().unwrap().details, "1");
        assert_eq!(queue.pop().unwrap().details, "2");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_full_queue_displaces_oldest() {
        let queue = AuditQueue::new(2);
        assert!(queue.push(entry("1")).is_none());
        assert!(queue.push(entry("2")).is_none());

        let displaced = queue.push(entry("3")).unwrap();

        assert_eq!(displaced.details, "1");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().details, "2");
    }

    #[test]
    fn test_zero_capacity_clamped() {
        assert_eq!(AuditQueue::new(0).capacity(), 1);
    }
}
