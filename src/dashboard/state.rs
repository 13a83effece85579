//! Dashboard thread status
//!
//! `STOPPED -> RUNNING <-> PAUSED`, and back to `STOPPED` on stop. Every
//! transition is a compare-and-swap on a single atomic.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ThreadStatus {
    Stopped = 0,
    Running = 1,
    Paused = 2,
}

impl ThreadStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ThreadStatus::Running,
            2 => ThreadStatus::Paused,
            _ => ThreadStatus::Stopped,
        }
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ThreadStatus::Stopped => "STOPPED",
            ThreadStatus::Running => "RUNNING",
            ThreadStatus::Paused => "PAUSED",
        };
        f.write_str(label)
    }
}

/// Atomic holder of a [`ThreadStatus`].
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new(status: ThreadStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub(crate) fn load(&self) -> ThreadStatus {
        ThreadStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from -> to` only if the current status is `from`.
    pub(crate) fn transition(&self, from: ThreadStatus, to: ThreadStatus) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Forces the status, returning the previous one.
    pub(crate) fn replace(&self, to: ThreadStatus) -> ThreadStatus {
        ThreadStatus::from_u8(self.0.swap(to as u8, Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_requires_expected_state() {
        let cell = StatusCell::new(ThreadStatus::Stopped);

        assert!(!cell.transition(ThreadStatus::Running, ThreadStatus::Paused));
        assert!(cell.transition(ThreadStatus::Stopped, ThreadStatus::Running));
        assert!(cell.transition(ThreadStatus::Running, ThreadStatus::Paused));
        assert_eq!(cell.load(), ThreadStatus::Paused);
    }

    #[test]
    fn test_replace_returns_previous() {
        let cell = StatusCell::new(ThreadStatus::Paused);

        assert_eq!(cell.replace(ThreadStatus::Stopped), ThreadStatus::Paused);
        assert_eq!(cell.load(), ThreadStatus::Stopped);
    }

    #[test]
    fn test_status_rendering() {
        assert_eq!(ThreadStatus::Running.to_string(), "RUNNING");
        assert_eq!(serde_json::to_string(&ThreadStatus::Paused).unwrap(), "\"PAUSED\"");
    }
}
