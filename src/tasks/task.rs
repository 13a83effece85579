//! Scheduled Task Module
//!
//! Task records, their bounded execution history, and the per-run wrapper
//! that turns action failures into history entries.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Body of a recurring task. An `Err` marks the run as failed.
pub type TaskAction = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

// == Task Execution ==
/// Outcome of one run of a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskExecution {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub details: String,
}

// == Execution History ==
/// Insertion-ordered run history; the oldest run is dropped past `limit`.
#[derive(Debug)]
pub struct ExecutionHistory {
    entries: VecDeque<TaskExecution>,
    limit: usize,
}

impl ExecutionHistory {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit.min(64)),
            limit,
        }
    }

    pub fn record(&mut self, execution: TaskExecution) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(execution);
    }

    pub fn last(&self) -> Option<&TaskExecution> {
        self.entries.back()
    }

    pub fn to_vec(&self) -> Vec<TaskExecution> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Task Runtime State ==
/// State shared between the scheduler and the worker running a dispatch.
#[derive(Debug)]
pub(crate) struct TaskRuntime {
    pub(crate) history: Mutex<ExecutionHistory>,
    cancelled: AtomicBool,
    dispatched: AtomicU64,
}

impl TaskRuntime {
    pub(crate) fn new(history_limit: usize) -> Self {
        Self {
            history: Mutex::new(ExecutionHistory::new(history_limit)),
            cancelled: AtomicBool::new(false),
            dispatched: AtomicU64::new(0),
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::AcqRel);
    }
}

// == Scheduled Task ==
/// A registered recurring task.
pub struct ScheduledTask {
    pub(crate) name: String,
    pub(crate) interval: Duration,
    pub(crate) next_due: Instant,
    /// Distinguishes this registration from earlier ones under the same name
    pub(crate) version: u64,
    pub(crate) action: TaskAction,
    pub(crate) runtime: Arc<TaskRuntime>,
}

impl ScheduledTask {
    pub(crate) fn new(
        name: String,
        interval: Duration,
        next_due: Instant,
        version: u64,
        action: TaskAction,
        history_limit: usize,
    ) -> Self {
        Self {
            name,
            interval,
            next_due,
            version,
            action,
            runtime: Arc::new(TaskRuntime::new(history_limit)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn info(&self, now: Instant) -> TaskInfo {
        let remaining = self.next_due.saturating_duration_since(now);
        let last_success = self.runtime.history.lock().last().map(|e| e.success);
        TaskInfo {
            name: self.name.clone(),
            interval_ms: self.interval.as_millis() as u64,
            next_due_in_ms: remaining.as_millis() as u64,
            next_due_at: Utc::now()
                + chrono::Duration::from_std(remaining).unwrap_or(chrono::Duration::zero()),
            dispatched: self.runtime.dispatched.load(Ordering::Acquire),
            last_success,
        }
    }
}

// == Task Info ==
/// Read-only view of a task returned by `list_tasks`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub name: String,
    pub interval_ms: u64,
    pub next_due_in_ms: u64,
    pub next_due_at: DateTime<Utc>,
    /// Number of runs handed to the worker pool
    pub dispatched: u64,
    /// Outcome of the most recent recorded run
    pub last_success: Option<bool>,
}

// == Run Wrapper ==
/// Runs one dispatch of a task on a worker thread and records the outcome.
///
/// Skips the run when the task was cancelled after being dispatched.
pub(crate) fn execute(name: &str, action: &TaskAction, runtime: &TaskRuntime) {
    if runtime.is_cancelled() {
        debug!(task = %name, "Skipping run of cancelled task");
        return;
    }

    let timestamp = Utc::now();
    let started = std::time::Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| action()));
    let duration_ms = started.elapsed().as_millis() as u64;

    let (success, details) = match outcome {
        Ok(Ok(())) => (true, "completed".to_string()),
        Ok(Err(err)) => {
            let details = format!("{err:#}");
            warn!(task = %name, error = %details, "Scheduled task failed");
            (false, details)
        }
        Err(_) => {
            warn!(task = %name, "Scheduled task panicked");
            (false, "task panicked".to_string())
        }
    };

    runtime.history.lock().record(TaskExecution {
        timestamp,
        duration_ms,
        success,
        details,
    });
}
