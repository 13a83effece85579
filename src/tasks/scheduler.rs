//! Task Scheduler
//!
//! Recurring tasks ordered by next due time and dispatched to the
//! scheduled-jobs worker pool by a single background loop.
//!
//! The name-indexed map is the source of truth for which tasks are live.
//! The priority queue only orders due times: cancelled or replaced tasks
//! leave stale queue entries behind, and those are discarded when popped.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::task::{execute, ScheduledTask, TaskAction, TaskExecution, TaskInfo};
use crate::error::SchedulerError;
use crate::runtime::{ExecutorRegistry, PoolKind, WorkerPool};

// == Scheduler Settings ==
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Runs kept per task in its execution history
    pub history_limit: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self { history_limit: 50 }
    }
}

// == Queue Entry ==
/// Ordering hint for one pending dispatch.
#[derive(Debug)]
struct QueueEntry {
    due: Instant,
    /// Tie-breaker keeping equal due times in insertion order
    seq: u64,
    name: String,
    version: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

// == Scheduler State ==
#[derive(Default)]
struct SchedulerState {
    tasks: HashMap<String, ScheduledTask>,
    /// Min-heap on (due, seq)
    queue: BinaryHeap<Reverse<QueueEntry>>,
    next_version: u64,
    next_seq: u64,
}

impl SchedulerState {
    fn enqueue(&mut self, name: String, version: u64, due: Instant) {
        self.next_seq += 1;
        self.queue.push(Reverse(QueueEntry {
            due,
            seq: self.next_seq,
            name,
            version,
        }));
    }
}

/// What the dispatch loop should do next.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Nothing queued
    Idle,
    /// Earliest entry is due at this instant
    Wait(Instant),
    /// An entry was popped (dispatched or discarded)
    Progress,
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    wake: Notify,
    shutdown: CancellationToken,
    pool: Arc<WorkerPool>,
    settings: SchedulerSettings,
}

impl SchedulerInner {
    /// Pops at most one due entry and dispatches it if it is still live.
    fn poll(&self, now: Instant) -> Step {
        let mut state = self.state.lock();

        match state.queue.peek() {
            None => return Step::Idle,
            Some(Reverse(head)) if head.due > now => return Step::Wait(head.due),
            Some(_) => {}
        }
        let Some(Reverse(entry)) = state.queue.pop() else {
            return Step::Idle;
        };

        let Some(task) = state.tasks.get_mut(&entry.name) else {
            debug!(task = %entry.name, "Discarding queue entry of cancelled task");
            return Step::Progress;
        };
        if task.version != entry.version {
            debug!(task = %entry.name, "Discarding queue entry of replaced task");
            return Step::Progress;
        }

        let name = task.name.clone();
        let action: TaskAction = Arc::clone(&task.action);
        let runtime = Arc::clone(&task.runtime);
        runtime.mark_dispatched();
        self.pool.submit(move || execute(&name, &action, &runtime));

        // Fixed rate from dispatch time: missed ticks are not replayed
        task.next_due = now + task.interval;
        let next_due = task.next_due;
        state.enqueue(entry.name, entry.version, next_due);
        Step::Progress
    }

    async fn run(self: Arc<Self>) {
        info!("Task scheduler dispatch loop started");

        while !self.shutdown.is_cancelled() {
            match self.poll(Instant::now()) {
                Step::Progress => continue,
                Step::Idle => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = self.wake.notified() => {}
                    }
                }
                Step::Wait(due) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = self.wake.notified() => {}
                        _ = tokio::time::sleep_until(due) => {}
                    }
                }
            }
        }

        info!("Task scheduler dispatch loop stopped");
    }
}

// == Task Scheduler ==
/// Runs named actions at a fixed rate on the scheduled-jobs pool.
///
/// An action never blocks the dispatch loop: the next run is queued as
/// soon as the current one is handed to the pool, so a slow action can
/// overlap with its own next run.
pub struct TaskScheduler {
    inner: Arc<SchedulerInner>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl TaskScheduler {
    // == Constructor ==
    /// Starts the dispatch loop on the registry's runtime.
    pub fn start(registry: &ExecutorRegistry, settings: SchedulerSettings) -> Self {
        let inner = Arc::new(SchedulerInner {
            state: Mutex::new(SchedulerState::default()),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            pool: registry.worker_pool(PoolKind::Scheduled),
            settings,
        });
        let dispatcher = registry.handle().spawn(Arc::clone(&inner).run());

        Self {
            inner,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    // == Schedule ==
    /// Registers a task whose first run is due immediately.
    pub fn schedule_task<F>(
        &self,
        name: impl Into<String>,
        interval: Duration,
        action: F,
    ) -> Result<(), SchedulerError>
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.schedule_task_with_delay(name, interval, Duration::ZERO, action)
    }

    /// Registers a task whose first run is due after `initial_delay`.
    pub fn schedule_task_with_delay<F>(
        &self,
        name: impl Into<String>,
        interval: Duration,
        initial_delay: Duration,
        action: F,
    ) -> Result<(), SchedulerError>
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SchedulerError::InvalidName);
        }
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(name));
        }
        if self.inner.shutdown.is_cancelled() {
            return Err(SchedulerError::NotRunning);
        }

        {
            let mut state = self.inner.state.lock();
            if state.tasks.contains_key(&name) {
                return Err(SchedulerError::DuplicateTask(name));
            }

            state.next_version += 1;
            let version = state.next_version;
            let due = Instant::now() + initial_delay;
            let task = ScheduledTask::new(
                name.clone(),
                interval,
                due,
                version,
                Arc::new(action),
                self.inner.settings.history_limit,
            );
            state.tasks.insert(name.clone(), task);
            state.enqueue(name.clone(), version, due);
        }

        self.inner.wake.notify_one();
        info!(
            task = %name,
            interval_ms = interval.as_millis() as u64,
            "Task scheduled"
        );
        Ok(())
    }

    // == Cancel ==
    /// Removes a task. Returns false if no task has that name.
    ///
    /// A run already executing is allowed to finish; dispatched runs that
    /// have not started yet are skipped.
    pub fn cancel_task(&self, name: &str) -> bool {
        let removed = self.inner.state.lock().tasks.remove(name);
        match removed {
            Some(task) => {
                task.runtime.cancel();
                info!(task = %name, "Task cancelled");
                true
            }
            None => false,
        }
    }

    // == Queries ==
    /// Current tasks ordered by next due time.
    pub fn list_tasks(&self) -> Vec<TaskInfo> {
        let now = Instant::now();
        let state = self.inner.state.lock();
        let mut tasks: Vec<&ScheduledTask> = state.tasks.values().collect();
        tasks.sort_by(|a, b| a.next_due.cmp(&b.next_due).then_with(|| a.name.cmp(&b.name)));
        tasks.into_iter().map(|task| task.info(now)).collect()
    }

    /// Oldest-first execution history, or None for an unknown task.
    pub fn get_execution_history(&self, name: &str) -> Option<Vec<TaskExecution>> {
        let runtime = {
            let state = self.inner.state.lock();
            Arc::clone(&state.tasks.get(name)?.runtime)
        };
        let history = runtime.history.lock().to_vec();
        Some(history)
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.inner.state.lock().tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Shutdown ==
    /// Stops the dispatch loop, waiting at most `timeout` before aborting it.
    ///
    /// Every task is cancelled so pending dispatches are skipped. Returns
    /// true when the loop exited on its own.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.inner.shutdown.cancel();
        {
            let state = self.inner.state.lock();
            for task in state.tasks.values() {
                task.runtime.cancel();
            }
        }

        let handle = self.dispatcher.lock().take();
        let Some(mut handle) = handle else {
            return true;
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Dispatch loop did not stop in time, aborting"
                );
                handle.abort();
                false
            }
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}
