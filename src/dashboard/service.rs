//! Statistics Dashboard
//!
//! Periodically recomputes a [`StatisticsSnapshot`] from the roster and
//! publishes it by swapping a shared pointer. Computations are single-flight:
//! a request arriving while one is running is dropped, not queued.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::snapshot::StatisticsSnapshot;
use super::state::{StatusCell, ThreadStatus};
use crate::cache::EvictionCache;
use crate::error::{RuntimeError, StatisticsError};
use crate::roster::RosterSource;
use crate::runtime::ExecutorRegistry;

/// Registry cache holding the latest per-student averages.
pub const AVERAGES_CACHE: &str = "dashboard.averages";

const MIN_INTERVAL: Duration = Duration::from_millis(1);

// == Dashboard Settings ==
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    /// Timer period between automatic recomputations
    pub interval: Duration,
    /// Minimum number of students reported as top performers
    pub top_n: usize,
    /// Bounded wait for the timer task on stop
    pub stop_timeout: Duration,
    /// Capacity of the per-student averages cache
    pub averages_capacity: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            top_n: 5,
            stop_timeout: Duration::from_secs(2),
            averages_capacity: 1024,
        }
    }
}

// == Refresh Outcome ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// A new snapshot was published
    Completed,
    /// Another computation was in progress
    Skipped,
    /// The computation failed; the previous snapshot stays published
    Failed,
    /// A stop arrived while computing; the result was thrown away
    Discarded,
}

// == Dashboard Metrics ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub status: ThreadStatus,
    pub computations: u64,
    pub failures: u64,
    /// Requests dropped because a computation was in progress
    pub skipped: u64,
    /// Snapshot reads that found a published snapshot
    pub cache_hits: u64,
    /// Snapshot reads before any snapshot was published
    pub cache_misses: u64,
    pub in_progress: bool,
}

/// Clears the in-progress flag when a computation ends, even by panic.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct DashboardInner {
    source: Arc<dyn RosterSource>,
    settings: DashboardSettings,
    status: StatusCell,
    computing: AtomicBool,
    /// Bumped on every stop, under the `published` write lock
    epoch: AtomicU64,
    published: RwLock<Option<Arc<StatisticsSnapshot>>>,
    averages: Arc<EvictionCache<String, f64>>,
    computations: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DashboardInner {
    fn recompute(&self) -> RefreshOutcome {
        self.recompute_since(self.epoch.load(Ordering::Acquire))
    }

    /// Computes and publishes unless a stop happened after `epoch` was read.
    fn recompute_since(&self, epoch: u64) -> RefreshOutcome {
        if self
            .computing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("Statistics computation already in progress, skipping");
            return RefreshOutcome::Skipped;
        }
        let _flight = FlightGuard(&self.computing);

        let started = Instant::now();
        let result = self
            .source
            .view()
            .map_err(StatisticsError::Source)
            .and_then(|view| {
                let snapshot = StatisticsSnapshot::compute(&view, self.settings.top_n)?;
                Ok((view, snapshot))
            });

        match result {
            Ok((view, snapshot)) => {
                let mut published = self.published.write();
                if self.epoch.load(Ordering::Acquire) != epoch {
                    debug!("Dashboard stopped during computation, discarding result");
                    return RefreshOutcome::Discarded;
                }

                let current: HashSet<&str> = view.students.iter().map(|s| s.id.as_str()).collect();
                for id in self.averages.keys() {
                    if !current.contains(id.as_str()) {
                        self.averages.remove(&id);
                    }
                }
                for student in &view.students {
                    match student.average() {
                        Some(average) => {
                            self.averages.put(student.id.clone(), average);
                        }
                        None => {
                            self.averages.remove(&student.id);
                        }
                    }
                }
                *published = Some(Arc::new(snapshot));
                drop(published);

                self.computations.fetch_add(1, Ordering::Relaxed);
                debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Statistics snapshot published"
                );
                RefreshOutcome::Completed
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "Statistics computation failed, keeping previous snapshot");
                RefreshOutcome::Failed
            }
        }
    }
}

async fn run_timer(inner: Arc<DashboardInner>, token: CancellationToken) {
    let period = inner.settings.interval.max(MIN_INTERVAL);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                // Ticks while paused are no-ops
                let epoch = inner.epoch.load(Ordering::Acquire);
                if inner.status.load() == ThreadStatus::Running {
                    let worker = Arc::clone(&inner);
                    if let Err(err) =
                        tokio::task::spawn_blocking(move || worker.recompute_since(epoch)).await
                    {
                        error!(error = %err, "Statistics computation task panicked");
                    }
                }
            }
        }
    }

    debug!("Dashboard timer stopped");
}

struct TimerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

// == Statistics Dashboard ==
pub struct StatisticsDashboard {
    inner: Arc<DashboardInner>,
    handle: Handle,
    /// Serializes start/stop; holds the running timer
    timer: Mutex<Option<TimerHandle>>,
}

impl StatisticsDashboard {
    // == Constructor ==
    /// Creates a stopped dashboard reading from `source`.
    pub fn new(
        registry: &ExecutorRegistry,
        source: Arc<dyn RosterSource>,
        settings: DashboardSettings,
    ) -> Result<Self, RuntimeError> {
        let averages = registry.get_or_create_cache(AVERAGES_CACHE, settings.averages_capacity)?;
        let inner = DashboardInner {
            source,
            settings,
            status: StatusCell::new(ThreadStatus::Stopped),
            computing: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            published: RwLock::new(None),
            averages,
            computations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };

        Ok(Self {
            inner: Arc::new(inner),
            handle: registry.handle().clone(),
            timer: Mutex::new(None),
        })
    }

    // == Start ==
    /// Computes once, then recomputes every interval. Returns false when
    /// the dashboard was not stopped.
    ///
    /// The first computation runs on the calling thread; async callers
    /// should go through `spawn_blocking`.
    pub fn start(&self) -> bool {
        let epoch = {
            let mut timer = self.timer.lock();
            if !self
                .inner
                .status
                .transition(ThreadStatus::Stopped, ThreadStatus::Running)
            {
                return false;
            }

            let token = CancellationToken::new();
            let task = self
                .handle
                .spawn(run_timer(Arc::clone(&self.inner), token.clone()));
            *timer = Some(TimerHandle { token, task });
            self.inner.epoch.load(Ordering::Acquire)
        };

        info!(
            interval_ms = self.inner.settings.interval.as_millis() as u64,
            "Dashboard started"
        );
        self.inner.recompute_since(epoch);
        true
    }

    // == Stop ==
    /// Cancels the timer and waits for an in-flight timer computation,
    /// aborting the timer task if the wait exceeds the stop timeout.
    /// A computation still running once stop has begun never publishes.
    ///
    /// Returns false when the dashboard was already stopped.
    pub async fn stop(&self) -> bool {
        let (previous, timer) = {
            let mut timer = self.timer.lock();
            (self.inner.status.replace(ThreadStatus::Stopped), timer.take())
        };
        if previous != ThreadStatus::Stopped {
            let _published = self.inner.published.write();
            self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        }

        if let Some(TimerHandle { token, mut task }) = timer {
            token.cancel();
            let timeout = self.inner.settings.stop_timeout;
            if tokio::time::timeout(timeout, &mut task).await.is_err() {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Dashboard timer did not stop in time, aborting"
                );
                task.abort();
            }
        }

        if previous == ThreadStatus::Stopped {
            return false;
        }
        info!("Dashboard stopped");
        true
    }

    // == Pause ==
    /// Flips `RUNNING <-> PAUSED` and returns the new status. A stopped
    /// dashboard stays stopped.
    pub fn toggle_pause(&self) -> ThreadStatus {
        let status = &self.inner.status;
        if status.transition(ThreadStatus::Running, ThreadStatus::Paused) {
            info!("Dashboard paused");
            return ThreadStatus::Paused;
        }
        if status.transition(ThreadStatus::Paused, ThreadStatus::Running) {
            info!("Dashboard resumed");
            return ThreadStatus::Running;
        }
        status.load()
    }

    // == Refresh ==
    /// Recomputes immediately, whatever the timer state.
    pub fn refresh(&self) -> RefreshOutcome {
        self.inner.recompute()
    }

    // == Reads ==
    pub fn status(&self) -> ThreadStatus {
        self.inner.status.load()
    }

    /// Latest published snapshot. Never waits on a running computation.
    pub fn snapshot(&self) -> Option<Arc<StatisticsSnapshot>> {
        let snapshot = self.inner.published.read().clone();
        let counter = if snapshot.is_some() {
            &self.inner.hits
        } else {
            &self.inner.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        snapshot
    }

    /// Average of one student as of the last successful computation.
    pub fn student_average(&self, student_id: &str) -> Option<f64> {
        self.inner.averages.get(student_id)
    }

    /// Text rendering of the status and the latest snapshot.
    pub fn render(&self) -> String {
        let status = self.status();
        match self.snapshot() {
            Some(snapshot) => format!("Dashboard [{status}]\n{snapshot}"),
            None => format!("Dashboard [{status}]\nNo statistics available yet\n"),
        }
    }

    pub fn metrics(&self) -> DashboardMetrics {
        let inner = &self.inner;
        DashboardMetrics {
            status: inner.status.load(),
            computations: inner.computations.load(Ordering::Relaxed),
            failures: inner.failures.load(Ordering::Relaxed),
            skipped: inner.skipped.load(Ordering::Relaxed),
            cache_hits: inner.hits.load(Ordering::Relaxed),
            cache_misses: inner.misses.load(Ordering::Relaxed),
            in_progress: inner.computing.load(Ordering::Acquire),
        }
    }
}

impl Drop for StatisticsDashboard {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.token.cancel();
        }
    }
}
