//! Worker Pool Module
//!
//! Named pools that run blocking jobs on the tokio blocking thread pool,
//! optionally bounded by a semaphore.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// == Pool Kind ==
/// The fixed set of shared pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// Fixed-size pool for predictable concurrent batch work
    Batch,
    /// Growable pool for short-lived bursts
    Burst,
    /// Small fixed pool dedicated to periodic scheduled jobs
    Scheduled,
}

impl PoolKind {
    pub const ALL: [PoolKind; 3] = [PoolKind::Batch, PoolKind::Burst, PoolKind::Scheduled];

    pub fn name(&self) -> &'static str {
        match self {
            PoolKind::Batch => "batch",
            PoolKind::Burst => "burst",
            PoolKind::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// == Pool Stats ==
/// Point-in-time counters of one pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    pub kind: PoolKind,
    /// Worker limit, None for growable pools
    pub max_workers: Option<usize>,
    /// Jobs submitted but waiting for a worker
    pub queued: usize,
    /// Jobs currently running
    pub active: usize,
    /// Jobs that finished, including panicked ones
    pub completed: u64,
    /// Jobs that panicked
    pub panicked: u64,
    /// Jobs rejected because the pool was closed
    pub dropped: u64,
    pub closed: bool,
}

// == Worker Pool ==
/// A named pool of blocking workers.
#[derive(Debug)]
pub struct WorkerPool {
    kind: PoolKind,
    max_workers: Option<usize>,
    permits: Option<Arc<Semaphore>>,
    handle: Handle,
    closed: AtomicBool,
    queued: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
    dropped: AtomicU64,
}

impl WorkerPool {
    // == Constructors ==
    /// Creates a pool running at most `workers` jobs at a time.
    pub fn fixed(kind: PoolKind, workers: usize, handle: Handle) -> Self {
        let workers = workers.max(1);
        Self::build(kind, Some(workers), handle)
    }

    /// Creates a pool that grows with demand.
    pub fn growable(kind: PoolKind, handle: Handle) -> Self {
        Self::build(kind, None, handle)
    }

    fn build(kind: PoolKind, max_workers: Option<usize>, handle: Handle) -> Self {
        Self {
            kind,
            max_workers,
            permits: max_workers.map(|n| Arc::new(Semaphore::new(n))),
            handle,
            closed: AtomicBool::new(false),
            queued: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    // == Submit ==
    /// Queues a blocking job. Returns immediately.
    ///
    /// Jobs submitted to a closed pool, or still waiting for a worker when
    /// it closes, are dropped.
    pub fn submit<F>(self: &Arc<Self>, job: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let pool = Arc::clone(self);
        pool.queued.fetch_add(1, Ordering::AcqRel);

        self.handle.spawn(async move {
            let _permit = match &pool.permits {
                Some(permits) => match Arc::clone(permits).acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        pool.reject();
                        return;
                    }
                },
                None => None,
            };
            if pool.is_closed() {
                pool.reject();
                return;
            }

            pool.queued.fetch_sub(1, Ordering::AcqRel);
            pool.active.fetch_add(1, Ordering::AcqRel);

            let outcome =
                tokio::task::spawn_blocking(move || catch_unwind(AssertUnwindSafe(job))).await;

            pool.active.fetch_sub(1, Ordering::AcqRel);
            pool.completed.fetch_add(1, Ordering::AcqRel);
            if !matches!(outcome, Ok(Ok(()))) {
                pool.panicked.fetch_add(1, Ordering::AcqRel);
                warn!(pool = %pool.kind, "Worker job panicked");
            }
        })
    }

    // == Close ==
    /// Stops accepting queued work; running jobs finish normally.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(permits) = &self.permits {
            permits.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn reject(&self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
        self.dropped.fetch_add(1, Ordering::AcqRel);
        debug!(pool = %self.kind, "Pool closed, dropping queued job");
    }

    // == Stats ==
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            kind: self.kind,
            max_workers: self.max_workers,
            queued: self.queued.load(Ordering::Acquire),
            active: self.active.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
            panicked: self.panicked.load(Ordering::Acquire),
            dropped: self.dropped.load(Ordering::Acquire),
            closed: self.is_closed(),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_runs_job() {
        let pool = Arc::new(WorkerPool::growable(PoolKind::Burst, Handle::current()));
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let stats = pool.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.max_workers, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fixed_pool_bounds_concurrency() {
        let pool = Arc::new(WorkerPool::fixed(PoolKind::Batch, 2, Handle::current()));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                pool.submit(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(30));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.stats().completed, 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_job_is_counted() {
        let pool = Arc::new(WorkerPool::fixed(PoolKind::Scheduled, 1, Handle::current()));

        pool.submit(|| panic!("boom")).await.unwrap();

        let stats = pool.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.panicked, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_closed_pool_drops_queued_jobs() {
        let pool = Arc::new(WorkerPool::fixed(PoolKind::Batch, 1, Handle::current()));
        pool.close();

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pool.stats().queued, 0);
        assert_eq!(pool.stats().dropped, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_closed_growable_pool_rejects_jobs() {
        let pool = Arc::new(WorkerPool::growable(PoolKind::Burst, Handle::current()));
        pool.close();

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        let stats = pool.stats();
        assert!(stats.closed);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.queued, 0);
    }

    #[test]
    fn test_pool_kind_names() {
        assert_eq!(PoolKind::Batch.to_string(), "batch");
        assert_eq!(PoolKind::ALL.len(), 3);
    }
}
