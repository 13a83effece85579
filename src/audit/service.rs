//! Audit Trail Service
//!
//! Producers enqueue entries without blocking; a single writer task drains
//! the queue in FIFO order into the sink and the in-memory recent window.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::entry::AuditEntry;
use super::queue::AuditQueue;
use super::sink::AuditSink;
use crate::runtime::ExecutorRegistry;

/// Entries drained between two sink flushes.
const MAX_BATCH: usize = 512;

const DRAIN_POLL: Duration = Duration::from_millis(2);

// == Audit Settings ==
#[derive(Debug, Clone)]
pub struct AuditSettings {
    /// Unwritten entries held before the oldest is dropped
    pub queue_capacity: usize,
    /// Written entries kept for `get_recent_entries`
    pub recent_capacity: usize,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            recent_capacity: 10_000,
        }
    }
}

// == Audit Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    /// Entries drained by the writer
    pub total: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Entries lost to queue overflow or logged after shutdown
    pub dropped: u64,
    /// Entries waiting in the queue
    pub pending: usize,
    /// Sink appends that returned an error
    pub write_failures: u64,
}

struct AuditInner {
    queue: AuditQueue,
    wake: Notify,
    /// Held shared while pushing; set under the write lock on shutdown so
    /// no push lands after the writer's final drain.
    closed: RwLock<bool>,
    recent: Mutex<VecDeque<AuditEntry>>,
    recent_capacity: usize,
    accepted: AtomicU64,
    total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    dropped: AtomicU64,
    write_failures: AtomicU64,
}

impl AuditInner {
    fn record(&self, entry: AuditEntry) {
        let counter = if entry.success {
            &self.successes
        } else {
            &self.failures
        };
        counter.fetch_add(1, Ordering::Relaxed);

        {
            let mut recent = self.recent.lock();
            if recent.len() == self.recent_capacity {
                recent.pop_front();
            }
            recent.push_back(entry);
        }
        self.total.fetch_add(1, Ordering::AcqRel);
    }

    /// Writes up to one batch. Returns the number of entries drained.
    fn drain_batch(&self, sink: &mut Option<Box<dyn AuditSink>>) -> usize {
        let mut drained = 0;
        while drained < MAX_BATCH {
            let Some(entry) = self.queue.pop() else {
                break;
            };
            if let Some(sink) = sink.as_mut() {
                if let Err(err) = sink.append(&entry) {
                    self.write_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, operation = %entry.operation, "Failed to write audit entry");
                }
            }
            self.record(entry);
            drained += 1;
        }

        if drained > 0 {
            if let Some(sink) = sink.as_mut() {
                if let Err(err) = sink.flush() {
                    self.write_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, "Failed to flush audit sink");
                }
            }
        }
        drained
    }

    fn is_drained(&self) -> bool {
        let settled = self.total.load(Ordering::Acquire) + self.displaced();
        self.queue.is_empty() && settled >= self.accepted.load(Ordering::Acquire)
    }

    /// Accepted entries later pushed out of a full queue.
    fn displaced(&self) -> u64 {
        self.dropped.load(Ordering::Acquire)
    }

    /// Counts whatever is left in the queue as dropped.
    fn discard_pending(&self) -> u64 {
        let mut discarded = 0;
        while self.queue.pop().is_some() {
            discarded += 1;
        }
        self.dropped.fetch_add(discarded, Ordering::AcqRel);
        discarded
    }
}

async fn run_writer(
    inner: Arc<AuditInner>,
    mut sink: Option<Box<dyn AuditSink>>,
    token: CancellationToken,
) {
    loop {
        // Sink writes are blocking I/O; the sink travels to the blocking pool and back
        loop {
            let worker = Arc::clone(&inner);
            let result = tokio::task::spawn_blocking(move || {
                let drained = worker.drain_batch(&mut sink);
                (sink, drained)
            })
            .await;

            match result {
                Ok((returned, drained)) => {
                    sink = returned;
                    if drained < MAX_BATCH {
                        break;
                    }
                }
                Err(err) => {
                    error!(error = %err, "Audit writer panicked, stopping");
                    return;
                }
            }
        }

        if token.is_cancelled() && inner.queue.is_empty() {
            break;
        }

        tokio::select! {
            _ = token.cancelled() => {}
            _ = inner.wake.notified() => {}
        }
    }

    debug!("Audit writer stopped");
}

struct WriterHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

// == Audit Trail Service ==
pub struct AuditTrailService {
    inner: Arc<AuditInner>,
    writer: Mutex<Option<WriterHandle>>,
}

impl AuditTrailService {
    // == Constructors ==
    /// Starts a writer that only keeps the in-memory recent window.
    pub fn start(registry: &ExecutorRegistry, settings: AuditSettings) -> Self {
        Self::spawn(registry, settings, None)
    }

    /// Starts a writer appending every entry to `sink`.
    pub fn start_with_sink(
        registry: &ExecutorRegistry,
        settings: AuditSettings,
        sink: Box<dyn AuditSink>,
    ) -> Self {
        Self::spawn(registry, settings, Some(sink))
    }

    fn spawn(
        registry: &ExecutorRegistry,
        settings: AuditSettings,
        sink: Option<Box<dyn AuditSink>>,
    ) -> Self {
        let recent_capacity = settings.recent_capacity.max(1);
        let inner = Arc::new(AuditInner {
            queue: AuditQueue::new(settings.queue_capacity),
            wake: Notify::new(),
            closed: RwLock::new(false),
            recent: Mutex::new(VecDeque::with_capacity(recent_capacity.min(1024))),
            recent_capacity,
            accepted: AtomicU64::new(0),
            total: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
        });

        let token = CancellationToken::new();
        let task = registry
            .handle()
            .spawn(run_writer(Arc::clone(&inner), sink, token.clone()));

        info!(
            queue_capacity = inner.queue.capacity(),
            "Audit writer started"
        );
        Self {
            inner,
            writer: Mutex::new(Some(WriterHandle { token, task })),
        }
    }

    // == Log Operation ==
    /// Enqueues an entry without blocking.
    ///
    /// On a full queue the oldest unwritten entry is dropped. After
    /// shutdown the entry itself is dropped.
    pub fn log_operation(
        &self,
        operation: impl Into<String>,
        action: impl Into<String>,
        duration_ms: u64,
        success: bool,
        details: impl Into<String>,
    ) {
        self.log_entry(AuditEntry::new(
            operation,
            action,
            duration_ms,
            success,
            details,
        ));
    }

    pub fn log_entry(&self, entry: AuditEntry) {
        let closed = self.inner.closed.read();
        if *closed {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            self.inner.accepted.fetch_add(1, Ordering::AcqRel);
            debug!(operation = %entry.operation, "Audit entry logged after shutdown, dropped");
            return;
        }

        self.inner.accepted.fetch_add(1, Ordering::AcqRel);
        if let Some(displaced) = self.inner.queue.push(entry) {
            self.inner.dropped.fetch_add(1, Ordering::AcqRel);
            debug!(
                operation = %displaced.operation,
                "Audit queue full, dropped oldest entry"
            );
        }
        drop(closed);
        self.inner.wake.notify_one();
    }

    // == Reads ==
    pub fn get_statistics(&self) -> AuditStats {
        let inner = &self.inner;
        AuditStats {
            total: inner.total.load(Ordering::Acquire),
            success_count: inner.successes.load(Ordering::Relaxed),
            failure_count: inner.failures.load(Ordering::Relaxed),
            dropped: inner.dropped.load(Ordering::Relaxed),
            pending: inner.queue.len(),
            write_failures: inner.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Last `n` written entries, oldest first.
    pub fn get_recent_entries(&self, n: usize) -> Vec<AuditEntry> {
        let recent = self.inner.recent.lock();
        let skip = recent.len().saturating_sub(n);
        recent.iter().skip(skip).cloned().collect()
    }

    // == Drain ==
    /// Waits until every accepted entry has been written or dropped.
    /// Returns false on timeout.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let inner = &self.inner;
        tokio::time::timeout(timeout, async {
            while !inner.is_drained() {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        })
        .await
        .is_ok()
    }

    // == Shutdown ==
    /// Stops accepting entries, drains the queue and stops the writer,
    /// aborting it if the drain exceeds `timeout`.
    ///
    /// Returns true when every queued entry was written. Entries left
    /// behind by an aborted writer are counted as dropped.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        // Waits out producers mid-push
        *self.inner.closed.write() = true;
        let writer = self.writer.lock().take();
        let Some(WriterHandle { token, mut task }) = writer else {
            return self.inner.queue.is_empty();
        };

        token.cancel();
        if tokio::time::timeout(timeout, &mut task).await.is_err() {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                pending = self.inner.queue.len(),
                "Audit drain did not finish in time, aborting writer"
            );
            task.abort();
            let discarded = self.inner.discard_pending();
            warn!(discarded, "Unwritten audit entries dropped");
            return false;
        }

        let stats = self.get_statistics();
        info!(total = stats.total, dropped = stats.dropped, "Audit writer shut down");
        stats.pending == 0
    }
}

impl Drop for AuditTrailService {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.get_mut().take() {
            writer.token.cancel();
        }
    }
}
