//! Executor Registry Module
//!
//! Lifecycle-scoped owner of the shared worker pools and named caches.
//! Built once by the application entry point and handed to each component.

use std::any::{Any, TypeId};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::pool::{PoolKind, PoolStats, WorkerPool};
use crate::cache::EvictionCache;
use crate::error::RuntimeError;

// == Registry Settings ==
/// Sizing of the shared pools.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Workers in the fixed batch pool
    pub batch_workers: usize,
    /// Workers in the scheduled-jobs pool
    pub scheduled_workers: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            batch_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            scheduled_workers: 2,
        }
    }
}

/// A registered cache together with the concrete type it was created with.
struct NamedCache {
    type_id: TypeId,
    cache: Arc<dyn Any + Send + Sync>,
}

impl NamedCache {
    fn downcast<K, V>(&self, name: &str) -> Result<Arc<EvictionCache<K, V>>, RuntimeError>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if self.type_id != TypeId::of::<EvictionCache<K, V>>() {
            return Err(RuntimeError::CacheTypeMismatch(name.to_string()));
        }
        Arc::clone(&self.cache)
            .downcast::<EvictionCache<K, V>>()
            .map_err(|_| RuntimeError::CacheTypeMismatch(name.to_string()))
    }
}

// == Executor Registry ==
/// Shared pools and named caches for the lifetime of the application.
pub struct ExecutorRegistry {
    settings: RegistrySettings,
    handle: Handle,
    batch: OnceCell<Arc<WorkerPool>>,
    burst: OnceCell<Arc<WorkerPool>>,
    scheduled: OnceCell<Arc<WorkerPool>>,
    caches: DashMap<String, NamedCache>,
    closed: AtomicBool,
}

impl ExecutorRegistry {
    // == Constructor ==
    /// Creates a registry bound to the current tokio runtime.
    pub fn new(settings: RegistrySettings) -> Result<Self, RuntimeError> {
        let handle = Handle::try_current().map_err(|_| RuntimeError::NoRuntime)?;
        Ok(Self::with_handle(settings, handle))
    }

    /// Creates a registry whose pools run on `handle`.
    pub fn with_handle(settings: RegistrySettings, handle: Handle) -> Self {
        info!(
            batch_workers = settings.batch_workers,
            scheduled_workers = settings.scheduled_workers,
            "Executor registry created"
        );
        Self {
            settings,
            handle,
            batch: OnceCell::new(),
            burst: OnceCell::new(),
            scheduled: OnceCell::new(),
            caches: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Runtime handle the background loops are spawned on.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    // == Worker Pools ==
    /// Returns the named pool, building it on first use. Pools built after
    /// shutdown start closed.
    pub fn worker_pool(&self, kind: PoolKind) -> Arc<WorkerPool> {
        let cell = self.cell(kind);
        Arc::clone(cell.get_or_init(|| {
            debug!(pool = %kind, "Creating worker pool");
            let pool = match kind {
                PoolKind::Batch => {
                    WorkerPool::fixed(kind, self.settings.batch_workers, self.handle.clone())
                }
                PoolKind::Burst => WorkerPool::growable(kind, self.handle.clone()),
                PoolKind::Scheduled => {
                    WorkerPool::fixed(kind, self.settings.scheduled_workers, self.handle.clone())
                }
            };
            if self.closed.load(Ordering::Acquire) {
                pool.close();
            }
            Arc::new(pool)
        }))
    }

    fn cell(&self, kind: PoolKind) -> &OnceCell<Arc<WorkerPool>> {
        match kind {
            PoolKind::Batch => &self.batch,
            PoolKind::Burst => &self.burst,
            PoolKind::Scheduled => &self.scheduled,
        }
    }

    // == Named Caches ==
    /// Returns the cache registered under `name`, creating it with
    /// `capacity` on first use. Later calls ignore `capacity`.
    pub fn get_or_create_cache<K, V>(
        &self,
        name: &str,
        capacity: usize,
    ) -> Result<Arc<EvictionCache<K, V>>, RuntimeError>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<EvictionCache<K, V>>();
        let entry = self.caches.entry(name.to_string()).or_insert_with(|| {
            debug!(cache = %name, capacity, "Creating named cache");
            NamedCache {
                type_id,
                cache: Arc::new(EvictionCache::<K, V>::new(capacity)),
            }
        });

        entry.downcast(name)
    }

    /// Returns the cache registered under `name` without creating it.
    pub fn find_cache<K, V>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<EvictionCache<K, V>>>, RuntimeError>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self.caches.get(name) {
            Some(entry) => entry.downcast(name).map(Some),
            None => Ok(None),
        }
    }

    /// Names of every registered cache, sorted.
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    // == Statistics ==
    /// Counters of every pool built so far.
    pub fn statistics(&self) -> Vec<PoolStats> {
        PoolKind::ALL
            .iter()
            .filter_map(|kind| self.cell(*kind).get())
            .map(|pool| pool.stats())
            .collect()
    }

    // == Shutdown ==
    /// Closes every pool; queued jobs are dropped, running jobs finish.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        for kind in PoolKind::ALL {
            if let Some(pool) = self.cell(kind).get() {
                pool.close();
            }
        }
        info!("Executor registry shut down");
    }
}
