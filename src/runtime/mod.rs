//! Runtime Module
//!
//! Shared worker pools and the registry that owns them together with the
//! named caches.

mod pool;
mod registry;

pub use pool::{PoolKind, PoolStats, WorkerPool};
pub use registry::{ExecutorRegistry, RegistrySettings};
