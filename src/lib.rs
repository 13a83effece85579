//! Grade Runtime - concurrent services behind a student grade manager
//!
//! Provides an LRU eviction cache, shared worker pools, a fixed-rate task
//! scheduler, a single-flight statistics dashboard and an asynchronous
//! audit trail, with an HTTP admin surface over all of them.

pub mod api;
pub mod audit;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod roster;
pub mod runtime;
pub mod tasks;

pub use api::{create_router, AppState};
pub use audit::{AuditEntry, AuditStats, AuditTrailService};
pub use cache::EvictionCache;
pub use config::Config;
pub use dashboard::{StatisticsDashboard, StatisticsSnapshot, ThreadStatus};
pub use roster::{InMemoryRoster, RosterSource, RosterView, Student};
pub use runtime::{ExecutorRegistry, PoolKind};
pub use tasks::{TaskExecution, TaskScheduler};
