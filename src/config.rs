//! Configuration Module
//!
//! Loads runtime configuration from environment variables and projects it
//! into the settings of each component.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::audit::AuditSettings;
use crate::dashboard::DashboardSettings;
use crate::runtime::RegistrySettings;
use crate::tasks::SchedulerSettings;

/// Runtime configuration parameters.
///
/// All values can be configured via environment variables; a missing or
/// unparsable value falls back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP admin port
    pub server_port: u16,
    /// Capacity of caches created through the admin surface
    pub cache_capacity: usize,
    /// Dashboard timer period in milliseconds
    pub dashboard_interval_ms: u64,
    /// Minimum number of students listed as top performers
    pub top_performers: usize,
    /// Runs kept in each task's execution history
    pub task_history_limit: usize,
    /// Workers in the fixed batch pool
    pub batch_workers: usize,
    /// Workers in the scheduled-jobs pool
    pub scheduled_workers: usize,
    /// Unwritten audit entries held before the oldest is dropped
    pub audit_queue_capacity: usize,
    /// Written audit entries kept in memory
    pub audit_recent_capacity: usize,
    /// JSON-lines audit file; audit is in-memory only when unset
    pub audit_log_path: Option<PathBuf>,
    /// Bounded wait for each component on shutdown, in milliseconds
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP port (default: 3000)
    /// - `CACHE_CAPACITY` - admin cache capacity (default: 1000)
    /// - `DASHBOARD_INTERVAL_MS` - dashboard period, must be positive (default: 5000)
    /// - `TOP_PERFORMERS` - top performer count (default: 5)
    /// - `TASK_HISTORY_LIMIT` - per-task history cap (default: 50)
    /// - `BATCH_WORKERS` - batch pool size (default: available parallelism)
    /// - `SCHEDULED_WORKERS` - scheduled-jobs pool size (default: 2)
    /// - `AUDIT_QUEUE_CAPACITY` - audit queue bound (default: 4096)
    /// - `AUDIT_RECENT_CAPACITY` - recent audit window (default: 10000)
    /// - `AUDIT_LOG_PATH` - audit file (default: unset)
    /// - `SHUTDOWN_TIMEOUT_MS` - shutdown wait per component (default: 2000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            cache_capacity: parse_env("CACHE_CAPACITY").unwrap_or(defaults.cache_capacity),
            dashboard_interval_ms: parse_env("DASHBOARD_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.dashboard_interval_ms),
            top_performers: parse_env("TOP_PERFORMERS").unwrap_or(defaults.top_performers),
            task_history_limit: parse_env("TASK_HISTORY_LIMIT")
                .unwrap_or(defaults.task_history_limit),
            batch_workers: parse_env("BATCH_WORKERS").unwrap_or(defaults.batch_workers),
            scheduled_workers: parse_env("SCHEDULED_WORKERS")
                .unwrap_or(defaults.scheduled_workers),
            audit_queue_capacity: parse_env("AUDIT_QUEUE_CAPACITY")
                .unwrap_or(defaults.audit_queue_capacity),
            audit_recent_capacity: parse_env("AUDIT_RECENT_CAPACITY")
                .unwrap_or(defaults.audit_recent_capacity),
            audit_log_path: env::var("AUDIT_LOG_PATH")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            shutdown_timeout_ms: parse_env("SHUTDOWN_TIMEOUT_MS")
                .unwrap_or(defaults.shutdown_timeout_ms),
        }
    }

    // == Component Settings ==
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            batch_workers: self.batch_workers,
            scheduled_workers: self.scheduled_workers,
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            history_limit: self.task_history_limit,
        }
    }

    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            interval: Duration::from_millis(self.dashboard_interval_ms),
            top_n: self.top_performers,
            stop_timeout: self.shutdown_timeout(),
            ..DashboardSettings::default()
        }
    }

    pub fn audit_settings(&self) -> AuditSettings {
        AuditSettings {
            queue_capacity: self.audit_queue_capacity,
            recent_capacity: self.audit_recent_capacity,
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        let registry = RegistrySettings::default();
        Self {
            server_port: 3000,
            cache_capacity: 1000,
            dashboard_interval_ms: 5000,
            top_performers: 5,
            task_history_limit: 50,
            batch_workers: registry.batch_workers,
            scheduled_workers: registry.scheduled_workers,
            audit_queue_capacity: 4096,
            audit_recent_capacity: 10_000,
            audit_log_path: None,
            shutdown_timeout_ms: 2000,
        }
    }
}
