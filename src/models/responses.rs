//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::audit::AuditEntry;
use crate::cache::CacheStats;
use crate::dashboard::{DashboardMetrics, RefreshOutcome, StatisticsSnapshot, ThreadStatus};
use crate::runtime::PoolStats;
use crate::tasks::{TaskExecution, TaskInfo};

use super::requests::JobKind;

/// Response body for `GET /cache/:name/:key`
#[derive(Debug, Clone, Serialize)]
pub struct CacheGetResponse {
    pub cache: String,
    pub key: String,
    pub value: String,
}

/// Response body for `PUT /cache/:name`
#[derive(Debug, Clone, Serialize)]
pub struct CachePutResponse {
    pub cache: String,
    pub key: String,
    /// Key evicted to make room, if any
    pub evicted: Option<String>,
}

/// Response body for `GET /cache/:name/stats`
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub cache: String,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_entries: usize,
    pub capacity: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl CacheStatsResponse {
    pub fn new(cache: impl Into<String>, stats: &CacheStats) -> Self {
        Self {
            cache: cache.into(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
            capacity: stats.capacity,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for `GET /tasks`
#[derive(Debug, Clone, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskInfo>,
}

/// Response body for `POST /tasks`
#[derive(Debug, Clone, Serialize)]
pub struct TaskScheduledResponse {
    pub message: String,
    pub name: String,
    pub interval_ms: u64,
    pub job: JobKind,
}

impl TaskScheduledResponse {
    pub fn new(name: impl Into<String>, interval_ms: u64, job: JobKind) -> Self {
        let name = name.into();
        Self {
            message: format!("Task '{}' scheduled successfully", name),
            name,
            interval_ms,
            job,
        }
    }
}

/// Response body for `DELETE /tasks/:name`
#[derive(Debug, Clone, Serialize)]
pub struct TaskCancelledResponse {
    pub message: String,
    pub name: String,
}

impl TaskCancelledResponse {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            message: format!("Task '{}' cancelled successfully", name),
            name,
        }
    }
}

/// Response body for `GET /tasks/:name/history`
#[derive(Debug, Clone, Serialize)]
pub struct TaskHistoryResponse {
    pub name: String,
    pub executions: Vec<TaskExecution>,
}

/// Response body for `GET /dashboard`
#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub status: ThreadStatus,
    /// Latest published statistics, absent before the first computation
    pub snapshot: Option<StatisticsSnapshot>,
    pub metrics: DashboardMetrics,
}

/// Response body for the `POST /dashboard/*` control endpoints
#[derive(Debug, Clone, Serialize)]
pub struct DashboardActionResponse {
    pub action: String,
    pub status: ThreadStatus,
    /// Whether the action changed the dashboard state
    pub changed: bool,
    /// Set for `refresh` only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RefreshOutcome>,
}

/// Response body for `PUT /students`
#[derive(Debug, Clone, Serialize)]
pub struct StudentResponse {
    pub id: String,
    /// True when an existing student was replaced
    pub replaced: bool,
    pub student_count: usize,
}

/// Response body for `POST /audit`
#[derive(Debug, Clone, Serialize)]
pub struct AuditAcceptedResponse {
    pub accepted: bool,
    /// Entries waiting for the writer after this one was queued
    pub pending: usize,
}

/// Response body for `GET /audit/recent`
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecentResponse {
    pub entries: Vec<AuditEntry>,
}

/// Response body for `GET /runtime/pools`
#[derive(Debug, Clone, Serialize)]
pub struct PoolsResponse {
    pub pools: Vec<PoolStats>,
    pub caches: Vec<String>,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_response_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            evictions: 5,
            total_entries: 10,
            capacity: 10,
        };
        let resp = CacheStatsResponse::new("sessions", &stats);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.cache, "sessions");
    }

    #[test]
    fn test_task_scheduled_response_serialize() {
        let resp = TaskScheduledResponse::new("beat", 1000, JobKind::Heartbeat);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"job\":\"heartbeat\""));
        assert!(json.contains("scheduled successfully"));
    }

    #[test]
    fn test_refresh_outcome_omitted_when_absent() {
        let resp = DashboardActionResponse {
            action: "pause".to_string(),
            status: ThreadStatus::Paused,
            changed: true,
            outcome: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "PAUSED");
        assert!(json.get("outcome").is_none());
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
