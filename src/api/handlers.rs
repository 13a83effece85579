//! API Handlers
//!
//! HTTP request handlers for the admin surface. Every mutating handler
//! records an audit entry with its outcome and duration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, warn};

use crate::audit::{AuditEntry, AuditStats, AuditTrailService, JsonLinesSink};
use crate::cache::EvictionCache;
use crate::config::Config;
use crate::dashboard::{RefreshOutcome, StatisticsDashboard, ThreadStatus};
use crate::error::{ApiError, Result};
use crate::models::{
    AuditAcceptedResponse, AuditLogRequest, AuditRecentResponse, CacheGetResponse,
    CachePutRequest, CachePutResponse, CacheStatsResponse, DashboardActionResponse,
    DashboardResponse, HealthResponse, JobKind, PoolsResponse, RecentQuery, ScheduleTaskRequest,
    StudentRequest, StudentResponse, TaskCancelledResponse, TaskHistoryResponse, TaskListResponse,
    TaskScheduledResponse,
};
use crate::roster::{InMemoryRoster, RosterSource};
use crate::runtime::ExecutorRegistry;
use crate::tasks::TaskScheduler;

/// Entries returned by `GET /audit/recent` without a limit.
const DEFAULT_RECENT_LIMIT: usize = 20;

/// Admin caches hold string keys and values.
type AdminCache = EvictionCache<String, String>;

/// Body of a built-in scheduled job.
type JobAction = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ExecutorRegistry>,
    pub scheduler: Arc<TaskScheduler>,
    pub dashboard: Arc<StatisticsDashboard>,
    pub audit: Arc<AuditTrailService>,
    pub roster: Arc<InMemoryRoster>,
    /// Capacity of caches created through `PUT /cache/:name`
    pub cache_capacity: usize,
}

impl AppState {
    /// Builds every component from configuration on the current runtime.
    ///
    /// The dashboard is created stopped.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let registry = Arc::new(ExecutorRegistry::new(config.registry_settings())?);

        let audit = match &config.audit_log_path {
            Some(path) => {
                let sink = JsonLinesSink::open(path)
                    .with_context(|| format!("failed to open audit log {}", path.display()))?;
                AuditTrailService::start_with_sink(
                    &registry,
                    config.audit_settings(),
                    Box::new(sink),
                )
            }
            None => AuditTrailService::start(&registry, config.audit_settings()),
        };

        let roster = Arc::new(InMemoryRoster::new());
        let source: Arc<dyn RosterSource> = roster.clone();
        let dashboard = StatisticsDashboard::new(&registry, source, config.dashboard_settings())?;
        let scheduler = TaskScheduler::start(&registry, config.scheduler_settings());

        Ok(Self {
            registry,
            scheduler: Arc::new(scheduler),
            dashboard: Arc::new(dashboard),
            audit: Arc::new(audit),
            roster,
            cache_capacity: config.cache_capacity,
        })
    }

    /// Stops the dashboard, the scheduler, the audit writer and the pools,
    /// in that order.
    pub async fn shutdown(&self, timeout: Duration) {
        self.dashboard.stop().await;
        if !self.scheduler.shutdown(timeout).await {
            warn!("Scheduler did not stop cleanly");
        }
        if !self.audit.shutdown(timeout).await {
            warn!("Audit trail was not fully drained");
        }
        self.registry.shutdown();
    }

    fn record<T>(
        &self,
        operation: &str,
        action: &str,
        started: Instant,
        result: &Result<T>,
        details: String,
    ) {
        let (success, details) = match result {
            Ok(_) => (true, details),
            Err(err) => (false, format!("{details}: {err}")),
        };
        self.audit.log_operation(
            operation,
            action,
            started.elapsed().as_millis() as u64,
            success,
            details,
        );
    }

    fn admin_cache(&self, name: &str) -> Result<Arc<AdminCache>> {
        self.registry
            .find_cache::<String, String>(name)?
            .ok_or_else(|| ApiError::NotFound(format!("Cache '{}' not found", name)))
    }
}

// == Cache ==

/// Handler for PUT /cache/:name
///
/// Stores a key-value pair, creating the cache on first use.
pub async fn cache_put_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<CachePutRequest>,
) -> Result<Json<CachePutResponse>> {
    let started = Instant::now();
    let details = format!("{}/{}", name, req.key);

    let result = put_entry(&state, &name, &req);

    state.record("cache", "put", started, &result, details);
    result.map(Json)
}

fn put_entry(state: &AppState, name: &str, req: &CachePutRequest) -> Result<CachePutResponse> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }
    let cache = state
        .registry
        .get_or_create_cache::<String, String>(name, state.cache_capacity)?;
    let evicted = cache.put(req.key.clone(), req.value.clone());

    Ok(CachePutResponse {
        cache: name.to_string(),
        key: req.key.clone(),
        evicted,
    })
}

/// Handler for GET /cache/:name/:key
pub async fn cache_get_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<CacheGetResponse>> {
    let cache = state.admin_cache(&name)?;
    let value = cache
        .get(key.as_str())
        .ok_or_else(|| ApiError::NotFound(format!("Key '{}' not found", key)))?;

    Ok(Json(CacheGetResponse {
        cache: name,
        key,
        value,
    }))
}

/// Handler for GET /cache/:name/stats
pub async fn cache_stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CacheStatsResponse>> {
    let cache = state.admin_cache(&name)?;
    Ok(Json(CacheStatsResponse::new(name, &cache.stats())))
}

// == Tasks ==

fn job_action(state: &AppState, task: &str, job: JobKind) -> JobAction {
    match job {
        JobKind::Heartbeat => {
            let audit = Arc::clone(&state.audit);
            let task = task.to_string();
            Box::new(move || -> anyhow::Result<()> {
                audit.log_operation("tasks", "heartbeat", 0, true, task.as_str());
                Ok(())
            })
        }
        JobKind::DashboardRefresh => {
            let dashboard = Arc::clone(&state.dashboard);
            Box::new(move || -> anyhow::Result<()> {
                match dashboard.refresh() {
                    RefreshOutcome::Failed => anyhow::bail!("statistics computation failed"),
                    RefreshOutcome::Completed
                    | RefreshOutcome::Skipped
                    | RefreshOutcome::Discarded => Ok(()),
                }
            })
        }
    }
}

/// Handler for GET /tasks
pub async fn list_tasks_handler(State(state): State<AppState>) -> Json<TaskListResponse> {
    Json(TaskListResponse {
        tasks: state.scheduler.list_tasks(),
    })
}

/// Handler for POST /tasks
///
/// Schedules a built-in job. Duplicate names are rejected with 409.
pub async fn schedule_task_handler(
    State(state): State<AppState>,
    Json(req): Json<ScheduleTaskRequest>,
) -> Result<(StatusCode, Json<TaskScheduledResponse>)> {
    let started = Instant::now();

    let result = state
        .scheduler
        .schedule_task_with_delay(
            req.name.clone(),
            Duration::from_millis(req.interval_ms),
            Duration::from_millis(req.initial_delay_ms.unwrap_or(0)),
            job_action(&state, &req.name, req.job),
        )
        .map_err(ApiError::from);

    state.record("tasks", "schedule", started, &result, req.name.clone());
    result?;

    Ok((
        StatusCode::CREATED,
        Json(TaskScheduledResponse::new(req.name, req.interval_ms, req.job)),
    ))
}

/// Handler for DELETE /tasks/:name
pub async fn cancel_task_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TaskCancelledResponse>> {
    let started = Instant::now();

    let result = if state.scheduler.cancel_task(&name) {
        Ok(TaskCancelledResponse::new(name.clone()))
    } else {
        Err(ApiError::NotFound(format!("Task '{}' not found", name)))
    };

    state.record("tasks", "cancel", started, &result, name);
    result.map(Json)
}

/// Handler for GET /tasks/:name/history
pub async fn task_history_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TaskHistoryResponse>> {
    let executions = state
        .scheduler
        .get_execution_history(&name)
        .ok_or_else(|| ApiError::NotFound(format!("Task '{}' not found", name)))?;

    Ok(Json(TaskHistoryResponse { name, executions }))
}

// == Dashboard ==

/// Handler for GET /dashboard
pub async fn dashboard_handler(State(state): State<AppState>) -> Json<DashboardResponse> {
    let dashboard = &state.dashboard;
    let snapshot = dashboard.snapshot().map(|s| s.as_ref().clone());

    Json(DashboardResponse {
        status: dashboard.status(),
        snapshot,
        metrics: dashboard.metrics(),
    })
}

/// Handler for POST /dashboard/start
pub async fn dashboard_start_handler(
    State(state): State<AppState>,
) -> Result<Json<DashboardActionResponse>> {
    let started = Instant::now();
    let dashboard = Arc::clone(&state.dashboard);
    // The first computation runs inline in start
    let changed = tokio::task::spawn_blocking(move || dashboard.start())
        .await
        .map_err(|err| ApiError::Internal(err.to_string()));

    let result = changed.map(|changed| DashboardActionResponse {
        action: "start".to_string(),
        status: state.dashboard.status(),
        changed,
        outcome: None,
    });
    state.record("dashboard", "start", started, &result, String::new());
    result.map(Json)
}

/// Handler for POST /dashboard/stop
pub async fn dashboard_stop_handler(
    State(state): State<AppState>,
) -> Result<Json<DashboardActionResponse>> {
    let started = Instant::now();
    let changed = state.dashboard.stop().await;

    let result = Ok(DashboardActionResponse {
        action: "stop".to_string(),
        status: state.dashboard.status(),
        changed,
        outcome: None,
    });
    state.record("dashboard", "stop", started, &result, String::new());
    result.map(Json)
}

/// Handler for POST /dashboard/pause
///
/// Toggles between running and paused.
pub async fn dashboard_pause_handler(
    State(state): State<AppState>,
) -> Result<Json<DashboardActionResponse>> {
    let started = Instant::now();
    let status = state.dashboard.toggle_pause();

    let result = Ok(DashboardActionResponse {
        action: "pause".to_string(),
        status,
        changed: status != ThreadStatus::Stopped,
        outcome: None,
    });
    state.record("dashboard", "pause", started, &result, status.to_string());
    result.map(Json)
}

/// Handler for POST /dashboard/refresh
pub async fn dashboard_refresh_handler(
    State(state): State<AppState>,
) -> Result<Json<DashboardActionResponse>> {
    let started = Instant::now();
    let dashboard = Arc::clone(&state.dashboard);

    let result = tokio::task::spawn_blocking(move || dashboard.refresh())
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))
        .map(|outcome| DashboardActionResponse {
            action: "refresh".to_string(),
            status: state.dashboard.status(),
            changed: outcome == RefreshOutcome::Completed,
            outcome: Some(outcome),
        });

    state.record("dashboard", "refresh", started, &result, String::new());
    result.map(Json)
}

// == Roster ==

/// Handler for PUT /students
///
/// Inserts or replaces a student. Takes effect at the next computation.
pub async fn upsert_student_handler(
    State(state): State<AppState>,
    Json(req): Json<StudentRequest>,
) -> Result<Json<StudentResponse>> {
    let started = Instant::now();
    let id = req.id.clone();

    let result = match req.validate() {
        Some(error_msg) => Err(ApiError::InvalidRequest(error_msg)),
        None => {
            let replaced = state.roster.upsert(req.into_student());
            Ok(StudentResponse {
                id: id.clone(),
                replaced,
                student_count: state.roster.len(),
            })
        }
    };

    state.record("roster", "upsert", started, &result, id);
    result.map(Json)
}

// == Audit ==

/// Handler for POST /audit
///
/// Queues an entry from an external caller.
pub async fn audit_log_handler(
    State(state): State<AppState>,
    Json(req): Json<AuditLogRequest>,
) -> Result<(StatusCode, Json<AuditAcceptedResponse>)> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    state.audit.log_entry(AuditEntry::new(
        req.operation,
        req.action,
        req.duration_ms,
        req.success,
        req.details,
    ));
    let pending = state.audit.get_statistics().pending;
    debug!(pending, "Audit entry queued over HTTP");

    Ok((
        StatusCode::ACCEPTED,
        Json(AuditAcceptedResponse {
            accepted: true,
            pending,
        }),
    ))
}

/// Handler for GET /audit/stats
pub async fn audit_stats_handler(State(state): State<AppState>) -> Json<AuditStats> {
    Json(state.audit.get_statistics())
}

/// Handler for GET /audit/recent
pub async fn audit_recent_handler(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<AuditRecentResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    Json(AuditRecentResponse {
        entries: state.audit.get_recent_entries(limit),
    })
}

// == Runtime ==

/// Handler for GET /runtime/pools
pub async fn pools_handler(State(state): State<AppState>) -> Json<PoolsResponse> {
    Json(PoolsResponse {
        pools: state.registry.statistics(),
        caches: state.registry.cache_names(),
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedulerError;

    fn state() -> AppState {
        let config = Config {
            cache_capacity: 2,
            dashboard_interval_ms: 60_000,
            ..Config::default()
        };
        AppState::from_config(&config).unwrap()
    }

    fn put(key: &str, value: &str) -> Json<CachePutRequest> {
        Json(CachePutRequest {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cache_put_get_and_evict() {
        let state = state();
        let name = || Path("sessions".to_string());

        cache_put_handler(State(state.clone()), name(), put("a", "1")).await.unwrap();
        cache_put_handler(State(state.clone()), name(), put("b", "2")).await.unwrap();
        let response = cache_put_handler(State(state.clone()), name(), put("c", "3"))
            .await
            .unwrap();
        assert_eq!(response.evicted.as_deref(), Some("a"));

        let response = cache_get_handler(
            State(state.clone()),
            Path(("sessions".to_string(), "c".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(response.value, "3");

        let stats = cache_stats_handler(State(state), name()).await.unwrap();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.capacity, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_get_unknown_cache() {
        let state = state();

        let result = cache_get_handler(
            State(state),
            Path(("missing".to_string(), "k".to_string())),
        )
        .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_put_into_dashboard_cache_conflicts() {
        let state = state();

        let result = cache_put_handler(
            State(state),
            Path(crate::dashboard::AVERAGES_CACHE.to_string()),
            put("s1", "90"),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_schedule_duplicate_and_cancel() {
        let state = state();
        let req = || {
            Json(ScheduleTaskRequest {
                name: "beat".to_string(),
                interval_ms: 60_000,
                job: JobKind::Heartbeat,
                initial_delay_ms: Some(60_000),
            })
        };

        let (status, _) = schedule_task_handler(State(state.clone()), req()).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let result = schedule_task_handler(State(state.clone()), req()).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
        assert_eq!(list_tasks_handler(State(state.clone())).await.tasks.len(), 1);

        cancel_task_handler(State(state.clone()), Path("beat".to_string()))
            .await
            .unwrap();
        let result = cancel_task_handler(State(state), Path("beat".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dashboard_refresh_job_reports_failure() {
        let state = state();
        let action = job_action(&state, "refresh", JobKind::DashboardRefresh);

        // Empty roster: the computation fails
        assert!(action().is_err());

        state.roster.upsert(crate::roster::Student::new("s1", "Ada", vec![88.0]));
        assert!(action().is_ok());
        assert!(state.dashboard.snapshot().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dashboard_controls() {
        let state = state();
        state.roster.upsert(crate::roster::Student::new("s1", "Ada", vec![88.0]));

        let response = dashboard_start_handler(State(state.clone())).await.unwrap();
        assert!(response.changed);
        assert_eq!(response.status, ThreadStatus::Running);

        let response = dashboard_pause_handler(State(state.clone())).await.unwrap();
        assert_eq!(response.status, ThreadStatus::Paused);

        let response = dashboard_refresh_handler(State(state.clone())).await.unwrap();
        assert_eq!(response.outcome, Some(RefreshOutcome::Completed));

        let response = dashboard_stop_handler(State(state.clone())).await.unwrap();
        assert!(response.changed);
        assert_eq!(response.status, ThreadStatus::Stopped);

        let dashboard = dashboard_handler(State(state)).await;
        assert_eq!(dashboard.snapshot.as_ref().unwrap().grade_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_mutations_are_audited() {
        let state = state();

        cache_put_handler(State(state.clone()), Path("c".to_string()), put("k", "v"))
            .await
            .unwrap();
        let _ = cache_put_handler(State(state.clone()), Path("c".to_string()), put("", "v")).await;
        assert!(state.audit.wait_for_drain(Duration::from_secs(2)).await);

        let stats = state.audit.get_statistics();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.failure_count, 1);
        let entries = state.audit.get_recent_entries(2);
        assert_eq!(entries[0].details, "c/k");
        assert!(entries[1].details.contains("Key cannot be empty"));
    }

    #[test]
    fn test_scheduler_errors_map_to_status() {
        let err: ApiError = SchedulerError::InvalidInterval("x".to_string()).into();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
