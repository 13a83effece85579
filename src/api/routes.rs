//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    audit_log_handler, audit_recent_handler, audit_stats_handler, cache_get_handler,
    cache_put_handler, cache_stats_handler, cancel_task_handler, dashboard_handler,
    dashboard_pause_handler, dashboard_refresh_handler, dashboard_start_handler,
    dashboard_stop_handler, health_handler, list_tasks_handler, pools_handler,
    schedule_task_handler, task_history_handler, upsert_student_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/cache/:name", put(cache_put_handler))
        .route("/cache/:name/stats", get(cache_stats_handler))
        .route("/cache/:name/:key", get(cache_get_handler))
        .route("/tasks", get(list_tasks_handler).post(schedule_task_handler))
        .route("/tasks/:name", delete(cancel_task_handler))
        .route("/tasks/:name/history", get(task_history_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/dashboard/start", post(dashboard_start_handler))
        .route("/dashboard/stop", post(dashboard_stop_handler))
        .route("/dashboard/pause", post(dashboard_pause_handler))
        .route("/dashboard/refresh", post(dashboard_refresh_handler))
        .route("/students", put(upsert_student_handler))
        .route("/audit", post(audit_log_handler))
        .route("/audit/stats", get(audit_stats_handler))
        .route("/audit/recent", get(audit_recent_handler))
        .route("/runtime/pools", get(pools_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
