//! Error types for the runtime
//!
//! Caller-facing errors are surfaced synchronously; background failures are
//! logged and counted by the component that hit them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Scheduler Error Enum ==
/// Errors returned synchronously by the task scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// A task with this name is already registered
    #[error("Task already scheduled: {0}")]
    DuplicateTask(String),

    /// Interval must be strictly positive
    #[error("Invalid interval for task {0}: interval must be greater than zero")]
    InvalidInterval(String),

    /// Task names must be non-empty
    #[error("Task name cannot be empty")]
    InvalidName,

    /// The dispatch loop has been shut down
    #[error("Scheduler is not running")]
    NotRunning,
}

// == Statistics Error Enum ==
/// Failure of one statistics computation. Never fatal to the dashboard.
#[derive(Error, Debug)]
pub enum StatisticsError {
    /// No grades to aggregate
    #[error("No grades available to compute statistics")]
    EmptyDataset,

    /// A grade was NaN or infinite
    #[error("Invalid grade {value} for student {student}")]
    InvalidGrade { student: String, value: f64 },

    /// The roster could not be read
    #[error("Roster unavailable: {0:#}")]
    Source(anyhow::Error),
}

// == Runtime Error Enum ==
/// Errors raised while building or querying the executor registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Registry construction requires a running tokio runtime
    #[error("No tokio runtime available to host worker pools")]
    NoRuntime,

    /// A named cache exists with different key/value types
    #[error("Cache '{0}' already exists with different key/value types")]
    CacheTypeMismatch(String),
}

// == API Error Enum ==
/// Unified error type for the admin HTTP surface.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Conflicts with existing state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::DuplicateTask(_) => ApiError::Conflict(err.to_string()),
            SchedulerError::InvalidInterval(_) | SchedulerError::InvalidName => {
                ApiError::InvalidRequest(err.to_string())
            }
            SchedulerError::NotRunning => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::CacheTypeMismatch(_) => ApiError::Conflict(err.to_string()),
            RuntimeError::NoRuntime => ApiError::Internal(err.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the admin API.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_task_maps_to_conflict() {
        let err: ApiError = SchedulerError::DuplicateTask("report".to_string()).into();
        assert!(matches!(err, ApiError::Conflict(ref msg) if msg.contains("report")));
    }

    #[test]
    fn test_invalid_interval_maps_to_bad_request() {
        let err: ApiError = SchedulerError::InvalidInterval("report".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_statistics_source_error_message() {
        let err = StatisticsError::Source(anyhow::anyhow!("database offline"));
        assert!(err.to_string().contains("database offline"));
    }
}
