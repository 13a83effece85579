//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::{Deserialize, Serialize};

use crate::roster::Student;

const MAX_KEY_LEN: usize = 256;

/// Shadowed by the `GET /cache/:name/stats` route.
const RESERVED_KEY: &str = "stats";

/// Request body for `PUT /cache/:name`
#[derive(Debug, Clone, Deserialize)]
pub struct CachePutRequest {
    pub key: String,
    pub value: String,
}

impl CachePutRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LEN {
            return Some(format!(
                "Key exceeds maximum length of {MAX_KEY_LEN} characters"
            ));
        }
        if self.key == RESERVED_KEY {
            return Some(format!("Key '{RESERVED_KEY}' is reserved"));
        }
        None
    }
}

/// Built-in actions that can be scheduled over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Records an audit entry on every run
    Heartbeat,
    /// Forces a dashboard recomputation
    DashboardRefresh,
}

/// Request body for `POST /tasks`
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleTaskRequest {
    pub name: String,
    pub interval_ms: u64,
    pub job: JobKind,
    /// Delay before the first run; immediate when absent
    #[serde(default)]
    pub initial_delay_ms: Option<u64>,
}

/// Request body for `PUT /students`
#[derive(Debug, Clone, Deserialize)]
pub struct StudentRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub grades: Vec<f64>,
}

impl StudentRequest {
    pub fn validate(&self) -> Option<String> {
        if self.id.trim().is_empty() {
            return Some("Student id cannot be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Some("Student name cannot be empty".to_string());
        }
        None
    }

    pub fn into_student(self) -> Student {
        Student::new(self.id, self.name, self.grades)
    }
}

fn default_success() -> bool {
    true
}

/// Request body for `POST /audit`
#[derive(Debug, Clone, Deserialize)]
pub struct AuditLogRequest {
    pub operation: String,
    pub action: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub details: String,
}

impl AuditLogRequest {
    pub fn validate(&self) -> Option<String> {
        if self.operation.is_empty() || self.action.is_empty() {
            return Some("Operation and action cannot be empty".to_string());
        }
        None
    }
}

/// Query string for `GET /audit/recent`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}
