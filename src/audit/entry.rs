use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded operation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// Component or surface that performed the operation, e.g. `cache`
    pub operation: String,
    /// What was done, e.g. `put`
    pub action: String,
    pub duration_ms: u64,
    pub success: bool,
    pub details: String,
}

impl AuditEntry {
    pub fn new(
        operation: impl Into<String>,
        action: impl Into<String>,
        duration_ms: u64,
        success: bool,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            action: action.into(),
            duration_ms,
            success,
            details: details.into(),
        }
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}/{} ({}ms) {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            if self.success { "OK" } else { "FAIL" },
            self.operation,
            self.action,
            self.duration_ms,
            self.details
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_line() {
        let entry = AuditEntry::new("cache", "put", 3, false, "key=alpha");
        let line = entry.to_string();

        assert!(line.contains("[FAIL] cache/put (3ms) key=alpha"));
    }

    #[test]
    fn test_json_field_names() {
        let entry = AuditEntry::new("tasks", "schedule", 0, true, "");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["operation"], "tasks");
        assert_eq!(json["duration_ms"], 0);
        assert_eq!(json["success"], true);
    }
}
