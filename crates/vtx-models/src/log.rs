//! Per-job log entries.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::JobId;

/// Severity of a job log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Parse the uppercase wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(LogLevel::Info),
            "WARN" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only audit/progress entry for a job.
///
/// Listed ascending by `created_at` for display.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobLogEntry {
    pub id: String,
    pub job_id: JobId,
    pub level: LogLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl JobLogEntry {
    /// Create a new entry stamped with the current time.
    pub fn new(job_id: JobId, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_id,
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_wire_form() {
        assert_eq!(serde_json::to_string(&LogLevel::Error).unwrap(), "\"ERROR\"");
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("warn"), None);
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = JobLogEntry::new(JobId::from_string("j1"), LogLevel::Info, "started");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"jobId\":\"j1\""));
        assert!(json.contains("\"level\":\"INFO\""));
        assert!(json.contains("\"createdAt\""));
    }
}
