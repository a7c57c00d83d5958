//! Progress events published by workers over the relay channel.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::JobId;
use crate::log::LogLevel;
use crate::status::JobStatus;

/// Job-level status carried by a progress event.
///
/// STARTED marks the beginning of transcoding; COMPLETED and FAILED are
/// terminal. Plain log events carry no status at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventStatus {
    Started,
    Completed,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Started => "STARTED",
            EventStatus::Completed => "COMPLETED",
            EventStatus::Failed => "FAILED",
        }
    }

    /// Job status this event status folds into.
    pub fn to_job_status(&self) -> JobStatus {
        match self {
            EventStatus::Started => JobStatus::Processing,
            EventStatus::Completed => JobStatus::Completed,
            EventStatus::Failed => JobStatus::Failed,
        }
    }

    /// Terminal events get the extra publish retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Failed)
    }
}

/// Event published by a worker and consumed by the relay subscriber and
/// live WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeEvent {
    pub job_id: JobId,
    pub log_level: LogLevel,
    pub log_message: String,

    /// Present on STARTED/COMPLETED/FAILED events only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,

    /// Produced output keys, present on the COMPLETED event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_keys: Option<Vec<String>>,

    /// Wall-clock transcode time ("X.XX seconds"), present on COMPLETED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl TranscodeEvent {
    /// Plain info log event.
    pub fn info(job_id: JobId, message: impl Into<String>) -> Self {
        Self {
            job_id,
            log_level: LogLevel::Info,
            log_message: message.into(),
            status: None,
            output_keys: None,
            duration: None,
        }
    }

    /// Plain warning log event.
    pub fn warn(job_id: JobId, message: impl Into<String>) -> Self {
        Self {
            job_id,
            log_level: LogLevel::Warn,
            log_message: message.into(),
            status: None,
            output_keys: None,
            duration: None,
        }
    }

    /// Plain error log event (no status change).
    pub fn error(job_id: JobId, message: impl Into<String>) -> Self {
        Self {
            job_id,
            log_level: LogLevel::Error,
            log_message: message.into(),
            status: None,
            output_keys: None,
            duration: None,
        }
    }

    /// Transcoding-started event.
    pub fn started(job_id: JobId) -> Self {
        Self {
            job_id,
            log_level: LogLevel::Info,
            log_message: "Transcoding started".to_string(),
            status: Some(EventStatus::Started),
            output_keys: None,
            duration: None,
        }
    }

    /// Terminal completion event with the produced output keys.
    pub fn completed(job_id: JobId, output_keys: Vec<String>, duration_secs: f64) -> Self {
        let count = output_keys.len();
        Self {
            job_id,
            log_level: LogLevel::Info,
            log_message: format!("Transcoding completed, {} output(s) produced", count),
            status: Some(EventStatus::Completed),
            output_keys: Some(output_keys),
            duration: Some(format!("{:.2} seconds", duration_secs)),
        }
    }

    /// Terminal failure event.
    pub fn failed(job_id: JobId, message: impl Into<String>) -> Self {
        Self {
            job_id,
            log_level: LogLevel::Error,
            log_message: message.into(),
            status: Some(EventStatus::Failed),
            output_keys: None,
            duration: None,
        }
    }

    /// Whether this is a terminal (COMPLETED/FAILED) event.
    pub fn is_terminal(&self) -> bool {
        self.status.map(|s| s.is_terminal()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_event_omits_optional_fields() {
        let event = TranscodeEvent::info(JobId::from_string("j1"), "downloading source");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"jobId\":\"j1\""));
        assert!(json.contains("\"logLevel\":\"INFO\""));
        assert!(json.contains("\"logMessage\":\"downloading source\""));
        assert!(!json.contains("status"));
        assert!(!json.contains("outputKeys"));
        assert!(!json.contains("duration"));
    }

    #[test]
    fn test_completed_event_wire_form() {
        let event = TranscodeEvent::completed(
            JobId::from_string("j1"),
            vec!["videos/j1/360p.mp4".into(), "videos/j1/720p.mp4".into()],
            12.345,
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"status\":\"COMPLETED\""));
        assert!(json.contains("\"outputKeys\":[\"videos/j1/360p.mp4\",\"videos/j1/720p.mp4\"]"));
        assert!(json.contains("\"duration\":\"12.35 seconds\""));
        assert!(event.is_terminal());
    }

    #[test]
    fn test_failed_event_is_terminal_error() {
        let event = TranscodeEvent::failed(JobId::from_string("j1"), "download failed");
        assert_eq!(event.log_level, LogLevel::Error);
        assert!(event.is_terminal());
        assert_eq!(event.status, Some(EventStatus::Failed));
    }

    #[test]
    fn test_status_fold() {
        assert_eq!(EventStatus::Started.to_job_status(), JobStatus::Processing);
        assert_eq!(EventStatus::Completed.to_job_status(), JobStatus::Completed);
        assert_eq!(EventStatus::Failed.to_job_status(), JobStatus::Failed);
    }

    #[test]
    fn test_round_trip() {
        let event = TranscodeEvent::started(JobId::from_string("j9"));
        let json = serde_json::to_string(&event).unwrap();
        let back: TranscodeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job_id.as_str(), "j9");
        assert_eq!(back.status, Some(EventStatus::Started));
    }
}
