//! Job records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::status::JobStatus;

/// Unique identifier for a transcoding job.
///
/// Generated at upload-intent time and threaded through the queue message,
/// the worker task environment and the event relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One user request to transcode a source video into resolution variants.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Owning user
    pub user_id: String,

    /// Blob key of the uploaded source
    pub input_key: String,

    /// Blob keys of produced variants, populated as uploads complete
    #[serde(default)]
    pub output_keys: Vec<String>,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Resolution labels requested at upload-intent time
    pub requested_resolutions: Vec<String>,

    /// Source duration in seconds, if probed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration: Option<f64>,

    /// Wall-clock transcode time, e.g. "12.34 seconds"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_duration: Option<String>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new queued job for an upcoming upload.
    ///
    /// The input key follows the `uploads/<userId>/<jobId>/<fileName>`
    /// convention the dispatcher matches against.
    pub fn new(
        user_id: impl Into<String>,
        file_name: &str,
        requested_resolutions: Vec<String>,
    ) -> Self {
        let user_id = user_id.into();
        let id = JobId::new();
        let now = Utc::now();
        let input_key = format!("uploads/{}/{}/{}", user_id, id, file_name);

        Self {
            id,
            user_id,
            input_key,
            output_keys: Vec::new(),
            status: JobStatus::Queued,
            requested_resolutions,
            video_duration: None,
            completion_duration: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the job reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = Job::new("user123", "video.mp4", vec!["360p".into(), "720p".into()]);

        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.output_keys.is_empty());
        assert_eq!(
            job.input_key,
            format!("uploads/user123/{}/video.mp4", job.id)
        );
    }

    #[test]
    fn test_job_id_is_transparent_in_json() {
        let id = JobId::from_string("j1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"j1\"");
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let job = Job::new("u1", "clip.mp4", vec!["480p".into()]);
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"inputKey\""));
        assert!(json.contains("\"requestedResolutions\""));
        assert!(json.contains("\"status\":\"QUEUED\""));
    }
}
