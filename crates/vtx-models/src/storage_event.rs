//! Storage upload notifications and key parsing.
//!
//! Object stores deliver creation events as a JSON envelope with a
//! `Records` array. Synthetic test events (sent when a bucket subscription
//! is wired up) carry a top-level `Event` marker instead and must be
//! dropped without side effects.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::job::JobId;

static UPLOAD_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn upload_key_re() -> &'static Regex {
    UPLOAD_KEY_RE.get_or_init(|| {
        Regex::new(r"^uploads/([^/]+)/([^/]+)/([^/]+)$").expect("valid upload key pattern")
    })
}

/// Notification envelope delivered on the upload queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEventEnvelope {
    #[serde(rename = "Records", default)]
    pub records: Vec<StorageRecord>,

    /// Set on synthetic subscription-test events
    #[serde(rename = "Service", skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Event name, e.g. "s3:TestEvent"
    #[serde(rename = "Event", skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl StorageEventEnvelope {
    /// Whether this is a synthetic subscription-test event.
    pub fn is_test_event(&self) -> bool {
        self.event
            .as_deref()
            .is_some_and(|e| e.ends_with("TestEvent"))
    }

    /// Wrap a single object-created record, as tests and the webhook
    /// ingress produce.
    pub fn object_created(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            records: vec![StorageRecord {
                s3: S3Entity {
                    bucket: BucketRef { name: bucket.into() },
                    object: ObjectRef { key: key.into() },
                },
            }],
            service: None,
            event: None,
        }
    }
}

/// One object-created record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageRecord {
    pub s3: S3Entity,
}

impl StorageRecord {
    pub fn bucket(&self) -> &str {
        &self.s3.bucket.name
    }

    pub fn key(&self) -> &str {
        &self.s3.object.key
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

/// Parsed `uploads/<userId>/<jobId>/<fileName>` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadKey {
    pub user_id: String,
    pub job_id: JobId,
    pub file_name: String,
}

impl UploadKey {
    /// Parse an object key against the upload path convention.
    ///
    /// Keys that do not match are permanently malformed; callers skip the
    /// record rather than retry.
    pub fn parse(key: &str) -> Option<UploadKey> {
        let caps = upload_key_re().captures(key)?;
        Some(UploadKey {
            user_id: caps[1].to_string(),
            job_id: JobId::from_string(&caps[2]),
            file_name: caps[3].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_upload_key() {
        let parsed = UploadKey::parse("uploads/u1/j1/video.mp4").unwrap();
        assert_eq!(parsed.user_id, "u1");
        assert_eq!(parsed.job_id.as_str(), "j1");
        assert_eq!(parsed.file_name, "video.mp4");
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        assert!(UploadKey::parse("uploads/bad-format.mp4").is_none());
        assert!(UploadKey::parse("uploads/u1/j1").is_none());
        assert!(UploadKey::parse("uploads/u1/j1/a/b.mp4").is_none());
        assert!(UploadKey::parse("videos/j1/360p.mp4").is_none());
        assert!(UploadKey::parse("").is_none());
    }

    #[test]
    fn test_envelope_parses_object_created_json() {
        let body = r#"{
            "Records": [
                {"s3": {"bucket": {"name": "vtx-uploads"}, "object": {"key": "uploads/u1/j1/video.mp4"}}}
            ]
        }"#;
        let envelope: StorageEventEnvelope = serde_json::from_str(body).unwrap();
        assert!(!envelope.is_test_event());
        assert_eq!(envelope.records.len(), 1);
        assert_eq!(envelope.records[0].bucket(), "vtx-uploads");
        assert_eq!(envelope.records[0].key(), "uploads/u1/j1/video.mp4");
    }

    #[test]
    fn test_envelope_detects_test_event() {
        let body = r#"{"Service": "Amazon S3", "Event": "s3:TestEvent"}"#;
        let envelope: StorageEventEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.is_test_event());
        assert!(envelope.records.is_empty());
    }

    #[test]
    fn test_envelope_rejects_malformed_body() {
        assert!(serde_json::from_str::<StorageEventEnvelope>("not json").is_err());
        assert!(serde_json::from_str::<StorageEventEnvelope>(r#"{"Records": "nope"}"#).is_err());
    }
}
