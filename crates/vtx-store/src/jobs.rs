//! Typed repositories for jobs and their log entries.
//!
//! Status writers go through the allowed-transition table, so applying the
//! same terminal write twice is a no-op. That makes the relay subscriber safe
//! to run in multiple API instances.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use vtx_models::{Job, JobId, JobLogEntry, JobStatus, LogLevel};

use crate::client::StoreClient;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    CollectionSelector, Document, Filter, FromStoreValue, Order, StructuredQuery, ToStoreValue,
    Value,
};

/// Root collection holding job documents.
pub const JOBS_COLLECTION: &str = "transcodingJobs";

/// Subcollection id holding a job's log entries.
pub const LOGS_COLLECTION: &str = "logs";

fn logs_collection(job_id: &JobId) -> String {
    format!("{}/{}/{}", JOBS_COLLECTION, job_id, LOGS_COLLECTION)
}

/// Repository for job documents.
#[derive(Clone)]
pub struct JobRepository {
    client: StoreClient,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Get a job by ID.
    pub async fn get(&self, job_id: &JobId) -> StoreResult<Option<Job>> {
        let doc = self
            .client
            .get_document(JOBS_COLLECTION, job_id.as_str())
            .await?;

        match doc {
            Some(d) => Ok(Some(document_to_job(&d)?)),
            None => Ok(None),
        }
    }

    /// Create a new job record.
    pub async fn create(&self, job: &Job) -> StoreResult<()> {
        let fields = job_to_fields(job);
        self.client
            .create_document(JOBS_COLLECTION, job.id.as_str(), fields)
            .await?;
        info!("Created job record: {}", job.id);
        Ok(())
    }

    /// List a user's jobs, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Job>> {
        let query = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: JOBS_COLLECTION.to_string(),
                all_descendants: None,
            }],
            filter: Some(Filter::equal(
                "userId",
                Value::StringValue(user_id.to_string()),
            )),
            order_by: Some(vec![Order::descending("createdAt")]),
            limit: None,
        };

        let docs = self.client.run_query(None, query).await?;
        docs.iter().map(document_to_job).collect()
    }

    /// Apply a status transition if the table allows it.
    ///
    /// Returns whether the write happened. A disallowed transition is logged
    /// and skipped, not an error; late or duplicate terminal writes land here.
    pub async fn set_status(&self, job_id: &JobId, to: JobStatus) -> StoreResult<bool> {
        self.guarded_update(job_id, to, HashMap::new(), Vec::new())
            .await
    }

    /// Mark a job completed with its produced outputs and wall-clock duration.
    pub async fn complete(
        &self,
        job_id: &JobId,
        output_keys: &[String],
        duration: &str,
    ) -> StoreResult<bool> {
        let mut fields = HashMap::new();
        fields.insert(
            "outputKeys".to_string(),
            output_keys.to_vec().to_store_value(),
        );
        fields.insert(
            "completionDuration".to_string(),
            duration.to_store_value(),
        );

        self.guarded_update(
            job_id,
            JobStatus::Completed,
            fields,
            vec!["outputKeys".to_string(), "completionDuration".to_string()],
        )
        .await
    }

    /// Mark a job failed with an error message.
    pub async fn fail(&self, job_id: &JobId, error_message: &str) -> StoreResult<bool> {
        let mut fields = HashMap::new();
        fields.insert("errorMessage".to_string(), error_message.to_store_value());

        self.guarded_update(
            job_id,
            JobStatus::Failed,
            fields,
            vec!["errorMessage".to_string()],
        )
        .await
    }

    /// Cancel a job. Canceled is absorbing, so later worker events are
    /// ignored by the guard.
    pub async fn cancel(&self, job_id: &JobId) -> StoreResult<bool> {
        self.set_status(job_id, JobStatus::Canceled).await
    }

    /// Delete a job record and its log entries.
    pub async fn delete(&self, job_id: &JobId) -> StoreResult<()> {
        let logs = logs_collection(job_id);

        let query = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: LOGS_COLLECTION.to_string(),
                all_descendants: None,
            }],
            filter: None,
            order_by: None,
            limit: None,
        };
        let parent = format!("{}/{}", JOBS_COLLECTION, job_id);
        let docs = self.client.run_query(Some(&parent), query).await?;

        for doc in &docs {
            if let Some(id) = doc.doc_id() {
                self.client.delete_document(&logs, id).await?;
            }
        }

        self.client
            .delete_document(JOBS_COLLECTION, job_id.as_str())
            .await?;
        info!("Deleted job {} and {} log entries", job_id, docs.len());
        Ok(())
    }

    async fn guarded_update(
        &self,
        job_id: &JobId,
        to: JobStatus,
        mut extra_fields: HashMap<String, Value>,
        mut extra_mask: Vec<String>,
    ) -> StoreResult<bool> {
        let doc = self
            .client
            .get_document(JOBS_COLLECTION, job_id.as_str())
            .await?
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", JOBS_COLLECTION, job_id)))?;

        let current = required_status(&doc)?;
        if !current.can_transition_to(to) {
            debug!(
                "Skipping disallowed transition {} -> {} for job {}",
                current, to, job_id
            );
            return Ok(false);
        }

        extra_fields.insert("status".to_string(), to.as_str().to_store_value());
        extra_fields.insert("updatedAt".to_string(), Utc::now().to_store_value());
        extra_mask.push("status".to_string());
        extra_mask.push("updatedAt".to_string());

        self.client
            .update_document(JOBS_COLLECTION, job_id.as_str(), extra_fields, Some(extra_mask))
            .await?;

        info!("Job {} moved {} -> {}", job_id, current, to);
        Ok(true)
    }
}

/// Repository for per-job log entries.
#[derive(Clone)]
pub struct JobLogRepository {
    client: StoreClient,
}

impl JobLogRepository {
    /// Create a new log repository.
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Append a log entry.
    pub async fn append(
        &self,
        job_id: &JobId,
        level: LogLevel,
        message: impl Into<String>,
    ) -> StoreResult<JobLogEntry> {
        let entry = JobLogEntry::new(job_id.clone(), level, message);
        let fields = log_entry_to_fields(&entry);

        self.client
            .create_document(&logs_collection(job_id), &entry.id, fields)
            .await?;
        Ok(entry)
    }

    /// List a job's log entries, oldest first.
    pub async fn list(&self, job_id: &JobId) -> StoreResult<Vec<JobLogEntry>> {
        let query = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: LOGS_COLLECTION.to_string(),
                all_descendants: None,
            }],
            filter: None,
            order_by: Some(vec![Order::ascending("createdAt")]),
            limit: None,
        };

        let parent = format!("{}/{}", JOBS_COLLECTION, job_id);
        let docs = self.client.run_query(Some(&parent), query).await?;
        docs.iter().map(|d| document_to_log_entry(d, job_id)).collect()
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn job_to_fields(job: &Job) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("userId".to_string(), job.user_id.to_store_value());
    fields.insert("inputKey".to_string(), job.input_key.to_store_value());
    fields.insert("outputKeys".to_string(), job.output_keys.to_store_value());
    fields.insert("status".to_string(), job.status.as_str().to_store_value());
    fields.insert(
        "requestedResolutions".to_string(),
        job.requested_resolutions.to_store_value(),
    );
    fields.insert(
        "videoDuration".to_string(),
        job.video_duration.to_store_value(),
    );
    fields.insert(
        "completionDuration".to_string(),
        job.completion_duration.to_store_value(),
    );
    fields.insert(
        "errorMessage".to_string(),
        job.error_message.to_store_value(),
    );
    fields.insert("createdAt".to_string(), job.created_at.to_store_value());
    fields.insert("updatedAt".to_string(), job.updated_at.to_store_value());
    fields
}

fn document_to_job(doc: &Document) -> StoreResult<Job> {
    let id = doc
        .doc_id()
        .ok_or_else(|| StoreError::invalid_response("job document has no name"))?;

    Ok(Job {
        id: JobId::from_string(id),
        user_id: required_field(doc, "userId")?,
        input_key: required_field(doc, "inputKey")?,
        output_keys: optional_field(doc, "outputKeys").unwrap_or_default(),
        status: required_status(doc)?,
        requested_resolutions: optional_field(doc, "requestedResolutions").unwrap_or_default(),
        video_duration: optional_field(doc, "videoDuration"),
        completion_duration: optional_field(doc, "completionDuration"),
        error_message: optional_field(doc, "errorMessage"),
        created_at: required_field(doc, "createdAt")?,
        updated_at: required_field(doc, "updatedAt")?,
    })
}

fn log_entry_to_fields(entry: &JobLogEntry) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("level".to_string(), entry.level.as_str().to_store_value());
    fields.insert("message".to_string(), entry.message.to_store_value());
    fields.insert("createdAt".to_string(), entry.created_at.to_store_value());
    fields
}

fn document_to_log_entry(doc: &Document, job_id: &JobId) -> StoreResult<JobLogEntry> {
    let id = doc
        .doc_id()
        .ok_or_else(|| StoreError::invalid_response("log document has no name"))?;

    let level_str: String = required_field(doc, "level")?;
    let level = LogLevel::parse(&level_str)
        .ok_or_else(|| StoreError::invalid_response(format!("unknown log level: {}", level_str)))?;

    Ok(JobLogEntry {
        id: id.to_string(),
        job_id: job_id.clone(),
        level,
        message: required_field(doc, "message")?,
        created_at: required_field(doc, "createdAt")?,
    })
}

fn required_field<T: FromStoreValue>(doc: &Document, name: &str) -> StoreResult<T> {
    doc.field(name)
        .and_then(T::from_store_value)
        .ok_or_else(|| StoreError::invalid_response(format!("missing or invalid field: {}", name)))
}

fn optional_field<T: FromStoreValue>(doc: &Document, name: &str) -> Option<T> {
    doc.field(name).and_then(T::from_store_value)
}

fn required_status(doc: &Document) -> StoreResult<JobStatus> {
    let s: String = required_field(doc, "status")?;
    JobStatus::parse(&s)
        .ok_or_else(|| StoreError::invalid_response(format!("unknown job status: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_for(job: &Job) -> Document {
        let mut doc = Document::new(job_to_fields(job));
        doc.name = Some(format!(
            "projects/p/databases/(default)/documents/{}/{}",
            JOBS_COLLECTION, job.id
        ));
        doc
    }

    #[test]
    fn test_job_round_trip() {
        let mut job = Job::new("u1", "movie.mp4", vec!["360p".into(), "1080p".into()]);
        job.output_keys = vec![format!("videos/{}/360p.mp4", job.id)];
        job.status = JobStatus::Processing;
        job.video_duration = Some(42.5);

        let back = document_to_job(&doc_for(&job)).unwrap();

        assert_eq!(back.id, job.id);
        assert_eq!(back.user_id, "u1");
        assert_eq!(back.input_key, job.input_key);
        assert_eq!(back.output_keys, job.output_keys);
        assert_eq!(back.status, JobStatus::Processing);
        assert_eq!(back.requested_resolutions, job.requested_resolutions);
        assert_eq!(back.video_duration, Some(42.5));
        assert_eq!(back.completion_duration, None);
        assert_eq!(back.error_message, None);
    }

    #[test]
    fn test_unknown_status_rejected() {
        let job = Job::new("u1", "movie.mp4", vec!["360p".into()]);
        let mut doc = doc_for(&job);
        doc.fields
            .as_mut()
            .unwrap()
            .insert("status".to_string(), Value::StringValue("RUNNING".into()));

        assert!(document_to_job(&doc).is_err());
    }

    #[test]
    fn test_null_optionals_become_none() {
        let job = Job::new("u1", "movie.mp4", vec!["360p".into()]);
        let back = document_to_job(&doc_for(&job)).unwrap();
        assert_eq!(back.video_duration, None);
        assert_eq!(back.completion_duration, None);
    }

    #[test]
    fn test_logs_collection_path() {
        assert_eq!(
            logs_collection(&JobId::from_string("j1")),
            "transcodingJobs/j1/logs"
        );
    }

    #[test]
    fn test_log_entry_round_trip() {
        let job_id = JobId::from_string("j1");
        let entry = JobLogEntry::new(job_id.clone(), LogLevel::Warn, "240p failed");
        let mut doc = Document::new(log_entry_to_fields(&entry));
        doc.name = Some(format!(
            "projects/p/databases/(default)/documents/transcodingJobs/j1/logs/{}",
            entry.id
        ));

        let back = document_to_log_entry(&doc, &job_id).unwrap();
        assert_eq!(back.id, entry.id);
        assert_eq!(back.level, LogLevel::Warn);
        assert_eq!(back.message, "240p failed");
    }
}
