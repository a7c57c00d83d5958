//! Upload dispatch loop.
//!
//! Consumes storage notifications from the upload queue, resolves each
//! record to a job, and launches a transcoding worker per upload. A
//! message is acked only when every record either launched or was
//! permanently skipped; transient failures leave it pending for the
//! claim loop to redeliver.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vtx_models::{Job, StorageEventEnvelope, StorageRecord, UploadKey};
use vtx_queue::UploadQueue;
use vtx_store::JobRepository;

use crate::config::DispatcherConfig;
use crate::error::DispatchResult;
use crate::launcher::{TaskLauncher, TaskSpec};
use crate::metrics::{reasons, record_dropped, record_launch_failure, record_launched};

/// Classification of a raw queue message body.
enum MessageKind {
    /// Body that does not parse as a notification envelope. Acked away.
    Malformed,
    /// Synthetic subscription-test event. Acked away, no side effects.
    TestEvent,
    /// Object-created records to dispatch.
    Records(Vec<StorageRecord>),
}

fn classify(body: &str) -> MessageKind {
    match serde_json::from_str::<StorageEventEnvelope>(body) {
        Err(_) => MessageKind::Malformed,
        Ok(envelope) if envelope.is_test_event() => MessageKind::TestEvent,
        Ok(envelope) => MessageKind::Records(envelope.records),
    }
}

/// Outcome of dispatching one record.
#[derive(Debug, PartialEq, Eq)]
enum RecordOutcome {
    Launched,
    /// Permanently unusable record. Counts toward acking the message.
    Skipped,
    /// Transient failure. Blocks the ack so the message is redelivered.
    Failed,
}

/// A message is safe to ack once no record is waiting on a retry.
fn should_ack(outcomes: &[RecordOutcome]) -> bool {
    outcomes.iter().all(|o| *o != RecordOutcome::Failed)
}

fn task_spec(config: &DispatcherConfig, record: &StorageRecord, upload: &UploadKey, job: &Job) -> TaskSpec {
    TaskSpec {
        job_id: upload.job_id.clone(),
        source_bucket: record.bucket().to_string(),
        source_key: record.key().to_string(),
        output_bucket: config.destination_bucket.clone(),
        resolutions: job.requested_resolutions.clone(),
        redis_url: config.redis_url.clone(),
    }
}

async fn launch_record(launcher: &dyn TaskLauncher, spec: &TaskSpec) -> RecordOutcome {
    match launcher.launch(spec).await {
        Ok(()) => {
            record_launched();
            RecordOutcome::Launched
        }
        Err(e) => {
            error!(job_id = %spec.job_id, "Worker launch failed: {}", e);
            record_launch_failure();
            RecordOutcome::Failed
        }
    }
}

/// Dispatcher that turns upload notifications into worker launches.
pub struct Dispatcher {
    config: DispatcherConfig,
    queue: Arc<UploadQueue>,
    jobs: JobRepository,
    launcher: Arc<dyn TaskLauncher>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        queue: UploadQueue,
        jobs: JobRepository,
        launcher: Arc<dyn TaskLauncher>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("dispatcher-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            jobs,
            launcher,
            shutdown,
            consumer_name,
        }
    }

    /// Signal the run loop to stop.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Run until shutdown is signalled.
    pub async fn run(&self) -> DispatchResult<()> {
        info!(consumer = %self.consumer_name, "Starting dispatcher");

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = self.spawn_claim_task();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping dispatcher");
                        break;
                    }
                }
                result = self.poll_once() => {
                    if let Err(e) = result {
                        error!("Dispatch iteration failed: {}", e);
                        tokio::time::sleep(self.config.error_backoff).await;
                    }
                }
            }
        }

        claim_task.abort();
        info!("Dispatcher stopped");
        Ok(())
    }

    /// Periodically reclaim messages stuck pending on dead consumers.
    fn spawn_claim_task(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let jobs = self.jobs.clone();
        let launcher = Arc::clone(&self.launcher);
        let config = self.config.clone();
        let consumer_name = self.consumer_name.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let claimed = queue
                            .claim_pending(&consumer_name, config.claim_min_idle, config.max_batch)
                            .await;
                        match claimed {
                            Ok(messages) if !messages.is_empty() => {
                                info!("Claimed {} stuck messages", messages.len());
                                for (message_id, body) in messages {
                                    Self::handle_message(
                                        &config, &queue, &jobs, launcher.as_ref(), &message_id, &body,
                                    )
                                    .await;
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Failed to claim pending messages: {}", e);
                            }
                        }
                    }
                }
            }
        })
    }

    /// One receive-dispatch-ack iteration.
    async fn poll_once(&self) -> DispatchResult<()> {
        let messages = self.queue.receive(&self.consumer_name).await?;

        if messages.is_empty() {
            return Ok(());
        }

        debug!("Received {} upload notifications", messages.len());

        for (message_id, body) in messages {
            Self::handle_message(
                &self.config,
                &self.queue,
                &self.jobs,
                self.launcher.as_ref(),
                &message_id,
                &body,
            )
            .await;
        }

        Ok(())
    }

    async fn handle_message(
        config: &DispatcherConfig,
        queue: &UploadQueue,
        jobs: &JobRepository,
        launcher: &dyn TaskLauncher,
        message_id: &str,
        body: &str,
    ) {
        let records = match classify(body) {
            MessageKind::Malformed => {
                warn!(message_id, "Dropping malformed notification body");
                record_dropped(reasons::MALFORMED);
                Self::ack(queue, message_id).await;
                return;
            }
            MessageKind::TestEvent => {
                debug!(message_id, "Dropping subscription test event");
                record_dropped(reasons::TEST_EVENT);
                Self::ack(queue, message_id).await;
                return;
            }
            MessageKind::Records(records) => records,
        };

        let outcomes = join_all(
            records
                .iter()
                .map(|record| Self::process_record(config, jobs, launcher, record)),
        )
        .await;

        if should_ack(&outcomes) {
            Self::ack(queue, message_id).await;
        } else {
            warn!(
                message_id,
                "Leaving message unacked for redelivery after launch failure"
            );
        }
    }

    async fn process_record(
        config: &DispatcherConfig,
        jobs: &JobRepository,
        launcher: &dyn TaskLauncher,
        record: &StorageRecord,
    ) -> RecordOutcome {
        let key = record.key();

        if record.bucket() != config.source_bucket {
            warn!(
                bucket = record.bucket(),
                key, "Notification for a foreign bucket, skipping"
            );
            record_dropped(reasons::FOREIGN_BUCKET);
            return RecordOutcome::Skipped;
        }

        let upload = match UploadKey::parse(key) {
            Some(upload) => upload,
            None => {
                error!(key, "Object key does not match the upload convention, skipping");
                record_dropped(reasons::UNMATCHED_KEY);
                return RecordOutcome::Skipped;
            }
        };

        let job = match jobs.get(&upload.job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                error!(job_id = %upload.job_id, key, "No job record for upload, skipping");
                record_dropped(reasons::MISSING_JOB);
                return RecordOutcome::Skipped;
            }
            Err(e) => {
                error!(job_id = %upload.job_id, "Job lookup failed: {}", e);
                return RecordOutcome::Failed;
            }
        };

        let spec = task_spec(config, record, &upload, &job);
        launch_record(launcher, &spec).await
    }

    async fn ack(queue: &UploadQueue, message_id: &str) {
        if let Err(e) = queue.ack(message_id).await {
            error!(message_id, "Failed to ack message: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::launcher::MockTaskLauncher;
    use vtx_models::JobId;

    fn sample_record() -> StorageRecord {
        let envelope =
            StorageEventEnvelope::object_created("vtx-uploads", "uploads/u1/j1/video.mp4");
        envelope.records.into_iter().next().unwrap()
    }

    fn sample_job() -> Job {
        Job::new(
            "u1".to_string(),
            "video.mp4",
            vec!["360p".to_string(), "720p".to_string()],
        )
    }

    #[test]
    fn test_classify_malformed() {
        assert!(matches!(classify("not json"), MessageKind::Malformed));
        assert!(matches!(
            classify(r#"{"Records": "nope"}"#),
            MessageKind::Malformed
        ));
    }

    #[test]
    fn test_classify_test_event() {
        let body = r#"{"Service": "Amazon S3", "Event": "s3:TestEvent"}"#;
        assert!(matches!(classify(body), MessageKind::TestEvent));
    }

    #[test]
    fn test_classify_records() {
        let body = serde_json::to_string(&StorageEventEnvelope::object_created(
            "vtx-uploads",
            "uploads/u1/j1/video.mp4",
        ))
        .unwrap();
        match classify(&body) {
            MessageKind::Records(records) => assert_eq!(records.len(), 1),
            _ => panic!("expected records"),
        }
    }

    #[test]
    fn test_task_spec_contract() {
        let config = DispatcherConfig::default();
        let record = sample_record();
        let upload = UploadKey::parse(record.key()).unwrap();
        let job = sample_job();

        let spec = task_spec(&config, &record, &upload, &job);

        assert_eq!(spec.job_id, JobId::from_string("j1"));
        assert_eq!(spec.source_bucket, "vtx-uploads");
        assert_eq!(spec.source_key, "uploads/u1/j1/video.mp4");
        assert_eq!(spec.output_bucket, config.destination_bucket);
        assert_eq!(spec.resolutions, job.requested_resolutions);
    }

    #[test]
    fn test_ack_when_all_launched() {
        assert!(should_ack(&[RecordOutcome::Launched, RecordOutcome::Launched]));
    }

    #[test]
    fn test_ack_when_skips_are_permanent() {
        assert!(should_ack(&[RecordOutcome::Launched, RecordOutcome::Skipped]));
        assert!(should_ack(&[RecordOutcome::Skipped]));
        assert!(should_ack(&[]));
    }

    #[test]
    fn test_no_ack_when_any_launch_failed() {
        assert!(!should_ack(&[
            RecordOutcome::Launched,
            RecordOutcome::Failed,
            RecordOutcome::Skipped
        ]));
    }

    #[tokio::test]
    async fn test_launch_record_success() {
        let mut launcher = MockTaskLauncher::new();
        launcher.expect_launch().times(1).returning(|_| Ok(()));

        let config = DispatcherConfig::default();
        let record = sample_record();
        let upload = UploadKey::parse(record.key()).unwrap();
        let spec = task_spec(&config, &record, &upload, &sample_job());

        let outcome = launch_record(&launcher, &spec).await;
        assert_eq!(outcome, RecordOutcome::Launched);
    }

    #[tokio::test]
    async fn test_launch_record_failure_is_transient() {
        let mut launcher = MockTaskLauncher::new();
        launcher
            .expect_launch()
            .times(1)
            .returning(|_| Err(DispatchError::launch_failed("spawn failed")));

        let config = DispatcherConfig::default();
        let record = sample_record();
        let upload = UploadKey::parse(record.key()).unwrap();
        let spec = task_spec(&config, &record, &upload, &sample_job());

        let outcome = launch_record(&launcher, &spec).await;
        assert_eq!(outcome, RecordOutcome::Failed);
    }
}
