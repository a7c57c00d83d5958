//! Multi-resolution transcode pipeline.
//!
//! Downloads the source upload into a scratch directory, fans out one
//! encode task per requested resolution under a semaphore, uploads each
//! variant as it finishes, and streams progress over the event relay.
//! One resolution's failure never aborts its siblings; the job completes
//! with whatever outputs were produced.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tempfile::TempDir;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use vtx_media::{encode_variant, get_duration, EncodeSettings, FfmpegProgress};
use vtx_models::{JobId, Resolution, TranscodeEvent};
use vtx_queue::EventRelay;
use vtx_storage::BlobClient;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Reports progress in 5-point steps, dropping intermediate ticks.
struct ProgressGate {
    last: i64,
}

impl ProgressGate {
    fn new() -> Self {
        Self { last: -5 }
    }

    /// Returns the percentage to report, if this tick crosses the next
    /// 5-point threshold.
    fn advance(&mut self, percent: f64) -> Option<i64> {
        let current = percent.floor() as i64;
        if current >= self.last + 5 {
            self.last = current;
            Some(current)
        } else {
            None
        }
    }
}

/// One transcoding task: a job's source upload in, N variants out.
pub struct TranscodeJob {
    config: WorkerConfig,
    source: BlobClient,
    outputs: BlobClient,
    relay: EventRelay,
}

impl TranscodeJob {
    pub fn new(
        config: WorkerConfig,
        source: BlobClient,
        outputs: BlobClient,
        relay: EventRelay,
    ) -> Self {
        Self {
            config,
            source,
            outputs,
            relay,
        }
    }

    /// Run the pipeline. Fatal errors publish a terminal FAILED event
    /// before returning so watchers are not left hanging.
    pub async fn run(&self) -> WorkerResult<()> {
        match self.execute().await {
            Ok(()) => Ok(()),
            Err(e) => {
                publish_quiet(
                    &self.relay,
                    TranscodeEvent::failed(
                        self.config.job_id.clone(),
                        format!("Transcoding failed: {}", e),
                    ),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn execute(&self) -> WorkerResult<()> {
        let started = Instant::now();
        let job_id = &self.config.job_id;

        let scratch = TempDir::new()?;

        publish_quiet(
            &self.relay,
            TranscodeEvent::info(job_id.clone(), "Downloading source video"),
        )
        .await;

        let source_path = scratch.path().join("source.mp4");
        self.source
            .download_file(&self.config.source_key, &source_path)
            .await
            .map_err(|e| {
                WorkerError::download_failed(format!(
                    "{} from {}: {}",
                    self.config.source_key, self.config.source_bucket, e
                ))
            })?;

        // Probing only feeds progress percentages; a failure degrades the
        // events, not the transcode.
        let total_duration_ms = match get_duration(&source_path).await {
            Ok(secs) => Some((secs * 1000.0) as i64),
            Err(e) => {
                warn!(job_id = %job_id, "Duration probe failed, progress will omit percentages: {}", e);
                None
            }
        };

        publish_quiet(&self.relay, TranscodeEvent::started(job_id.clone())).await;

        let semaphore = Arc::new(Semaphore::new(self.config.parallelism()));
        let settings = EncodeSettings {
            timeout_secs: self.config.encode_timeout_secs,
            ..Default::default()
        };

        let mut handles = Vec::with_capacity(self.config.resolutions.len());
        for label in &self.config.resolutions {
            let semaphore = Arc::clone(&semaphore);
            let label = label.clone();
            let job_id = job_id.clone();
            let source_path = source_path.clone();
            let scratch_dir = scratch.path().to_path_buf();
            let settings = settings.clone();
            let outputs = self.outputs.clone();
            let relay = self.relay.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                transcode_one(
                    job_id,
                    label,
                    source_path,
                    scratch_dir,
                    total_duration_ms,
                    settings,
                    outputs,
                    relay,
                )
                .await
            }));
        }

        let results = join_all(handles).await;
        let output_keys = collect_output_keys(results);

        let duration_secs = started.elapsed().as_secs_f64();

        info!(
            job_id = %job_id,
            outputs = output_keys.len(),
            requested = self.config.resolutions.len(),
            duration_secs,
            "Transcoding finished"
        );

        // Partial output is still useful output, so the job completes even
        // when some resolutions failed. Their ERROR events are on record.
        publish_quiet(
            &self.relay,
            TranscodeEvent::completed(job_id.clone(), output_keys, duration_secs),
        )
        .await;

        Ok(())
    }
}

/// Keys of the variants that made it to the output bucket. A failed or
/// panicked variant contributes nothing; its ERROR event is the record.
fn collect_output_keys(
    results: Vec<Result<Option<String>, tokio::task::JoinError>>,
) -> Vec<String> {
    results.into_iter().filter_map(|r| r.ok().flatten()).collect()
}

/// Encode, upload, and clean up one resolution variant. Returns the
/// output key on success.
#[allow(clippy::too_many_arguments)]
async fn transcode_one(
    job_id: JobId,
    label: String,
    source_path: PathBuf,
    scratch_dir: PathBuf,
    total_duration_ms: Option<i64>,
    settings: EncodeSettings,
    outputs: BlobClient,
    relay: EventRelay,
) -> Option<String> {
    let Some(resolution) = Resolution::lookup(&label) else {
        error!(job_id = %job_id, label, "Unknown resolution label, skipping");
        publish_quiet(
            &relay,
            TranscodeEvent::error(job_id, format!("Unknown resolution label: {}", label)),
        )
        .await;
        return None;
    };

    let output_path = scratch_dir.join(format!("video-{}.mp4", label));
    let output_key = resolution.output_key(&job_id);

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<i64>();
    let forwarder = tokio::spawn({
        let relay = relay.clone();
        let job_id = job_id.clone();
        let label = label.clone();
        async move {
            while let Some(percent) = progress_rx.recv().await {
                publish_quiet(
                    &relay,
                    TranscodeEvent::info(
                        job_id.clone(),
                        format!("Transcoding {}: {}% complete", label, percent),
                    ),
                )
                .await;
            }
        }
    });

    let mut gate = ProgressGate::new();
    let on_progress = move |p: FfmpegProgress| {
        let Some(total) = total_duration_ms else {
            return;
        };
        if let Some(percent) = p.percentage(total).and_then(|pct| gate.advance(pct)) {
            let _ = progress_tx.send(percent);
        }
    };

    let encode_result = encode_variant(
        &source_path,
        &output_path,
        &resolution,
        &settings,
        None,
        on_progress,
    )
    .await;

    // The progress sender is gone once the encode future resolves, so the
    // forwarder drains and exits on its own.
    forwarder.await.ok();

    if let Err(e) = encode_result {
        error!(job_id = %job_id, label, "Encode failed: {}", e);
        publish_quiet(
            &relay,
            TranscodeEvent::error(job_id, format!("Transcoding failed for {}", label)),
        )
        .await;
        tokio::fs::remove_file(&output_path).await.ok();
        return None;
    }

    let upload_result = outputs.upload_variant(&output_path, &output_key).await;

    // Scratch space is bounded by removing each variant as soon as it is
    // settled, whatever the upload outcome.
    tokio::fs::remove_file(&output_path).await.ok();

    match upload_result {
        Ok(()) => {
            publish_quiet(
                &relay,
                TranscodeEvent::info(
                    job_id.clone(),
                    format!("Transcoding {} completed", label),
                ),
            )
            .await;
            info!(job_id = %job_id, label, key = %output_key, "Variant uploaded");
            Some(output_key)
        }
        Err(e) => {
            error!(job_id = %job_id, label, "Upload failed: {}", e);
            publish_quiet(
                &relay,
                TranscodeEvent::error(job_id, format!("Failed to upload {}", label)),
            )
            .await;
            None
        }
    }
}

/// Publish without letting relay errors bubble into the pipeline.
async fn publish_quiet(relay: &EventRelay, event: TranscodeEvent) {
    if let Err(e) = relay.publish(&event).await {
        warn!(job_id = %event.job_id, "Event publish failed: {}", e);
    }
}
