//! Relay subscriber: pub/sub events into the job store and live rooms.
//!
//! A single background task owns the relay subscription for the whole
//! process. Every event is appended to the job's log subcollection and
//! broadcast into its room; events carrying a status additionally move
//! the job record through its guarded transitions. A lost subscription
//! is re-established with backoff, so a Redis restart costs at most the
//! events published while disconnected.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use vtx_models::{EventStatus, JobStatus, TranscodeEvent};

use crate::metrics;
use crate::state::AppState;

/// Delay before re-subscribing after the relay stream ends or errors.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Run the subscriber until the shutdown signal flips.
pub async fn run_subscriber(state: AppState, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let mut stream = match state.relay.subscribe().await {
            Ok(stream) => {
                info!("Relay subscription established");
                stream
            }
            Err(e) => {
                error!("Relay subscribe failed, retrying: {}", e);
                metrics::record_relay_reconnect();
                if wait_or_shutdown(&mut shutdown, RESUBSCRIBE_DELAY).await {
                    break;
                }
                continue;
            }
        };

        loop {
            tokio::select! {
                event = stream.next() => {
                    match event {
                        Some(event) => handle_event(&state, event).await,
                        None => {
                            warn!("Relay stream ended, re-subscribing");
                            metrics::record_relay_reconnect();
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Relay subscriber shutting down");
                        return;
                    }
                }
            }
        }

        if wait_or_shutdown(&mut shutdown, RESUBSCRIBE_DELAY).await {
            break;
        }
    }
}

/// Sleep for `delay`, returning true if shutdown fired first.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.changed() => *shutdown.borrow(),
    }
}

/// Persist one event and fan it out to live watchers.
///
/// Store failures are logged and counted but never stop the subscriber;
/// watchers still get the live event and the worker is long past caring.
async fn handle_event(state: &AppState, event: TranscodeEvent) {
    let job_id = event.job_id.clone();
    metrics::record_relay_event(event.log_level.as_str());

    if let Err(e) = state
        .logs
        .append(&job_id, event.log_level, &event.log_message)
        .await
    {
        metrics::record_relay_store_failure();
        error!(job_id = %job_id, "Failed to append job log: {}", e);
    }

    if let Some(status) = event.status {
        apply_status(state, &event, status).await;
    }

    let delivered = state.rooms.publish(&job_id, event).await;
    debug!(job_id = %job_id, delivered, "Relay event dispatched");
}

/// Fold an event status into the job record.
///
/// All writers go through transition guards, so a replayed STARTED after
/// COMPLETED, or any terminal event after a cancellation, is refused by
/// the store rather than filtered here.
async fn apply_status(state: &AppState, event: &TranscodeEvent, status: EventStatus) {
    let job_id = &event.job_id;

    let result = match status {
        EventStatus::Started => state.jobs.set_status(job_id, JobStatus::Processing).await,
        EventStatus::Completed => {
            let output_keys = event.output_keys.clone().unwrap_or_default();
            let duration = event.duration.as_deref().unwrap_or("");
            state.jobs.complete(job_id, &output_keys, duration).await
        }
        EventStatus::Failed => state.jobs.fail(job_id, &event.log_message).await,
    };

    match result {
        Ok(true) => {
            info!(job_id = %job_id, status = status.as_str(), "Job status updated");
        }
        Ok(false) => {
            // Refused transition, e.g. a terminal event landing on a
            // job the user already canceled.
            debug!(job_id = %job_id, status = status.as_str(), "Status transition refused");
        }
        Err(e) => {
            metrics::record_relay_store_failure();
            error!(job_id = %job_id, status = status.as_str(), "Failed to update job status: {}", e);
        }
    }
}
