//! Storage notification ingress.
//!
//! S3-compatible stores that deliver webhooks instead of writing to the
//! queue directly POST their notification envelope here; the handler
//! pushes the raw body onto the upload stream and lets the dispatcher
//! classify it. Test events and unmatched keys are the dispatcher's
//! problem, not the webhook sender's.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::{debug, info};

use vtx_models::StorageEventEnvelope;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEventResponse {
    pub message_id: String,
}

/// POST /api/events/storage
pub async fn storage_event(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<StorageEventResponse>> {
    if body.trim().is_empty() {
        return Err(ApiError::bad_request("Empty notification body"));
    }
    if serde_json::from_str::<serde_json::Value>(&body).is_err() {
        metrics::record_storage_event("rejected");
        return Err(ApiError::bad_request("Notification body is not JSON"));
    }

    // Only for the log line; the queued payload stays verbatim.
    let records = serde_json::from_str::<StorageEventEnvelope>(&body)
        .map(|e| e.records.len())
        .unwrap_or(0);

    let message_id = state.queue.publish_raw(&body).await?;

    metrics::record_storage_event("accepted");
    if records > 0 {
        info!(message_id = %message_id, records, "Storage notification enqueued");
    } else {
        debug!(message_id = %message_id, "Storage notification enqueued without records");
    }

    Ok(Json(StorageEventResponse { message_id }))
}
