//! Job lifecycle handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use vtx_models::{Job, JobId, JobLogEntry, Resolution};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Content type presigned into the upload URL; sources are always mp4.
const UPLOAD_CONTENT_TYPE: &str = "video/mp4";

const MAX_FILE_NAME_LEN: usize = 255;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub file_name: String,
    pub resolutions: Vec<String>,
    /// Source duration in seconds, if the client probed it before upload.
    #[serde(default)]
    pub video_duration: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job: Job,
    /// Presigned PUT URL for the source upload, valid for one hour.
    pub upload_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetailResponse {
    pub job: Job,
    /// Job log entries, oldest first.
    pub logs: Vec<JobLogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub resolution: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub download_url: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/jobs
///
/// Register an upload intent: creates a Queued job and hands back the
/// presigned PUT URL the client uploads the source to. Transcoding only
/// starts once the storage notification for that upload arrives.
pub async fn create_job(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    validate_file_name(&request.file_name)?;
    validate_resolutions(&request.resolutions)?;

    let mut job = Job::new(&user.id, &request.file_name, request.resolutions);
    job.video_duration = request.video_duration.filter(|d| d.is_finite() && *d > 0.0);

    state.jobs.create(&job).await?;

    let upload_url = state
        .uploads
        .presign_upload(&job.input_key, UPLOAD_CONTENT_TYPE)
        .await?;

    metrics::record_job_created();
    info!(job_id = %job.id, user_id = %user.id, "Job created");

    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse { job, upload_url }),
    ))
}

/// GET /api/jobs
///
/// The caller's jobs, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Job>>> {
    let jobs = state.jobs.list_for_user(&user.id).await?;
    Ok(Json(jobs))
}

/// GET /api/jobs/:job_id
///
/// One job with its log history.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<JobDetailResponse>> {
    let job_id = JobId::from_string(job_id);
    let job = load_owned_job(&state, &job_id, &user).await?;
    let logs = state.logs.list(&job_id).await?;

    Ok(Json(JobDetailResponse { job, logs }))
}

/// POST /api/jobs/:job_id/cancel
///
/// Mark a job Canceled. Advisory: a worker already running keeps going,
/// but its terminal event will be refused by the transition guard.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<Job>> {
    let job_id = JobId::from_string(job_id);
    let job = load_owned_job(&state, &job_id, &user).await?;

    if job.is_terminal() {
        return Err(ApiError::conflict(format!(
            "Job is already {}",
            job.status
        )));
    }

    if !state.jobs.cancel(&job_id).await? {
        // Lost the race against a terminal event from the relay.
        return Err(ApiError::conflict("Job already reached a terminal status"));
    }

    metrics::record_job_canceled();
    info!(job_id = %job_id, user_id = %user.id, "Job canceled");

    let job = state
        .jobs
        .get(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(Json(job))
}

/// GET /api/jobs/:job_id/download?resolution=720p
///
/// Presigned download URL for one produced variant.
pub async fn download_job_output(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<DownloadQuery>,
    user: AuthUser,
) -> ApiResult<Json<DownloadResponse>> {
    let job_id = JobId::from_string(job_id);
    let job = load_owned_job(&state, &job_id, &user).await?;

    let resolution = Resolution::lookup(&query.resolution).ok_or_else(|| {
        ApiError::bad_request(format!("Unknown resolution: {}", query.resolution))
    })?;

    let output_key = resolution.output_key(&job_id);
    if !job.output_keys.contains(&output_key) {
        return Err(ApiError::not_found(format!(
            "No {} output for this job",
            resolution.label
        )));
    }

    let download_url = state.outputs.presign_download(&output_key).await?;
    Ok(Json(DownloadResponse { download_url }))
}

/// DELETE /api/jobs/:job_id
///
/// Remove the job record, its logs and every stored output variant.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    user: AuthUser,
) -> ApiResult<StatusCode> {
    let job_id = JobId::from_string(job_id);
    load_owned_job(&state, &job_id, &user).await?;

    let removed = state.outputs.delete_job_outputs(&job_id).await?;
    state.jobs.delete(&job_id).await?;

    metrics::record_job_deleted();
    info!(job_id = %job_id, user_id = %user.id, outputs_removed = removed, "Job deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Helpers
// ============================================================================

/// Fetch a job and enforce ownership: 404 unknown, 403 someone else's.
async fn load_owned_job(state: &AppState, job_id: &JobId, user: &AuthUser) -> ApiResult<Job> {
    let job = state
        .jobs
        .get(job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    if job.user_id != user.id {
        return Err(ApiError::forbidden("Access denied"));
    }
    Ok(job)
}

fn validate_file_name(file_name: &str) -> ApiResult<()> {
    if file_name.is_empty() {
        return Err(ApiError::Validation("fileName must not be empty".into()));
    }
    if file_name.len() > MAX_FILE_NAME_LEN {
        return Err(ApiError::Validation("fileName is too long".into()));
    }
    // Keys embed the file name as their last segment.
    if file_name.contains('/') || file_name.contains("..") {
        return Err(ApiError::Validation(
            "fileName must not contain path separators".into(),
        ));
    }
    Ok(())
}

fn validate_resolutions(resolutions: &[String]) -> ApiResult<()> {
    if resolutions.is_empty() {
        return Err(ApiError::Validation(
            "resolutions must not be empty".into(),
        ));
    }
    for label in resolutions {
        if Resolution::lookup(label).is_none() {
            return Err(ApiError::Validation(format!(
                "Unknown resolution: {}",
                label
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("video.mp4").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("a/b.mp4").is_err());
        assert!(validate_file_name("../escape.mp4").is_err());
        assert!(validate_file_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_validate_resolutions() {
        assert!(validate_resolutions(&["360p".into(), "4K".into()]).is_ok());
        assert!(validate_resolutions(&[]).is_err());
        assert!(validate_resolutions(&["999p".into()]).is_err());
        assert!(validate_resolutions(&["360p".into(), "999p".into()]).is_err());
    }
}
