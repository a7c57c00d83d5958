//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] vtx_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] vtx_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] vtx_queue::QueueError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }
}
