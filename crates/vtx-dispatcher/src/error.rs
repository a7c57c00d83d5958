//! Dispatcher error types.

use thiserror::Error;

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Launch failed: {0}")]
    LaunchFailed(String),

    #[error("Queue error: {0}")]
    Queue(#[from] vtx_queue::QueueError),

    #[error("Store error: {0}")]
    Store(#[from] vtx_store::StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatchError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn launch_failed(msg: impl Into<String>) -> Self {
        Self::LaunchFailed(msg.into())
    }
}
