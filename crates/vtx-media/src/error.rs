//! Media processing error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from ffmpeg/ffprobe invocations.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("ffmpeg binary not found in PATH")]
    FfmpegNotFound,

    #[error("ffprobe binary not found in PATH")]
    FfprobeNotFound,

    #[error("ffmpeg failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("ffprobe failed: {message}")]
    FfprobeFailed { message: String, stderr: String },

    #[error("input file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid video: {0}")]
    InvalidVideo(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn ffprobe_failed(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::FfprobeFailed {
            message: message.into(),
            stderr: stderr.into(),
        }
    }

    pub fn invalid_video(message: impl Into<String>) -> Self {
        Self::InvalidVideo(message.into())
    }
}

pub type MediaResult<T> = Result<T, MediaError>;
