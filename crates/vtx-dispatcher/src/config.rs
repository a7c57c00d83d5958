//! Dispatcher configuration.

use std::time::Duration;

use crate::error::{DispatchError, DispatchResult};

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Redis connection URL, forwarded to launched workers.
    pub redis_url: String,
    /// Bucket uploads arrive in.
    pub source_bucket: String,
    /// Bucket transcoded outputs are written to.
    pub destination_bucket: String,
    /// Path to the worker binary.
    pub worker_binary: String,
    /// Max messages consumed per poll.
    pub max_batch: usize,
    /// How often to scan for stuck pending messages.
    pub claim_interval: Duration,
    /// Minimum idle time before a pending message can be reclaimed.
    pub claim_min_idle: Duration,
    /// Backoff after an iteration-level error.
    pub error_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            source_bucket: "vtx-uploads".to_string(),
            destination_bucket: "vtx-videos".to_string(),
            worker_binary: "vtx-worker".to_string(),
            max_batch: 5,
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            error_backoff: Duration::from_secs(5),
        }
    }
}

impl DispatcherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> DispatchResult<Self> {
        let redis_url = std::env::var("REDIS_URL")
            .map_err(|_| DispatchError::config_error("REDIS_URL is required"))?;

        let source_bucket = std::env::var("SOURCE_BUCKET")
            .map_err(|_| DispatchError::config_error("SOURCE_BUCKET is required"))?;

        let destination_bucket = std::env::var("OUTPUT_BUCKET")
            .map_err(|_| DispatchError::config_error("OUTPUT_BUCKET is required"))?;

        let worker_binary =
            std::env::var("WORKER_BINARY").unwrap_or_else(|_| "vtx-worker".to_string());

        let max_batch: usize = std::env::var("DISPATCH_MAX_BATCH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let claim_interval = Duration::from_secs(
            std::env::var("DISPATCH_CLAIM_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        );

        let claim_min_idle = Duration::from_secs(
            std::env::var("DISPATCH_CLAIM_MIN_IDLE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        );

        let error_backoff = Duration::from_secs(
            std::env::var("DISPATCH_ERROR_BACKOFF_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        );

        Ok(Self {
            redis_url,
            source_bucket,
            destination_bucket,
            worker_binary,
            max_batch,
            claim_interval,
            claim_min_idle,
            error_backoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DispatcherConfig::default();
        assert_eq!(config.max_batch, 5);
        assert_eq!(config.claim_interval, Duration::from_secs(30));
        assert_eq!(config.claim_min_idle, Duration::from_secs(300));
        assert_eq!(config.error_backoff, Duration::from_secs(5));
    }
}
