//! Worker configuration from the dispatcher's task environment.

use vtx_models::JobId;

use crate::error::{WorkerError, WorkerResult};

/// Hard cap on concurrent encodes regardless of requested resolutions.
pub const MAX_PARALLEL_ENCODES: usize = 8;

/// One task's worth of configuration, handed over by the dispatcher.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub job_id: JobId,
    pub source_bucket: String,
    pub source_key: String,
    pub output_bucket: String,
    /// Resolution labels to produce.
    pub resolutions: Vec<String>,
    pub redis_url: String,
    /// Per-encode timeout in seconds.
    pub encode_timeout_secs: u64,
}

impl WorkerConfig {
    /// Read the task environment. Every variable except the timeout is
    /// required; there is no usable fallback for a one-shot task.
    pub fn from_env() -> WorkerResult<Self> {
        let job_id = JobId::from_string(&required("JOB_ID")?);
        let source_bucket = required("SOURCE_BUCKET")?;
        let source_key = required("SOURCE_KEY")?;
        let output_bucket = required("OUTPUT_BUCKET")?;
        let redis_url = required("REDIS_URL")?;

        let resolutions: Vec<String> = serde_json::from_str(&required("RESOLUTIONS")?)
            .map_err(|e| WorkerError::config_error(format!("RESOLUTIONS is not a JSON array: {}", e)))?;

        if resolutions.is_empty() {
            return Err(WorkerError::config_error("RESOLUTIONS must not be empty"));
        }

        let encode_timeout_secs: u64 = std::env::var("ENCODE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        Ok(Self {
            job_id,
            source_bucket,
            source_key,
            output_bucket,
            resolutions,
            redis_url,
            encode_timeout_secs,
        })
    }

    /// Encode concurrency for this task.
    pub fn parallelism(&self) -> usize {
        self.resolutions.len().min(MAX_PARALLEL_ENCODES)
    }
}

fn required(name: &'static str) -> WorkerResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WorkerError::config_error(format!("{} is required", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_task_env() {
        std::env::set_var("JOB_ID", "j1");
        std::env::set_var("SOURCE_BUCKET", "vtx-uploads");
        std::env::set_var("SOURCE_KEY", "uploads/u1/j1/video.mp4");
        std::env::set_var("OUTPUT_BUCKET", "vtx-videos");
        std::env::set_var("RESOLUTIONS", r#"["360p","720p"]"#);
        std::env::set_var("REDIS_URL", "redis://localhost:6379");
    }

    fn clear_task_env() {
        for var in [
            "JOB_ID",
            "SOURCE_BUCKET",
            "SOURCE_KEY",
            "OUTPUT_BUCKET",
            "RESOLUTIONS",
            "REDIS_URL",
            "ENCODE_TIMEOUT_SECS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_complete() {
        set_task_env();
        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.job_id.as_str(), "j1");
        assert_eq!(config.resolutions, vec!["360p", "720p"]);
        assert_eq!(config.encode_timeout_secs, 3600);
        clear_task_env();
    }

    #[test]
    #[serial]
    fn test_from_env_missing_job_id() {
        set_task_env();
        std::env::remove_var("JOB_ID");
        assert!(matches!(
            WorkerConfig::from_env(),
            Err(WorkerError::ConfigError(_))
        ));
        clear_task_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_empty_resolutions() {
        set_task_env();
        std::env::set_var("RESOLUTIONS", "[]");
        assert!(matches!(
            WorkerConfig::from_env(),
            Err(WorkerError::ConfigError(_))
        ));
        clear_task_env();
    }

    #[test]
    #[serial]
    fn test_parallelism_capped() {
        set_task_env();
        std::env::set_var(
            "RESOLUTIONS",
            r#"["144p","240p","360p","480p","720p","1080p","1440p","4K","360p","720p"]"#,
        );
        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.parallelism(), MAX_PARALLEL_ENCODES);
        clear_task_env();
    }
}
