//! Worker task launching.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use vtx_models::JobId;

use crate::error::{DispatchError, DispatchResult};

/// Everything a worker needs to transcode one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub job_id: JobId,
    pub source_bucket: String,
    pub source_key: String,
    pub output_bucket: String,
    /// Resolution labels to produce.
    pub resolutions: Vec<String>,
    pub redis_url: String,
}

impl TaskSpec {
    /// Environment variables passed to the worker process.
    pub fn env_vars(&self) -> DispatchResult<Vec<(&'static str, String)>> {
        let resolutions = serde_json::to_string(&self.resolutions)?;
        Ok(vec![
            ("SOURCE_BUCKET", self.source_bucket.clone()),
            ("SOURCE_KEY", self.source_key.clone()),
            ("JOB_ID", self.job_id.as_str().to_string()),
            ("OUTPUT_BUCKET", self.output_bucket.clone()),
            ("RESOLUTIONS", resolutions),
            ("REDIS_URL", self.redis_url.clone()),
        ])
    }
}

/// Launches transcoding tasks for dispatched uploads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskLauncher: Send + Sync {
    /// Launch a worker for the given spec. Success means the task was
    /// handed off, not that transcoding finished.
    async fn launch(&self, spec: &TaskSpec) -> DispatchResult<()>;
}

/// Spawns the worker binary as a detached process.
///
/// The child inherits the dispatcher's environment (blob credentials)
/// plus the spec's variables. No supervision: if the worker dies before
/// publishing a terminal event, the unacked queue message is reclaimed
/// and redispatched.
pub struct ProcessLauncher {
    worker_binary: String,
}

impl ProcessLauncher {
    pub fn new(worker_binary: impl Into<String>) -> Self {
        Self {
            worker_binary: worker_binary.into(),
        }
    }
}

#[async_trait]
impl TaskLauncher for ProcessLauncher {
    async fn launch(&self, spec: &TaskSpec) -> DispatchResult<()> {
        let mut command = Command::new(&self.worker_binary);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        for (key, value) in spec.env_vars()? {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|e| {
            DispatchError::launch_failed(format!(
                "failed to spawn {}: {}",
                self.worker_binary, e
            ))
        })?;

        info!(
            job_id = %spec.job_id,
            pid = child.id(),
            resolutions = spec.resolutions.len(),
            "Launched transcoding worker"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_vars_contract() {
        let spec = TaskSpec {
            job_id: JobId::from_string("j1"),
            source_bucket: "vtx-uploads".to_string(),
            source_key: "uploads/u1/j1/video.mp4".to_string(),
            output_bucket: "vtx-videos".to_string(),
            resolutions: vec!["360p".to_string(), "720p".to_string()],
            redis_url: "redis://localhost:6379".to_string(),
        };

        let vars = spec.env_vars().unwrap();
        let lookup = |k: &str| {
            vars.iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(lookup("JOB_ID").unwrap(), "j1");
        assert_eq!(lookup("SOURCE_KEY").unwrap(), "uploads/u1/j1/video.mp4");
        assert_eq!(lookup("RESOLUTIONS").unwrap(), r#"["360p","720p"]"#);
        assert_eq!(lookup("REDIS_URL").unwrap(), "redis://localhost:6379");
    }

    #[tokio::test]
    async fn test_process_launcher_missing_binary() {
        let launcher = ProcessLauncher::new("/nonexistent/vtx-worker");
        let spec = TaskSpec {
            job_id: JobId::from_string("j1"),
            source_bucket: "b".to_string(),
            source_key: "k".to_string(),
            output_bucket: "o".to_string(),
            resolutions: vec!["360p".to_string()],
            redis_url: "redis://localhost:6379".to_string(),
        };

        let result = launcher.launch(&spec).await;
        assert!(matches!(result, Err(DispatchError::LaunchFailed(_))));
    }
}
