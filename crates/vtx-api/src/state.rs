//! Application state.

use std::sync::Arc;

use vtx_queue::{EventRelay, UploadQueue};
use vtx_storage::{BlobClient, BlobConfig};
use vtx_store::{JobLogRepository, JobRepository, StoreClient};

use crate::config::ApiConfig;
use crate::rooms::JobRooms;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    /// Source upload bucket, presigns the client PUT URLs
    pub uploads: Arc<BlobClient>,
    /// Variant output bucket, presigns downloads and deletes outputs
    pub outputs: Arc<BlobClient>,
    pub jobs: JobRepository,
    pub logs: JobLogRepository,
    pub queue: Arc<UploadQueue>,
    pub relay: EventRelay,
    pub rooms: JobRooms,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let blob_config = BlobConfig::from_env()?;
        let uploads = Arc::new(BlobClient::new(
            blob_config.clone(),
            config.upload_bucket.clone(),
        ));
        let outputs = Arc::new(BlobClient::new(blob_config, config.output_bucket.clone()));

        let store = StoreClient::from_env().await?;
        let jobs = JobRepository::new(store.clone());
        let logs = JobLogRepository::new(store);

        let queue = Arc::new(UploadQueue::from_env()?);
        let relay = EventRelay::new(&config.redis_url)?;

        Ok(Self {
            config,
            uploads,
            outputs,
            jobs,
            logs,
            queue,
            relay,
            rooms: JobRooms::new(),
        })
    }
}
