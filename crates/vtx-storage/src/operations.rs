//! High-level storage operations scoped to transcoding jobs.

use std::path::Path;
use std::time::Duration;

use tracing::info;

use vtx_models::JobId;

use crate::client::BlobClient;
use crate::error::StorageResult;

/// Expiry for presigned upload URLs handed to clients.
pub const UPLOAD_URL_EXPIRY: Duration = Duration::from_secs(3600);

/// Expiry for presigned download URLs.
pub const DOWNLOAD_URL_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Prefix under which a job's variants are stored.
pub fn output_prefix(job_id: &JobId) -> String {
    format!("videos/{}/", job_id)
}

impl BlobClient {
    /// Upload a transcoded variant under the deterministic output key.
    ///
    /// Re-runs overwrite the same key, which keeps redelivered jobs safe.
    pub async fn upload_variant(
        &self,
        path: impl AsRef<Path>,
        output_key: &str,
    ) -> StorageResult<()> {
        self.upload_file(path, output_key, "video/mp4").await
    }

    /// Presign a client upload for a source object.
    pub async fn presign_upload(&self, key: &str, content_type: &str) -> StorageResult<String> {
        self.presign_put(key, content_type, UPLOAD_URL_EXPIRY).await
    }

    /// Presign a download for a produced variant.
    pub async fn presign_download(&self, key: &str) -> StorageResult<String> {
        self.presign_get(key, DOWNLOAD_URL_EXPIRY).await
    }

    /// Delete every variant a job produced. Returns the number of objects
    /// removed.
    pub async fn delete_job_outputs(&self, job_id: &JobId) -> StorageResult<u32> {
        let prefix = output_prefix(job_id);
        let objects = self.list_objects(&prefix).await?;
        let keys: Vec<String> = objects.into_iter().map(|o| o.key).collect();

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted = self.delete_objects(&keys).await?;
        info!("Removed {} output(s) for job {}", deleted, job_id);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_prefix() {
        assert_eq!(output_prefix(&JobId::from_string("j1")), "videos/j1/");
    }

    #[test]
    fn test_expiry_constants() {
        assert_eq!(UPLOAD_URL_EXPIRY.as_secs(), 3600);
        assert_eq!(DOWNLOAD_URL_EXPIRY.as_secs(), 86_400);
    }
}
