//! Blob store client over the S3 API.

use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Configuration for the blob store client.
///
/// `endpoint_url` is unset for AWS proper and points at the S3 API of any
/// compatible store otherwise.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Custom S3 API endpoint, if any
    pub endpoint_url: Option<String>,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region ("auto" works for most compatible stores)
    pub region: String,
}

impl BlobConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("BLOB_ENDPOINT_URL").ok(),
            access_key_id: std::env::var("BLOB_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("BLOB_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("BLOB_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("BLOB_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("BLOB_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Blob store client bound to one bucket.
#[derive(Clone)]
pub struct BlobClient {
    client: Client,
    bucket: String,
}

impl BlobClient {
    /// Create a new client for a bucket.
    pub fn new(config: BlobConfig, bucket: impl Into<String>) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vtx",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);

        // Path-style addressing only for custom endpoints; virtual-hosted
        // style is the AWS default.
        if let Some(ref endpoint) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Create from environment variables.
    pub fn from_env(bucket: impl Into<String>) -> StorageResult<Self> {
        let config = BlobConfig::from_env()?;
        Ok(Self::new(config, bucket))
    }

    /// Bucket this client operates on.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload a file.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    /// Upload bytes.
    pub async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", data.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    /// Download an object as bytes.
    pub async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        debug!("Downloading {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    /// Download an object to a file, creating parent directories.
    pub async fn download_file(&self, key: &str, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Downloading {} to {}", key, path.display());

        let bytes = self.download_bytes(key).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::download_failed(format!("Failed to create directory: {}", e))
            })?;
        }

        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| StorageError::download_failed(format!("Failed to write file: {}", e)))?;

        info!("Downloaded {} to {}", key, path.display());
        Ok(())
    }

    /// Generate a presigned GET URL.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Generate a presigned PUT URL for a client-side upload.
    pub async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Delete an object.
    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    /// Delete multiple objects.
    pub async fn delete_objects(&self, keys: &[String]) -> StorageResult<u32> {
        if keys.is_empty() {
            return Ok(0);
        }

        debug!("Deleting {} objects", keys.len());

        let objects: Result<Vec<_>, _> = keys
            .iter()
            .map(|k| aws_sdk_s3::types::ObjectIdentifier::builder().key(k).build())
            .collect();
        let objects = objects.map_err(|e| StorageError::delete_failed(e.to_string()))?;

        let delete = aws_sdk_s3::types::Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        info!("Deleted {} objects", keys.len());
        Ok(keys.len() as u32)
    }

    /// List objects with a prefix.
    pub async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        debug!("Listing objects with prefix: {}", prefix);

        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?;

            if let Some(ref contents) = response.contents {
                for obj in contents {
                    objects.push(ObjectInfo {
                        key: obj.key.clone().unwrap_or_default(),
                        size: obj.size.unwrap_or(0) as u64,
                        last_modified: obj
                            .last_modified
                            .as_ref()
                            .and_then(|t| t.to_millis().ok())
                            .map(|ms| ms as u64),
                    });
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(objects)
    }

    /// Check if an object exists.
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.to_string().contains("NotFound") || e.to_string().contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(e.to_string()))
                }
            }
        }
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("Blob store connectivity check failed: {}", e)))?;
        Ok(())
    }
}

/// Information about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modified timestamp (milliseconds since epoch)
    pub last_modified: Option<u64>,
}
