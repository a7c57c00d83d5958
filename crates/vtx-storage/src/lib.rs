//! S3-compatible blob store adapter.
//!
//! This crate provides:
//! - File and byte upload/download
//! - Presigned PUT/GET URL generation with fixed expiries
//! - Prefix listing and deletion
//! - Job-scoped output helpers

pub mod client;
pub mod error;
pub mod operations;

pub use client::{BlobClient, BlobConfig, ObjectInfo};
pub use error::{StorageError, StorageResult};
pub use operations::{DOWNLOAD_URL_EXPIRY, UPLOAD_URL_EXPIRY};
