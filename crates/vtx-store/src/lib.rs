//! Firestore-backed job store.
//!
//! This crate provides:
//! - A tuned Firestore REST client (token cache, pooling, retry with
//!   backoff and jitter)
//! - Typed repositories for job documents and their log subcollection
//! - Transition-guarded status writers safe under redelivery

pub mod client;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;

pub use client::{StoreClient, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use jobs::{JobLogRepository, JobRepository, JOBS_COLLECTION, LOGS_COLLECTION};
pub use retry::RetryConfig;
