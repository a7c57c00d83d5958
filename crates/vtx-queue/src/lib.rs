//! Redis plumbing for the transcoding pipeline.
//!
//! This crate provides:
//! - A durable upload-notification queue over Redis Streams with consumer
//!   groups, ack-and-delete, and idle-claim redelivery
//! - A pub/sub relay carrying transcode events on a single channel

pub mod error;
pub mod relay;
pub mod upload;

pub use error::{QueueError, QueueResult};
pub use relay::{EventRelay, EVENT_CHANNEL};
pub use upload::{QueueConfig, UploadQueue};
