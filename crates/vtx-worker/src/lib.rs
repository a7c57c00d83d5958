//! Transcoding worker.
//!
//! One process per job: the dispatcher hands over everything through the
//! environment, the worker produces the requested resolution variants and
//! reports progress over the event relay, then exits.

pub mod config;
pub mod error;
pub mod transcode;

pub use config::{WorkerConfig, MAX_PARALLEL_ENCODES};
pub use error::{WorkerError, WorkerResult};
pub use transcode::TranscodeJob;
