//! Upload dispatcher.
//!
//! This crate provides:
//! - The dispatch loop consuming storage notifications from the upload
//!   queue and acking under at-least-once semantics
//! - The `TaskLauncher` seam with a detached-process implementation

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod launcher;
pub mod metrics;

pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};
pub use launcher::{ProcessLauncher, TaskLauncher, TaskSpec};
