//! ffmpeg/ffprobe wrappers.
//!
//! This crate provides:
//! - A builder for ffmpeg invocations with progress parsed from stderr
//! - A runner with timeout and cooperative cancellation
//! - Probing via ffprobe JSON output
//! - Resolution variant encoding presets

pub mod command;
pub mod encode;
pub mod error;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use encode::{encode_variant, variant_command, EncodeSettings};
pub use error::{MediaError, MediaResult};
pub use probe::{get_duration, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
