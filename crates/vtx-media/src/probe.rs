//! Video metadata via ffprobe.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Metadata extracted from a video file.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    /// Duration in seconds.
    pub duration: f64,
    /// File size in bytes, when reported.
    pub size_bytes: Option<u64>,
    /// Overall bit rate, when reported.
    pub bit_rate: Option<u64>,
    /// Video stream width.
    pub width: Option<u32>,
    /// Video stream height.
    pub height: Option<u32>,
    /// Video codec name.
    pub video_codec: Option<String>,
    /// Audio codec name, absent for silent files.
    pub audio_codec: Option<String>,
    /// Frames per second.
    pub frame_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a video file for duration, dimensions, and codecs.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    check_ffprobe()?;

    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(MediaError::ffprobe_failed(
            format!("ffprobe exited with status {}", output.status),
            stderr,
        ));
    }

    let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)?;

    let format = parsed
        .format
        .ok_or_else(|| MediaError::invalid_video("no format section in ffprobe output"))?;

    let duration = format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| MediaError::invalid_video("missing or unparseable duration"))?;

    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let audio_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    let frame_rate = video_stream.and_then(|s| {
        s.avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
    });

    let info = VideoInfo {
        duration,
        size_bytes: format.size.as_deref().and_then(|s| s.parse().ok()),
        bit_rate: format.bit_rate.as_deref().and_then(|s| s.parse().ok()),
        width: video_stream.and_then(|s| s.width),
        height: video_stream.and_then(|s| s.height),
        video_codec: video_stream.and_then(|s| s.codec_name.clone()),
        audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
        frame_rate,
    };

    debug!(path = %path.display(), duration = info.duration, "Probed video");

    Ok(info)
}

/// Duration in seconds, without the full metadata struct.
pub async fn get_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    Ok(probe_video(path).await?.duration)
}

/// Parse an ffprobe frame rate, either fractional ("30000/1001") or
/// plain decimal ("29.97").
fn parse_frame_rate(raw: &str) -> Option<f64> {
    if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate_fraction() {
        let rate = parse_frame_rate("30000/1001").unwrap();
        assert!((rate - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_frame_rate_whole_fraction() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
    }

    #[test]
    fn test_parse_frame_rate_decimal() {
        assert_eq!(parse_frame_rate("29.97"), Some(29.97));
    }

    #[test]
    fn test_parse_frame_rate_zero_denominator() {
        assert_eq!(parse_frame_rate("0/0"), None);
    }

    #[test]
    fn test_parse_frame_rate_garbage() {
        assert_eq!(parse_frame_rate("n/a"), None);
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let result = probe_video("/nonexistent/path/video.mp4").await;
        assert!(matches!(
            result,
            Err(MediaError::FileNotFound(_)) | Err(MediaError::FfprobeNotFound)
        ));
    }
}
