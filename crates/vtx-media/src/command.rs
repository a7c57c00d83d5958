//! ffmpeg command construction and execution.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Builder for an ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    input_args: Vec<String>,
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Arguments placed before `-i` (seek, format hints).
    pub fn input_args(mut self, args: &[&str]) -> Self {
        self.input_args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Arguments placed after the input (codecs, filters, mappings).
    pub fn output_args(mut self, args: &[&str]) -> Self {
        self.output_args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn video_filter(self, filter: &str) -> Self {
        self.output_args(&["-vf", filter])
    }

    pub fn video_codec(self, codec: &str) -> Self {
        self.output_args(&["-c:v", codec])
    }

    pub fn audio_codec(self, codec: &str) -> Self {
        self.output_args(&["-c:a", codec])
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_args(&["-crf", &crf.to_string()])
    }

    pub fn preset(self, preset: &str) -> Self {
        self.output_args(&["-preset", preset])
    }

    pub fn audio_bitrate(self, bitrate: &str) -> Self {
        self.output_args(&["-b:a", bitrate])
    }

    pub fn input_path(&self) -> &Path {
        &self.input
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Full argument list. Progress goes to stderr so stdout stays clean.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Executes ffmpeg commands with optional cancellation and timeout.
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: u64,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self {
            cancel_rx: None,
            timeout_secs: 3600,
        }
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a cancellation channel. When the sender flips to `true`
    /// the child process is killed.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Run to completion, discarding progress.
    pub async fn run(&self, command: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(command, |_| {}).await
    }

    /// Run to completion, invoking `on_progress` for each parsed
    /// progress block from stderr.
    pub async fn run_with_progress<F>(
        &self,
        command: &FfmpegCommand,
        mut on_progress: F,
    ) -> MediaResult<()>
    where
        F: FnMut(FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;

        if !command.input_path().exists() {
            return Err(MediaError::FileNotFound(command.input_path().to_path_buf()));
        }

        let args = command.build_args();
        debug!(args = ?args, "Spawning ffmpeg");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child.stderr.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("stderr pipe not available", String::new(), None)
        })?;

        let stderr_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            let mut captured = Vec::new();
            let mut current = FfmpegProgress::default();

            while let Ok(Some(line)) = reader.next_line().await {
                if let Some(complete) = parse_progress_line(&line, &mut current) {
                    on_progress(complete);
                    current = FfmpegProgress::default();
                } else if !line.contains('=') {
                    // Non key=value lines are diagnostics worth keeping.
                    captured.push(line);
                }
            }

            captured.join("\n")
        });

        let status = self.wait_for_completion(&mut child).await?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "ffmpeg exited with non-zero status",
                stderr_output,
                status.code(),
            ))
        }
    }

    async fn wait_for_completion(
        &self,
        child: &mut tokio::process::Child,
    ) -> MediaResult<std::process::ExitStatus> {
        let timeout = Duration::from_secs(self.timeout_secs);

        match &self.cancel_rx {
            Some(cancel_rx) => {
                let mut cancel_rx = cancel_rx.clone();
                tokio::select! {
                    status = child.wait() => Ok(status?),
                    _ = tokio::time::sleep(timeout) => {
                        warn!(timeout_secs = self.timeout_secs, "ffmpeg timed out, killing");
                        child.kill().await?;
                        Err(MediaError::Timeout(self.timeout_secs))
                    }
                    _ = async { let _ = cancel_rx.wait_for(|&cancelled| cancelled).await; } => {
                        debug!("ffmpeg cancelled, killing");
                        child.kill().await?;
                        Err(MediaError::Cancelled)
                    }
                }
            }
            None => {
                tokio::select! {
                    status = child.wait() => Ok(status?),
                    _ = tokio::time::sleep(timeout) => {
                        warn!(timeout_secs = self.timeout_secs, "ffmpeg timed out, killing");
                        child.kill().await?;
                        Err(MediaError::Timeout(self.timeout_secs))
                    }
                }
            }
        }
    }
}

/// Parse one `key=value` line from `-progress pipe:2` output into the
/// accumulating snapshot. Returns the finished snapshot when the block
/// ends (`progress=continue` or `progress=end`).
fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    match key {
        "frame" => current.frame = value.parse().ok(),
        "fps" => current.fps = value.parse().ok(),
        // ffmpeg reports out_time_ms in microseconds.
        "out_time_ms" | "out_time_us" => {
            current.out_time_ms = value.parse::<i64>().ok().map(|us| us / 1000);
        }
        "out_time" => current.out_time = Some(value.to_string()),
        "speed" => {
            current.speed = value.strip_suffix('x').unwrap_or(value).parse().ok();
        }
        "progress" => {
            current.is_complete = value == "end";
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

/// Verify ffmpeg is on PATH.
pub fn check_ffmpeg() -> MediaResult<()> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
    Ok(())
}

/// Verify ffprobe is on PATH.
pub fn check_ffprobe() -> MediaResult<()> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;
    Ok(())
}
