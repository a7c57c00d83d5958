//! Resolution variant encoding.

use std::path::Path;

use tokio::sync::watch;
use tracing::info;

use vtx_models::Resolution;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::progress::FfmpegProgress;

/// Encoder settings shared by all resolution variants.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub crf: u8,
    pub preset: String,
    pub timeout_secs: u64,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            crf: 23,
            preset: "medium".to_string(),
            timeout_secs: 3600,
        }
    }
}

/// Build the ffmpeg command for one resolution variant.
pub fn variant_command(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    resolution: &Resolution,
    settings: &EncodeSettings,
) -> FfmpegCommand {
    FfmpegCommand::new(input.as_ref(), output.as_ref())
        .video_filter(&format!("scale={}:{}", resolution.width, resolution.height))
        .video_codec(&settings.video_codec)
        .crf(settings.crf)
        .preset(&settings.preset)
        .audio_codec(&settings.audio_codec)
        .audio_bitrate(&settings.audio_bitrate)
        .output_args(&["-movflags", "+faststart"])
}

/// Transcode `input` to one resolution variant, reporting progress.
pub async fn encode_variant<F>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    resolution: &Resolution,
    settings: &EncodeSettings,
    cancel_rx: Option<watch::Receiver<bool>>,
    on_progress: F,
) -> MediaResult<()>
where
    F: FnMut(FfmpegProgress) + Send + 'static,
{
    let command = variant_command(&input, &output, resolution, settings);

    let mut runner = FfmpegRunner::new().with_timeout(settings.timeout_secs);
    if let Some(rx) = cancel_rx {
        runner = runner.with_cancel(rx);
    }

    runner.run_with_progress(&command, on_progress).await?;

    info!(
        label = resolution.label,
        output = %output.as_ref().display(),
        "Encoded resolution variant"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtx_models::RESOLUTIONS;

    fn resolution(label: &str) -> Resolution {
        Resolution::lookup(label).unwrap()
    }

    #[test]
    fn test_variant_command_scale_filter() {
        let settings = EncodeSettings::default();
        let cmd = variant_command("/tmp/in.mp4", "/tmp/720p.mp4", &resolution("720p"), &settings);
        let args = cmd.build_args();

        let vf_pos = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf_pos + 1], "scale=1280:720");
    }

    #[test]
    fn test_variant_command_codecs() {
        let settings = EncodeSettings::default();
        let cmd = variant_command("/tmp/in.mp4", "/tmp/out.mp4", &resolution("1080p"), &settings);
        let args = cmd.build_args();

        let cv_pos = args.iter().position(|a| a == "-c:v").unwrap();
        assert_eq!(args[cv_pos + 1], "libx264");
        let ca_pos = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[ca_pos + 1], "aac");
        assert!(args.contains(&"+faststart".to_string()));
    }

    #[test]
    fn test_all_resolutions_build() {
        let settings = EncodeSettings::default();
        for res in &RESOLUTIONS {
            let cmd = variant_command("/tmp/in.mp4", "/tmp/out.mp4", res, &settings);
            let args = cmd.build_args();
            let expected = format!("scale={}:{}", res.width, res.height);
            assert!(args.contains(&expected));
        }
    }
}
