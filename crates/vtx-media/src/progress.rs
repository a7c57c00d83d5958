//! Progress reporting parsed from `ffmpeg -progress pipe:2` output.

/// A snapshot of encoding progress.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProgress {
    /// Frames encoded so far.
    pub frame: Option<u64>,
    /// Current encoding frame rate.
    pub fps: Option<f64>,
    /// Output timestamp in milliseconds.
    pub out_time_ms: Option<i64>,
    /// Output timestamp as reported (HH:MM:SS.micros).
    pub out_time: Option<String>,
    /// Encoding speed relative to realtime.
    pub speed: Option<f64>,
    /// Set once ffmpeg reports `progress=end`.
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Percent complete against a known total duration, clamped to 100.
    pub fn percentage(&self, total_duration_ms: i64) -> Option<f64> {
        if total_duration_ms <= 0 {
            return None;
        }
        self.out_time_ms
            .map(|t| ((t as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0))
    }

    /// Estimated seconds remaining, from current speed and position.
    pub fn eta_seconds(&self, total_duration_ms: i64) -> Option<f64> {
        let out_ms = self.out_time_ms?;
        let speed = self.speed?;
        if speed <= 0.0 || total_duration_ms <= out_ms {
            return None;
        }
        let remaining_ms = (total_duration_ms - out_ms) as f64;
        Some(remaining_ms / 1000.0 / speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: Some(30_000),
            ..Default::default()
        };
        assert_eq!(progress.percentage(60_000), Some(50.0));
    }

    #[test]
    fn test_percentage_clamped() {
        let progress = FfmpegProgress {
            out_time_ms: Some(90_000),
            ..Default::default()
        };
        assert_eq!(progress.percentage(60_000), Some(100.0));
    }

    #[test]
    fn test_percentage_zero_duration() {
        let progress = FfmpegProgress {
            out_time_ms: Some(1000),
            ..Default::default()
        };
        assert_eq!(progress.percentage(0), None);
    }

    #[test]
    fn test_eta() {
        let progress = FfmpegProgress {
            out_time_ms: Some(30_000),
            speed: Some(2.0),
            ..Default::default()
        };
        let eta = progress.eta_seconds(60_000).unwrap();
        assert!((eta - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_eta_no_speed() {
        let progress = FfmpegProgress {
            out_time_ms: Some(30_000),
            ..Default::default()
        };
        assert_eq!(progress.eta_seconds(60_000), None);
    }
}
