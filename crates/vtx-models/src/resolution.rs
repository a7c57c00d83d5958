//! Resolution labels and the fixed dimension table.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// A target resolution: label plus output dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Every resolution the pipeline can produce, smallest first.
pub const RESOLUTIONS: [Resolution; 8] = [
    Resolution { label: "144p", width: 256, height: 144 },
    Resolution { label: "240p", width: 426, height: 240 },
    Resolution { label: "360p", width: 640, height: 360 },
    Resolution { label: "480p", width: 854, height: 480 },
    Resolution { label: "720p", width: 1280, height: 720 },
    Resolution { label: "1080p", width: 1920, height: 1080 },
    Resolution { label: "1440p", width: 2560, height: 1440 },
    Resolution { label: "4K", width: 3840, height: 2160 },
];

impl Resolution {
    /// Look up a label in the fixed table.
    pub fn lookup(label: &str) -> Option<Resolution> {
        RESOLUTIONS.iter().find(|r| r.label == label).copied()
    }

    /// Check whether a label names a known resolution.
    pub fn is_known(label: &str) -> bool {
        Self::lookup(label).is_some()
    }

    /// Deterministic output key for a job's variant at this resolution.
    pub fn output_key(&self, job_id: &JobId) -> String {
        format!("videos/{}/{}.mp4", job_id, self.label)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}x{})", self.label, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_labels() {
        let r = Resolution::lookup("720p").unwrap();
        assert_eq!((r.width, r.height), (1280, 720));

        let r = Resolution::lookup("4K").unwrap();
        assert_eq!((r.width, r.height), (3840, 2160));

        let r = Resolution::lookup("144p").unwrap();
        assert_eq!((r.width, r.height), (256, 144));
    }

    #[test]
    fn test_lookup_unknown_label() {
        assert!(Resolution::lookup("999p").is_none());
        assert!(Resolution::lookup("720P").is_none());
        assert!(!Resolution::is_known(""));
    }

    #[test]
    fn test_output_key_convention() {
        let r = Resolution::lookup("360p").unwrap();
        let key = r.output_key(&JobId::from_string("j1"));
        assert_eq!(key, "videos/j1/360p.mp4");
    }

    #[test]
    fn test_table_covers_144p_through_4k() {
        assert_eq!(RESOLUTIONS.first().unwrap().label, "144p");
        assert_eq!(RESOLUTIONS.last().unwrap().label, "4K");
        assert_eq!(RESOLUTIONS.len(), 8);
    }
}
