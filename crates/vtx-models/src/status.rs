//! Job status and the allowed-transition table.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a transcoding job.
///
/// Transitions are forward-only and go through [`JobStatus::can_transition_to`];
/// writers that bypass the table risk regressing terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Job record created, upload not yet observed
    #[default]
    Queued,
    /// Upload observed, task launch pending
    Pending,
    /// Worker task is transcoding
    Processing,
    /// Worker finished (possibly with partial output)
    Completed,
    /// Fatal worker or dispatch failure
    Failed,
    /// Canceled by the user
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Canceled => "CANCELED",
        }
    }

    /// Parse the uppercase wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(JobStatus::Queued),
            "PENDING" => Some(JobStatus::Pending),
            "PROCESSING" => Some(JobStatus::Processing),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            "CANCELED" => Some(JobStatus::Canceled),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    ///
    /// Canceled is absorbing: a late worker terminal event must not
    /// overwrite it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled
        )
    }

    /// Allowed-transition table. Forward-only; terminal states accept nothing.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        match (self, to) {
            (Queued, Pending | Processing | Failed | Canceled) => true,
            (Pending, Processing | Failed | Canceled) => true,
            (Processing, Completed | Failed | Canceled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Pending));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Queued));
    }

    #[test]
    fn test_canceled_is_absorbing() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Canceled));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Canceled));
        assert!(!JobStatus::Canceled.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Canceled.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Canceled.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn test_wire_form_is_uppercase() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
        assert_eq!(JobStatus::parse("CANCELED"), Some(JobStatus::Canceled));
        assert_eq!(JobStatus::parse("canceled"), None);
    }
}
