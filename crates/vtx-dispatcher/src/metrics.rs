//! Dispatch counters.

/// Metric names.
pub mod names {
    pub const LAUNCHED_TOTAL: &str = "dispatch_launched_total";
    pub const LAUNCH_FAILURES_TOTAL: &str = "dispatch_launch_failures_total";
    pub const DROPPED_TOTAL: &str = "dispatch_dropped_total";
}

/// Drop reasons recorded on `dispatch_dropped_total`.
pub mod reasons {
    pub const MALFORMED: &str = "malformed";
    pub const TEST_EVENT: &str = "test_event";
    pub const UNMATCHED_KEY: &str = "unmatched_key";
    pub const MISSING_JOB: &str = "missing_job";
    pub const FOREIGN_BUCKET: &str = "foreign_bucket";
}

pub fn record_launched() {
    metrics::counter!(names::LAUNCHED_TOTAL).increment(1);
}

pub fn record_launch_failure() {
    metrics::counter!(names::LAUNCH_FAILURES_TOTAL).increment(1);
}

pub fn record_dropped(reason: &'static str) {
    metrics::counter!(names::DROPPED_TOTAL, "reason" => reason).increment(1);
}
