//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the embedding application.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const RUNS_STARTED_TOTAL: &str = "vshorts_runs_started_total";
    pub const RUNS_COMPLETED_TOTAL: &str = "vshorts_runs_completed_total";
    pub const RUNS_FAILED_TOTAL: &str = "vshorts_runs_failed_total";
    pub const RUN_DURATION_SECONDS: &str = "vshorts_run_duration_seconds";

    pub const STAGE_DURATION_SECONDS: &str = "vshorts_stage_duration_seconds";
    pub const STAGE_POLLS_TOTAL: &str = "vshorts_stage_polls_total";

    pub const UPLOAD_BYTES_TOTAL: &str = "vshorts_upload_bytes_total";
    pub const UPLOAD_DURATION_SECONDS: &str = "vshorts_upload_duration_seconds";

    pub const INPUTS_REJECTED_TOTAL: &str = "vshorts_inputs_rejected_total";
}

/// Record a submission entering the pipeline.
pub fn record_run_started(mode: &str) {
    let labels = [("mode", mode.to_string())];
    counter!(names::RUNS_STARTED_TOTAL, &labels).increment(1);
}

/// Record a successful submission.
pub fn record_run_completed(mode: &str, duration_secs: f64) {
    let labels = [("mode", mode.to_string())];
    counter!(names::RUNS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::RUN_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a failed submission.
pub fn record_run_failed(mode: &str, error_kind: &str) {
    let labels = [
        ("mode", mode.to_string()),
        ("error_kind", error_kind.to_string()),
    ];
    counter!(names::RUNS_FAILED_TOTAL, &labels).increment(1);
}

/// Record how long a stage took and how it ended.
pub fn record_stage_duration(kind: &str, outcome: &str, duration_secs: f64) {
    let labels = [
        ("kind", kind.to_string()),
        ("outcome", outcome.to_string()),
    ];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record one status query against the engine.
pub fn record_stage_poll(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::STAGE_POLLS_TOTAL, &labels).increment(1);
}

/// Record a finished upload.
pub fn record_upload(bytes: u64, duration_secs: f64) {
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

/// Record an input rejected before any network call.
pub fn record_input_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::INPUTS_REJECTED_TOTAL, &labels).increment(1);
}
