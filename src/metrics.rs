//! Run metrics for the sampling pipeline
//!
//! Counters and histograms go through the `metrics` facade. `init_metrics` installs a
//! Prometheus recorder without an HTTP listener; the server renders it on `/metrics`.
//! When no recorder is installed (library use, tests) every call is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::pipeline::PipelineResult;

pub const RUNS_TOTAL: &str = "audit_sampler_runs_total";
pub const ROWS_INPUT_TOTAL: &str = "audit_sampler_rows_input_total";
pub const ROWS_EXCLUDED_TOTAL: &str = "audit_sampler_rows_excluded_total";
pub const ROWS_SAMPLED_TOTAL: &str = "audit_sampler_rows_sampled_total";
pub const DUPLICATES_REMOVED_TOTAL: &str = "audit_sampler_duplicates_removed_total";
pub const RUN_DURATION_SECONDS: &str = "audit_sampler_run_duration_seconds";

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once; later calls are no-ops
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_err() {
                warn!("Prometheus handle was already stored");
            }
            info!("Prometheus recorder installed");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}

/// Prometheus text exposition, if a recorder is installed
pub fn render() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}

/// Record the outcome of one pipeline run
pub fn record_run(result: &PipelineResult, duration_secs: f64) {
    counter!(RUNS_TOTAL).increment(1);
    counter!(ROWS_INPUT_TOTAL).increment(result.filter.input_rows as u64);
    counter!(ROWS_EXCLUDED_TOTAL, "rule" => "user_profile")
        .increment(result.filter.excluded_by_user_profile as u64);
    counter!(ROWS_EXCLUDED_TOTAL, "rule" => "changed_using")
        .increment(result.filter.excluded_by_changed_using as u64);
    counter!(ROWS_SAMPLED_TOTAL).increment(result.sampled_rows as u64);
    counter!(DUPLICATES_REMOVED_TOTAL).increment(result.dedup.removed_rows as u64);
    histogram!(RUN_DURATION_SECONDS).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_naming_convention() {
        for name in [
            RUNS_TOTAL,
            ROWS_INPUT_TOTAL,
            ROWS_EXCLUDED_TOTAL,
            ROWS_SAMPLED_TOTAL,
            DUPLICATES_REMOVED_TOTAL,
        ] {
            assert!(name.starts_with("audit_sampler_"));
            assert!(name.ends_with("_total"));
        }
        assert!(RUN_DURATION_SECONDS.ends_with("_seconds"));
    }
}
