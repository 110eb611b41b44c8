//! Structured logging for pipeline runs
//!
//! Every event carries an `event` field and the input it came from, so runs
//! over many exports can be filtered in JSON log output.

use serde::Serialize;
use tracing::{info, warn};

/// Counters accumulated over one run of the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub groups: usize,
    pub records: usize,
    pub experiments_created: usize,
    pub results_uploaded: usize,
    pub failures: usize,
}

/// Structured logger for pipeline events
#[derive(Clone)]
pub struct PipelineLogger {
    source: String,
}

impl PipelineLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Log the outcome of normalizing a raw export
    pub fn log_normalized(&self, kept: usize, dropped: usize) {
        info!(
            event = "rows_normalized",
            source = %self.source,
            kept = kept,
            dropped = dropped,
            "Normalized telemetry rows"
        );
    }

    pub fn log_aggregated(&self, rows: usize, groups: usize, output_dir: &str) {
        info!(
            event = "rows_aggregated",
            source = %self.source,
            rows = rows,
            groups = groups,
            output_dir = %output_dir,
            "Aggregated rows into workload groups"
        );
    }

    pub fn log_records(&self, records: usize, output: &str) {
        info!(
            event = "records_synthesized",
            source = %self.source,
            records = records,
            output = %output,
            "Wrote experiment records"
        );
    }

    /// Log the validation outcome of an experiment definition
    pub fn log_validation(&self, experiment_name: &str, error: Option<&str>) {
        match error {
            None => info!(
                event = "experiment_validated",
                source = %self.source,
                experiment = %experiment_name,
                "Experiment definition is valid"
            ),
            Some(message) => warn!(
                event = "experiment_invalid",
                source = %self.source,
                experiment = %experiment_name,
                error = %message,
                "Experiment definition rejected"
            ),
        }
    }

    /// Log a call to the recommendation service
    pub fn log_api_call(&self, endpoint: &str, experiment_name: &str, success: bool) {
        if success {
            info!(
                event = "api_call",
                source = %self.source,
                endpoint = %endpoint,
                experiment = %experiment_name,
                success = true,
                "Recommendation service accepted request"
            );
        } else {
            warn!(
                event = "api_call",
                source = %self.source,
                endpoint = %endpoint,
                experiment = %experiment_name,
                success = false,
                "Recommendation service rejected request"
            );
        }
    }

    pub fn log_summary(&self, stats: &PipelineStats) {
        info!(
            event = "run_finished",
            source = %self.source,
            rows_read = stats.rows_read,
            rows_dropped = stats.rows_dropped,
            groups = stats.groups,
            records = stats.records,
            experiments_created = stats.experiments_created,
            results_uploaded = stats.results_uploaded,
            failures = stats.failures,
            "Pipeline run finished"
        );
    }
}
