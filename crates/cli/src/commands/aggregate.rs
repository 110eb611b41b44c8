//! Normalize and aggregate a raw metrics export

use anyhow::{Context, Result};
use kruize_lib::ingest::{self, WorkloadGroup};
use kruize_lib::models::columns;
use kruize_lib::{PipelineLogger, PipelineStats};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::Tabled;

use super::CommandContext;
use crate::output::print_items;

/// Where aggregation outputs go
#[derive(Debug, Clone)]
pub struct AggregateOutputs {
    pub group_dir: PathBuf,
    pub final_csv: PathBuf,
    pub metrics_csv: PathBuf,
}

impl AggregateOutputs {
    /// Defaults under `output_dir`, with explicit paths taking precedence
    pub fn resolve(
        output_dir: &Path,
        final_csv: Option<PathBuf>,
        metrics_csv: Option<PathBuf>,
    ) -> Self {
        Self {
            group_dir: output_dir.join("groups"),
            final_csv: final_csv.unwrap_or_else(|| output_dir.join("final.csv")),
            metrics_csv: metrics_csv.unwrap_or_else(|| output_dir.join("metrics.csv")),
        }
    }
}

/// Row for the per-group summary table
#[derive(Tabled, Serialize)]
struct GroupRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Experiment")]
    experiment: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Interval Start")]
    interval_start: String,
    #[tabled(rename = "Rows")]
    rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    pub stats: PipelineStats,
    pub group_files: Vec<PathBuf>,
}

/// Run normalization and aggregation, writing every output file
pub fn aggregate_file(
    input: &Path,
    outputs: &AggregateOutputs,
    logger: &PipelineLogger,
) -> Result<(AggregateReport, Vec<WorkloadGroup>)> {
    let raw = ingest::read_csv(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let rows_read = raw.len();

    let normalized = ingest::normalize(raw)?;
    logger.log_normalized(normalized.table.len(), normalized.dropped);

    let dropped = normalized.dropped;
    let table = normalized.table;
    let groups = ingest::group_rows(&table)?;
    let group_files = ingest::write_group_files(&outputs.group_dir, table.columns(), &groups)?;

    let aggregated = ingest::aggregate(&table)?;
    let final_table = ingest::aggregated_table(table.columns(), &aggregated)?;
    ingest::write_csv(&outputs.final_csv, &final_table)?;

    let metrics = final_table.without_columns(columns::POD_IDENTITY);
    ingest::write_csv(&outputs.metrics_csv, &metrics)?;

    logger.log_aggregated(rows_read, groups.len(), &outputs.group_dir.display().to_string());

    let stats = PipelineStats {
        rows_read,
        rows_dropped: dropped,
        groups: groups.len(),
        ..Default::default()
    };
    logger.log_summary(&stats);

    Ok((
        AggregateReport {
            stats,
            group_files,
        },
        groups,
    ))
}

pub fn run(
    ctx: &CommandContext,
    input: &Path,
    output_dir: Option<PathBuf>,
    final_csv: Option<PathBuf>,
    metrics_csv: Option<PathBuf>,
) -> Result<()> {
    let output_dir = output_dir.unwrap_or_else(|| ctx.config.output_dir.clone());
    let outputs = AggregateOutputs::resolve(&output_dir, final_csv, metrics_csv);
    let logger = PipelineLogger::new(input.display().to_string());

    let (report, groups) = aggregate_file(input, &outputs, &logger)?;

    let rows: Vec<GroupRow> = groups
        .iter()
        .zip(&report.group_files)
        .map(|(group, file)| GroupRow {
            file: file.display().to_string(),
            experiment: group.key.experiment_name(),
            container: group.key.container_name.clone(),
            interval_start: group.key.interval_start.clone(),
            rows: group.rows.len(),
        })
        .collect();
    print_items(&rows, &rows, ctx.format, "No workload rows to aggregate")?;

    ctx.success(&format!(
        "Aggregated {} rows ({} dropped) into {} groups; metrics written to {}",
        report.stats.rows_read,
        report.stats.rows_dropped,
        report.stats.groups,
        outputs.metrics_csv.display()
    ));
    Ok(())
}
