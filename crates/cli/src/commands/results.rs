//! `updateResults` payload commands

use anyhow::{Context, Result};
use kruize_lib::{ingest, record, PipelineLogger};
use std::path::Path;
use tabled::Tabled;

use super::{read_json_file, CommandContext};
use crate::output::print_items;

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Experiment")]
    experiment: String,
    #[tabled(rename = "Interval Start")]
    interval_start: String,
    #[tabled(rename = "Interval End")]
    interval_end: String,
    #[tabled(rename = "Metrics")]
    metrics: usize,
}

/// Convert a metrics CSV into an `updateResults` JSON array
pub fn convert(ctx: &CommandContext, csv: &Path, json: &Path) -> Result<()> {
    let logger = PipelineLogger::new(csv.display().to_string());

    let table = ingest::read_csv(csv)
        .with_context(|| format!("Failed to read {}", csv.display()))?;
    let records = record::synthesize(&table)?;
    record::write_json(json, &records)
        .with_context(|| format!("Failed to write {}", json.display()))?;
    logger.log_records(records.len(), &json.display().to_string());

    let rows: Vec<RecordRow> = records
        .iter()
        .map(|r| RecordRow {
            experiment: r.experiment_name.clone(),
            interval_start: r.interval_start_time.clone(),
            interval_end: r.interval_end_time.clone(),
            metrics: r
                .kubernetes_objects
                .iter()
                .flat_map(|o| &o.containers)
                .map(|c| c.metrics.len())
                .sum(),
        })
        .collect();
    print_items(&rows, &records, ctx.format, "No rows in input")?;

    ctx.success(&format!("Wrote {} records to {}", records.len(), json.display()));
    Ok(())
}

/// Post an `updateResults` JSON file to the service
pub async fn upload(ctx: &CommandContext, json: &Path) -> Result<()> {
    let client = ctx.client()?;
    let logger = PipelineLogger::new(json.display().to_string());
    let payload = read_json_file(json)?;

    let response = client.update_results(&payload).await;
    logger.log_api_call("updateResults", "-", response.is_ok());
    let response = response?;

    ctx.success(&format!("Results uploaded: {}", response.message));
    Ok(())
}
