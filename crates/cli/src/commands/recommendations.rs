//! Recommendation-related CLI commands

use anyhow::{Context, Result};
use kruize_lib::{ingest, MetricRow, MetricTable, PipelineLogger};
use std::path::Path;
use std::time::Duration;
use tabled::Tabled;
use tracing::info;

use super::CommandContext;
use crate::client::{Amount, ExperimentRecommendations, ResourceConfig, TermRecommendation};
use crate::output::{color_status, format_amount, print_items};

/// Row for recommendations table
#[derive(Tabled)]
pub(crate) struct RecommendationRow {
    #[tabled(rename = "Experiment")]
    experiment: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Monitoring End")]
    monitoring_end: String,
    #[tabled(rename = "Term")]
    term: String,
    #[tabled(rename = "Engine")]
    engine: String,
    #[tabled(rename = "CPU Req")]
    cpu_request: String,
    #[tabled(rename = "CPU Lim")]
    cpu_limit: String,
    #[tabled(rename = "Mem Req")]
    memory_request: String,
    #[tabled(rename = "Mem Lim")]
    memory_limit: String,
}

fn row(
    experiment: &str,
    container: &str,
    monitoring_end: &str,
    term: &str,
    engine: &str,
    config: Option<&ResourceConfig>,
) -> RecommendationRow {
    let requests = config.and_then(|c| c.requests.as_ref());
    let limits = config.and_then(|c| c.limits.as_ref());
    RecommendationRow {
        experiment: experiment.to_string(),
        container: container.to_string(),
        monitoring_end: format_timestamp(monitoring_end),
        term: term.to_string(),
        engine: engine.to_string(),
        cpu_request: format_amount(requests.and_then(|r| r.cpu.as_ref())),
        cpu_limit: format_amount(limits.and_then(|r| r.cpu.as_ref())),
        memory_request: format_amount(requests.and_then(|r| r.memory.as_ref())),
        memory_limit: format_amount(limits.and_then(|r| r.memory.as_ref())),
    }
}

/// Format timestamp for display
fn format_timestamp(ts: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(ts) {
        dt.format("%Y-%m-%d %H:%M").to_string()
    } else {
        ts.to_string()
    }
}

/// Flatten the latest interval of each container into table rows.
///
/// Containers the service has not produced recommendations for yet get a
/// single row carrying its first notification instead.
pub(crate) fn recommendation_rows(listed: &[ExperimentRecommendations]) -> Vec<RecommendationRow> {
    let mut rows = Vec::new();

    for experiment in listed {
        let name = experiment.experiment_name.as_str();
        for container in experiment.kubernetes_objects.iter().flat_map(|o| &o.containers) {
            let recommendations = container.recommendations.as_ref();

            // data is keyed by ISO timestamp, so the last entry is the latest
            let Some((end, interval)) = recommendations.and_then(|r| r.data.iter().next_back())
            else {
                let note = recommendations
                    .and_then(|r| r.notifications.values().next())
                    .map(|n| format!("{}: {}", color_status(&n.kind), n.message))
                    .unwrap_or_else(|| "no recommendations yet".to_string());
                rows.push(row(name, &container.container_name, "-", &note, "-", None));
                continue;
            };

            for (term, term_reco) in &interval.recommendation_terms {
                for (engine, engine_reco) in &term_reco.recommendation_engines {
                    rows.push(row(
                        name,
                        &container.container_name,
                        end,
                        term,
                        engine,
                        engine_reco.config.as_ref(),
                    ));
                }
            }
        }
    }

    rows
}

/// File name of the flattened recommendations export
pub(crate) const RECOMMENDATIONS_CSV: &str = "recommendationsOutput.csv";

const CSV_COLUMNS: [&str; 9] = [
    "cluster_name",
    "experiment_name",
    "container_name",
    "time_zone",
    "duration_type",
    "cpu_requests",
    "memory_requests",
    "cpu_limits",
    "memory_limits",
];

/// Engine whose config is exported when a term carries several
const EXPORTED_ENGINE: &str = "cost";

fn exported_config(term: &TermRecommendation) -> Option<&ResourceConfig> {
    term.recommendation_engines
        .get(EXPORTED_ENGINE)
        .and_then(|e| e.config.as_ref())
        .or_else(|| {
            term.recommendation_engines
                .values()
                .find_map(|e| e.config.as_ref())
        })
}

fn amount_cell(amount: Option<&Amount>) -> String {
    amount
        .map(|a| ((a.amount * 10_000.0).round() / 10_000.0).to_string())
        .unwrap_or_default()
}

/// One row per container, interval and term that has a config; amounts are
/// rounded to 4 decimals
pub(crate) fn recommendations_table(listed: &[ExperimentRecommendations]) -> Result<MetricTable> {
    let mut table = MetricTable::new(CSV_COLUMNS.iter().map(|c| c.to_string()).collect());

    for experiment in listed {
        let cluster = experiment.cluster_name.as_deref().unwrap_or_default();
        for container in experiment.kubernetes_objects.iter().flat_map(|o| &o.containers) {
            let Some(recommendations) = &container.recommendations else {
                continue;
            };
            for (time_zone, interval) in &recommendations.data {
                for (term, term_reco) in &interval.recommendation_terms {
                    let Some(config) = exported_config(term_reco) else {
                        continue;
                    };
                    let requests = config.requests.as_ref();
                    let limits = config.limits.as_ref();
                    table.push_row(MetricRow::new(vec![
                        cluster.to_string(),
                        experiment.experiment_name.clone(),
                        container.container_name.clone(),
                        time_zone.clone(),
                        term.clone(),
                        amount_cell(requests.and_then(|r| r.cpu.as_ref())),
                        amount_cell(requests.and_then(|r| r.memory.as_ref())),
                        amount_cell(limits.and_then(|r| r.cpu.as_ref())),
                        amount_cell(limits.and_then(|r| r.memory.as_ref())),
                    ]))?;
                }
            }
        }
    }

    Ok(table)
}

pub(crate) fn write_recommendations_csv(
    path: &Path,
    listed: &[ExperimentRecommendations],
) -> Result<()> {
    let table = recommendations_table(listed)?;
    ingest::write_csv(path, &table)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = table.len(), "Wrote recommendations CSV");
    Ok(())
}

/// Fetch (optionally after generating) recommendations for an experiment
pub async fn get_recommendations(
    ctx: &CommandContext,
    experiment_name: &str,
    wait_secs: u64,
    update: bool,
    interval_end: Option<&str>,
    csv: Option<&Path>,
) -> Result<()> {
    let client = ctx.client()?;
    let logger = PipelineLogger::new(client.base_url().as_str());

    if wait_secs > 0 {
        info!(seconds = wait_secs, "Waiting before fetching recommendations");
        tokio::time::sleep(Duration::from_secs(wait_secs)).await;
    }

    let response = if update {
        client.update_recommendations(experiment_name, interval_end).await
    } else {
        client.list_recommendations(experiment_name).await
    };
    let endpoint = if update {
        "updateRecommendations"
    } else {
        "listRecommendations"
    };
    logger.log_api_call(endpoint, experiment_name, response.is_ok());
    let listed = response?;

    if let Some(path) = csv {
        write_recommendations_csv(path, &listed)?;
    }

    let rows = recommendation_rows(&listed);
    print_items(&rows, &listed, ctx.format, "No recommendations found")?;
    Ok(())
}
