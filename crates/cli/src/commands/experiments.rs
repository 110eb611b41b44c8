//! Experiment and performance-profile commands

use anyhow::{Context, Result};
use kruize_lib::record::{self, ExperimentMatch, ExperimentSummary};
use kruize_lib::{ingest, validate_experiment_input, CreateExperiment, PipelineLogger};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tabled::Tabled;

use super::{read_json_file, CommandContext};
use crate::client::ApiClient;
use crate::output::{print_error, print_info, print_items, print_warning, OutputFormat};

#[derive(Tabled, Serialize)]
struct ExperimentRow {
    #[tabled(rename = "Experiment")]
    experiment: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Containers")]
    containers: String,
}

#[derive(Tabled, Serialize)]
struct CreatedRow {
    #[tabled(rename = "Experiment")]
    experiment: String,
    #[tabled(rename = "Existing")]
    existing: String,
    #[tabled(rename = "Action")]
    action: String,
}

/// Experiment name of the first definition in a document
fn first_experiment_name(document: &Value) -> &str {
    document
        .get(0)
        .and_then(|e| e.get("experiment_name"))
        .and_then(Value::as_str)
        .unwrap_or("-")
}

/// Validate an experiment-definition file; invalid input is an error
pub fn validate(ctx: &CommandContext, json: &Path) -> Result<()> {
    let document = read_json_file(json)?;
    check_document(&document, &PipelineLogger::new(json.display().to_string()))?;
    ctx.success(&format!("{} is a valid experiment definition", json.display()));
    Ok(())
}

fn check_document(document: &Value, logger: &PipelineLogger) -> Result<()> {
    let name = first_experiment_name(document);
    match validate_experiment_input(document) {
        Ok(()) => {
            logger.log_validation(name, None);
            Ok(())
        }
        Err(failure) => {
            logger.log_validation(name, Some(failure.message()));
            print_error(failure.message());
            anyhow::bail!("Input JSON is invalid: {}", failure)
        }
    }
}

/// Create experiments from a definition JSON or from a metrics CSV
pub async fn create(ctx: &CommandContext, input: &Path) -> Result<()> {
    let client = ctx.client()?;
    let logger = PipelineLogger::new(input.display().to_string());

    let is_csv = input
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if !is_csv {
        let document = read_json_file(input)?;
        check_document(&document, &logger)?;
        let response = client.create_experiment(&document).await;
        let name = first_experiment_name(&document);
        logger.log_api_call("createExperiment", name, response.is_ok());
        ctx.success(&format!("Experiment created: {}", response?.message));
        return Ok(());
    }

    let table = ingest::read_csv(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let rows = record::usage_rows(&table)?;
    let experiments = record::experiments_for_rows(&ctx.config.experiment_settings(), &rows);
    let existing = client.list_experiments().await?;

    let mut created = Vec::with_capacity(experiments.len());
    for experiment in &experiments {
        let action = create_if_missing(&client, &logger, &existing, experiment).await?;
        created.push(action);
    }

    print_items(&created, &created, ctx.format, "No workloads in input")?;
    Ok(())
}

/// Weakest match over the containers of `experiment`, so a workload is
/// `Exact` only when every one of its containers is already registered
pub(crate) fn workload_match(
    existing: &[ExperimentSummary],
    experiment: &CreateExperiment,
) -> ExperimentMatch {
    experiment
        .identities()
        .map(|identity| record::find_match(existing, &identity))
        .max()
        .unwrap_or(ExperimentMatch::NoMatch)
}

async fn create_if_missing(
    client: &ApiClient,
    logger: &PipelineLogger,
    existing: &[ExperimentSummary],
    experiment: &CreateExperiment,
) -> Result<CreatedRow> {
    let matched = workload_match(existing, experiment);
    let mut row = CreatedRow {
        experiment: experiment.experiment_name.clone(),
        existing: matched.describe().to_string(),
        action: "skipped".to_string(),
    };
    if matched == ExperimentMatch::Exact {
        return Ok(row);
    }

    let document = serde_json::to_value([experiment])?;
    check_document(&document, logger)?;

    let response = client.create_experiment(&document).await;
    logger.log_api_call("createExperiment", &experiment.experiment_name, response.is_ok());
    row.action = match response {
        Ok(_) => "created".to_string(),
        Err(err) => {
            print_warning(&format!("{}: {:#}", experiment.experiment_name, err));
            "failed".to_string()
        }
    };
    Ok(row)
}

/// List experiments known to the service
pub async fn list(ctx: &CommandContext) -> Result<()> {
    let client = ctx.client()?;
    let experiments = client.list_experiments().await?;

    let rows: Vec<ExperimentRow> = experiments
        .iter()
        .flat_map(|e| {
            e.kubernetes_objects.iter().map(move |o| ExperimentRow {
                experiment: e.experiment_name.clone(),
                kind: o.kind.clone(),
                namespace: o.namespace.clone(),
                containers: o
                    .containers
                    .iter()
                    .map(|c| c.container_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        })
        .collect();

    print_items(&rows, &experiments, ctx.format, "No experiments found")?;
    if let OutputFormat::Table = ctx.format {
        print_info(&format!("Total: {} experiments", experiments.len()));
    }
    Ok(())
}

/// Register a performance profile
pub async fn create_profile(ctx: &CommandContext, json: &Path) -> Result<()> {
    let client = ctx.client()?;
    let logger = PipelineLogger::new(json.display().to_string());
    let profile = read_json_file(json)?;

    let name = profile.get("name").and_then(Value::as_str).unwrap_or("-");
    let response = client.create_performance_profile(&profile).await;
    logger.log_api_call("createPerformanceProfile", name, response.is_ok());

    ctx.success(&format!("Performance profile created: {}", response?.message));
    Ok(())
}
