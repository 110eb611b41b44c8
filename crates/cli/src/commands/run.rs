//! End-to-end demo run over a metrics CSV

use anyhow::{Context, Result};
use kruize_lib::record::{self, ExperimentMatch, UsageRow};
use kruize_lib::{ingest, validate_experiment_input, PipelineLogger, PipelineStats};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::experiments::workload_match;
use super::recommendations::{
    recommendation_rows, write_recommendations_csv, RECOMMENDATIONS_CSV,
};
use super::CommandContext;
use crate::client::ApiClient;
use crate::output::{print_items, print_warning};

/// Create each workload's experiment, upload every row as results, then
/// fetch recommendations for every experiment touched.
///
/// `wait_secs` is slept between uploads and once more before fetching, so
/// the service has time to produce recommendations.
pub async fn run(
    ctx: &CommandContext,
    metrics_csv: &Path,
    wait_secs: u64,
    output: Option<PathBuf>,
) -> Result<()> {
    let client = ctx.client()?;
    let logger = PipelineLogger::new(metrics_csv.display().to_string());
    let mut stats = PipelineStats::default();

    let table = ingest::read_csv(metrics_csv)
        .with_context(|| format!("Failed to read {}", metrics_csv.display()))?;
    let rows = record::usage_rows(&table)?;
    stats.rows_read = rows.len();

    let experiments = record::experiments_for_rows(&ctx.config.experiment_settings(), &rows);
    let existing = client.list_experiments().await?;

    for experiment in &experiments {
        if workload_match(&existing, experiment) == ExperimentMatch::Exact {
            info!(experiment = %experiment.experiment_name, "Experiment already exists");
            continue;
        }
        let document = serde_json::to_value([experiment])?;
        if let Err(failure) = validate_experiment_input(&document) {
            logger.log_validation(&experiment.experiment_name, Some(failure.message()));
            anyhow::bail!("Input JSON is invalid: {}", failure);
        }

        let response = client.create_experiment(&document).await;
        logger.log_api_call("createExperiment", &experiment.experiment_name, response.is_ok());
        match response {
            Ok(_) => stats.experiments_created += 1,
            Err(err) => {
                stats.failures += 1;
                print_warning(&format!("{}: {:#}", experiment.experiment_name, err));
            }
        }
    }

    for (i, usage) in rows.iter().enumerate() {
        if i > 0 && wait_secs > 0 {
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }
        upload_row(&client, &logger, usage, &mut stats).await;
    }
    stats.records = rows.len();

    if wait_secs > 0 {
        info!(seconds = wait_secs, "Waiting before fetching recommendations");
        tokio::time::sleep(Duration::from_secs(wait_secs)).await;
    }

    let mut listed = Vec::with_capacity(experiments.len());
    for experiment in &experiments {
        let name = experiment.experiment_name.as_str();
        let response = client.list_recommendations(name).await;
        logger.log_api_call("listRecommendations", name, response.is_ok());
        match response {
            Ok(mut recommendations) => listed.append(&mut recommendations),
            Err(err) => {
                stats.failures += 1;
                warn!(experiment = %name, error = %err, "Failed to list recommendations");
            }
        }
    }

    let output =
        output.unwrap_or_else(|| ctx.config.output_dir.join("recommendations_data.json"));
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    record::write_json(&output, &listed)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    write_recommendations_csv(&output.with_file_name(RECOMMENDATIONS_CSV), &listed)?;

    let rows = recommendation_rows(&listed);
    print_items(&rows, &listed, ctx.format, "No recommendations found")?;
    logger.log_summary(&stats);
    ctx.success(&format!(
        "Uploaded {}/{} records; recommendations written to {}",
        stats.results_uploaded,
        stats.records,
        output.display()
    ));
    Ok(())
}

/// Upload one row as a single-record `updateResults` call
async fn upload_row(
    client: &ApiClient,
    logger: &PipelineLogger,
    usage: &UsageRow,
    stats: &mut PipelineStats,
) {
    let record = usage.to_record();
    let response = client.update_results(&[&record]).await;
    logger.log_api_call("updateResults", &record.experiment_name, response.is_ok());

    match response {
        Ok(_) => stats.results_uploaded += 1,
        Err(err) => {
            stats.failures += 1;
            warn!(
                experiment = %record.experiment_name,
                interval_end = %record.interval_end_time,
                error = %err,
                "Failed to upload results"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::output::OutputFormat;
    use mockito::Matcher;

    const METRICS: &str = "namespace,k8_object_type,k8_object_name,container_name,image_name,interval_start,interval_end,cpu_usage_container_avg,cpu_usage_container_min,cpu_usage_container_max,cpu_usage_container_sum
prod,deployment,fe,web,img,2023-01-02T03:00:00.000Z,2023-01-02T03:15:00.000Z,0.3,0.1,0.5,4.5
prod,deployment,fe,web,img,2023-01-02T03:15:00.000Z,2023-01-02T03:30:00.000Z,0.4,0.2,0.6,6
";

    #[tokio::test]
    async fn test_run_creates_uploads_and_lists() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/listExperiments")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let create = server
            .mock("POST", "/createExperiment")
            .match_body(Matcher::Regex(
                r#""experiment_name":"fe\|deployment\|prod""#.to_string(),
            ))
            .with_status(201)
            .with_body(r#"{"message":"ok","httpcode":201,"status":"SUCCESS"}"#)
            .expect(1)
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/updateResults")
            .with_status(201)
            .with_body(r#"{"message":"ok","httpcode":201,"status":"SUCCESS"}"#)
            .expect(2)
            .create_async()
            .await;
        server
            .mock("GET", "/listRecommendations")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"experiment_name":"fe|deployment|prod","kubernetes_objects":[]}]"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let metrics = dir.path().join("metrics.csv");
        std::fs::write(&metrics, METRICS).unwrap();
        let output = dir.path().join("reco").join("recommendations.json");

        let ctx = CommandContext {
            config: Config {
                api_url: server.url(),
                ..Default::default()
            },
            format: OutputFormat::Json,
        };
        run(&ctx, &metrics, 0, Some(output.clone())).await.unwrap();

        create.assert_async().await;
        upload.assert_async().await;

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written[0]["experiment_name"], "fe|deployment|prod");

        let exported = ingest::read_csv(&output.with_file_name(RECOMMENDATIONS_CSV)).unwrap();
        assert_eq!(exported.columns()[0], "cluster_name");
        assert!(exported.is_empty());
    }

    #[tokio::test]
    async fn test_run_waits_before_listing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/listExperiments")
            .with_status(200)
            .with_body(r#"[{"experiment_name":"fe|deployment|prod","kubernetes_objects":[{"type":"deployment","name":"fe","namespace":"prod","containers":[{"container_name":"web"}]}]}]"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/createExperiment")
            .expect(0)
            .create_async()
            .await;
        server
            .mock("POST", "/updateResults")
            .with_status(201)
            .with_body(r#"{"message":"ok","httpcode":201,"status":"SUCCESS"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/listRecommendations")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let metrics = dir.path().join("metrics.csv");
        std::fs::write(&metrics, METRICS).unwrap();

        let ctx = CommandContext {
            config: Config {
                api_url: server.url(),
                ..Default::default()
            },
            format: OutputFormat::Json,
        };
        let started = std::time::Instant::now();
        run(&ctx, &metrics, 1, Some(dir.path().join("reco.json")))
            .await
            .unwrap();

        // one pause between the two uploads, one before listing
        assert!(started.elapsed() >= Duration::from_secs(2));
        create.assert_async().await;
        assert!(dir.path().join(RECOMMENDATIONS_CSV).exists());
    }
}
