//! Kruize demo CLI
//!
//! A command-line tool for turning exported container metrics into
//! recommendation-service payloads and driving the service end to end.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{aggregate, experiments, recommendations, results, run, CommandContext};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Kruize demo CLI
#[derive(Parser)]
#[command(name = "kruize-demo")]
#[command(author, version, about = "CLI for the Kruize recommendation demos", long_about = None)]
pub struct Cli {
    /// Recommendation service URL (can also be set via KRUIZE_URL env var)
    #[arg(long, env = "KRUIZE_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize a raw metrics export and aggregate it per workload
    Aggregate {
        /// Raw metrics CSV
        input: PathBuf,

        /// Directory for per-group files and default outputs
        #[arg(long, short)]
        output_dir: Option<PathBuf>,

        /// Path of the aggregated CSV (default: <output-dir>/final.csv)
        #[arg(long)]
        final_csv: Option<PathBuf>,

        /// Path of the metrics CSV (default: <output-dir>/metrics.csv)
        #[arg(long)]
        metrics_csv: Option<PathBuf>,
    },

    /// Build or upload updateResults payloads
    #[command(subcommand)]
    Results(ResultsCommands),

    /// Validate an experiment-definition JSON file
    Validate {
        /// Experiment-definition JSON
        json: PathBuf,
    },

    /// Manage experiments
    #[command(subcommand)]
    Experiment(ExperimentCommands),

    /// Manage performance profiles
    #[command(subcommand)]
    Profile(ProfileCommands),

    /// Get recommendations for an experiment
    Recommendations {
        /// Experiment name, e.g. name|type|namespace
        experiment: String,

        /// Seconds to wait before fetching
        #[arg(long, default_value_t = 0)]
        wait_secs: u64,

        /// Generate recommendations instead of listing existing ones
        #[arg(long)]
        update: bool,

        /// End of the interval to generate recommendations for
        #[arg(long, requires = "update")]
        interval_end: Option<String>,

        /// Also export the recommendations as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Create experiments, upload results and fetch recommendations for a metrics CSV
    Run {
        /// Metrics CSV, one row per workload container and interval
        metrics_csv: PathBuf,

        /// Seconds to wait between result uploads
        #[arg(long, default_value_t = 0)]
        wait_secs: u64,

        /// Where to write the fetched recommendations; the CSV export is
        /// written next to it
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ResultsCommands {
    /// Convert a metrics CSV into an updateResults JSON array
    Convert {
        /// Metrics CSV
        csv: PathBuf,
        /// Output JSON
        json: PathBuf,
    },

    /// Upload an updateResults JSON file
    Upload {
        /// updateResults JSON
        json: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ExperimentCommands {
    /// Create experiments from a definition JSON or a metrics CSV
    Create {
        /// Experiment-definition JSON or metrics CSV
        input: PathBuf,
    },

    /// List experiments known to the service
    List,
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Register a performance profile
    Create {
        /// Performance profile JSON
        json: PathBuf,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let mut config = config::Config::load()?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    debug!(api_url = %config.api_url, "Configuration loaded");

    let ctx = CommandContext {
        config,
        format: cli.format,
    };

    // Execute command
    match cli.command {
        Commands::Aggregate {
            input,
            output_dir,
            final_csv,
            metrics_csv,
        } => {
            aggregate::run(&ctx, &input, output_dir, final_csv, metrics_csv)?;
        }
        Commands::Results(results_cmd) => match results_cmd {
            ResultsCommands::Convert { csv, json } => {
                results::convert(&ctx, &csv, &json)?;
            }
            ResultsCommands::Upload { json } => {
                results::upload(&ctx, &json).await?;
            }
        },
        Commands::Validate { json } => {
            experiments::validate(&ctx, &json)?;
        }
        Commands::Experiment(experiment_cmd) => match experiment_cmd {
            ExperimentCommands::Create { input } => {
                experiments::create(&ctx, &input).await?;
            }
            ExperimentCommands::List => {
                experiments::list(&ctx).await?;
            }
        },
        Commands::Profile(ProfileCommands::Create { json }) => {
            experiments::create_profile(&ctx, &json).await?;
        }
        Commands::Recommendations {
            experiment,
            wait_secs,
            update,
            interval_end,
            csv,
        } => {
            recommendations::get_recommendations(
                &ctx,
                &experiment,
                wait_secs,
                update,
                interval_end.as_deref(),
                csv.as_deref(),
            )
            .await?;
        }
        Commands::Run {
            metrics_csv,
            wait_secs,
            output,
        } => {
            run::run(&ctx, &metrics_csv, wait_secs, output).await?;
        }
    }

    Ok(())
}
