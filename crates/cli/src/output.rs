//! Output formatting utilities

use crate::client::Amount;
use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print items as a table, or as JSON of `json_view`
pub fn print_items<T: Tabled, J: Serialize + ?Sized>(
    rows: &[T],
    json_view: &J,
    format: OutputFormat,
    empty_message: &str,
) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(json_view)?,
        OutputFormat::Table => {
            if rows.is_empty() {
                print_warning(empty_message);
            } else {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
    }
    Ok(())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a recommended amount in the unit the service reports
pub fn format_amount(amount: Option<&Amount>) -> String {
    match amount {
        None => "-".to_string(),
        Some(a) => match a.format.as_str() {
            "cores" => format_cpu(a.amount),
            "MiB" => format_mib(a.amount),
            "" => format!("{:.2}", a.amount),
            unit => format!("{:.2} {}", a.amount, unit),
        },
    }
}

/// Format cores, switching to millicores below one core
pub fn format_cpu(cores: f64) -> String {
    if cores >= 1.0 {
        format!("{:.2}", cores)
    } else {
        format!("{:.0}m", cores * 1000.0)
    }
}

/// Format MiB as a human-readable quantity
pub fn format_mib(mib: f64) -> String {
    if mib >= 1024.0 {
        format!("{:.2}Gi", mib / 1024.0)
    } else {
        format!("{:.2}Mi", mib)
    }
}

/// Color a service status or notification type
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "success" | "info" => status.green().to_string(),
        "notice" | "warning" => status.yellow().to_string(),
        "error" | "critical" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}
