//! CLI command implementations

pub mod aggregate;
pub mod experiments;
pub mod recommendations;
pub mod results;
pub mod run;

use crate::client::ApiClient;
use crate::config::Config;
use crate::output::{print_success, OutputFormat};
use anyhow::{Context, Result};
use std::path::Path;

/// State shared by every command
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Client for the configured service URL
    pub fn client(&self) -> Result<ApiClient> {
        ApiClient::new(&self.config.api_url)
    }

    /// Success lines are table-mode only so JSON output stays parseable
    pub fn success(&self, message: &str) {
        if let OutputFormat::Table = self.format {
            print_success(message);
        }
    }
}

pub(crate) fn read_json_file(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
