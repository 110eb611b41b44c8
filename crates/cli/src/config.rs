//! Configuration management for the CLI

use anyhow::{Context, Result};
use kruize_lib::record::ExperimentSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment prefix, e.g. `KRUIZE_CLUSTER_NAME`
const ENV_PREFIX: &str = "KRUIZE";

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recommendation service URL
    pub api_url: String,
    pub cluster_name: String,
    pub performance_profile: String,
    pub mode: String,
    pub target_cluster: String,
    pub measurement_duration: String,
    pub threshold: String,
    /// Where aggregation outputs are written
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let experiment = ExperimentSettings::default();
        Self {
            api_url: "http://localhost:8080".to_string(),
            cluster_name: experiment.cluster_name,
            performance_profile: experiment.performance_profile,
            mode: experiment.mode,
            target_cluster: experiment.target_cluster,
            measurement_duration: experiment.measurement_duration,
            threshold: experiment.threshold,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load from an optional JSON file, overridden by `KRUIZE_*` variables
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("kruize-demo").join("config.json"))
    }

    pub fn experiment_settings(&self) -> ExperimentSettings {
        ExperimentSettings {
            cluster_name: self.cluster_name.clone(),
            performance_profile: self.performance_profile.clone(),
            mode: self.mode.clone(),
            target_cluster: self.target_cluster.clone(),
            measurement_duration: self.measurement_duration.clone(),
            threshold: self.threshold.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.performance_profile, "resource-optimization-openshift");
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"cluster_name": "e23-alias", "threshold": "0.2"}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.cluster_name, "e23-alias");
        assert_eq!(config.mode, "monitor");

        let settings = config.experiment_settings();
        assert_eq!(settings.threshold, "0.2");
        assert_eq!(settings.measurement_duration, "15min");
    }
}
