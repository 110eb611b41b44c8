//! Core data models for the Kruize helpers

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// API version stamped on every document sent to the service
pub const API_VERSION: &str = "v2.0";

/// Placeholder the exporter writes when a pod has no owning workload name
pub const NONE_PLACEHOLDER: &str = "<none>";

/// Column names written by the metrics exporter
pub mod columns {
    pub const NAMESPACE: &str = "namespace";
    pub const OWNER_KIND: &str = "owner_kind";
    pub const OWNER_NAME: &str = "owner_name";
    pub const WORKLOAD: &str = "workload";
    pub const WORKLOAD_TYPE: &str = "workload_type";
    pub const CONTAINER_NAME: &str = "container_name";
    pub const IMAGE_NAME: &str = "image_name";
    pub const INTERVAL_START: &str = "interval_start";
    pub const INTERVAL_END: &str = "interval_end";
    pub const POD: &str = "pod";
    pub const NODE: &str = "node";
    pub const RESOURCE_ID: &str = "resource_id";

    /// Derived by the normalizer
    pub const K8_OBJECT_TYPE: &str = "k8_object_type";
    /// Derived by the normalizer
    pub const K8_OBJECT_NAME: &str = "k8_object_name";

    /// Columns that identify a single pod and legitimately vary inside a
    /// workload group
    pub const POD_IDENTITY: &[&str] = &[POD, OWNER_NAME, NODE, RESOURCE_ID];
}

/// One CSV line, with cells aligned to the owning table's header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricRow {
    cells: Vec<String>,
}

impl MetricRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Cell at `index`, or an empty string past the end of the row
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    pub(crate) fn set(&mut self, index: usize, value: String) {
        if index >= self.cells.len() {
            self.cells.resize(index + 1, String::new());
        }
        self.cells[index] = value;
    }
}

/// A CSV file held in memory: ordered header plus rows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricTable {
    columns: Vec<String>,
    rows: Vec<MetricRow>,
}

impl MetricTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table, rejecting rows whose width differs from the header
    pub fn from_rows(columns: Vec<String>, rows: Vec<MetricRow>) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: MetricRow) -> Result<()> {
        if row.cells.len() != self.columns.len() {
            return Err(PipelineError::RowWidth {
                row: self.rows.len() + 1,
                expected: self.columns.len(),
                found: row.cells.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column the caller cannot continue without
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    /// Index of `name`, appending it (with empty cells) when absent
    pub(crate) fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.cells.push(String::new());
        }
        self.columns.len() - 1
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [MetricRow] {
        &mut self.rows
    }

    pub(crate) fn retain_rows<F>(&mut self, keep: F)
    where
        F: FnMut(&MetricRow) -> bool,
    {
        self.rows.retain(keep);
    }

    /// Copy of the table without the named columns; unknown names are ignored
    pub fn without_columns(&self, names: &[&str]) -> MetricTable {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !names.contains(&self.columns[i].as_str()))
            .collect();

        MetricTable {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| MetricRow::new(keep.iter().map(|&i| row.cell(i).to_string()).collect()))
                .collect(),
        }
    }

    /// Iterate rows with by-name access
    pub fn iter(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(move |row| RowView { table: self, row })
    }

    pub fn row_view(&self, index: usize) -> Option<RowView<'_>> {
        self.rows.get(index).map(|row| RowView { table: self, row })
    }
}

/// Borrowed row paired with its header
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a MetricTable,
    row: &'a MetricRow,
}

impl<'a> RowView<'a> {
    /// Value of a column that must exist
    pub fn get(&self, column: &str) -> Result<&'a str> {
        let index = self.table.require_column(column)?;
        Ok(self.row.cell(index))
    }

    /// Value of a column that may not have been exported at all
    pub fn get_opt(&self, column: &str) -> Option<&'a str> {
        self.table.column_index(column).map(|i| self.row.cell(i))
    }

    pub fn row(&self) -> &'a MetricRow {
        self.row
    }
}

/// Grouping identity of a container in a workload for one interval.
///
/// Field order is the sort order of aggregated output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadKey {
    pub namespace: String,
    pub k8_object_type: String,
    pub k8_object_name: String,
    pub container_name: String,
    pub interval_start: String,
}

impl WorkloadKey {
    /// Experiment name the service keys state by
    pub fn experiment_name(&self) -> String {
        experiment_name(&self.k8_object_name, &self.k8_object_type, &self.namespace)
    }
}

/// `name|type|namespace`, unique across namespaces with same-named workloads
pub fn experiment_name(k8_object_name: &str, k8_object_type: &str, namespace: &str) -> String {
    format!("{}|{}|{}", k8_object_name, k8_object_type, namespace)
}

/// One reduced row per workload group
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedMetric {
    pub key: WorkloadKey,
    pub row: MetricRow,
}

// updateResults document

/// One `updateResults` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub version: String,
    pub experiment_name: String,
    pub interval_start_time: String,
    pub interval_end_time: String,
    pub kubernetes_objects: Vec<KubernetesObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KubernetesObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub containers: Vec<ContainerResults>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerResults {
    pub container_image_name: String,
    pub container_name: String,
    pub metrics: Vec<MetricEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name: String,
    pub results: MetricResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResults {
    pub aggregation_info: AggregationInfo,
}

/// Reduced statistics for one metric, tagged with their unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    pub format: String,
}

// createExperiment document

/// One `createExperiment` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateExperiment {
    pub version: String,
    pub experiment_name: String,
    pub cluster_name: String,
    pub performance_profile: String,
    pub mode: String,
    pub target_cluster: String,
    pub kubernetes_objects: Vec<ExperimentObject>,
    pub trial_settings: TrialSettings,
    pub recommendation_settings: RecommendationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub containers: Vec<ExperimentContainer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentContainer {
    pub container_image_name: String,
    pub container_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSettings {
    pub measurement_duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSettings {
    pub threshold: String,
}
