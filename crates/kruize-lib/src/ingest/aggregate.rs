//! Per-workload aggregation of normalized rows

use crate::error::{PipelineError, Result};
use crate::models::{columns, AggregatedMetric, MetricRow, MetricTable, WorkloadKey};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// How a numeric column is reduced when rows are merged, chosen by the
/// column name's suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    Min,
    Max,
    Sum,
}

impl Reduction {
    pub fn for_column(name: &str) -> Option<Self> {
        if name.ends_with("_avg") {
            Some(Self::Mean)
        } else if name.ends_with("_min") {
            Some(Self::Min)
        } else if name.ends_with("_max") {
            Some(Self::Max)
        } else if name.ends_with("_sum") {
            Some(Self::Sum)
        } else {
            None
        }
    }

    /// Reduce the samples, or `None` when there are none
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            Self::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            Self::Min => values.iter().copied().reduce(f64::min),
            Self::Max => values.iter().copied().reduce(f64::max),
            Self::Sum => Some(values.iter().sum()),
        }
    }
}

/// Rows sharing one workload key
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadGroup {
    pub key: WorkloadKey,
    pub rows: Vec<MetricRow>,
}

/// Group normalized rows by workload key, in key order
pub fn group_rows(table: &MetricTable) -> Result<Vec<WorkloadGroup>> {
    let namespace = table.require_column(columns::NAMESPACE)?;
    let object_type = table.require_column(columns::K8_OBJECT_TYPE)?;
    let object_name = table.require_column(columns::K8_OBJECT_NAME)?;
    let container = table.require_column(columns::CONTAINER_NAME)?;
    let interval_start = table.require_column(columns::INTERVAL_START)?;

    let mut groups: BTreeMap<WorkloadKey, Vec<MetricRow>> = BTreeMap::new();
    for row in table.rows() {
        let key = WorkloadKey {
            namespace: row.cell(namespace).to_string(),
            k8_object_type: row.cell(object_type).to_string(),
            k8_object_name: row.cell(object_name).to_string(),
            container_name: row.cell(container).to_string(),
            interval_start: row.cell(interval_start).to_string(),
        };
        groups.entry(key).or_default().push(row.clone());
    }

    Ok(groups
        .into_iter()
        .map(|(key, rows)| WorkloadGroup { key, rows })
        .collect())
}

/// Collapse every workload group to a single row with reduced metric columns
pub fn aggregate(table: &MetricTable) -> Result<Vec<AggregatedMetric>> {
    let groups = group_rows(table)?;
    debug!(groups = groups.len(), rows = table.len(), "Aggregating workload groups");

    groups
        .iter()
        .map(|group| reduce_group(table.columns(), group))
        .collect()
}

fn reduce_group(header: &[String], group: &WorkloadGroup) -> Result<AggregatedMetric> {
    // groups are never empty: each one is created by the row that keys it
    let mut representative = group.rows.first().cloned().unwrap_or_default();

    for (i, column) in header.iter().enumerate() {
        match Reduction::for_column(column) {
            Some(reduction) => {
                let mut samples = Vec::with_capacity(group.rows.len());
                for row in &group.rows {
                    if let Some(value) = parse_sample(column, row.cell(i))? {
                        samples.push(value);
                    }
                }
                let reduced = reduction
                    .apply(&samples)
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                representative.set(i, reduced);
            }
            None if columns::POD_IDENTITY.contains(&column.as_str()) => {}
            None => {
                let first = representative.cell(i);
                if group.rows.iter().any(|row| row.cell(i) != first) {
                    warn!(
                        column = %column,
                        experiment = %group.key.experiment_name(),
                        container = %group.key.container_name,
                        "Column varies within workload group, keeping first value"
                    );
                }
            }
        }
    }

    Ok(AggregatedMetric {
        key: group.key.clone(),
        row: representative,
    })
}

/// Parse a metric cell; blanks and NaN are missing samples
fn parse_sample(column: &str, cell: &str) -> Result<Option<f64>> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: f64 = trimmed.parse().map_err(|_| PipelineError::InvalidNumber {
        column: column.to_string(),
        value: cell.to_string(),
    })?;
    Ok(if value.is_nan() { None } else { Some(value) })
}
