//! Synthesis of service payloads from metric rows
//!
//! Each CSV row (aggregated or raw per-interval) becomes one `updateResults`
//! record. A metric is only emitted when its presence column carries a
//! value: a blank means the metric was not collected for the interval, and
//! sending zero instead would read as an idle resource that can be sized
//! down to nothing.

mod experiment;
mod metrics;
mod timestamp;


pub use experiment::{
    experiments_for_rows, find_match, match_workload, ExperimentMatch, ExperimentSettings,
    ExperimentSummary, SummaryContainer, SummaryObject, WorkloadIdentity,
};
pub use metrics::{MetricKind, MetricStats, MetricUnit, Stat, MEBIBYTE};
pub use timestamp::{convert_date_format, format_timestamp, parse_timestamp, SERVICE_FORMAT};

use crate::error::{PipelineError, Result};
use crate::models::{
    columns, experiment_name, ContainerResults, ExperimentRecord, KubernetesObject, MetricEntry,
    MetricResults, MetricTable, RowView, API_VERSION,
};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Typed view of one metric row, with an explicit slot per metric family
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRow {
    pub k8_object_type: String,
    pub k8_object_name: String,
    pub namespace: String,
    pub container_name: String,
    pub image_name: String,
    pub interval_start: DateTime<Utc>,
    pub interval_end: DateTime<Utc>,
    pub cpu_request: Option<MetricStats>,
    pub cpu_limit: Option<MetricStats>,
    pub cpu_throttle: Option<MetricStats>,
    pub cpu_usage: Option<MetricStats>,
    pub memory_request: Option<MetricStats>,
    pub memory_limit: Option<MetricStats>,
    pub memory_usage: Option<MetricStats>,
    pub memory_rss: Option<MetricStats>,
    pub accelerator_core_usage: Option<MetricStats>,
    pub accelerator_memory_usage: Option<MetricStats>,
    pub accelerator_frame_buffer_usage: Option<MetricStats>,
}

impl UsageRow {
    pub fn from_row(row: RowView<'_>) -> Result<Self> {
        let mut usage = UsageRow {
            k8_object_type: row.get(columns::K8_OBJECT_TYPE)?.to_string(),
            k8_object_name: row.get(columns::K8_OBJECT_NAME)?.to_string(),
            namespace: row.get(columns::NAMESPACE)?.to_string(),
            container_name: row.get(columns::CONTAINER_NAME)?.to_string(),
            image_name: row.get(columns::IMAGE_NAME)?.to_string(),
            interval_start: parse_timestamp(row.get(columns::INTERVAL_START)?)?,
            interval_end: parse_timestamp(row.get(columns::INTERVAL_END)?)?,
            cpu_request: None,
            cpu_limit: None,
            cpu_throttle: None,
            cpu_usage: None,
            memory_request: None,
            memory_limit: None,
            memory_usage: None,
            memory_rss: None,
            accelerator_core_usage: None,
            accelerator_memory_usage: None,
            accelerator_frame_buffer_usage: None,
        };

        for kind in MetricKind::ALL {
            *usage.metric_mut(kind) = read_metric(&row, kind)?;
        }

        Ok(usage)
    }

    pub fn metric(&self, kind: MetricKind) -> Option<&MetricStats> {
        match kind {
            MetricKind::CpuRequest => self.cpu_request.as_ref(),
            MetricKind::CpuLimit => self.cpu_limit.as_ref(),
            MetricKind::CpuThrottle => self.cpu_throttle.as_ref(),
            MetricKind::CpuUsage => self.cpu_usage.as_ref(),
            MetricKind::MemoryRequest => self.memory_request.as_ref(),
            MetricKind::MemoryLimit => self.memory_limit.as_ref(),
            MetricKind::MemoryUsage => self.memory_usage.as_ref(),
            MetricKind::MemoryRss => self.memory_rss.as_ref(),
            MetricKind::AcceleratorCoreUsage => self.accelerator_core_usage.as_ref(),
            MetricKind::AcceleratorMemoryUsage => self.accelerator_memory_usage.as_ref(),
            MetricKind::AcceleratorFrameBufferUsage => self.accelerator_frame_buffer_usage.as_ref(),
        }
    }

    fn metric_mut(&mut self, kind: MetricKind) -> &mut Option<MetricStats> {
        match kind {
            MetricKind::CpuRequest => &mut self.cpu_request,
            MetricKind::CpuLimit => &mut self.cpu_limit,
            MetricKind::CpuThrottle => &mut self.cpu_throttle,
            MetricKind::CpuUsage => &mut self.cpu_usage,
            MetricKind::MemoryRequest => &mut self.memory_request,
            MetricKind::MemoryLimit => &mut self.memory_limit,
            MetricKind::MemoryUsage => &mut self.memory_usage,
            MetricKind::MemoryRss => &mut self.memory_rss,
            MetricKind::AcceleratorCoreUsage => &mut self.accelerator_core_usage,
            MetricKind::AcceleratorMemoryUsage => &mut self.accelerator_memory_usage,
            MetricKind::AcceleratorFrameBufferUsage => &mut self.accelerator_frame_buffer_usage,
        }
    }

    pub fn experiment_name(&self) -> String {
        experiment_name(&self.k8_object_name, &self.k8_object_type, &self.namespace)
    }

    pub fn identity(&self) -> WorkloadIdentity {
        WorkloadIdentity {
            k8_object_type: self.k8_object_type.clone(),
            k8_object_name: self.k8_object_name.clone(),
            namespace: self.namespace.clone(),
            container_name: self.container_name.clone(),
        }
    }

    /// Build the `updateResults` record: one object, one container
    pub fn to_record(&self) -> ExperimentRecord {
        let metrics = MetricKind::ALL
            .iter()
            .filter_map(|&kind| {
                self.metric(kind).map(|stats| MetricEntry {
                    name: kind.api_name().to_string(),
                    results: MetricResults {
                        aggregation_info: stats.to_aggregation_info(kind.unit()),
                    },
                })
            })
            .collect();

        ExperimentRecord {
            version: API_VERSION.to_string(),
            experiment_name: self.experiment_name(),
            interval_start_time: format_timestamp(&self.interval_start),
            interval_end_time: format_timestamp(&self.interval_end),
            kubernetes_objects: vec![KubernetesObject {
                kind: self.k8_object_type.clone(),
                name: self.k8_object_name.clone(),
                namespace: self.namespace.clone(),
                containers: vec![ContainerResults {
                    container_image_name: self.image_name.clone(),
                    container_name: self.container_name.clone(),
                    metrics,
                }],
            }],
        }
    }
}

fn read_metric(row: &RowView<'_>, kind: MetricKind) -> Result<Option<MetricStats>> {
    // a family with no presence column was never exported
    let present = row
        .get_opt(&kind.column(kind.presence()))
        .is_some_and(|cell| !cell.trim().is_empty());
    if !present {
        return Ok(None);
    }

    let mut stats = MetricStats::default();
    for &stat in kind.stats() {
        let column = kind.column(stat);
        let cell = row.get(&column)?;
        let value = cell.trim().parse().map_err(|_| PipelineError::InvalidNumber {
            column: column.clone(),
            value: cell.to_string(),
        })?;
        stats.set(stat, value);
    }
    Ok(Some(stats))
}

/// Parse every row of a metrics table
pub fn usage_rows(table: &MetricTable) -> Result<Vec<UsageRow>> {
    table.iter().map(UsageRow::from_row).collect()
}

/// One `updateResults` record per row, in row order
pub fn synthesize(table: &MetricTable) -> Result<Vec<ExperimentRecord>> {
    let records: Vec<ExperimentRecord> = usage_rows(table)?
        .iter()
        .map(UsageRow::to_record)
        .collect();
    debug!(records = records.len(), "Synthesized experiment records");
    Ok(records)
}

/// Write a payload as a JSON array
pub fn write_json<T: serde::Serialize>(path: &Path, payload: &[T]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, payload)?;
    writer.flush()?;
    Ok(())
}
