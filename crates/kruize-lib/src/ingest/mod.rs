//! Ingestion of exported telemetry CSVs
//!
//! Raw exporter rows are normalized (bare pods dropped, workload identity
//! derived) and then aggregated so that each container of a workload has a
//! single row per interval. Reading and writing CSV happens here at the
//! boundary; the transforms themselves never touch the filesystem.

mod aggregate;
mod normalize;

#[cfg(test)]
mod tests;

pub use aggregate::{aggregate, group_rows, Reduction, WorkloadGroup};
pub use normalize::{derive_object_name, derive_object_type, normalize, NormalizeOutcome};

use crate::error::Result;
use crate::models::{AggregatedMetric, MetricRow, MetricTable};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read a CSV with a header row
pub fn read_csv_from<R: Read>(reader: R) -> Result<MetricTable> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let columns: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
    let mut table = MetricTable::new(columns);

    for record in rdr.records() {
        let record = record?;
        table.push_row(MetricRow::new(record.iter().map(String::from).collect()))?;
    }

    Ok(table)
}

pub fn read_csv(path: &Path) -> Result<MetricTable> {
    let file = File::open(path)?;
    let table = read_csv_from(file)?;
    debug!(path = %path.display(), rows = table.len(), "Read CSV");
    Ok(table)
}

pub fn write_csv_to<W: Write>(writer: W, table: &MetricTable) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(row.cells())?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv(path: &Path, table: &MetricTable) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_csv_to(File::create(path)?, table)?;
    debug!(path = %path.display(), rows = table.len(), "Wrote CSV");
    Ok(())
}

fn is_group_file(name: &str) -> bool {
    name.strip_prefix("file_")
        .and_then(|rest| rest.strip_suffix(".csv"))
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Remove `file_<n>.csv` left in `dir` by an earlier run
fn clear_group_files(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let stale = entry.file_name().to_str().map(is_group_file).unwrap_or(false);
        if stale && entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            debug!(path = %entry.path().display(), "Removed stale group file");
        }
    }
    Ok(())
}

/// Write each group to `file_<n>.csv` in `dir`, numbered from 1 in key order.
/// Group files from a previous run are removed first.
pub fn write_group_files(
    dir: &Path,
    columns: &[String],
    groups: &[WorkloadGroup],
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    clear_group_files(dir)?;

    let mut written = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let path = dir.join(format!("file_{}.csv", i + 1));
        let table = MetricTable::from_rows(columns.to_vec(), group.rows.clone())?;
        write_csv(&path, &table)?;
        written.push(path);
    }

    Ok(written)
}

/// Table holding one representative row per aggregated group
pub fn aggregated_table(columns: &[String], aggregated: &[AggregatedMetric]) -> Result<MetricTable> {
    MetricTable::from_rows(
        columns.to_vec(),
        aggregated.iter().map(|a| a.row.clone()).collect(),
    )
}
