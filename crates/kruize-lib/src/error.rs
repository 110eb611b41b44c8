//! Error types for the CSV/JSON transforms

use thiserror::Error;

/// Errors raised while reading, transforming or writing metric data.
///
/// Everything here is a data-shape problem at the source: none of these are
/// retried and the offending file has to be fixed upstream.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An expected column is not in the CSV header
    #[error("missing expected column '{0}'")]
    MissingColumn(String),

    /// A metric cell holds something that is not a number
    #[error("invalid number '{value}' in column '{column}'")]
    InvalidNumber { column: String, value: String },

    /// None of the known timestamp layouts matched
    #[error("Unrecognized date format: {0}")]
    UnrecognizedDate(String),

    /// A row has a different number of cells than the header
    #[error("row {row} has {found} cells, header has {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
