//! Helper library for driving the Kruize recommendation service
//!
//! This crate provides the transforms that sit between raw telemetry exports
//! and the service's JSON API:
//! - CSV normalization and per-workload aggregation
//! - Synthesis of `updateResults` / `createExperiment` documents
//! - Validation of experiment definitions before submission
//! - Structured logging of pipeline runs

pub mod error;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod record;
pub mod validate;

pub use error::{PipelineError, Result};
pub use models::*;
pub use observability::{PipelineLogger, PipelineStats};
pub use validate::{validate_experiment_input, ValidationFailure};
