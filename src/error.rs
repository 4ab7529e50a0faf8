//! Defines the error taxonomy shared by every dataflow operation.
//!
//! All failures are caller-contract violations or data-quality issues and
//! propagate synchronously to the immediate caller; no variant is retried
//! internally.

use crate::frame::ColLabel;
use crate::node::Phase;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataflowError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataflowError {
    /// Malformed construction arguments: bad mode value, overlapping or
    /// mismatched column groups, depth mismatch, unknown column or node id.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing values present where the NaN policy forbids them.
    #[error("NaNs detected at rows {rows:?}")]
    NaNDetected { rows: Vec<i64> },

    /// An output table would contain a repeated column label.
    #[error("Duplicate column `{column}` in output")]
    DuplicateColumn { column: ColLabel },

    /// `predict` invoked before any successful `fit`.
    #[error("Model is not fitted; call fit() before predict()")]
    NotFitted,

    /// A DAG-wide state restore was given a mapping whose keys do not match
    /// the DAG's node identifiers.
    #[error("Fit-state key set does not match DAG nodes (missing: {missing:?}, unexpected: {unexpected:?})")]
    NodeSetMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// A snapshot or info record was requested for a phase that never ran.
    #[error("No info recorded for phase `{phase}`")]
    KeyMissing { phase: Phase },

    /// A matrix or table had dimensions incompatible with the operation.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}
