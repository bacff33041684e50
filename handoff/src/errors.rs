//! Error types for the handoff pipeline.
//!
//! Stage failures travel as [`StageError`] reports through the error
//! aggregator and are never raised as panics. [`PipelineError`] covers the
//! infrastructure around a run: configuration, IO and crashed workers.
//! Neither covers cancellation; a cancelled stage is not a failed one.

use crate::Item;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The cause carried by a stage's error report.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorCause {
    /// An item was rejected by the stage's validation policy.
    #[error("invalid value {value}")]
    InvalidValue {
        /// The offending item.
        value: Item,
    },

    /// A stage-specific failure.
    #[error("{message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

/// A fatal error report emitted by a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("stage '{stage}' failed: {cause}")]
pub struct StageError {
    /// Name of the stage that reported the error.
    pub stage: String,
    /// What went wrong.
    pub cause: ErrorCause,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(stage: impl Into<String>, cause: ErrorCause) -> Self {
        Self {
            stage: stage.into(),
            cause,
        }
    }

    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid_value(stage: impl Into<String>, value: Item) -> Self {
        Self::new(stage, ErrorCause::InvalidValue { value })
    }

    /// Creates a generic failure.
    #[must_use]
    pub fn failed(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            stage,
            ErrorCause::Failed {
                message: message.into(),
            },
        )
    }
}

/// Errors from a queue operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The reading side of the queue has gone away.
    #[error("queue closed: receiver dropped")]
    Closed,
}

/// Errors surfaced by a pipeline run outside of stage reports.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The logging subscriber could not be installed.
    #[error("Logging error: {0}")]
    Logging(String),

    /// A worker task panicked or was aborted.
    #[error("Worker '{worker}' did not shut down cleanly: {message}")]
    WorkerPanicked {
        /// Name of the worker.
        worker: String,
        /// The join error.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
