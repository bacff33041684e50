//! # Handoff
//!
//! A small concurrent pipeline of independent stages connected by
//! point-to-point handoff queues.
//!
//! Handoff provides:
//!
//! - **Stages**: a producer, a transformer and a sink, each running as its own task
//! - **Handoff queues**: single-writer, single-reader queues with explicit end-of-stream
//! - **Cancellation**: one broadcast token with a reason, observed at every suspension point
//! - **Error aggregation**: per-stage error reports fanned in to a single stream
//! - **Driver**: multiplexes errors and completion to decide the run's outcome
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use handoff::prelude::*;
//!
//! let config = PipelineConfig::new()
//!     .with_items(vec![0, 1, 2, 3, 4, 5])
//!     .with_fail_on_value(None);
//!
//! let report = Pipeline::new(config)
//!     .with_recorder(Arc::new(StdoutRecorder))
//!     .run()
//!     .await?;
//!
//! assert!(report.outcome.is_completed());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod aggregator;
pub mod cancellation;
pub mod config;
pub mod driver;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod queue;
pub mod recorder;
pub mod signal;
pub mod stages;

/// A value flowing through the pipeline.
pub type Item = i64;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregator::{merge_errors, MergedErrors};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::PipelineConfig;
    pub use crate::driver::{Driver, ErrorPolicy, Outcome, Verdict};
    pub use crate::errors::{ErrorCause, PipelineError, QueueError, StageError};
    pub use crate::pipeline::{Pipeline, RunReport, StageRecord};
    pub use crate::queue::{handoff, QueueReceiver, QueueSender, Recv};
    pub use crate::recorder::{LoggingRecorder, MemoryRecorder, Recorder, StdoutRecorder};
    pub use crate::stages::{
        multiply_by, ErrorReporter, Producer, Sink, Stage, StageContext, StageExit, Transform,
        Transformer,
    };
    pub use crate::Item;
    pub use std::sync::Arc;
}
