//! Pipeline wiring and execution.
//!
//! This module provides:
//! - The default producer → transformer → sink wiring from a `PipelineConfig`
//! - Execution of any set of stages under one driver and cancellation token
//! - The run report returned once every worker has shut down

mod report;
mod runner;

pub use report::{RunReport, StageRecord};
pub use runner::Pipeline;
