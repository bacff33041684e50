//! The summary of one pipeline run.

use crate::driver::Outcome;
use crate::errors::StageError;
use crate::stages::StageExit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a single stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage name.
    pub stage: String,
    /// How it stopped.
    pub exit: StageExit,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique id of the run, also recorded on the run's tracing span.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds, including shutdown.
    pub duration_ms: f64,
    /// The driver's terminal decision.
    pub outcome: Outcome,
    /// Every error report the driver received.
    pub errors: Vec<StageError>,
    /// How each stage ended, in wiring order.
    pub stages: Vec<StageRecord>,
}

impl RunReport {
    /// Returns the exit of the named stage.
    #[must_use]
    pub fn stage_exit(&self, stage: &str) -> Option<StageExit> {
        self.stages
            .iter()
            .find(|record| record.stage == stage)
            .map(|record| record.exit)
    }

    /// Returns the line printed for the outcome, if it prints one.
    ///
    /// A cancelled run prints nothing.
    #[must_use]
    pub fn status_line(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Completed => Some("successfully finished processing".to_string()),
            Outcome::Errored { error } => Some(format!("pipeline error: {error}")),
            Outcome::Cancelled { .. } => None,
        }
    }
}
