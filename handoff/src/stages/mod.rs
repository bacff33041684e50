//! Stage trait and implementations.
//!
//! A stage is one concurrent worker of the pipeline. It owns the queue
//! halves it was constructed with and runs until its input is exhausted,
//! it fails, or the pipeline is cancelled.

mod context;
mod producer;
mod sink;
mod transformer;

pub use context::{error_channel, ErrorReceiver, ErrorReporter, StageContext};
pub use producer::Producer;
pub use sink::Sink;
pub use transformer::{multiply_by, Transform, Transformer};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Trait for pipeline stages.
///
/// `run` consumes the stage: a stage lives for exactly one pipeline run and
/// its queues are closed when it returns.
#[async_trait]
pub trait Stage: Send + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Runs the stage to completion.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The cancellation token and error reporter for this stage
    ///
    /// # Returns
    ///
    /// How the stage stopped.
    async fn run(self: Box<Self>, ctx: StageContext) -> StageExit;
}

/// How a stage stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageExit {
    /// The stage consumed and forwarded everything it was given.
    Finished,
    /// The stage observed cancellation and stopped early.
    Cancelled,
    /// The upstream writer went away without finishing its stream.
    UpstreamAborted,
    /// The downstream reader went away.
    DownstreamClosed,
    /// The stage reported a fatal error.
    Failed,
}

impl fmt::Display for StageExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished => write!(f, "finished"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::UpstreamAborted => write!(f, "upstream_aborted"),
            Self::DownstreamClosed => write!(f, "downstream_closed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_exit_display_matches_serde() {
        for exit in [
            StageExit::Finished,
            StageExit::Cancelled,
            StageExit::UpstreamAborted,
            StageExit::DownstreamClosed,
            StageExit::Failed,
        ] {
            let json = serde_json::to_value(exit).unwrap();
            assert_eq!(json, serde_json::Value::String(exit.to_string()));
        }
    }
}
