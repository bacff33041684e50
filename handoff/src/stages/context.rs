//! The per-stage execution context.

use crate::cancellation::CancellationToken;
use crate::errors::{ErrorCause, StageError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// The receiving end of one stage's error channel.
pub type ErrorReceiver = mpsc::Receiver<StageError>;

/// Creates the error channel for a stage.
///
/// The channel holds a single report, which is all a stage may ever send,
/// so reporting never waits on the aggregator.
#[must_use]
pub fn error_channel(stage: impl Into<String>) -> (ErrorReporter, ErrorReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (
        ErrorReporter {
            stage: stage.into(),
            tx,
        },
        rx,
    )
}

/// A stage's handle for its single fatal error report.
///
/// Reporting consumes the handle, so a stage can emit at most one report.
/// Dropping it closes the stage's error channel.
#[derive(Debug)]
pub struct ErrorReporter {
    stage: String,
    tx: mpsc::Sender<StageError>,
}

impl ErrorReporter {
    /// Returns the name of the stage this reporter belongs to.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Emits the stage's fatal error report and closes the channel.
    pub fn report(self, cause: ErrorCause) {
        let error = StageError::new(self.stage, cause);
        warn!(stage = %error.stage, error = %error.cause, "stage reported a fatal error");
        if let Err(e) = self.tx.try_send(error) {
            // Only possible once the aggregator has stopped listening.
            debug!(error = %e, "error report dropped");
        }
    }
}

/// Everything a running stage is handed besides its own queues.
#[derive(Debug)]
pub struct StageContext {
    cancel: Arc<CancellationToken>,
    reporter: ErrorReporter,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(cancel: Arc<CancellationToken>, reporter: ErrorReporter) -> Self {
        Self { cancel, reporter }
    }

    /// Returns the stage name the context was created for.
    #[must_use]
    pub fn stage(&self) -> &str {
        self.reporter.stage()
    }

    /// Returns the shared cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Returns whether the pipeline has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes once the pipeline is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Reports a fatal error, consuming the context.
    pub fn report(self, cause: ErrorCause) {
        self.reporter.report(cause);
    }
}
