//! The driver: decides how a pipeline run ends.
//!
//! The driver waits on two event sources, the merged error stream and the
//! sink's completion signal, and is the only place that turns a stage
//! error into a pipeline-wide cancellation.
//!
//! The driver also watches the shared cancellation token. An external
//! cancellation that arrives before any error report ends the run as
//! CANCELLED right away, without waiting for the stages to unwind.
//!
//! A source that is exhausted (the merged stream closed, or the completion
//! sender dropped without signalling) is removed from the wait set. When
//! both are exhausted the run ended without completing: it is ERRORED if any
//! report arrived and CANCELLED otherwise.

use crate::cancellation::CancellationToken;
use crate::errors::StageError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

/// What the driver does when an error report arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Cancel the run and end it as errored right away (default).
    #[default]
    StopOnFirstError,
    /// Cancel the run but keep waiting; a completion that still arrives
    /// ends the run as completed.
    CancelAndDrain,
}

/// The terminal state of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Outcome {
    /// The sink drained its input and signalled completion.
    Completed,
    /// A stage reported a fatal error.
    Errored {
        /// The first error the driver received.
        error: StageError,
    },
    /// The run was cancelled from outside before it could complete.
    Cancelled {
        /// The cancellation reason, if the token carried one.
        reason: Option<String>,
    },
}

impl Outcome {
    /// Returns true if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the run ended on a stage error.
    #[must_use]
    pub fn is_errored(&self) -> bool {
        matches!(self, Self::Errored { .. })
    }

    /// Returns true if the run was cancelled from outside.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns the terminal error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&StageError> {
        match self {
            Self::Errored { error } => Some(error),
            _ => None,
        }
    }
}

/// The driver's decision plus every report it received on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The terminal state.
    pub outcome: Outcome,
    /// Every error report received, in arrival order.
    pub errors: Vec<StageError>,
}

/// The control loop of a pipeline run.
#[derive(Debug, Clone)]
pub struct Driver {
    cancel: Arc<CancellationToken>,
    policy: ErrorPolicy,
}

impl Driver {
    /// Creates a driver that cancels `cancel` on the first error report.
    #[must_use]
    pub fn new(cancel: Arc<CancellationToken>) -> Self {
        Self {
            cancel,
            policy: ErrorPolicy::default(),
        }
    }

    /// Sets the error policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the error policy.
    #[must_use]
    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Runs the control loop until a terminal state is reached.
    ///
    /// Blocks until an error, the completion signal or a cancellation
    /// arrives; there is no timeout. Once an error has been received the
    /// token is cancelled by the driver itself, so under
    /// [`ErrorPolicy::CancelAndDrain`] the loop keeps waiting on the two
    /// sources instead.
    pub async fn drive(
        &self,
        errors: &mut mpsc::Receiver<StageError>,
        mut completion: oneshot::Receiver<()>,
    ) -> Verdict {
        let mut received: Vec<StageError> = Vec::new();
        let mut errors_open = true;
        let mut completion_open = true;
        let mut cancel_seen = false;

        loop {
            tokio::select! {
                biased;
                report = errors.recv(), if errors_open => match report {
                    Some(report) => {
                        error!(stage = %report.stage, error = %report.cause, "pipeline error");
                        self.cancel.cancel(report.to_string());
                        received.push(report.clone());
                        if self.policy == ErrorPolicy::StopOnFirstError {
                            return Verdict {
                                outcome: Outcome::Errored { error: report },
                                errors: received,
                            };
                        }
                    }
                    None => errors_open = false,
                },
                done = &mut completion, if completion_open => match done {
                    Ok(()) => {
                        info!(errors = received.len(), "pipeline completed");
                        return Verdict {
                            outcome: Outcome::Completed,
                            errors: received,
                        };
                    }
                    Err(_) => completion_open = false,
                },
                () = self.cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    if received.is_empty() {
                        break;
                    }
                }
                else => break,
            }
        }

        let outcome = match received.first() {
            Some(first) => Outcome::Errored {
                error: first.clone(),
            },
            None => {
                let reason = self.cancel.reason();
                warn!(reason = reason.as_deref().unwrap_or("none"), "pipeline cancelled");
                Outcome::Cancelled { reason }
            }
        };
        Verdict {
            outcome,
            errors: received,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn channels() -> (
        mpsc::Sender<StageError>,
        mpsc::Receiver<StageError>,
        oneshot::Sender<()>,
        oneshot::Receiver<()>,
    ) {
        let (err_tx, err_rx) = mpsc::channel(4);
        let (done_tx, done_rx) = oneshot::channel();
        (err_tx, err_rx, done_tx, done_rx)
    }

    #[tokio::test]
    async fn test_completion_ends_run() {
        let token = Arc::new(CancellationToken::new());
        let (_err_tx, mut err_rx, done_tx, done_rx) = channels();

        done_tx.send(()).unwrap();
        let verdict = Driver::new(token.clone()).drive(&mut err_rx, done_rx).await;

        assert_eq!(verdict.outcome, Outcome::Completed);
        assert!(verdict.errors.is_empty());
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_completion_after_errors_closed() {
        let token = Arc::new(CancellationToken::new());
        let (err_tx, mut err_rx, done_tx, done_rx) = channels();

        drop(err_tx);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            done_tx.send(()).unwrap();
        });

        let verdict = Driver::new(token).drive(&mut err_rx, done_rx).await;
        assert!(verdict.outcome.is_completed());
    }

    #[tokio::test]
    async fn test_first_error_cancels_and_stops() {
        let token = Arc::new(CancellationToken::new());
        let (err_tx, mut err_rx, _done_tx, done_rx) = channels();

        err_tx.send(StageError::invalid_value("transformer", 6)).await.unwrap();

        let verdict = Driver::new(token.clone()).drive(&mut err_rx, done_rx).await;

        assert_eq!(
            verdict.outcome,
            Outcome::Errored {
                error: StageError::invalid_value("transformer", 6)
            }
        );
        assert_eq!(verdict.errors.len(), 1);
        assert!(token.is_cancelled());
        assert_eq!(
            token.reason().as_deref(),
            Some("stage 'transformer' failed: invalid value 6")
        );
    }

    #[tokio::test]
    async fn test_error_wins_over_simultaneous_completion() {
        let token = Arc::new(CancellationToken::new());
        let (err_tx, mut err_rx, done_tx, done_rx) = channels();

        err_tx.send(StageError::invalid_value("transformer", 6)).await.unwrap();
        done_tx.send(()).unwrap();

        let verdict = Driver::new(token).drive(&mut err_rx, done_rx).await;
        assert!(verdict.outcome.is_errored());
    }

    #[tokio::test]
    async fn test_cancel_and_drain_still_completes() {
        let token = Arc::new(CancellationToken::new());
        let (err_tx, mut err_rx, done_tx, done_rx) = channels();

        err_tx.send(StageError::failed("producer", "flaky")).await.unwrap();
        drop(err_tx);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            done_tx.send(()).unwrap();
        });

        let driver = Driver::new(token.clone()).with_policy(ErrorPolicy::CancelAndDrain);
        assert_eq!(driver.policy(), ErrorPolicy::CancelAndDrain);
        let verdict = driver.drive(&mut err_rx, done_rx).await;

        assert_eq!(verdict.outcome, Outcome::Completed);
        assert_eq!(verdict.errors, vec![StageError::failed("producer", "flaky")]);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_and_drain_without_completion_is_errored() {
        let token = Arc::new(CancellationToken::new());
        let (err_tx, mut err_rx, done_tx, done_rx) = channels();

        err_tx.send(StageError::invalid_value("transformer", 6)).await.unwrap();
        err_tx.send(StageError::failed("sink", "late")).await.unwrap();
        drop(err_tx);
        drop(done_tx);

        let verdict = Driver::new(token)
            .with_policy(ErrorPolicy::CancelAndDrain)
            .drive(&mut err_rx, done_rx)
            .await;

        assert_eq!(verdict.outcome.error(), Some(&StageError::invalid_value("transformer", 6)));
        assert_eq!(verdict.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_external_cancellation_is_not_an_error() {
        let token = Arc::new(CancellationToken::new());
        let (err_tx, mut err_rx, done_tx, done_rx) = channels();

        token.cancel("interrupted by SIGINT");
        drop(err_tx);
        drop(done_tx);

        let verdict = Driver::new(token).drive(&mut err_rx, done_rx).await;

        assert_eq!(
            verdict.outcome,
            Outcome::Cancelled {
                reason: Some("interrupted by SIGINT".to_string())
            }
        );
        assert!(verdict.outcome.error().is_none());
        assert!(verdict.errors.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_ends_run_while_sources_stay_open() {
        let token = Arc::new(CancellationToken::new());
        // Both senders stay alive, as with a stage that ignores the token.
        let (_err_tx, mut err_rx, _done_tx, done_rx) = channels();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel("interrupted by SIGTERM");
        });

        let verdict = tokio::time::timeout(
            Duration::from_secs(1),
            Driver::new(token).drive(&mut err_rx, done_rx),
        )
        .await
        .expect("driver should return once the token is cancelled");

        assert_eq!(
            verdict.outcome,
            Outcome::Cancelled {
                reason: Some("interrupted by SIGTERM".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_cancel_and_drain_ignores_its_own_cancellation() {
        let token = Arc::new(CancellationToken::new());
        let (err_tx, mut err_rx, done_tx, done_rx) = channels();

        err_tx.send(StageError::invalid_value("transformer", 6)).await.unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            done_tx.send(()).unwrap();
        });

        let verdict = Driver::new(token)
            .with_policy(ErrorPolicy::CancelAndDrain)
            .drive(&mut err_rx, done_rx)
            .await;

        // The token is cancelled by the error itself, the driver keeps going.
        assert_eq!(verdict.outcome, Outcome::Completed);
        assert_eq!(verdict.errors.len(), 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(Outcome::Cancelled { reason: None }).unwrap();
        assert_eq!(json, serde_json::json!({"state": "cancelled", "reason": null}));

        let policy: ErrorPolicy = serde_json::from_str("\"cancel_and_drain\"").unwrap();
        assert_eq!(policy, ErrorPolicy::CancelAndDrain);
    }
}
