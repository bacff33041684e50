//! Cancellation token for cooperative cancellation.

use std::sync::OnceLock;
use tokio::sync::Notify;
use tracing::debug;

/// A one-shot, broadcast stop signal with a reason.
///
/// Cancellation is idempotent: only the first cancellation reason is kept,
/// and a cancelled token never becomes active again.
///
/// The reason lives in a `OnceLock`: it is written once, and its presence
/// is the cancelled state.
#[derive(Default)]
pub struct CancellationToken {
    /// The reason for cancellation (first one wins).
    reason: OnceLock<String>,
    /// Wakes every task parked in [`CancellationToken::cancelled`].
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new, active token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with a reason.
    ///
    /// Returns `true` if this call performed the transition and `false` if
    /// the token was already cancelled, in which case the reason is ignored.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        if self.reason.set(reason).is_err() {
            return false;
        }
        debug!(reason = ?self.reason.get(), "cancellation requested");
        self.notify.notify_waiters();
        true
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason.get().is_some()
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.get().cloned()
    }

    /// Completes once the token is cancelled.
    ///
    /// Resolves immediately if cancellation already happened. Safe to use as
    /// a `tokio::select!` branch.
    pub async fn cancelled(&self) {
        // Register interest before checking the flag so a concurrent
        // `cancel` cannot slip between the check and the wait.
        let notified = self.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
