//! Process signals as an external cancellation source.
//!
//! An interrupt cancels the run the same way a fatal stage error does, but
//! with an `interrupted by ...` reason and without counting as an error.

use crate::cancellation::CancellationToken;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Waits for SIGINT (Ctrl-C) or, on Unix, SIGTERM and returns its name.
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    }
}

/// Spawns a listener that cancels `cancel` on the first shutdown signal.
///
/// Abort the returned handle once the run is over.
pub fn cancel_on_signal(cancel: Arc<CancellationToken>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = shutdown_signal().await;
        info!(signal, "shutdown signal received");
        cancel.cancel(format!("interrupted by {signal}"));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_does_not_cancel_without_signal() {
        let token = Arc::new(CancellationToken::new());
        let listener = cancel_on_signal(token.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!token.is_cancelled());

        listener.abort();
        assert!(listener.await.unwrap_err().is_cancelled());
    }
}
