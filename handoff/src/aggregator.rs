//! Fan-in of per-stage error channels.
//!
//! Every source gets its own relay task. Each relay holds a clone of the
//! merged sender; the original is dropped as soon as the relays are
//! spawned, so the merged channel closes exactly when the last relay
//! finishes: once every source has closed and every report it carried has
//! been pushed or abandoned.

use crate::cancellation::CancellationToken;
use crate::errors::StageError;
use crate::stages::ErrorReceiver;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// The merged error stream and the relays feeding it.
#[derive(Debug)]
pub struct MergedErrors {
    /// Reports from every source, in arrival order.
    pub errors: mpsc::Receiver<StageError>,
    /// One relay per source, in source order.
    pub relays: Vec<JoinHandle<()>>,
}

/// Merges any number of error channels into one.
///
/// Relays forward reports first-arrived-first-relayed; there is no ordering
/// across sources. A relay waiting to push a report gives up when the run is
/// cancelled or when the merged receiver has been dropped.
pub fn merge_errors(
    cancel: Arc<CancellationToken>,
    sources: impl IntoIterator<Item = ErrorReceiver>,
) -> MergedErrors {
    let (tx, errors) = mpsc::channel(1);

    let relays = sources
        .into_iter()
        .enumerate()
        .map(|(index, source)| tokio::spawn(relay(index, source, tx.clone(), cancel.clone())))
        .collect();

    MergedErrors { errors, relays }
}

async fn relay(
    index: usize,
    mut source: ErrorReceiver,
    merged: mpsc::Sender<StageError>,
    cancel: Arc<CancellationToken>,
) {
    let mut relayed = 0usize;
    while let Some(report) = source.recv().await {
        let pushed = tokio::select! {
            biased;
            sent = merged.send(report) => sent.is_ok(),
            () = cancel.cancelled() => false,
        };
        if !pushed {
            debug!(relay = index, "error relay stopped before the source closed");
            return;
        }
        relayed += 1;
    }
    trace!(relay = index, relayed, "error source closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCause;
    use crate::stages::error_channel;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test]
    async fn test_no_sources_closes_immediately() {
        let token = Arc::new(CancellationToken::new());
        let mut merged = merge_errors(token, Vec::new());

        assert!(merged.relays.is_empty());
        assert_eq!(merged.errors.recv().await, None);
    }

    #[tokio::test]
    async fn test_relays_every_report_exactly_once() {
        let token = Arc::new(CancellationToken::new());
        let (a, a_rx) = error_channel("a");
        let (b, b_rx) = error_channel("b");
        let (c, c_rx) = error_channel("c");

        let mut merged = merge_errors(token, vec![a_rx, b_rx, c_rx]);

        a.report(ErrorCause::InvalidValue { value: 1 });
        drop(b);
        c.report(ErrorCause::Failed {
            message: "c broke".to_string(),
        });

        let mut stages = Vec::new();
        while let Some(report) = merged.errors.recv().await {
            stages.push(report.stage);
        }
        stages.sort();

        assert_eq!(stages, vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_stays_open_until_every_source_closes() {
        let token = Arc::new(CancellationToken::new());
        let (early, early_rx) = error_channel("early");
        let (late, late_rx) = error_channel("late");

        let mut merged = merge_errors(token, vec![early_rx, late_rx]);

        early.report(ErrorCause::InvalidValue { value: 6 });
        assert_eq!(
            merged.errors.recv().await,
            Some(StageError::invalid_value("early", 6))
        );

        // "late" is still open: the merged stream must not close yet.
        let pending = tokio::time::timeout(Duration::from_millis(50), merged.errors.recv()).await;
        assert!(pending.is_err());

        drop(late);
        assert_eq!(merged.errors.recv().await, None);
    }

    #[tokio::test]
    async fn test_relay_gives_up_when_cancelled() {
        let token = Arc::new(CancellationToken::new());
        let (a, a_rx) = error_channel("a");
        let (b, b_rx) = error_channel("b");

        let merged = merge_errors(token.clone(), vec![a_rx, b_rx]);

        // Nobody reads the merged stream: the first report fills it, the
        // second relay has to wait.
        a.report(ErrorCause::InvalidValue { value: 1 });
        b.report(ErrorCause::InvalidValue { value: 2 });
        tokio::time::sleep(Duration::from_millis(20)).await;

        token.cancel("driver stopped listening");

        for relay in merged.relays {
            tokio::time::timeout(Duration::from_secs(1), relay)
                .await
                .expect("relay should stop after cancellation")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_relay_gives_up_when_receiver_dropped() {
        let token = Arc::new(CancellationToken::new());
        let (a, a_rx) = error_channel("a");

        let MergedErrors { errors, relays } = merge_errors(token, vec![a_rx]);
        drop(errors);

        a.report(ErrorCause::InvalidValue { value: 1 });

        for relay in relays {
            tokio::time::timeout(Duration::from_secs(1), relay)
                .await
                .expect("relay should stop once the merged receiver is gone")
                .unwrap();
        }
    }
}
