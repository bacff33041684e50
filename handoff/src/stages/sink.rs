//! The sink stage: records items and signals completion.

use super::{Stage, StageContext, StageExit};
use crate::queue::{QueueReceiver, Recv};
use crate::recorder::Recorder;
use crate::Item;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Terminal stage: hands every item to a [`Recorder`].
///
/// Completion is signalled exactly once, and only when the input stream
/// finished normally. On cancellation or an aborted input the completion
/// sender is dropped unsent, which the driver reads as "no completion".
pub struct Sink {
    name: String,
    input: QueueReceiver<Item>,
    recorder: Arc<dyn Recorder>,
    completion: oneshot::Sender<()>,
}

impl Sink {
    /// Creates a sink named `sink`.
    #[must_use]
    pub fn new(
        input: QueueReceiver<Item>,
        recorder: Arc<dyn Recorder>,
        completion: oneshot::Sender<()>,
    ) -> Self {
        Self {
            name: "sink".to_string(),
            input,
            recorder,
            completion,
        }
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for Sink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>, ctx: StageContext) -> StageExit {
        let Self {
            name,
            mut input,
            recorder,
            completion,
        } = *self;
        let mut saved = 0usize;

        let exit = loop {
            let next = tokio::select! {
                biased;
                () = ctx.cancelled() => None,
                next = input.recv() => Some(next),
            };
            match next {
                Some(Recv::Item(item)) => {
                    recorder.record(item);
                    saved += 1;
                    debug!(stage = %name, item, "saved item");
                }
                Some(Recv::Finished) => {
                    if completion.send(()).is_err() {
                        debug!(stage = %name, "completion signal had no listener");
                    }
                    break StageExit::Finished;
                }
                Some(Recv::Aborted) => break StageExit::UpstreamAborted,
                None => break StageExit::Cancelled,
            }
        };

        info!(stage = %name, exit = %exit, saved, "sink stopped");
        exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::queue::handoff;
    use crate::recorder::{MemoryRecorder, MockRecorder};
    use crate::stages::error_channel;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn context(token: &Arc<CancellationToken>) -> StageContext {
        let (reporter, _rx) = error_channel("sink");
        StageContext::new(token.clone(), reporter)
    }

    #[tokio::test]
    async fn test_records_in_order_and_signals_completion() {
        let token = Arc::new(CancellationToken::new());
        let (tx, rx) = handoff(4);
        let (done_tx, done_rx) = oneshot::channel();

        let mut recorder = MockRecorder::new();
        let mut seq = Sequence::new();
        for item in [0, 2, 4] {
            recorder
                .expect_record()
                .with(eq(item))
                .times(1)
                .in_sequence(&mut seq)
                .return_const(());
        }

        for item in [0, 2, 4] {
            tx.send(item).await.unwrap();
        }
        tx.finish().await.unwrap();

        let exit = Box::new(Sink::new(rx, Arc::new(recorder), done_tx))
            .run(context(&token))
            .await;

        assert_eq!(exit, StageExit::Finished);
        assert_eq!(done_rx.await, Ok(()));
    }

    #[tokio::test]
    async fn test_aborted_input_does_not_signal_completion() {
        let token = Arc::new(CancellationToken::new());
        let (tx, rx) = handoff(4);
        let (done_tx, done_rx) = oneshot::channel();
        let recorder = Arc::new(MemoryRecorder::new());

        tx.send(0).await.unwrap();
        tx.send(2).await.unwrap();
        tx.abort();

        let exit = Box::new(Sink::new(rx, recorder.clone(), done_tx))
            .run(context(&token))
            .await;

        assert_eq!(exit, StageExit::UpstreamAborted);
        assert_eq!(recorder.items(), vec![0, 2]);
        assert!(done_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_cancellation_does_not_signal_completion() {
        let token = Arc::new(CancellationToken::new());
        let (_tx, rx) = handoff::<Item>(0);
        let (done_tx, done_rx) = oneshot::channel();

        let sink = Sink::new(rx, Arc::new(MemoryRecorder::new()), done_tx).with_name("store");
        assert_eq!(sink.name(), "store");

        let handle = tokio::spawn(Box::new(sink).run(context(&token)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel("interrupted");

        let exit = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sink should stop after cancellation")
            .unwrap();
        assert_eq!(exit, StageExit::Cancelled);
        assert!(done_rx.await.is_err());
    }
}
