//! The producer stage: emits a fixed sequence of items.

use super::{Stage, StageContext, StageExit};
use crate::queue::QueueSender;
use crate::Item;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Emits a finite, ordered sequence of items onto its output queue.
///
/// Cancellation is checked before every item and raced against the pacing
/// delay and every send, so the producer never outlives a cancelled run by
/// more than one scheduling step. It finishes its output queue on normal
/// exhaustion and aborts it on every other exit path.
#[derive(Debug)]
pub struct Producer {
    name: String,
    items: Vec<Item>,
    delay: Duration,
    output: QueueSender<Item>,
}

impl Producer {
    /// Creates a producer named `producer` with no pacing delay.
    #[must_use]
    pub fn new(items: Vec<Item>, output: QueueSender<Item>) -> Self {
        Self {
            name: "producer".to_string(),
            items,
            delay: Duration::ZERO,
            output,
        }
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the delay before each emitted item.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Stage for Producer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>, ctx: StageContext) -> StageExit {
        let Self {
            name,
            items,
            delay,
            output,
        } = *self;
        let total = items.len();

        for (emitted, item) in items.into_iter().enumerate() {
            if ctx.is_cancelled() {
                return stopped(&name, StageExit::Cancelled, emitted, total);
            }

            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    () = ctx.cancelled() => {
                        return stopped(&name, StageExit::Cancelled, emitted, total);
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }

            let sent = tokio::select! {
                biased;
                () = ctx.cancelled() => None,
                result = output.send(item) => Some(result),
            };
            match sent {
                Some(Ok(())) => debug!(stage = %name, item, "emitted item"),
                Some(Err(_)) => {
                    return stopped(&name, StageExit::DownstreamClosed, emitted, total);
                }
                None => return stopped(&name, StageExit::Cancelled, emitted, total),
            }
        }

        let finished = tokio::select! {
            biased;
            () = ctx.cancelled() => None,
            result = output.finish() => Some(result),
        };
        let exit = match finished {
            Some(Ok(())) => StageExit::Finished,
            Some(Err(_)) => StageExit::DownstreamClosed,
            None => StageExit::Cancelled,
        };
        stopped(&name, exit, total, total)
    }
}

fn stopped(name: &str, exit: StageExit, emitted: usize, total: usize) -> StageExit {
    info!(stage = %name, exit = %exit, emitted, total, "producer stopped");
    exit
}
