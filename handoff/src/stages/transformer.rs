//! The transformer stage: maps items and rejects a poison value.

use super::{Stage, StageContext, StageExit};
use crate::errors::ErrorCause;
use crate::queue::{QueueReceiver, QueueSender, Recv};
use crate::Item;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A per-item transform function.
///
/// An `Err` is reported as the stage's fatal error, exactly like the poison
/// value.
pub type Transform = Arc<dyn Fn(Item) -> Result<Item, ErrorCause> + Send + Sync>;

/// Returns a transform multiplying every item by `factor`.
///
/// Overflow is a failure, never a clamped or wrapped value.
#[must_use]
pub fn multiply_by(factor: Item) -> Transform {
    Arc::new(move |value: Item| {
        value.checked_mul(factor).ok_or_else(|| ErrorCause::Failed {
            message: format!("{value} * {factor} overflows"),
        })
    })
}

/// Reads items, applies a transform and forwards the result.
///
/// With a poison value configured, the first occurrence of that value is
/// reported as [`ErrorCause::InvalidValue`]; the transformer then stops
/// without forwarding it or anything after it. A transform error stops the
/// stage the same way.
pub struct Transformer {
    name: String,
    input: QueueReceiver<Item>,
    output: QueueSender<Item>,
    transform: Transform,
    fail_on_value: Option<Item>,
    delay: Duration,
}

impl Transformer {
    /// Creates a transformer named `transformer` that doubles every item
    /// and has no poison value.
    #[must_use]
    pub fn new(input: QueueReceiver<Item>, output: QueueSender<Item>) -> Self {
        Self {
            name: "transformer".to_string(),
            input,
            output,
            transform: multiply_by(2),
            fail_on_value: None,
            delay: Duration::ZERO,
        }
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the transform function.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Sets the poison value; `None` makes the stage fail-free.
    #[must_use]
    pub fn with_fail_on_value(mut self, value: Option<Item>) -> Self {
        self.fail_on_value = value;
        self
    }

    /// Sets the delay before each forwarded item.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("name", &self.name)
            .field("fail_on_value", &self.fail_on_value)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for Transformer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>, ctx: StageContext) -> StageExit {
        let Self {
            name,
            mut input,
            output,
            transform,
            fail_on_value,
            delay,
        } = *self;
        let mut forwarded = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                () = ctx.cancelled() => None,
                next = input.recv() => Some(next),
            };

            let value = match next {
                Some(Recv::Item(value)) => value,
                Some(Recv::Finished) => break,
                Some(Recv::Aborted) => {
                    return stopped(&name, StageExit::UpstreamAborted, forwarded);
                }
                None => return stopped(&name, StageExit::Cancelled, forwarded),
            };

            if fail_on_value == Some(value) {
                // Dropping `output` on return aborts the downstream queue.
                ctx.report(ErrorCause::InvalidValue { value });
                return stopped(&name, StageExit::Failed, forwarded);
            }

            let result = match transform(value) {
                Ok(result) => result,
                Err(cause) => {
                    ctx.report(cause);
                    return stopped(&name, StageExit::Failed, forwarded);
                }
            };

            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    () = ctx.cancelled() => {
                        return stopped(&name, StageExit::Cancelled, forwarded);
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }

            let sent = tokio::select! {
                biased;
                () = ctx.cancelled() => None,
                sent = output.send(result) => Some(sent),
            };
            match sent {
                Some(Ok(())) => {
                    forwarded += 1;
                    debug!(stage = %name, input = value, output = result, "forwarded item");
                }
                Some(Err(_)) => return stopped(&name, StageExit::DownstreamClosed, forwarded),
                None => return stopped(&name, StageExit::Cancelled, forwarded),
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
        stopped(&name, exit, forwarded)
    }
}

fn stopped(name: &str, exit: StageExit, forwarded: usize) -> StageExit {
    info!(stage = %name, exit = %exit, forwarded, "transformer stopped");
    exit
}
