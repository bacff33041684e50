//! Handoff queues between stages.
//!
//! A handoff queue connects exactly two stages. The writer owns the
//! [`QueueSender`]; the reader owns the [`QueueReceiver`]. Neither half is
//! `Clone`, so there is only ever one writer and one reader.
//!
//! End-of-stream is explicit. The writer either calls
//! [`QueueSender::finish`] after its last item, or lets the sender drop,
//! which the reader observes as [`Recv::Aborted`]. Both consume the sender,
//! so a queue is closed exactly once on every exit path.
//!
//! With a capacity of zero the queue is a rendezvous: `send` returns only
//! after the reader has taken the item.

use crate::errors::QueueError;
use tokio::sync::{mpsc, oneshot};

enum Frame<T> {
    Item {
        item: T,
        ack: Option<oneshot::Sender<()>>,
    },
    End,
}

/// What a reader gets back from [`QueueReceiver::recv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recv<T> {
    /// The next item in FIFO order.
    Item(T),
    /// The writer finished normally; no more items will arrive.
    Finished,
    /// The writer went away without finishing (cancelled or failed).
    Aborted,
}

/// Creates a handoff queue.
///
/// `capacity == 0` creates a rendezvous queue; any other value bounds the
/// number of items buffered between the two stages.
#[must_use]
pub fn handoff<T: Send>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        QueueSender {
            tx,
            rendezvous: capacity == 0,
        },
        QueueReceiver { rx, finished: false },
    )
}

/// The writing half of a handoff queue.
#[derive(Debug)]
pub struct QueueSender<T> {
    tx: mpsc::Sender<Frame<T>>,
    rendezvous: bool,
}

impl<T: Send> QueueSender<T> {
    /// Sends an item, waiting for queue capacity (or, for a rendezvous
    /// queue, for the reader to take it).
    ///
    /// Cancel safe: dropping the future before completion never blocks the
    /// reader. An item already handed over may still be delivered.
    pub async fn send(&self, item: T) -> Result<(), QueueError> {
        if self.rendezvous {
            let (ack_tx, ack_rx) = oneshot::channel();
            self.tx
                .send(Frame::Item {
                    item,
                    ack: Some(ack_tx),
                })
                .await
                .map_err(|_| QueueError::Closed)?;
            ack_rx.await.map_err(|_| QueueError::Closed)
        } else {
            self.tx
                .send(Frame::Item { item, ack: None })
                .await
                .map_err(|_| QueueError::Closed)
        }
    }

    /// Closes the queue after normal exhaustion.
    ///
    /// The reader sees [`Recv::Finished`] once it has drained every item
    /// sent before this call.
    pub async fn finish(self) -> Result<(), QueueError> {
        self.tx.send(Frame::End).await.map_err(|_| QueueError::Closed)
    }

    /// Closes the queue without finishing it.
    pub fn abort(self) {
        drop(self);
    }

    /// Returns whether the reader has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The reading half of a handoff queue.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: mpsc::Receiver<Frame<T>>,
    finished: bool,
}

impl<T: Send> QueueReceiver<T> {
    /// Receives the next item or the end-of-stream marker.
    ///
    /// Cancel safe: if the future is dropped before completion no item is
    /// lost.
    pub async fn recv(&mut self) -> Recv<T> {
        if self.finished {
            return Recv::Finished;
        }
        match self.rx.recv().await {
            Some(Frame::Item { item, ack }) => {
                if let Some(ack) = ack {
                    // The writer may have stopped waiting; nothing to do then.
                    let _ = ack.send(());
                }
                Recv::Item(item)
            }
            Some(Frame::End) => {
                self.finished = true;
                self.rx.close();
                Recv::Finished
            }
            None => Recv::Aborted,
        }
    }

    /// Returns whether the writer finished the stream and it was drained.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
