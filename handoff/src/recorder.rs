//! Side effects performed by the sink for every item.
//!
//! The sink hands each item it receives to a [`Recorder`]. The binary
//! prints with [`StdoutRecorder`]; tests collect with [`MemoryRecorder`].

use crate::Item;
use parking_lot::RwLock;
use tracing::{debug, error, info, trace, warn, Level};

/// Trait for the sink's per-item side effect.
#[cfg_attr(test, mockall::automock)]
pub trait Recorder: Send + Sync {
    /// Records one item.
    fn record(&self, item: Item);
}

/// Prints `saved: <item>` on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutRecorder;

impl Recorder for StdoutRecorder {
    fn record(&self, item: Item) {
        println!("saved: {item}");
    }
}

/// A recorder that logs items using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingRecorder {
    /// The log level to use.
    level: Level,
}

impl Default for LoggingRecorder {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingRecorder {
    /// Creates a new logging recorder with the specified level.
    ///
    /// Every item is logged at exactly this level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging recorder.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl Recorder for LoggingRecorder {
    fn record(&self, item: Item) {
        if self.level == Level::TRACE {
            trace!(item, "saved");
        } else if self.level == Level::DEBUG {
            debug!(item, "saved");
        } else if self.level == Level::INFO {
            info!(item, "saved");
        } else if self.level == Level::WARN {
            warn!(item, "saved");
        } else {
            error!(item, "saved");
        }
    }
}

/// A recorder that keeps every item in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    items: RwLock<Vec<Item>>,
}

impl MemoryRecorder {
    /// Creates an empty memory recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded items.
    #[must_use]
    pub fn items(&self) -> Vec<Item> {
        self.items.read().clone()
    }

    /// Returns the number of recorded items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl Recorder for MemoryRecorder {
    fn record(&self, item: Item) {
        self.items.write().push(item);
    }
}
