//! Pipeline configuration.

use crate::driver::ErrorPolicy;
use crate::errors::PipelineError;
use crate::Item;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest buffered queue capacity accepted by [`PipelineConfig::validate`].
pub const MAX_QUEUE_CAPACITY: usize = 1024;

/// Longest pacing delay accepted by [`PipelineConfig::validate`].
pub const MAX_DELAY_MS: u64 = 60_000;

/// Configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Items emitted by the producer, in order.
    #[serde(default = "default_items")]
    pub items: Vec<Item>,
    /// Value the transformer rejects; `None` disables the check.
    #[serde(default = "default_fail_on_value")]
    pub fail_on_value: Option<Item>,
    /// Factor the transformer multiplies every item by. A product that
    /// overflows fails the transformer.
    #[serde(default = "default_multiplier")]
    pub multiplier: Item,
    /// Delay before each item the producer emits.
    #[serde(default = "default_delay_ms")]
    pub producer_delay_ms: u64,
    /// Delay before each item the transformer forwards.
    #[serde(default = "default_delay_ms")]
    pub transform_delay_ms: u64,
    /// Capacity of each handoff queue; 0 is a rendezvous.
    #[serde(default)]
    pub queue_capacity: usize,
    /// How the driver reacts to an error report.
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

fn default_items() -> Vec<Item> {
    (0..10).collect()
}

#[allow(clippy::unnecessary_wraps)]
fn default_fail_on_value() -> Option<Item> {
    Some(6)
}

fn default_multiplier() -> Item {
    2
}

fn default_delay_ms() -> u64 {
    100
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            items: default_items(),
            fail_on_value: default_fail_on_value(),
            multiplier: default_multiplier(),
            producer_delay_ms: default_delay_ms(),
            transform_delay_ms: default_delay_ms(),
            queue_capacity: 0,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON and validates it.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file and validates it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Sets the items to emit.
    #[must_use]
    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.items = items;
        self
    }

    /// Sets the poison value.
    #[must_use]
    pub fn with_fail_on_value(mut self, value: Option<Item>) -> Self {
        self.fail_on_value = value;
        self
    }

    /// Sets the transform multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: Item) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets both pacing delays.
    #[must_use]
    pub fn with_delays(mut self, producer_ms: u64, transform_ms: u64) -> Self {
        self.producer_delay_ms = producer_ms;
        self.transform_delay_ms = transform_ms;
        self
    }

    /// Disables pacing.
    #[must_use]
    pub fn without_delays(self) -> Self {
        self.with_delays(0, 0)
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the error policy.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Gets the producer delay as Duration.
    #[must_use]
    pub fn producer_delay(&self) -> Duration {
        Duration::from_millis(self.producer_delay_ms)
    }

    /// Gets the transformer delay as Duration.
    #[must_use]
    pub fn transform_delay(&self) -> Duration {
        Duration::from_millis(self.transform_delay_ms)
    }

    /// Checks the configuration for values the pipeline refuses to run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(PipelineError::Config(format!(
                "queue_capacity {} exceeds the maximum of {MAX_QUEUE_CAPACITY}",
                self.queue_capacity
            )));
        }
        for (field, value) in [
            ("producer_delay_ms", self.producer_delay_ms),
            ("transform_delay_ms", self.transform_delay_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(PipelineError::Config(format!(
                    "{field} {value} exceeds the maximum of {MAX_DELAY_MS}"
                )));
            }
        }
        Ok(())
    }
}
