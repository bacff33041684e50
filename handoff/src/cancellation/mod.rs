//! Broadcast cancellation for a pipeline run.
//!
//! A single [`CancellationToken`] is created per run and shared by every
//! stage, relay and the driver. It can be triggered from outside the
//! pipeline (an interrupt) or by the driver after a fatal stage error.

mod token;

pub use token::CancellationToken;
