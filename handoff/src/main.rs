//! Command-line entry point.
//!
//! Usage: `handoff [CONFIG.json]`. Without a config file the built-in
//! defaults are used.

use anyhow::Context;
use handoff::observability::{init_tracing, LogFormat};
use handoff::prelude::*;
use handoff::signal::cancel_on_signal;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::from_env()?).context("failed to initialise logging")?;

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => PipelineConfig::default(),
    };

    let pipeline = Pipeline::new(config).with_recorder(Arc::new(StdoutRecorder));
    let listener = cancel_on_signal(pipeline.cancel_token());
    let report = pipeline.run().await.context("pipeline run failed")?;
    listener.abort();

    match report.status_line() {
        Some(line) => println!("{line}"),
        None => info!(outcome = ?report.outcome, "pipeline cancelled"),
    }
    debug!(report = %serde_json::to_string(&report)?, "run report");

    Ok(())
}
