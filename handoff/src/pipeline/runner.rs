//! Wiring stages together and running them under one driver.

use super::report::{RunReport, StageRecord};
use crate::aggregator::{merge_errors, MergedErrors};
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::driver::Driver;
use crate::errors::PipelineError;
use crate::observability::SpanTimer;
use crate::queue::handoff;
use crate::recorder::{LoggingRecorder, Recorder};
use crate::stages::{
    error_channel, multiply_by, Producer, Sink, Stage, StageContext, Transform, Transformer,
};
use chrono::Utc;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// A single-use pipeline run.
///
/// A pipeline owns the cancellation token of its run. Hand a clone of the
/// token to anything that should be able to stop the run from outside,
/// such as [`crate::signal::cancel_on_signal`].
pub struct Pipeline {
    config: PipelineConfig,
    recorder: Arc<dyn Recorder>,
    transform: Option<Transform>,
    cancel: Arc<CancellationToken>,
}

impl Pipeline {
    /// Creates a pipeline that logs saved items through tracing.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            recorder: Arc::new(LoggingRecorder::default()),
            transform: None,
            cancel: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the recorder the sink hands items to.
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn Recorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Replaces the multiplier-based transform with a custom function.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    /// Runs producer → transformer → sink as configured.
    pub async fn run(self) -> Result<RunReport, PipelineError> {
        self.config.validate()?;

        let capacity = self.config.queue_capacity;
        let (producer_tx, transformer_rx) = handoff(capacity);
        let (transformer_tx, sink_rx) = handoff(capacity);
        let (completion_tx, completion_rx) = oneshot::channel();

        let transform = self
            .transform
            .clone()
            .unwrap_or_else(|| multiply_by(self.config.multiplier));

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(
                Producer::new(self.config.items.clone(), producer_tx)
                    .with_delay(self.config.producer_delay()),
            ),
            Box::new(
                Transformer::new(transformer_rx, transformer_tx)
                    .with_transform(transform)
                    .with_fail_on_value(self.config.fail_on_value)
                    .with_delay(self.config.transform_delay()),
            ),
            Box::new(Sink::new(sink_rx, self.recorder.clone(), completion_tx)),
        ];

        self.run_stages(stages, completion_rx).await
    }

    /// Runs an arbitrary set of already-wired stages.
    ///
    /// Every stage gets its own error channel, all of which are merged for
    /// the driver. `completion` must be fed by one of the stages, otherwise
    /// the run can only end through an error or cancellation. The report is
    /// returned only after every stage task has been joined, so stages are
    /// expected to stop once the token is cancelled.
    pub async fn run_stages(
        self,
        stages: Vec<Box<dyn Stage>>,
        completion: oneshot::Receiver<()>,
    ) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline.run", %run_id);
        self.execute(run_id, stages, completion).instrument(span).await
    }

    async fn execute(
        self,
        run_id: Uuid,
        stages: Vec<Box<dyn Stage>>,
        completion: oneshot::Receiver<()>,
    ) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        let timer = SpanTimer::start("pipeline.run");
        info!(
            stages = stages.len(),
            policy = ?self.config.error_policy,
            "pipeline started"
        );

        let mut sources = Vec::with_capacity(stages.len());
        let mut workers = Vec::with_capacity(stages.len());
        for stage in stages {
            let name = stage.name().to_string();
            let (reporter, source) = error_channel(name.clone());
            sources.push(source);
            let ctx = StageContext::new(self.cancel.clone(), reporter);
            let span = info_span!("stage", stage = %name);
            workers.push((name, tokio::spawn(stage.run(ctx).instrument(span))));
        }

        let MergedErrors {
            errors: mut merged,
            relays,
        } = merge_errors(self.cancel.clone(), sources);

        let verdict = Driver::new(self.cancel.clone())
            .with_policy(self.config.error_policy)
            .drive(&mut merged, completion)
            .await;

        // The driver has stopped listening; a relay still holding a report
        // sees the closed receiver and exits.
        drop(merged);

        let mut first_failure = None;
        let mut records = Vec::with_capacity(workers.len());
        for (name, handle) in workers {
            match handle.await {
                Ok(exit) => records.push(StageRecord { stage: name, exit }),
                Err(e) => {
                    error!(stage = %name, error = %e, "stage did not shut down cleanly");
                    first_failure.get_or_insert(PipelineError::WorkerPanicked {
                        worker: name,
                        message: e.to_string(),
                    });
                }
            }
        }
        for (index, joined) in join_all(relays).await.into_iter().enumerate() {
            if let Err(e) = joined {
                error!(relay = index, error = %e, "error relay did not shut down cleanly");
                first_failure.get_or_insert(PipelineError::WorkerPanicked {
                    worker: format!("error relay {index}"),
                    message: e.to_string(),
                });
            }
        }
        if let Some(failure) = first_failure {
            return Err(failure);
        }

        let report = RunReport {
            run_id,
            started_at,
            duration_ms: timer.finish(),
            outcome: verdict.outcome,
            errors: verdict.errors,
            stages: records,
        };
        info!(
            outcome = ?report.outcome,
            duration_ms = report.duration_ms,
            "pipeline finished"
        );
        Ok(report)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}
