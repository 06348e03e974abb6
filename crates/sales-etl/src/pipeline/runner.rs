//! Sequential stage runner.
//!
//! Stages run in the order they were added. The first failure stops the
//! run; later stages are recorded as skipped and never started.

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::ingest::IngestStage;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::publish::PublishStage;
use crate::transform::{TransformOutcome, TransformStage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// One step of the pipeline.
pub trait Stage: Send {
    /// Which pipeline stage this is.
    fn stage(&self) -> PipelineStage;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        self.stage().display_name()
    }

    /// Run to completion, or fail without side effects on the stage's output.
    fn run(&self) -> Result<StageReport>;
}

/// What a stage reports on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageReport {
    /// Rows written by the stage.
    pub rows: usize,
    /// Set by the Transform stage only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformOutcome>,
}

impl StageReport {
    pub fn rows(rows: usize) -> Self {
        Self {
            rows,
            transform: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// The record of one stage within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: PipelineStage,
    pub status: StageStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
}

/// Outcome of a whole pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    pub stages: Vec<StageResult>,
    pub transform: Option<TransformOutcome>,
    /// The error that stopped the run, if any.
    pub error: Option<EtlError>,
    pub elapsed: Duration,
}

impl PipelineRun {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The stage that failed, if any.
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Failed)
            .map(|s| s.stage)
    }

    /// Convert into a `Result`, keeping the stage error.
    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

impl Stage for IngestStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Ingest
    }

    fn run(&self) -> Result<StageReport> {
        IngestStage::run(self).map(StageReport::rows)
    }
}

impl Stage for TransformStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Transform
    }

    fn run(&self) -> Result<StageReport> {
        let outcome = TransformStage::run(self)?;
        Ok(StageReport {
            rows: outcome.counts.survivors(),
            transform: Some(outcome),
        })
    }
}

impl Stage for PublishStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Publish
    }

    fn run(&self) -> Result<StageReport> {
        PublishStage::run(self).map(StageReport::rows)
    }
}

/// Publish stage whose sink is only set up when the stage starts, so a bad
/// credential file fails Publish instead of the whole run up front.
pub struct DeferredPublish {
    config: EtlConfig,
}

impl DeferredPublish {
    pub fn new(config: EtlConfig) -> Self {
        Self { config }
    }
}

impl Stage for DeferredPublish {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Publish
    }

    fn run(&self) -> Result<StageReport> {
        let stage = PublishStage::from_config(&self.config)?;
        Stage::run(&stage)
    }
}

/// Ingest, Transform and Publish for `config`, in that order.
pub fn default_stages(config: &EtlConfig) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(IngestStage::from_config(config)),
        Box::new(TransformStage::from_config(config)),
        Box::new(DeferredPublish::new(config.clone())),
    ]
}

/// Runs stages in order and stops at the first failure.
///
/// # Example
///
/// ```rust,ignore
/// use sales_etl::pipeline::Pipeline;
///
/// let run = Pipeline::builder()
///     .config(EtlConfig::builder().source_location("data/sales.csv").build()?)
///     .build()?
///     .run();
///
/// if let Some(stage) = run.failed_stage() {
///     eprintln!("{} failed", stage);
/// }
/// ```
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    /// Run every stage. Never panics on stage failure; inspect the result.
    pub fn run(&self) -> PipelineRun {
        let start = Instant::now();
        info!("Pipeline Started");

        let mut results = Vec::with_capacity(self.stages.len());
        let mut transform = None;
        let mut failure = None;

        for (index, stage) in self.stages.iter().enumerate() {
            if failure.is_some() {
                results.push(StageResult {
                    stage: stage.stage(),
                    status: StageStatus::Skipped,
                    duration_ms: 0,
                    rows: None,
                });
                continue;
            }

            info!("--- Stage {}: {} ---", index + 1, stage.name());
            self.report_progress(ProgressUpdate::new(
                stage.stage(),
                0.0,
                format!("Starting {}...", stage.name()),
            ));

            let stage_start = Instant::now();
            let outcome = stage.run();
            let duration_ms = stage_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(report) => {
                    self.report_progress(ProgressUpdate::new(
                        stage.stage(),
                        1.0,
                        format!("{} complete", stage.name()),
                    ));
                    results.push(StageResult {
                        stage: stage.stage(),
                        status: StageStatus::Succeeded,
                        duration_ms,
                        rows: Some(report.rows),
                    });
                    if report.transform.is_some() {
                        transform = report.transform;
                    }
                }
                Err(e) => {
                    error!("{} failed: {}", stage.name(), e);
                    error!("Pipeline Stopped: {} Failed", stage.name());
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                    results.push(StageResult {
                        stage: stage.stage(),
                        status: StageStatus::Failed,
                        duration_ms,
                        rows: None,
                    });
                    failure = Some(e);
                }
            }
        }

        let elapsed = start.elapsed();
        if failure.is_none() {
            self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
            info!("Pipeline Finished Successfully in {:.2} seconds", elapsed.as_secs_f64());
        } else {
            info!("Pipeline ran for {:.2} seconds", elapsed.as_secs_f64());
        }

        PipelineRun {
            stages: results,
            transform,
            error: failure,
            elapsed,
        }
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<EtlConfig>,
    stages: Vec<Box<dyn Stage>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl PipelineBuilder {
    /// Run the default Ingest, Transform and Publish stages for `config`.
    ///
    /// Ignored when stages are added explicitly with [`stage`](Self::stage).
    pub fn config(mut self, config: EtlConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Append a stage.
    pub fn stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// # Errors
    ///
    /// [`EtlError::InvalidConfig`] if the configuration is invalid or there is
    /// nothing to run.
    pub fn build(self) -> Result<Pipeline> {
        let stages = if !self.stages.is_empty() {
            self.stages
        } else if let Some(config) = &self.config {
            config.validate()?;
            default_stages(config)
        } else {
            return Err(EtlError::InvalidConfig(
                "pipeline needs a configuration or at least one stage".to_string(),
            ));
        };

        Ok(Pipeline {
            stages,
            progress_reporter: self.progress_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeStage {
        stage: PipelineStage,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FakeStage {
        fn boxed(stage: PipelineStage, fail: bool, calls: &Arc<AtomicUsize>) -> Box<dyn Stage> {
            Box::new(Self {
                stage,
                fail,
                calls: Arc::clone(calls),
            })
        }
    }

    impl Stage for FakeStage {
        fn stage(&self) -> PipelineStage {
            self.stage
        }

        fn run(&self) -> Result<StageReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(EtlError::EmptyInput("public.raw_sales".to_string()))
            } else {
                Ok(StageReport::rows(7))
            }
        }
    }

    #[test]
    fn test_all_stages_succeed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let run = Pipeline::builder()
            .stage(FakeStage::boxed(PipelineStage::Ingest, false, &calls))
            .stage(FakeStage::boxed(PipelineStage::Transform, false, &calls))
            .stage(FakeStage::boxed(PipelineStage::Publish, false, &calls))
            .build()
            .unwrap()
            .run();

        assert!(run.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(run.stages.iter().all(|s| s.status == StageStatus::Succeeded));
        assert_eq!(run.stages[2].rows, Some(7));
    }

    #[test]
    fn test_failure_short_circuits() {
        let before = Arc::new(AtomicUsize::new(0));
        let failing = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));

        let run = Pipeline::builder()
            .stage(FakeStage::boxed(PipelineStage::Ingest, false, &before))
            .stage(FakeStage::boxed(PipelineStage::Transform, true, &failing))
            .stage(FakeStage::boxed(PipelineStage::Publish, false, &after))
            .build()
            .unwrap()
            .run();

        assert!(!run.is_success());
        assert_eq!(run.failed_stage(), Some(PipelineStage::Transform));
        assert_eq!(after.load(Ordering::SeqCst), 0);

        let statuses: Vec<StageStatus> = run.stages.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StageStatus::Succeeded, StageStatus::Failed, StageStatus::Skipped]
        );
        assert_eq!(run.into_result().unwrap_err().error_code(), "EMPTY_INPUT");
    }

    #[test]
    fn test_progress_updates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        Pipeline::builder()
            .stage(FakeStage::boxed(PipelineStage::Ingest, false, &calls))
            .stage(FakeStage::boxed(PipelineStage::Transform, true, &calls))
            .on_progress(move |u| sink.lock().unwrap().push(u.stage))
            .build()
            .unwrap()
            .run();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                PipelineStage::Ingest,
                PipelineStage::Ingest,
                PipelineStage::Transform,
                PipelineStage::Failed,
            ]
        );
    }

    #[test]
    fn test_build_requires_something_to_run() {
        let err = Pipeline::builder().build().err().unwrap();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_build_validates_config() {
        let mut config = EtlConfig::default();
        config.publish_row_limit = Some(0);
        let err = Pipeline::builder().config(config).build().err().unwrap();
        assert!(err.is_config_error());
    }
}
