//! Pipeline module.
//!
//! Runs the Ingest, Transform and Publish stages in order, stopping at the
//! first failure, with optional progress reporting.

pub mod progress;
mod runner;

pub use progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
pub use runner::{
    DeferredPublish, Pipeline, PipelineBuilder, PipelineRun, Stage, StageReport, StageResult,
    StageStatus, default_stages,
};
