//! Pipeline module.
//!
//! This module provides the remediation pipeline, its executor and the
//! progress machinery shared by single and batch runs.

mod builder;
mod context;
mod downcast;
mod executor;
pub mod outliers;
pub mod progress;

pub use builder::{BatchResult, Pipeline, PipelineBuilder, RunOutcome};
pub use context::RunContext;
pub use executor::RemediationExecutor;
pub use outliers::OutlierHandler;
pub use progress::{ClosureProgressReporter, PipelineState, ProgressReporter, ProgressUpdate};
