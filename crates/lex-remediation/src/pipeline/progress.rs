//! Run states and progress reporting for the remediation pipeline.
//!
//! A run moves through [`PipelineState`]s in a fixed order:
//!
//! ```text
//! idle -> profiling -> scoring -> planning -> (anomaly || executing) -> reporting -> done
//! ```
//!
//! `failed` is reachable from any stage. Each transition emits a
//! [`ProgressUpdate`] to the configured [`ProgressReporter`].
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_remediation::Pipeline;
//!
//! let outcome = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(df)?;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// States of a remediation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Created, not yet started
    Idle,
    /// Profiling the dataset (statistics, semantic types)
    Profiling,
    /// Scoring data quality
    Scoring,
    /// Building the remediation plan
    Planning,
    /// Running the anomaly ensemble on the pre-remediation snapshot
    Anomaly,
    /// Applying the plan to a working copy
    Executing,
    /// Assembling the final report
    Reporting,
    /// Run completed successfully
    Done,
    /// Run failed with an error
    Failed,
}

impl PipelineState {
    /// Returns a human-readable name for the state.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Profiling => "Profiling Dataset",
            Self::Scoring => "Scoring Quality",
            Self::Planning => "Planning Remediation",
            Self::Anomaly => "Detecting Anomalies",
            Self::Executing => "Executing Plan",
            Self::Reporting => "Generating Report",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run spent in this state (0.0 - 1.0).
    pub fn weight(&self) -> f32 {
        match self {
            Self::Profiling => 0.20,
            Self::Scoring => 0.10,
            Self::Planning => 0.10,
            Self::Anomaly => 0.25,
            Self::Executing => 0.25,
            Self::Reporting => 0.10,
            Self::Idle | Self::Done | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this state.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Idle | Self::Profiling => 0.0,
            Self::Scoring => 0.20,
            Self::Planning => 0.30,
            Self::Anomaly => 0.40,
            Self::Executing => 0.65,
            Self::Reporting => 0.90,
            Self::Done => 1.0,
            Self::Failed => 0.0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Progress update for one state of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Run the update belongs to
    pub run_id: u64,

    pub stage: PipelineState,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the current state (0.0 - 1.0)
    pub stage_progress: f32,

    /// Human-readable message describing current activity
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(
        run_id: u64,
        stage: PipelineState,
        stage_progress: f32,
        message: impl Into<String>,
    ) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            run_id,
            stage,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Creates a completion progress update.
    pub fn done(run_id: u64, message: impl Into<String>) -> Self {
        Self {
            run_id,
            stage: PipelineState::Done,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
        }
    }

    /// Creates a failed progress update.
    pub fn failed(run_id: u64, message: impl Into<String>) -> Self {
        Self {
            run_id,
            stage: PipelineState::Failed,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
        }
    }
}

/// Receives progress updates during a run.
///
/// Implementations must be `Send + Sync`: the anomaly stage reports from its
/// own thread, and batch runs share one reporter across workers.
pub trait ProgressReporter: Send + Sync {
    /// Called at every state transition. Implementations should not block.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);
static_assertions::assert_impl_all!(PipelineState: Send, Sync, Copy);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(3, PipelineState::Scoring, 0.5, "Scoring...");
        assert_eq!(update.run_id, 3);
        assert_eq!(update.stage, PipelineState::Scoring);
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_progress_update_done_and_failed() {
        let done = ProgressUpdate::done(1, "Done!");
        assert_eq!(done.stage, PipelineState::Done);
        assert_eq!(done.progress, 1.0);

        let failed = ProgressUpdate::failed(1, "boom");
        assert!(failed.stage.is_terminal());
        assert_eq!(failed.progress, 0.0);
    }

    #[test]
    fn test_state_weights_sum() {
        let states = [
            PipelineState::Profiling,
            PipelineState::Scoring,
            PipelineState::Planning,
            PipelineState::Anomaly,
            PipelineState::Executing,
            PipelineState::Reporting,
        ];
        let total_weight: f32 = states.iter().map(|s| s.weight()).sum();
        assert!((total_weight - 1.0).abs() < 0.01, "Weights should sum to ~1.0");
    }

    #[test]
    fn test_state_json_values() {
        let expectations = [
            (PipelineState::Idle, "\"idle\""),
            (PipelineState::Profiling, "\"profiling\""),
            (PipelineState::Scoring, "\"scoring\""),
            (PipelineState::Planning, "\"planning\""),
            (PipelineState::Anomaly, "\"anomaly\""),
            (PipelineState::Executing, "\"executing\""),
            (PipelineState::Reporting, "\"reporting\""),
            (PipelineState::Done, "\"done\""),
            (PipelineState::Failed, "\"failed\""),
        ];
        for (state, expected) in expectations {
            assert_eq!(serde_json::to_string(&state).unwrap(), expected);
        }
    }

    #[test]
    fn test_closure_progress_reporter_across_threads() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let reporter_clone = reporter.clone();
        let handle = std::thread::spawn(move || {
            reporter_clone.report(ProgressUpdate::new(
                7,
                PipelineState::Anomaly,
                0.0,
                "From background thread",
            ));
        });
        handle.join().expect("Thread should not panic");
        reporter.report(ProgressUpdate::done(7, "Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }
}
