//! Data Remediation Pipeline Library
//!
//! Automated quality assessment, remediation planning and execution for
//! tabular data, built with Rust and Polars.
//!
//! # Overview
//!
//! A run moves one dataset through five stages:
//!
//! - **Profiling**: per-column statistics, outlier bounds and semantic types
//! - **Quality Scoring**: completeness, uniqueness and consistency folded into a 0-100 score
//! - **Planning**: a deterministic, ordered list of remediation actions
//! - **Anomaly Detection**: an ensemble of three detectors voting on the original rows
//! - **Execution**: the plan applied to a working copy, then outlier treatment
//!
//! Anomaly detection reads the untouched snapshot and can run on its own
//! thread while the executor works.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_remediation::{Pipeline, RemediationConfig};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("data.csv".into()))?
//!     .finish()?;
//!
//! let outcome = Pipeline::builder()
//!     .config(RemediationConfig::default())
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(df)?;
//!
//! for action in outcome.report.plan.iter().flatten() {
//!     println!("{}", action);
//! }
//! println!("{} rows left", outcome.data.height());
//! ```
//!
//! # Configuration
//!
//! Use [`RemediationConfig`] to customize thresholds and strategies:
//!
//! ```rust,ignore
//! use lex_remediation::config::*;
//!
//! let config = RemediationConfig::builder()
//!     .missing_drop_threshold(0.7)     // Drop columns with >70% missing
//!     .impute_simple_threshold(0.3)    // Median/mode below 30%, fill above
//!     .outlier_treatment(OutlierTreatment::Clip)
//!     .anomaly_vote(VoteRule::Majority)
//!     .anomaly_contamination(Contamination::Auto)
//!     .build()?;
//! ```
//!
//! # Stage Components
//!
//! Every stage is usable on its own:
//!
//! ```rust,ignore
//! use lex_remediation::{ActionPlanner, ColumnProfiler, QualityScorer, RemediationConfig};
//!
//! let config = RemediationConfig::default();
//! let profile = ColumnProfiler::new(&config).profile(&df)?;
//! let quality = QualityScorer::new(&config).score(&profile);
//! let plan = ActionPlanner::new(&config).plan(&profile);
//! ```

pub mod anomaly;
pub mod config;
pub mod error;
pub mod imputers;
pub mod pipeline;
pub mod planner;
pub mod profiler;
pub mod quality;
pub mod reporting;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use anomaly::{
    AnomalyDetector, AnomalyEnsemble, CovarianceDetector, DensityDetector, IsolationDetector,
    mark_anomalies, remove_anomalies,
};
pub use config::{
    AnomalyMethod, ConfigValidationError, Contamination, OutlierTreatment, QualityThresholds,
    RemediationConfig, RemediationConfigBuilder, StageToggles, VoteRule,
};
pub use error::{RemediationError, Result as RemediationResult, ResultExt};
pub use imputers::{DirectionalImputer, StatisticalImputer};
pub use pipeline::{
    BatchResult, ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineState,
    ProgressReporter, ProgressUpdate, RemediationExecutor, RunContext, RunOutcome,
};
pub use planner::ActionPlanner;
pub use profiler::ColumnProfiler;
pub use quality::QualityScorer;
pub use reporting::{ArtifactPaths, ArtifactWriter, RemediationReport, StageTiming};
pub use types::{
    ActionKind, AnomalyReport, AnomalyVote, ColumnProfile, DatasetProfile, ExecutionLog,
    ExecutionRecord, ImputeStrategy, OutlierBounds, ProposedAction, QualityLabel, QualityReport,
    SemanticType,
};
pub use utils::{DtypeCategory, get_dtype_category, parse_datetime_string, parse_numeric_string};
