//! Main remediation pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating profile, score, plan, detect and execute.

use crate::anomaly::{AnomalyDetector, AnomalyEnsemble};
use crate::config::{ConfigValidationError, RemediationConfig};
use crate::error::{RemediationError, Result};
use crate::pipeline::RemediationExecutor;
use crate::pipeline::context::RunContext;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineState, ProgressReporter, ProgressUpdate,
};
use crate::planner::ActionPlanner;
use crate::profiler::ColumnProfiler;
use crate::quality::QualityScorer;
use crate::reporting::{RemediationReport, StageTiming};
use crate::types::{
    AnomalyReport, DatasetProfile, ExecutionLog, ProposedAction, QualityReport,
};
use chrono::Utc;
use parking_lot::Mutex;
use polars::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Span, debug, error, info, info_span, warn};

/// Result of one run: the report and the remediated data.
///
/// When execution did not run, `data` is the input unchanged.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RemediationReport,
    pub data: DataFrame,
}

/// One named dataset of a batch and how its run ended.
#[derive(Debug)]
pub struct BatchResult {
    pub name: String,
    pub outcome: Result<RunOutcome>,
}

/// Stage results gathered during a run.
#[derive(Default)]
struct StageResults {
    quality: Option<QualityReport>,
    plan: Option<Vec<ProposedAction>>,
    execution: Option<ExecutionLog>,
    anomaly: Option<AnomalyReport>,
    quality_after: Option<QualityReport>,
}

/// The main remediation pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
/// A pipeline holds no per-run state; one instance can serve many runs,
/// including concurrent ones.
///
/// # Example
///
/// ```rust,ignore
/// use lex_remediation::{Pipeline, RemediationConfig, OutlierTreatment};
///
/// let outcome = Pipeline::builder()
///     .config(
///         RemediationConfig::builder()
///             .outlier_treatment(OutlierTreatment::Remove)
///             .build()?,
///     )
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run(dataframe)?;
///
/// println!("score: {:?}", outcome.report.quality.map(|q| q.overall_score));
/// ```
pub struct Pipeline {
    config: Arc<RemediationConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    profiler: ColumnProfiler,
    scorer: QualityScorer,
    planner: ActionPlanner,
    ensemble: AnomalyEnsemble,
    executor: RemediationExecutor,
}

// Batch workers and the anomaly thread borrow the pipeline
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &RemediationConfig {
        &self.config
    }

    /// Run every enabled stage over `df`.
    ///
    /// # Errors
    ///
    /// Only dataset-level failures abort a run: an empty dataset, or a stage
    /// that cannot produce a result at all. Per-action and per-detector
    /// failures are recorded in the report instead.
    pub fn run(&self, df: DataFrame) -> Result<RunOutcome> {
        let ctx = RunContext::new(self.config.clone());
        let span = info_span!("run", run_id = ctx.run_id);
        let _guard = span.enter();

        match self.run_internal(&ctx, df) {
            Ok(outcome) => {
                self.report_progress(ProgressUpdate::done(
                    ctx.run_id,
                    "Remediation completed successfully",
                ));
                Ok(outcome)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(ctx.run_id, e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Run many named datasets on a bounded worker pool.
    ///
    /// Runs are independent; one failure does not affect the others. Results
    /// come back in input order.
    pub fn run_batch(&self, inputs: Vec<(String, DataFrame)>) -> Vec<BatchResult> {
        let total = inputs.len();
        let workers = self.config.max_parallel_runs.min(total).max(1);
        info!("Processing batch of {} datasets with {} workers", total, workers);

        let queue: Mutex<VecDeque<(usize, String, DataFrame)>> = Mutex::new(
            inputs
                .into_iter()
                .enumerate()
                .map(|(i, (name, df))| (i, name, df))
                .collect(),
        );
        let slots: Mutex<Vec<Option<BatchResult>>> =
            Mutex::new((0..total).map(|_| None).collect());

        std::thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| {
                    loop {
                        // Guard dropped before the run starts
                        let next = queue.lock().pop_front();
                        let Some((index, name, df)) = next else {
                            break;
                        };
                        debug!(dataset = %name, "Worker picked up dataset");
                        let outcome = self.run(df);
                        slots.lock()[index] = Some(BatchResult { name, outcome });
                    }
                });
            }
        });

        slots
            .into_inner()
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| BatchResult {
                    name: format!("#{}", index),
                    outcome: Err(RemediationError::Internal(
                        "batch worker exited without a result".to_string(),
                    )),
                })
            })
            .collect()
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn enter(&self, ctx: &RunContext, state: PipelineState, message: impl Into<String>) {
        self.report_progress(ProgressUpdate::new(ctx.run_id, state, 0.0, message));
    }

    fn leave(&self, ctx: &RunContext, state: PipelineState, message: impl Into<String>) {
        self.report_progress(ProgressUpdate::new(ctx.run_id, state, 1.0, message));
    }

    fn run_internal(&self, ctx: &RunContext, df: DataFrame) -> Result<RunOutcome> {
        let stages = ctx.config.stages;
        let mut history: Vec<StageTiming> = Vec::new();
        let mut results = StageResults::default();

        info!(rows = df.height(), columns = df.width(), "Starting remediation pipeline...");
        self.enter(ctx, PipelineState::Idle, "Starting remediation pipeline...");

        // Step 1: Profile (always)
        let started = Instant::now();
        self.enter(ctx, PipelineState::Profiling, "Profiling dataset...");
        let profile = self.profiler.profile(&df)?;
        self.leave(ctx, PipelineState::Profiling, "Profiling complete");
        history.push(timing(PipelineState::Profiling, started));

        // Step 2: Score
        if stages.scoring {
            let started = Instant::now();
            self.enter(ctx, PipelineState::Scoring, "Scoring data quality...");
            let quality = self.scorer.score(&profile);
            info!(
                score = quality.overall_score,
                label = %quality.label,
                "Quality scored"
            );
            self.leave(
                ctx,
                PipelineState::Scoring,
                format!("Quality score {:.1} ({})", quality.overall_score, quality.label),
            );
            results.quality = Some(quality);
            history.push(timing(PipelineState::Scoring, started));
        } else {
            info!("Skipping quality scoring (disabled)");
        }

        // Step 3: Plan
        if stages.planning {
            let started = Instant::now();
            self.enter(ctx, PipelineState::Planning, "Planning remediation...");
            let plan = self.planner.plan(&profile);
            info!("Planned {} actions", plan.len());
            self.leave(
                ctx,
                PipelineState::Planning,
                format!("Planned {} actions", plan.len()),
            );
            results.plan = Some(plan);
            history.push(timing(PipelineState::Planning, started));
        } else {
            info!("Skipping planning (disabled)");
        }

        // Step 4: Detect anomalies on the snapshot while the plan runs on a copy
        let run_anomaly = stages.anomaly;
        let run_execution = stages.execution && results.plan.is_some();
        if stages.execution && !run_execution {
            info!("Skipping execution (no plan to execute)");
        }

        let plan = results.plan.as_deref().unwrap_or_default();
        let (data, execution, anomaly) = if run_anomaly
            && run_execution
            && ctx.config.concurrent_anomaly
        {
            let parent = Span::current();
            std::thread::scope(|s| {
                let handle = s.spawn(|| {
                    let _guard = parent.enter();
                    self.detect_stage(ctx, &df, &profile)
                });
                let (data, log, exec_timing) = self.execute_stage(ctx, df.clone(), plan, &profile);
                // Err only when the detector thread unwinds. The dev and release
                // profiles abort on panic, so in practice this is test builds only.
                let anomaly = handle.join().map_err(|_| {
                    RemediationError::Internal("anomaly detection thread panicked".to_string())
                })??;
                Ok::<_, RemediationError>((data, Some((log, exec_timing)), Some(anomaly)))
            })?
        } else {
            let anomaly = if run_anomaly {
                Some(self.detect_stage(ctx, &df, &profile)?)
            } else {
                info!("Skipping anomaly detection (disabled)");
                None
            };
            if run_execution {
                let (data, log, exec_timing) = self.execute_stage(ctx, df, plan, &profile);
                (data, Some((log, exec_timing)), anomaly)
            } else {
                (df, None, anomaly)
            }
        };

        if let Some((report, anomaly_timing)) = anomaly {
            results.anomaly = Some(report);
            history.push(anomaly_timing);
        }
        if let Some((log, exec_timing)) = execution {
            results.execution = Some(log);
            history.push(exec_timing);
        }

        // Step 5: Re-score the remediated data
        if results.quality.is_some() && results.execution.is_some() {
            results.quality_after = self.rescore(&data);
        }

        // Step 6: Report
        let started = Instant::now();
        self.enter(ctx, PipelineState::Reporting, "Generating report...");
        history.push(timing(PipelineState::Reporting, started));

        let finished_at = Utc::now();
        let report = RemediationReport {
            run_id: ctx.run_id,
            started_at: ctx.started_at,
            finished_at,
            duration_ms: ctx.elapsed_ms(),
            final_state: PipelineState::Done,
            stage_history: history,
            rows_before: profile.rows,
            columns_before: profile.columns,
            rows_after: data.height(),
            columns_after: data.width(),
            profile,
            quality: results.quality,
            plan: results.plan,
            execution: results.execution,
            anomaly: results.anomaly,
            quality_after: results.quality_after,
            config: ctx.config.as_ref().clone(),
        };
        self.leave(ctx, PipelineState::Reporting, "Report complete");

        info!(
            duration_ms = report.duration_ms,
            rows_after = report.rows_after,
            columns_after = report.columns_after,
            "Remediation pipeline finished"
        );

        Ok(RunOutcome { report, data })
    }

    fn detect_stage(
        &self,
        ctx: &RunContext,
        df: &DataFrame,
        profile: &DatasetProfile,
    ) -> Result<(AnomalyReport, StageTiming)> {
        let started = Instant::now();
        self.enter(ctx, PipelineState::Anomaly, "Detecting anomalies...");
        let report = self
            .ensemble
            .detect(df, profile)
            .map_err(|e| RemediationError::StageFailed {
                stage: "anomaly".to_string(),
                reason: e.to_string(),
            })?;
        self.leave(
            ctx,
            PipelineState::Anomaly,
            format!("Flagged {} anomalous rows", report.anomaly_count),
        );
        Ok((report, timing(PipelineState::Anomaly, started)))
    }

    fn execute_stage(
        &self,
        ctx: &RunContext,
        df: DataFrame,
        plan: &[ProposedAction],
        profile: &DatasetProfile,
    ) -> (DataFrame, ExecutionLog, StageTiming) {
        let started = Instant::now();
        self.enter(ctx, PipelineState::Executing, "Executing remediation plan...");
        let (data, log) = self.executor.execute(df, plan, profile);
        self.leave(
            ctx,
            PipelineState::Executing,
            format!("Applied {} of {} actions", log.applied_count(), log.records.len()),
        );
        (data, log, timing(PipelineState::Executing, started))
    }

    /// Quality of the remediated data. `None` when nothing is left to score.
    fn rescore(&self, data: &DataFrame) -> Option<QualityReport> {
        match self.profiler.profile(data) {
            Ok(profile) => Some(self.scorer.score(&profile)),
            Err(e) => {
                warn!("Skipping post-remediation scoring: {}", e);
                None
            }
        }
    }
}

fn timing(stage: PipelineState, started: Instant) -> StageTiming {
    StageTiming {
        stage,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

/// Builder for creating a [`Pipeline`] instance.
///
/// Use [`Pipeline::builder()`] to get started.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<RemediationConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    detectors: Option<Vec<Box<dyn AnomalyDetector>>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RemediationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    ///
    /// The reporter is shared by every run of the pipeline, including
    /// concurrent batch runs; updates carry the run id.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Replace the configured anomaly detectors.
    pub fn detectors(mut self, detectors: Vec<Box<dyn AnomalyDetector>>) -> Self {
        self.detectors = Some(detectors);
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let mut ensemble = AnomalyEnsemble::new(&config);
        if let Some(detectors) = self.detectors {
            ensemble = ensemble.with_detectors(detectors);
        }

        Ok(Pipeline {
            profiler: ColumnProfiler::new(&config),
            scorer: QualityScorer::new(&config),
            planner: ActionPlanner::new(&config),
            executor: RemediationExecutor::new(&config),
            ensemble,
            progress_reporter: self.progress_reporter,
            config: Arc::new(config),
        })
    }
}
