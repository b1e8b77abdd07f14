//! Integration tests for the remediation pipeline.
//!
//! These tests drive whole runs through the public API and check the
//! reports and remediated data they produce.

use lex_remediation::{
    ActionKind, ActionPlanner, ArtifactWriter, ColumnProfiler, Contamination, ImputeStrategy,
    OutlierTreatment, Pipeline, PipelineState, ProposedAction, RemediationConfig,
    RemediationError, RemediationExecutor, StageToggles, VoteRule,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// Helper Functions
// ============================================================================

/// 100 rows: unique names, `age` missing on every row ending in 0-2, constant `id`.
fn people_frame() -> DataFrame {
    let names: Vec<String> = (0..100).map(|i| format!("p{}", i)).collect();
    let ages: Vec<Option<i64>> = (0..100)
        .map(|i| if i % 10 < 3 { None } else { Some((i * 37) % 60 + 18) })
        .collect();
    let ids = vec![7i64; 100];

    df! {
        "name" => names,
        "age" => ages,
        "id" => ids,
    }
    .unwrap()
}

/// 50 rows where the last 5 repeat the first 5.
fn frame_with_duplicates() -> DataFrame {
    let keys: Vec<i64> = (0..50).map(|i| if i < 45 { i } else { i - 45 }).collect();
    let values: Vec<f64> = keys.iter().map(|&k| (k % 13) as f64 * 1.5 + 10.0).collect();
    let labels: Vec<&str> = keys
        .iter()
        .map(|&k| if k % 2 == 0 { "even" } else { "odd" })
        .collect();

    df! {
        "key" => keys,
        "value" => values,
        "label" => labels,
    }
    .unwrap()
}

fn pipeline_with(config: RemediationConfig) -> Pipeline {
    Pipeline::builder().config(config).build().unwrap()
}

fn column_f64(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .unwrap()
        .as_materialized_series()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

// ============================================================================
// End-to-End Scenarios
// ============================================================================

#[test]
fn test_constant_column_dropped_and_missing_age_imputed() {
    let outcome = Pipeline::builder().build().unwrap().run(people_frame()).unwrap();
    let report = &outcome.report;

    assert_eq!(
        report.plan.as_deref().unwrap(),
        &[
            ProposedAction::drop_column("id", "constant"),
            ProposedAction::impute("age", ImputeStrategy::Advanced, "missing 30–70%"),
        ]
    );

    let log = report.execution.as_ref().unwrap();
    assert_eq!(log.records.len(), 2);
    assert!(log.records.iter().all(|r| r.applied));
    assert_eq!(log.records[1].values_affected, 30);

    assert!(outcome.data.column("id").is_err());
    assert_eq!(outcome.data.column("age").unwrap().null_count(), 0);
    assert_eq!(outcome.data.height(), 100);
    assert_eq!(report.columns_after, 2);
    assert_eq!(report.final_state, PipelineState::Done);
}

#[test]
fn test_duplicates_are_removed_first() {
    let outcome = Pipeline::builder()
        .build()
        .unwrap()
        .run(frame_with_duplicates())
        .unwrap();
    let report = &outcome.report;

    assert_eq!(report.profile.duplicate_count, 5);
    let plan = report.plan.as_ref().unwrap();
    assert_eq!(plan[0].action_kind, ActionKind::Dedupe);
    assert_eq!(plan[0].column, None);

    let dedupe = &report.execution.as_ref().unwrap().records[0];
    assert_eq!(dedupe.rows_before, 50);
    assert_eq!(dedupe.rows_after, 45);
    assert_eq!(outcome.data.height(), 45);
    assert_eq!(report.rows_after, 45);
}

#[test]
fn test_extreme_value_clipped_to_upper_bound() {
    let df = df! { "value" => &[1i64, 2, 3, 4, 5, 6, 7, 8, 9, 90] }.unwrap();

    let outcome = Pipeline::builder().build().unwrap().run(df).unwrap();
    let report = &outcome.report;

    let bounds = report.profile.column_profiles[0].outlier_bounds.unwrap();
    assert_eq!(bounds.high, 14.5);
    assert!(report.plan.as_ref().unwrap().is_empty());

    let values = column_f64(&outcome.data, "value");
    assert_eq!(values.len(), 10);
    assert_eq!(values[9], Some(14.5));
    assert_eq!(values[0], Some(1.0));

    let treatments = &report.execution.as_ref().unwrap().outlier_treatments;
    assert_eq!(treatments.len(), 1);
    assert_eq!(treatments[0].treatment, OutlierTreatment::Clip);
    assert_eq!(treatments[0].values_affected, 1);
}

#[test]
fn test_remove_treatment_drops_outlier_rows() {
    let df = df! {
        "value" => &[1i64, 2, 3, 4, 5, 6, 7, 8, 9, 90],
        "tag" => &["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"],
    }
    .unwrap();
    let config = RemediationConfig::builder()
        .outlier_treatment(OutlierTreatment::Remove)
        .build()
        .unwrap();

    let outcome = pipeline_with(config).run(df).unwrap();

    assert_eq!(outcome.data.height(), 9);
    assert_eq!(outcome.report.rows_after, 9);
}

#[test]
fn test_numeric_text_is_cast_before_imputation() {
    let amounts: Vec<Option<String>> = (0..20)
        .map(|i| if i % 10 == 0 { None } else { Some(format!("{}.5", i)) })
        .collect();
    let df = df! {
        "row" => (0..20i64).collect::<Vec<_>>(),
        "amount" => amounts,
    }
    .unwrap();

    let outcome = Pipeline::builder().build().unwrap().run(df).unwrap();
    let plan = outcome.report.plan.as_ref().unwrap();
    let kinds: Vec<ActionKind> = plan.iter().map(|a| a.action_kind).collect();

    assert_eq!(kinds, vec![ActionKind::CastType, ActionKind::Impute]);
    assert_eq!(plan[1].strategy, Some(ImputeStrategy::Simple));

    let cast = &outcome.report.execution.as_ref().unwrap().records[0];
    assert!(cast.applied);
    assert_eq!(cast.unparseable_count, 0);

    let amount = outcome.data.column("amount").unwrap();
    assert_eq!(amount.dtype(), &DataType::Float64);
    assert_eq!(amount.null_count(), 0);
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_planning_remediated_output_proposes_nothing() {
    let config = RemediationConfig::default();
    let outcome = pipeline_with(config.clone()).run(people_frame()).unwrap();
    assert!(!outcome.report.plan.as_ref().unwrap().is_empty());

    let profile = ColumnProfiler::new(&config).profile(&outcome.data).unwrap();
    let replanned = ActionPlanner::new(&config).plan(&profile);

    assert!(replanned.is_empty(), "unexpected actions: {:?}", replanned);
}

#[test]
fn test_second_run_leaves_data_unchanged() {
    let first = Pipeline::builder()
        .build()
        .unwrap()
        .run(frame_with_duplicates())
        .unwrap();
    let second = Pipeline::builder()
        .build()
        .unwrap()
        .run(first.data.clone())
        .unwrap();

    assert!(second.report.plan.as_ref().unwrap().is_empty());
    assert_eq!(second.data.shape(), first.data.shape());
}

// ============================================================================
// Stage Toggles and Failure Isolation
// ============================================================================

#[test]
fn test_disabled_stages_are_absent_from_report() {
    let config = RemediationConfig::builder()
        .stages(StageToggles {
            scoring: true,
            planning: true,
            anomaly: false,
            execution: false,
        })
        .build()
        .unwrap();

    let outcome = pipeline_with(config).run(people_frame()).unwrap();
    let report = &outcome.report;

    assert!(report.quality.is_some());
    assert!(report.plan.is_some());
    assert!(report.execution.is_none());
    assert!(report.anomaly.is_none());
    assert!(report.quality_after.is_none());
    assert_eq!(outcome.data.shape(), (100, 3));

    let json = serde_json::to_value(report).unwrap();
    assert!(json.get("anomaly").is_none());
    assert!(json.get("execution").is_none());
    assert!(json.get("plan").is_some());
}

#[test]
fn test_stage_with_no_findings_is_present_but_empty() {
    let df = df! {
        "a" => &[1.0f64, 2.0, 3.0, 4.0, 5.0],
        "b" => &["x", "y", "z", "w", "v"],
    }
    .unwrap();

    let outcome = Pipeline::builder().build().unwrap().run(df).unwrap();

    assert_eq!(outcome.report.plan.as_deref(), Some(&[][..]));
    // Too few rows for the detectors: the report says why instead of failing
    let anomaly = outcome.report.anomaly.as_ref().unwrap();
    assert_eq!(anomaly.anomaly_count, 0);
    assert_eq!(anomaly.reason.as_deref(), Some("insufficient_data"));
}

#[test]
fn test_stale_action_skipped_after_drop() {
    let df = df! {
        "a" => &[Some(1.0f64), None, Some(3.0)],
        "b" => &[1i64, 2, 3],
    }
    .unwrap();
    let config = RemediationConfig::default();
    let profile = ColumnProfiler::new(&config).profile(&df).unwrap();
    let plan = vec![
        ProposedAction::drop_column("a", "manual"),
        ProposedAction::impute("a", ImputeStrategy::Simple, "manual"),
        ProposedAction::impute("b", ImputeStrategy::Simple, "manual"),
    ];

    let (out, log) = RemediationExecutor::new(&config).execute(df, &plan, &profile);

    assert!(log.records[0].applied);
    assert!(!log.records[1].applied);
    assert!(
        log.records[1]
            .note
            .as_deref()
            .unwrap()
            .contains("no longer present")
    );
    assert!(log.records[2].applied);
    assert_eq!(out.width(), 1);
    assert!(out.column("b").is_ok());
}

#[test]
fn test_empty_dataset_is_fatal() {
    let err = Pipeline::builder()
        .build()
        .unwrap()
        .run(DataFrame::empty())
        .unwrap_err();

    assert!(matches!(err, RemediationError::DataEmpty { .. }));
    assert!(!err.is_recoverable());
}

// ============================================================================
// Anomaly Detection Through the Pipeline
// ============================================================================

fn clustered_frame() -> DataFrame {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for i in 0..60 {
        x.push((i % 10) as f64 + (i / 10) as f64 * 0.1);
        y.push((i % 7) as f64 * 0.5 + 2.0);
    }
    x.push(80.0);
    y.push(-40.0);
    df! { "x" => x, "y" => y }.unwrap()
}

#[test]
fn test_vote_rules_are_ordered() {
    let count = |vote: VoteRule| {
        let config = RemediationConfig::builder()
            .anomaly_vote(vote)
            .anomaly_contamination(Contamination::Rate(0.1))
            .build()
            .unwrap();
        pipeline_with(config)
            .run(clustered_frame())
            .unwrap()
            .report
            .anomaly
            .unwrap()
            .anomaly_count
    };

    let unanimous = count(VoteRule::Unanimous);
    let majority = count(VoteRule::Majority);
    let any = count(VoteRule::Any);

    assert!(unanimous <= majority);
    assert!(majority <= any);
}

#[test]
fn test_planted_anomaly_is_found() {
    let outcome = Pipeline::builder().build().unwrap().run(clustered_frame()).unwrap();
    let anomaly = outcome.report.anomaly.unwrap();

    assert!(anomaly.reason.is_none());
    assert!(anomaly.per_row_verdict.contains(&60));
    assert_eq!(anomaly.anomaly_count, anomaly.per_row_verdict.len());
    assert!(anomaly.resolved_contamination.is_some());
}

// ============================================================================
// Progress Reporting
// ============================================================================

#[test]
fn test_progress_is_monotonic_and_ends_done() {
    let updates = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);

    // Sequential so stage updates arrive from one thread
    let config = RemediationConfig::builder()
        .concurrent_anomaly(false)
        .build()
        .unwrap();

    Pipeline::builder()
        .config(config)
        .on_progress(move |update| sink.lock().push((update.stage, update.progress)))
        .build()
        .unwrap()
        .run(people_frame())
        .unwrap();

    let updates = updates.lock();
    assert!(updates.windows(2).all(|w| w[0].1 <= w[1].1 + 1e-9));
    assert_eq!(updates.last().map(|u| u.0), Some(PipelineState::Done));
}

#[test]
fn test_failed_run_reports_failed_state() {
    let failed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&failed);

    let _ = Pipeline::builder()
        .on_progress(move |update| {
            if update.stage == PipelineState::Failed {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build()
        .unwrap()
        .run(DataFrame::empty());

    assert_eq!(failed.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Batch Mode
// ============================================================================

#[test]
fn test_batch_results_keep_input_order() {
    let config = RemediationConfig::builder().max_parallel_runs(2).build().unwrap();
    let inputs = vec![
        ("people".to_string(), people_frame()),
        ("empty".to_string(), DataFrame::empty()),
        ("dupes".to_string(), frame_with_duplicates()),
    ];

    let results = pipeline_with(config).run_batch(inputs);

    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["people", "empty", "dupes"]);
    assert!(results[0].outcome.is_ok());
    assert!(matches!(
        results[1].outcome,
        Err(RemediationError::DataEmpty { .. })
    ));
    assert_eq!(results[2].outcome.as_ref().unwrap().data.height(), 45);

    let ids: Vec<u64> = [&results[0], &results[2]]
        .iter()
        .map(|r| r.outcome.as_ref().unwrap().report.run_id)
        .collect();
    assert_ne!(ids[0], ids[1]);
}

// ============================================================================
// Configuration and Artifacts
// ============================================================================

#[test]
fn test_config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"missing_drop_threshold": 0.5, "anomaly_contamination": 0.05, "anomaly_vote": "any"}"#,
    )
    .unwrap();

    let config = RemediationConfig::from_json_file(&path).unwrap();

    assert_eq!(config.missing_drop_threshold, 0.5);
    assert_eq!(config.anomaly_contamination, Contamination::Rate(0.05));
    assert_eq!(config.anomaly_vote, VoteRule::Any);
    assert_eq!(config.impute_simple_threshold, 0.30);
}

#[test]
fn test_artifacts_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut outcome = Pipeline::builder().build().unwrap().run(people_frame()).unwrap();

    let writer = ArtifactWriter::new(dir.path());
    let paths = writer
        .write("people", &outcome.report, Some(&mut outcome.data))
        .unwrap();

    assert!(paths.quality_report.as_ref().unwrap().exists());
    assert!(paths.clean_plan.as_ref().unwrap().exists());
    assert!(paths.remediation_report.exists());
    assert!(paths.cleaned_data.as_ref().unwrap().exists());
    assert!(
        paths
            .remediation_report
            .ends_with("people_remediation_report.json")
    );

    let text = std::fs::read_to_string(&paths.clean_plan.unwrap()).unwrap();
    let records: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 2);

    let cleaned = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(paths.cleaned_data)
        .unwrap()
        .finish()
        .unwrap();
    assert_eq!(cleaned.shape(), (100, 2));
}

#[test]
fn test_artifacts_skip_stages_that_did_not_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = RemediationConfig::builder()
        .stages(StageToggles {
            scoring: false,
            planning: true,
            anomaly: false,
            execution: false,
        })
        .build()
        .unwrap();
    let outcome = pipeline_with(config).run(people_frame()).unwrap();

    let paths = ArtifactWriter::new(dir.path())
        .write("people", &outcome.report, None)
        .unwrap();

    assert!(paths.quality_report.is_none());
    assert!(paths.clean_plan.is_none());
    assert!(paths.cleaned_data.is_none());
    assert!(!dir.path().join("people_dq_report.json").exists());
}

#[test]
fn test_flagged_input_marks_verdict_rows() {
    let dir = tempfile::tempdir().unwrap();
    let input = clustered_frame();
    let outcome = Pipeline::builder().build().unwrap().run(input.clone()).unwrap();
    let anomaly = outcome.report.anomaly.unwrap();

    let path = ArtifactWriter::new(dir.path())
        .write_flagged("clusters", &input, &anomaly)
        .unwrap();
    assert!(path.ends_with("clusters_flagged.csv"));

    let flagged = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))
        .unwrap()
        .finish()
        .unwrap();
    assert_eq!(flagged.shape(), (61, 3));
    let flags = flagged.column("is_anomaly").unwrap().bool().unwrap();
    assert_eq!(flags.get(60), Some(true));
    assert_eq!(flags.sum(), Some(anomaly.anomaly_count as IdxSize));
}
