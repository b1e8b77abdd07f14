//! Multi-detector anomaly detection.
//!
//! The [`AnomalyEnsemble`] runs independent detectors over the numeric
//! columns of the pre-remediation data and combines their flags by vote:
//!
//! - `density`: local outlier factor
//! - `isolation`: isolation forest
//! - `covariance`: Mahalanobis distance from a robust covariance envelope
//!
//! A detector that fails drops out of the vote and is listed in the report.
//! Thin data (fewer than two numeric columns or too few rows) yields an empty
//! report instead of an error.

mod covariance;
mod density;
mod isolation;
mod matrix;

pub use covariance::CovarianceDetector;
pub use density::DensityDetector;
pub use isolation::IsolationDetector;

use crate::config::{AnomalyMethod, Contamination, RemediationConfig, VoteRule};
use crate::error::{RemediationError, Result};
use crate::types::{AnomalyReport, AnomalyVote, DatasetProfile, DetectorFailure, FeatureContribution};
use crate::utils::{mean, sample_std};
use matrix::FeatureMatrix;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Auto contamination never leaves this range.
const AUTO_CONTAMINATION_RANGE: (f64, f64) = (0.01, 0.10);

/// Indicator columns named in the recommendations.
const TOP_INDICATORS: usize = 3;

/// A scoring method over a standardized row-major matrix.
pub trait AnomalyDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// One score per row; higher means more anomalous.
    fn score(&self, data: &[Vec<f64>]) -> anyhow::Result<Vec<f64>>;
}

/// Flags the `ceil(rate * n)` highest scores. Ties go to the earlier row.
pub fn flag_top(scores: &[f64], rate: f64) -> Vec<bool> {
    let n = scores.len();
    let count = ((rate * n as f64).ceil() as usize).min(n);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));

    let mut flags = vec![false; n];
    for &i in order.iter().take(count) {
        flags[i] = true;
    }
    flags
}

/// Rows accepted by `rule` given each active detector's votes.
pub fn tally_votes(runs: &[Vec<AnomalyVote>], rule: VoteRule) -> BTreeSet<usize> {
    let active = runs.len();
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for vote in runs.iter().flatten() {
        let entry = counts.entry(vote.row_index).or_insert(0);
        if vote.is_anomaly {
            *entry += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, votes)| rule.accepts(*votes, active))
        .map(|(row, _)| row)
        .collect()
}

/// Column added by [`mark_anomalies`].
pub const ANOMALY_FLAG_COLUMN: &str = "is_anomaly";

/// `df` with a Boolean `is_anomaly` column, true on every row in the
/// report's verdict.
///
/// `df` must be the frame the report was computed on; verdict indices refer
/// to its rows. An existing `is_anomaly` column is replaced.
pub fn mark_anomalies(df: &DataFrame, report: &AnomalyReport) -> PolarsResult<DataFrame> {
    check_verdict_rows(df, report)?;
    let flags: Vec<bool> = (0..df.height())
        .map(|row| report.per_row_verdict.contains(&row))
        .collect();

    let mut marked = df.clone();
    marked.with_column(Series::new(ANOMALY_FLAG_COLUMN.into(), flags))?;
    Ok(marked)
}

/// `df` without the rows in the report's verdict. Remaining rows keep
/// their order.
pub fn remove_anomalies(df: &DataFrame, report: &AnomalyReport) -> PolarsResult<DataFrame> {
    check_verdict_rows(df, report)?;
    if report.per_row_verdict.is_empty() {
        return Ok(df.clone());
    }

    let keep: Vec<bool> = (0..df.height())
        .map(|row| !report.per_row_verdict.contains(&row))
        .collect();
    df.filter(&BooleanChunked::from_slice("keep".into(), &keep))
}

fn check_verdict_rows(df: &DataFrame, report: &AnomalyReport) -> PolarsResult<()> {
    match report.per_row_verdict.last() {
        Some(&row) if row >= df.height() => Err(PolarsError::OutOfBounds(
            format!(
                "anomaly verdict names row {} but the frame has {} rows",
                row,
                df.height()
            )
            .into(),
        )),
        _ => Ok(()),
    }
}

/// Ensemble of outlier detectors with a voting rule.
pub struct AnomalyEnsemble {
    detectors: Vec<Box<dyn AnomalyDetector>>,
    vote_rule: VoteRule,
    contamination: Contamination,
    min_rows: usize,
    max_rows: usize,
    seed: u64,
    importance_threshold: f64,
}

impl AnomalyEnsemble {
    pub fn new(config: &RemediationConfig) -> Self {
        let detectors = config
            .anomaly_methods
            .iter()
            .map(|method| -> Box<dyn AnomalyDetector> {
                match method {
                    AnomalyMethod::Density => Box::new(DensityDetector::new(config.density_neighbors)),
                    AnomalyMethod::Isolation => {
                        Box::new(IsolationDetector::new(config.isolation_trees, config.anomaly_seed))
                    }
                    AnomalyMethod::Covariance => Box::new(CovarianceDetector::default()),
                }
            })
            .collect();

        Self {
            detectors,
            vote_rule: config.anomaly_vote,
            contamination: config.anomaly_contamination,
            min_rows: config.anomaly_min_rows,
            max_rows: config.anomaly_max_rows,
            seed: config.anomaly_seed,
            importance_threshold: config.importance_threshold,
        }
    }

    /// Replace the detector set, e.g. with a custom [`AnomalyDetector`].
    pub fn with_detectors(mut self, detectors: Vec<Box<dyn AnomalyDetector>>) -> Self {
        self.detectors = detectors;
        self
    }

    /// `"ensemble(density, isolation)"` for the configured detectors.
    pub fn method_name(&self) -> String {
        let names: Vec<&str> = self.detectors.iter().map(|d| d.name()).collect();
        format!("ensemble({})", names.join(", "))
    }

    /// Detect anomalous rows. Row indices in the report refer to `df`.
    pub fn detect(&self, df: &DataFrame, profile: &DatasetProfile) -> Result<AnomalyReport> {
        let numeric = profile.numeric_columns();
        if let Err(e) = self.check_support(df.height(), numeric.len()) {
            info!(error = %e, "Skipping anomaly detection");
            let mut report = AnomalyReport::empty(self.method_name(), self.vote_rule, "insufficient_data");
            report.recommendations = vec!["Insufficient numeric data for anomaly detection".to_string()];
            return Ok(report);
        }

        let matrix = FeatureMatrix::prepare(df, &numeric, self.max_rows, self.seed)?;
        let rate = self.resolve_contamination(&matrix, profile);
        debug!(
            rows = matrix.rows(),
            columns = matrix.columns.len(),
            sampled = matrix.sampled,
            contamination = rate,
            "Prepared anomaly matrix"
        );

        let mut runs: Vec<Vec<AnomalyVote>> = Vec::new();
        let mut detectors = Vec::new();
        let mut detector_failures = Vec::new();

        for detector in &self.detectors {
            match self.run_detector(detector.as_ref(), &matrix, rate) {
                Ok(votes) => {
                    let flagged = votes.iter().filter(|v| v.is_anomaly).count();
                    debug!(detector = detector.name(), flagged, "Detector finished");
                    detectors.push(detector.name().to_string());
                    runs.push(votes);
                }
                Err(e) => {
                    warn!(detector = detector.name(), error = %e, "Detector failed");
                    detector_failures.push(DetectorFailure {
                        detector: detector.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if runs.is_empty() {
            let mut report =
                AnomalyReport::empty(self.method_name(), self.vote_rule, "no_active_detectors");
            report.rows_analyzed = matrix.rows();
            report.sampled = matrix.sampled;
            report.resolved_contamination = Some(rate);
            report.detector_failures = detector_failures;
            report.recommendations = vec!["No anomaly detector produced a result".to_string()];
            return Ok(report);
        }

        let per_row_verdict = tally_votes(&runs, self.vote_rule);
        let anomaly_count = per_row_verdict.len();
        let anomaly_percentage =
            (anomaly_count as f64 / matrix.rows() as f64 * 100.0 * 100.0).round() / 100.0;
        let feature_importance = self.feature_importance(&matrix, &per_row_verdict);
        let recommendations = recommendations(anomaly_count, anomaly_percentage, &feature_importance);

        info!(
            anomaly_count,
            anomaly_percentage,
            detectors = detectors.len(),
            "Anomaly detection complete"
        );

        Ok(AnomalyReport {
            method: self.method_name(),
            detectors,
            vote_rule: self.vote_rule,
            resolved_contamination: Some(rate),
            rows_analyzed: matrix.rows(),
            sampled: matrix.sampled,
            anomaly_count,
            anomaly_percentage,
            per_row_verdict,
            feature_importance,
            detector_failures,
            reason: None,
            recommendations,
        })
    }

    fn check_support(&self, rows: usize, numeric_columns: usize) -> Result<()> {
        if numeric_columns < 2 || rows < self.min_rows {
            return Err(RemediationError::InsufficientSupport {
                rows,
                numeric_columns,
                min_rows: self.min_rows,
            });
        }
        Ok(())
    }

    fn run_detector(
        &self,
        detector: &dyn AnomalyDetector,
        matrix: &FeatureMatrix,
        rate: f64,
    ) -> anyhow::Result<Vec<AnomalyVote>> {
        let scores = detector.score(&matrix.standardized)?;
        if scores.len() != matrix.rows() {
            anyhow::bail!("expected {} scores, got {}", matrix.rows(), scores.len());
        }
        if scores.iter().any(|s| !s.is_finite()) {
            anyhow::bail!("non-finite score");
        }

        let flags = flag_top(&scores, rate);
        Ok(matrix
            .row_index
            .iter()
            .zip(scores.iter().zip(flags))
            .map(|(&row_index, (&score, is_anomaly))| AnomalyVote {
                detector_name: detector.name().to_string(),
                row_index,
                is_anomaly,
                score,
            })
            .collect())
    }

    /// Configured rate, or the share of rows outside any column's IQR bounds.
    fn resolve_contamination(&self, matrix: &FeatureMatrix, profile: &DatasetProfile) -> f64 {
        match self.contamination {
            Contamination::Rate(rate) => rate,
            Contamination::Auto => {
                let bounds: Vec<_> = matrix
                    .columns
                    .iter()
                    .map(|c| profile.column(c).and_then(|p| p.outlier_bounds))
                    .collect();
                let outside = (0..matrix.rows())
                    .filter(|&r| {
                        matrix.raw.iter().zip(&bounds).any(|(column, b)| {
                            matches!((column[r], b), (Some(v), Some(b)) if b.is_outlier(v))
                        })
                    })
                    .count();
                let share = outside as f64 / matrix.rows().max(1) as f64;
                share.clamp(AUTO_CONTAMINATION_RANGE.0, AUTO_CONTAMINATION_RANGE.1)
            }
        }
    }

    /// `|mean(flagged) - mean(all)| / std(all)` per column, over raw values.
    fn feature_importance(
        &self,
        matrix: &FeatureMatrix,
        verdict: &BTreeSet<usize>,
    ) -> Vec<FeatureContribution> {
        if verdict.is_empty() {
            return Vec::new();
        }

        let mut contributions: Vec<FeatureContribution> = matrix
            .columns
            .iter()
            .zip(&matrix.raw)
            .filter_map(|(name, column)| {
                let all: Vec<f64> = column.iter().flatten().copied().collect();
                let flagged: Vec<f64> = matrix
                    .row_index
                    .iter()
                    .zip(column)
                    .filter(|(row, _)| verdict.contains(*row))
                    .filter_map(|(_, v)| *v)
                    .collect();
                let std = sample_std(&all);
                let contribution = match (mean(&flagged), mean(&all)) {
                    (Some(f), Some(g)) if std > 0.0 => (f - g).abs() / std,
                    _ => 0.0,
                };
                (contribution >= self.importance_threshold).then(|| FeatureContribution {
                    column: name.clone(),
                    contribution,
                })
            })
            .collect();

        contributions.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
        contributions
    }
}

fn recommendations(
    anomaly_count: usize,
    anomaly_percentage: f64,
    importance: &[FeatureContribution],
) -> Vec<String> {
    let mut recs = Vec::new();

    if anomaly_percentage < 1.0 {
        recs.push(format!(
            "Low anomaly rate ({:.1}%) - data quality is good",
            anomaly_percentage
        ));
    } else if anomaly_percentage < 5.0 {
        recs.push(format!(
            "Moderate anomaly rate ({:.1}%) - review flagged records",
            anomaly_percentage
        ));
    } else {
        recs.push(format!(
            "High anomaly rate ({:.1}%) - investigate data collection process",
            anomaly_percentage
        ));
    }

    if !importance.is_empty() {
        let top: Vec<String> = importance
            .iter()
            .take(TOP_INDICATORS)
            .map(|f| format!("{} ({:.2})", f.column, f.contribution))
            .collect();
        recs.push(format!("Key anomaly indicators: {}", top.join(", ")));
    }

    if anomaly_count > 0 {
        recs.push(format!(
            "Consider: Remove {} anomalous rows or investigate further",
            anomaly_count
        ));
        recs.push("Use per_row_verdict from the report to examine specific records".to_string());
    }

    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::ColumnProfiler;

    fn vote(detector: &str, row_index: usize, is_anomaly: bool) -> AnomalyVote {
        AnomalyVote {
            detector_name: detector.to_string(),
            row_index,
            is_anomaly,
            score: 0.0,
        }
    }

    fn cluster_with_outlier(rows: usize) -> DataFrame {
        let mut x: Vec<f64> = (0..rows).map(|i| (i % 7) as f64 + (i % 3) as f64 * 0.25).collect();
        let mut y: Vec<f64> = (0..rows).map(|i| (i % 5) as f64 * 1.5 + (i % 2) as f64).collect();
        x[rows - 1] = 60.0;
        y[rows - 1] = -40.0;
        df!["x" => x, "y" => y].unwrap()
    }

    fn detect(df: &DataFrame, config: &RemediationConfig) -> AnomalyReport {
        let profile = ColumnProfiler::new(config).profile(df).unwrap();
        AnomalyEnsemble::new(config).detect(df, &profile).unwrap()
    }

    // ===== flag_top / tally tests =====

    #[test]
    fn test_flag_top_counts_and_ties() {
        let flags = flag_top(&[0.1, 0.9, 0.5, 0.9], 0.25);
        assert_eq!(flags, vec![false, true, false, false]);

        let flags = flag_top(&[1.0, 2.0, 3.0], 0.5);
        assert_eq!(flags.iter().filter(|f| **f).count(), 2);
    }

    #[test]
    fn test_tally_votes_rules() {
        let runs = vec![
            vec![vote("a", 0, true), vote("a", 1, true), vote("a", 2, false)],
            vec![vote("b", 0, true), vote("b", 1, false), vote("b", 2, false)],
            vec![vote("c", 0, true), vote("c", 1, true), vote("c", 2, true)],
        ];
        assert_eq!(tally_votes(&runs, VoteRule::Unanimous), BTreeSet::from([0]));
        assert_eq!(tally_votes(&runs, VoteRule::Majority), BTreeSet::from([0, 1]));
        assert_eq!(tally_votes(&runs, VoteRule::Any), BTreeSet::from([0, 1, 2]));
    }

    // ===== ensemble tests =====

    #[test]
    fn test_insufficient_data() {
        let df = df!["x" => [1.0, 2.0, 3.0], "y" => [3.0, 2.0, 1.0]].unwrap();
        let report = detect(&df, &RemediationConfig::default());
        assert_eq!(report.reason.as_deref(), Some("insufficient_data"));
        assert_eq!(report.anomaly_count, 0);
    }

    #[test]
    fn test_single_numeric_column_is_insufficient() {
        let df = df!["x" => (0..50).map(|i| i as f64).collect::<Vec<_>>()].unwrap();
        let report = detect(&df, &RemediationConfig::default());
        assert_eq!(report.reason.as_deref(), Some("insufficient_data"));
    }

    #[test]
    fn test_ensemble_flags_extreme_row() {
        let df = cluster_with_outlier(60);
        let report = detect(&df, &RemediationConfig::default());

        assert!(report.reason.is_none());
        assert_eq!(report.detectors.len(), 3);
        assert!(report.per_row_verdict.contains(&59));
        assert_eq!(report.anomaly_count, report.per_row_verdict.len());
        assert!(!report.feature_importance.is_empty());
        let rate = report.resolved_contamination.unwrap();
        assert!((0.01..=0.10).contains(&rate));
        assert_eq!(report.method, "ensemble(density, isolation, covariance)");
    }

    #[test]
    fn test_vote_rule_ordering() {
        let df = cluster_with_outlier(60);
        let run = |rule| {
            let config = RemediationConfig::builder()
                .anomaly_vote(rule)
                .anomaly_contamination(Contamination::Rate(0.1))
                .build()
                .unwrap();
            detect(&df, &config).per_row_verdict
        };
        let unanimous = run(VoteRule::Unanimous);
        let majority = run(VoteRule::Majority);
        let any = run(VoteRule::Any);
        assert!(unanimous.is_subset(&majority));
        assert!(majority.is_subset(&any));
    }

    #[test]
    fn test_infinite_value_does_not_disable_detectors() {
        let mut df = cluster_with_outlier(60);
        let mut x: Vec<f64> = df.column("x").unwrap().f64().unwrap().into_no_null_iter().collect();
        x[10] = f64::INFINITY;
        df.with_column(Series::new("x".into(), x)).unwrap();

        let report = detect(&df, &RemediationConfig::default());

        assert!(report.reason.is_none());
        assert!(report.detector_failures.is_empty());
        assert_eq!(report.detectors.len(), 3);
    }

    struct FailingDetector;

    impl AnomalyDetector for FailingDetector {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn score(&self, _data: &[Vec<f64>]) -> anyhow::Result<Vec<f64>> {
            anyhow::bail!("always fails")
        }
    }

    #[test]
    fn test_failed_detector_leaves_vote() {
        let df = cluster_with_outlier(40);
        let config = RemediationConfig::default();
        let profile = ColumnProfiler::new(&config).profile(&df).unwrap();
        let ensemble = AnomalyEnsemble::new(&config).with_detectors(vec![
            Box::new(FailingDetector),
            Box::new(DensityDetector::new(10)),
        ]);
        let report = ensemble.detect(&df, &profile).unwrap();

        assert_eq!(report.detectors, vec!["density".to_string()]);
        assert_eq!(report.detector_failures.len(), 1);
        assert!(report.per_row_verdict.contains(&39));
    }

    #[test]
    fn test_all_detectors_failing() {
        let df = cluster_with_outlier(60);
        let config = RemediationConfig::default();
        let profile = ColumnProfiler::new(&config).profile(&df).unwrap();
        let ensemble =
            AnomalyEnsemble::new(&config).with_detectors(vec![Box::new(FailingDetector)]);
        let report = ensemble.detect(&df, &profile).unwrap();

        assert_eq!(report.reason.as_deref(), Some("no_active_detectors"));
        assert!(report.per_row_verdict.is_empty());
        assert_eq!(report.detector_failures[0].detector, "failing");
    }

    #[test]
    fn test_sampled_indices_refer_to_original_rows() {
        let df = cluster_with_outlier(120);
        let config = RemediationConfig::builder()
            .anomaly_max_rows(50)
            .anomaly_min_rows(10)
            .build()
            .unwrap();
        let report = detect(&df, &config);
        assert!(report.sampled);
        assert_eq!(report.rows_analyzed, 50);
        assert!(report.per_row_verdict.iter().all(|r| *r < 120));
    }

    #[test]
    fn test_recommendation_bands() {
        assert!(recommendations(0, 0.0, &[])[0].starts_with("Low anomaly rate"));
        assert!(recommendations(3, 3.0, &[])[0].starts_with("Moderate"));
        let recs = recommendations(
            10,
            10.0,
            &[FeatureContribution {
                column: "x".to_string(),
                contribution: 2.5,
            }],
        );
        assert!(recs[0].starts_with("High"));
        assert_eq!(recs[1], "Key anomaly indicators: x (2.50)");
        assert_eq!(recs.len(), 4);
    }

    // ===== marking and removal =====

    fn report_with_verdict(rows: &[usize]) -> AnomalyReport {
        let mut report = AnomalyReport::empty("ensemble(density)", VoteRule::Majority, "test");
        report.per_row_verdict = rows.iter().copied().collect();
        report.anomaly_count = rows.len();
        report
    }

    #[test]
    fn test_mark_anomalies_adds_flag_column() {
        let df = df!["x" => [1.0, 2.0, 3.0, 4.0], "y" => ["a", "b", "c", "d"]].unwrap();
        let marked = mark_anomalies(&df, &report_with_verdict(&[1, 3])).unwrap();

        assert_eq!(marked.width(), 3);
        let flags: Vec<Option<bool>> = marked
            .column(ANOMALY_FLAG_COLUMN)
            .unwrap()
            .bool()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(flags, vec![Some(false), Some(true), Some(false), Some(true)]);
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn test_mark_anomalies_with_empty_verdict() {
        let df = df!["x" => [1.0, 2.0]].unwrap();
        let marked = mark_anomalies(&df, &report_with_verdict(&[])).unwrap();
        let flags = marked.column(ANOMALY_FLAG_COLUMN).unwrap().bool().unwrap();
        assert_eq!(flags.sum(), Some(0));
    }

    #[test]
    fn test_remove_anomalies_keeps_order() {
        let df = df!["x" => [10i64, 20, 30, 40, 50]].unwrap();
        let kept = remove_anomalies(&df, &report_with_verdict(&[0, 3])).unwrap();

        let x: Vec<Option<i64>> = kept.column("x").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(x, vec![Some(20), Some(30), Some(50)]);
    }

    #[test]
    fn test_verdict_outside_frame_is_rejected() {
        let df = df!["x" => [1.0, 2.0]].unwrap();
        let report = report_with_verdict(&[5]);
        assert!(mark_anomalies(&df, &report).is_err());
        assert!(remove_anomalies(&df, &report).is_err());
    }

    #[test]
    fn test_detected_rows_can_be_marked_and_removed() {
        let df = cluster_with_outlier(60);
        let report = detect(&df, &RemediationConfig::default());
        assert!(report.per_row_verdict.contains(&59));

        let marked = mark_anomalies(&df, &report).unwrap();
        let flags = marked.column(ANOMALY_FLAG_COLUMN).unwrap().bool().unwrap();
        assert_eq!(flags.get(59), Some(true));
        assert_eq!(flags.sum(), Some(report.anomaly_count as IdxSize));

        let kept = remove_anomalies(&df, &report).unwrap();
        assert_eq!(kept.height(), 60 - report.anomaly_count);
    }
}
