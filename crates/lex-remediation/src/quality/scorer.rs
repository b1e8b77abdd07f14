use crate::config::{QualityThresholds, RemediationConfig};
use crate::types::{ColumnProfile, DatasetProfile, QualityLabel, QualityReport, SemanticType};
use indexmap::IndexMap;
use tracing::debug;

/// Columns named per recommendation line before it is cut with "...".
const NAMES_PER_LINE: usize = 3;

/// Per-column scores below this are called out.
const LOW_COLUMN_SCORE: f64 = 0.5;

/// The three dataset-level quality dimensions, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub completeness: f64,
    pub uniqueness: f64,
    pub consistency: f64,
}

impl ScoreBreakdown {
    /// Mean of the dimensions on a 0-100 scale.
    pub fn overall(&self) -> f64 {
        ((self.completeness + self.uniqueness + self.consistency) / 3.0 * 100.0).clamp(0.0, 100.0)
    }
}

/// Score dimensions from raw counts.
///
/// A missing numeric cell weighs on consistency like an outlier does, so
/// blanking an out-of-range value never improves the score. Each dimension
/// only falls as its counts rise.
pub fn score_counts(
    rows: usize,
    columns: usize,
    missing_cells: usize,
    duplicate_rows: usize,
    numeric_cells: usize,
    missing_numeric_cells: usize,
    outlier_cells: usize,
) -> ScoreBreakdown {
    let ratio = |part: usize, whole: usize| {
        if whole == 0 {
            0.0
        } else {
            (part as f64 / whole as f64).min(1.0)
        }
    };

    ScoreBreakdown {
        completeness: 1.0 - ratio(missing_cells, rows * columns),
        uniqueness: 1.0 - ratio(duplicate_rows, rows),
        consistency: 1.0 - ratio(outlier_cells + missing_numeric_cells, numeric_cells),
    }
}

/// Map a 0-100 score to its label.
pub fn label_for(score: f64, thresholds: &QualityThresholds) -> QualityLabel {
    if score >= thresholds.excellent {
        QualityLabel::Excellent
    } else if score >= thresholds.good {
        QualityLabel::Good
    } else if score >= thresholds.fair {
        QualityLabel::Fair
    } else {
        QualityLabel::Poor
    }
}

/// Per-column quality in `[0, 1]`, rounded to three decimals.
pub fn column_score(column: &ColumnProfile) -> f64 {
    let mut score = 1.0;
    score -= 0.40 * column.missing_ratio;
    if column.is_constant {
        score -= 0.25;
    }
    if column.value_count > 0 {
        score -= 0.20 * (column.outlier_count as f64 / column.value_count as f64);
    }
    if column.inferred_semantic_type == SemanticType::CategoricalHighCardinality {
        score -= 0.10;
    }
    (score.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

/// Turns a dataset profile into a quality report.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    thresholds: QualityThresholds,
    missing_drop_threshold: f64,
    impute_simple_threshold: f64,
    impute_floor: f64,
    datetime_parse_threshold: f64,
}

impl QualityScorer {
    pub fn new(config: &RemediationConfig) -> Self {
        Self {
            thresholds: config.quality_thresholds,
            missing_drop_threshold: config.missing_drop_threshold,
            impute_simple_threshold: config.impute_simple_threshold,
            impute_floor: config.impute_floor,
            datetime_parse_threshold: config.datetime_parse_threshold,
        }
    }

    pub fn score(&self, profile: &DatasetProfile) -> QualityReport {
        let breakdown = score_counts(
            profile.rows,
            profile.columns,
            profile.missing_total,
            profile.duplicate_count,
            profile.numeric_cells,
            profile.numeric_missing,
            profile.outlier_total,
        );
        let overall_score = breakdown.overall();
        let label = label_for(overall_score, &self.thresholds);

        let per_column: IndexMap<String, ColumnProfile> = profile
            .column_profiles
            .iter()
            .map(|c| (c.name.clone(), c.clone()))
            .collect();
        let column_scores: IndexMap<String, f64> = profile
            .column_profiles
            .iter()
            .map(|c| (c.name.clone(), column_score(c)))
            .collect();

        let recommendations = self.recommendations(profile, &column_scores);

        debug!(
            overall_score,
            label = %label,
            completeness = breakdown.completeness,
            uniqueness = breakdown.uniqueness,
            consistency = breakdown.consistency,
            "Scored dataset quality"
        );

        QualityReport {
            overall_score,
            label,
            completeness: breakdown.completeness,
            uniqueness: breakdown.uniqueness,
            consistency: breakdown.consistency,
            per_column,
            column_scores,
            missing_total: profile.missing_total,
            duplicate_count: profile.duplicate_count,
            outlier_count: profile.outlier_total,
            recommendations,
        }
    }

    /// Prioritized, human-readable findings.
    fn recommendations(
        &self,
        profile: &DatasetProfile,
        column_scores: &IndexMap<String, f64>,
    ) -> Vec<String> {
        let columns = &profile.column_profiles;
        let names_where = |pred: &dyn Fn(&ColumnProfile) -> bool| -> Vec<&str> {
            columns
                .iter()
                .filter(|c| pred(c))
                .map(|c| c.name.as_str())
                .collect()
        };
        let drop_pct = self.missing_drop_threshold * 100.0;
        let simple_pct = self.impute_simple_threshold * 100.0;
        let floor_pct = self.impute_floor * 100.0;

        let mut recs = Vec::new();

        let constant = names_where(&|c| c.is_constant && c.missing_ratio <= self.missing_drop_threshold);
        if !constant.is_empty() {
            recs.push(format!(
                "CRITICAL: Drop constant columns ({}): {}",
                constant.len(),
                name_list(&constant)
            ));
        }

        let critical_missing = names_where(&|c| c.missing_ratio > self.missing_drop_threshold);
        if !critical_missing.is_empty() {
            recs.push(format!(
                "CRITICAL: >{:.0}% missing in {} column(s): {}",
                drop_pct,
                critical_missing.len(),
                name_list(&critical_missing)
            ));
        }

        if profile.duplicate_count > 0 {
            let dup_pct = profile.duplicate_count as f64 / profile.rows.max(1) as f64 * 100.0;
            recs.push(format!(
                "HIGH: Remove {} duplicate rows ({:.1}%).",
                profile.duplicate_count, dup_pct
            ));
        }

        let high_missing = names_where(&|c| {
            c.missing_ratio >= self.impute_simple_threshold
                && c.missing_ratio <= self.missing_drop_threshold
        });
        if !high_missing.is_empty() {
            recs.push(format!(
                "HIGH: Handle {} column(s) with {:.0}-{:.0}% missing: {}",
                high_missing.len(),
                simple_pct,
                drop_pct,
                name_list(&high_missing)
            ));
        }

        let numeric_text = names_where(&|c| c.is_numeric_text());
        if !numeric_text.is_empty() {
            recs.push(format!(
                "HIGH: Convert numeric-like text to numbers in {} column(s): {}",
                numeric_text.len(),
                name_list(&numeric_text)
            ));
        }

        let moderate_missing = names_where(&|c| {
            c.missing_ratio >= self.impute_floor && c.missing_ratio < self.impute_simple_threshold
        });
        if !moderate_missing.is_empty() {
            recs.push(format!(
                "MEDIUM: Impute {} column(s) with {:.0}-{:.0}% missing: {}",
                moderate_missing.len(),
                floor_pct,
                simple_pct,
                name_list(&moderate_missing)
            ));
        }

        if profile.outlier_total > 0 {
            recs.push(format!(
                "MEDIUM: Review {} outlier value(s); consider capping or removal.",
                profile.outlier_total
            ));
        }

        let date_like = names_where(&|c| c.is_datetime_text(self.datetime_parse_threshold));
        if !date_like.is_empty() {
            recs.push(format!(
                "MEDIUM: Parse datetime in {} column(s): {}",
                date_like.len(),
                name_list(&date_like)
            ));
        }

        let mut low_quality: Vec<(&str, f64)> = column_scores
            .iter()
            .filter(|(_, s)| **s < LOW_COLUMN_SCORE)
            .map(|(c, s)| (c.as_str(), *s))
            .collect();
        if !low_quality.is_empty() {
            low_quality.sort_by(|a, b| a.1.total_cmp(&b.1));
            let listed: Vec<String> = low_quality
                .iter()
                .take(NAMES_PER_LINE)
                .map(|(c, s)| format!("{} ({:.2})", c, s))
                .collect();
            let more = if low_quality.len() > NAMES_PER_LINE { " ..." } else { "" };
            recs.push(format!(
                "QUALITY: Low-quality columns (score < {}): {}{}",
                LOW_COLUMN_SCORE,
                listed.join(", "),
                more
            ));
        }

        if recs.is_empty() {
            recs.push("EXCELLENT: No major data quality issues detected!".to_string());
        }

        recs
    }
}

fn name_list(names: &[&str]) -> String {
    let shown = names
        .iter()
        .take(NAMES_PER_LINE)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > NAMES_PER_LINE {
        format!("{} ...", shown)
    } else {
        shown
    }
}
