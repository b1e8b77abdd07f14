use crate::config::{OutlierTreatment, VoteRule};
use crate::utils::DtypeCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Profiling
// ============================================================================

/// What a column holds, decided once by the profiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    CategoricalLowCardinality,
    CategoricalHighCardinality,
    DatetimeLike,
    IdentifierLike,
    /// All-missing or unsupported column
    Unknown,
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Numeric => "numeric",
            Self::CategoricalLowCardinality => "categorical_low_cardinality",
            Self::CategoricalHighCardinality => "categorical_high_cardinality",
            Self::DatetimeLike => "datetime_like",
            Self::IdentifierLike => "identifier_like",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Tukey fences for a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub low: f64,
    pub high: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

impl OutlierBounds {
    /// Whether a value lies outside `[low, high]`.
    #[inline]
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.low || value > self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

/// Per-column statistics produced by one profiler run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    /// Polars dtype as text, e.g. `"Int64"` or `"String"`
    pub dtype_signature: String,
    pub storage: DtypeCategory,
    /// Non-missing values
    pub value_count: usize,
    pub missing_count: usize,
    pub missing_ratio: f64,
    pub distinct_count: usize,
    /// Distinct values over non-missing values
    pub distinct_ratio: f64,
    pub is_constant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlier_bounds: Option<OutlierBounds>,
    pub outlier_count: usize,
    pub inferred_semantic_type: SemanticType,
    /// Share of non-missing text values that parse as numbers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_parse_ratio: Option<f64>,
    /// Share of non-missing text values that parse as dates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime_parse_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_summary: Option<NumericSummary>,
}

impl ColumnProfile {
    /// Rows in the profiled dataset.
    pub fn row_count(&self) -> usize {
        self.value_count + self.missing_count
    }

    /// Text column whose every value parses as a number.
    pub fn is_numeric_text(&self) -> bool {
        self.storage == DtypeCategory::String
            && self.value_count > 0
            && self.numeric_parse_ratio == Some(1.0)
    }

    /// Text column whose values parse as dates at or above `threshold`.
    pub fn is_datetime_text(&self, threshold: f64) -> bool {
        self.storage == DtypeCategory::String
            && self.value_count > 0
            && !self.is_numeric_text()
            && self.datetime_parse_ratio.is_some_and(|r| r >= threshold)
    }
}

/// Dataset-level result of profiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: usize,
    pub column_profiles: Vec<ColumnProfile>,
    pub duplicate_count: usize,
    pub missing_total: usize,
    pub outlier_total: usize,
    /// Rows x numeric columns
    pub numeric_cells: usize,
    /// Missing cells inside numeric columns
    pub numeric_missing: usize,
    /// Column profiles over the first occurrence of each distinct row.
    /// Present only when duplicates exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduplicated_profiles: Option<Vec<ColumnProfile>>,
}

impl DatasetProfile {
    /// Profiles that describe the data as later actions will see it
    /// (deduplication runs first).
    pub fn planning_profiles(&self) -> &[ColumnProfile] {
        self.deduplicated_profiles
            .as_deref()
            .unwrap_or(&self.column_profiles)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.column_profiles.iter().find(|c| c.name == name)
    }

    pub fn planning_column(&self, name: &str) -> Option<&ColumnProfile> {
        self.planning_profiles().iter().find(|c| c.name == name)
    }

    /// Names of columns with the `numeric` semantic type, in dataset order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.column_profiles
            .iter()
            .filter(|c| c.inferred_semantic_type == SemanticType::Numeric)
            .map(|c| c.name.as_str())
            .collect()
    }
}

// ============================================================================
// Quality
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Fair => write!(f, "fair"),
            Self::Poor => write!(f, "poor"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// 0-100
    pub overall_score: f64,
    pub label: QualityLabel,
    pub completeness: f64,
    pub uniqueness: f64,
    pub consistency: f64,
    pub per_column: IndexMap<String, ColumnProfile>,
    /// Per-column quality, 0-1
    pub column_scores: IndexMap<String, f64>,
    pub missing_total: usize,
    pub duplicate_count: usize,
    pub outlier_count: usize,
    pub recommendations: Vec<String>,
}

// ============================================================================
// Planning
// ============================================================================

/// Kinds of remediation step, in execution-group order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Dedupe,
    DropColumn,
    CastType,
    ParseDatetime,
    Impute,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dedupe => write!(f, "dedupe"),
            Self::DropColumn => write!(f, "drop_column"),
            Self::CastType => write!(f, "cast_type"),
            Self::ParseDatetime => write!(f, "parse_datetime"),
            Self::Impute => write!(f, "impute"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    /// Median for numbers, mode for categories
    Simple,
    /// Forward fill, then backward fill, then simple
    Advanced,
}

/// One planned remediation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedAction {
    /// Target column; `None` for dataset-level actions
    pub column: Option<String>,
    pub action_kind: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ImputeStrategy>,
    pub reason: String,
}

impl ProposedAction {
    pub fn dedupe(reason: impl Into<String>) -> Self {
        Self {
            column: None,
            action_kind: ActionKind::Dedupe,
            strategy: None,
            reason: reason.into(),
        }
    }

    pub fn drop_column(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::for_column(column, ActionKind::DropColumn, None, reason)
    }

    pub fn cast_type(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::for_column(column, ActionKind::CastType, None, reason)
    }

    pub fn parse_datetime(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::for_column(column, ActionKind::ParseDatetime, None, reason)
    }

    pub fn impute(
        column: impl Into<String>,
        strategy: ImputeStrategy,
        reason: impl Into<String>,
    ) -> Self {
        Self::for_column(column, ActionKind::Impute, Some(strategy), reason)
    }

    fn for_column(
        column: impl Into<String>,
        action_kind: ActionKind,
        strategy: Option<ImputeStrategy>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            column: Some(column.into()),
            action_kind,
            strategy,
            reason: reason.into(),
        }
    }

    /// Column name, or `"<dataset>"` for dataset-level actions.
    pub fn target(&self) -> &str {
        self.column.as_deref().unwrap_or("<dataset>")
    }
}

impl fmt::Display for ProposedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.action_kind, self.target())?;
        if let Some(strategy) = self.strategy {
            write!(f, ", {:?}", strategy)?;
        }
        write!(f, ", \"{}\")", self.reason)
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Outcome of one attempted action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub action: ProposedAction,
    pub applied: bool,
    pub rows_before: usize,
    pub rows_after: usize,
    /// Cells or rows changed by the action
    pub values_affected: usize,
    /// Values that could not be coerced and were left missing
    pub unparseable_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierTreatmentRecord {
    pub column: String,
    pub treatment: OutlierTreatment,
    pub low: f64,
    pub high: f64,
    pub values_affected: usize,
    pub rows_before: usize,
    pub rows_after: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowncastRecord {
    pub column: String,
    pub from: String,
    pub to: String,
}

/// Everything the executor did, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub records: Vec<ExecutionRecord>,
    pub outlier_treatments: Vec<OutlierTreatmentRecord>,
    pub downcasts: Vec<DowncastRecord>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
}

impl ExecutionLog {
    pub fn applied_count(&self) -> usize {
        self.records.iter().filter(|r| r.applied).count()
    }
}

// ============================================================================
// Anomaly detection
// ============================================================================

/// One detector's opinion about one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyVote {
    pub detector_name: String,
    pub row_index: usize,
    pub is_anomaly: bool,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub column: String,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorFailure {
    pub detector: String,
    pub reason: String,
}

/// Ensemble verdict over the pre-remediation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    /// e.g. `"ensemble(density, isolation, covariance)"`
    pub method: String,
    /// Detectors that produced votes
    pub detectors: Vec<String>,
    pub vote_rule: VoteRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_contamination: Option<f64>,
    pub rows_analyzed: usize,
    pub sampled: bool,
    pub anomaly_count: usize,
    pub anomaly_percentage: f64,
    /// Original row indices judged anomalous
    pub per_row_verdict: BTreeSet<usize>,
    pub feature_importance: Vec<FeatureContribution>,
    pub detector_failures: Vec<DetectorFailure>,
    /// Set when detection did not run (`"insufficient_data"`, `"no_active_detectors"`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub recommendations: Vec<String>,
}

impl AnomalyReport {
    /// A report with no verdicts, explaining why detection did not run.
    pub fn empty(method: impl Into<String>, vote_rule: VoteRule, reason: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            detectors: Vec::new(),
            vote_rule,
            resolved_contamination: None,
            rows_analyzed: 0,
            sampled: false,
            anomaly_count: 0,
            anomaly_percentage: 0.0,
            per_row_verdict: BTreeSet::new(),
            feature_importance: Vec::new(),
            detector_failures: Vec::new(),
            reason: Some(reason.into()),
            recommendations: Vec::new(),
        }
    }
}
