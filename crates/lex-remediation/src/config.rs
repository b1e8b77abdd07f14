//! Configuration types for the remediation pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup. Every field has a default, so a
//! JSON config file only needs the keys it wants to override.

use crate::error::RemediationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// What the executor does with values outside a column's IQR bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierTreatment {
    /// Replace out-of-range values with the nearest bound
    #[default]
    Clip,
    /// Remove rows holding an out-of-range value
    Remove,
    /// Leave outliers untouched
    Ignore,
}

impl fmt::Display for OutlierTreatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clip => write!(f, "clip"),
            Self::Remove => write!(f, "remove"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

/// Outlier detectors available to the anomaly ensemble.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyMethod {
    /// Local outlier factor over k nearest neighbours
    Density,
    /// Isolation forest
    Isolation,
    /// Mahalanobis distance from a robust covariance envelope
    Covariance,
}

impl AnomalyMethod {
    /// All detectors, in execution order.
    pub const ALL: [AnomalyMethod; 3] = [Self::Density, Self::Isolation, Self::Covariance];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Density => "density",
            Self::Isolation => "isolation",
            Self::Covariance => "covariance",
        }
    }
}

impl fmt::Display for AnomalyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How detector flags combine into one verdict per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoteRule {
    /// Flagged by more than half of the active detectors
    #[default]
    Majority,
    /// Flagged by every active detector
    Unanimous,
    /// Flagged by at least one active detector
    Any,
}

impl VoteRule {
    /// Whether `votes` flags out of `active` detectors make a row anomalous.
    pub fn accepts(&self, votes: usize, active: usize) -> bool {
        if active == 0 || votes == 0 {
            return false;
        }
        match self {
            Self::Majority => votes * 2 > active,
            Self::Unanimous => votes == active,
            Self::Any => true,
        }
    }
}

impl fmt::Display for VoteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Majority => write!(f, "majority"),
            Self::Unanimous => write!(f, "unanimous"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Expected share of anomalous rows.
///
/// Serialized as the string `"auto"` or as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(try_from = "ContaminationRepr", into = "ContaminationRepr")]
pub enum Contamination {
    /// Derived from the share of rows outside the profiler's IQR bounds
    #[default]
    Auto,
    /// Fixed rate in (0, 0.5]
    Rate(f64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ContaminationRepr {
    Keyword(String),
    Rate(f64),
}

impl TryFrom<ContaminationRepr> for Contamination {
    type Error = String;

    fn try_from(repr: ContaminationRepr) -> Result<Self, Self::Error> {
        match repr {
            ContaminationRepr::Keyword(k) if k.eq_ignore_ascii_case("auto") => {
                Ok(Contamination::Auto)
            }
            ContaminationRepr::Keyword(k) => {
                k.trim().parse::<f64>().map(Contamination::Rate).map_err(|_| {
                    format!("contamination must be \"auto\" or a number, got \"{}\"", k)
                })
            }
            ContaminationRepr::Rate(r) => Ok(Contamination::Rate(r)),
        }
    }
}

impl From<Contamination> for ContaminationRepr {
    fn from(c: Contamination) -> Self {
        match c {
            Contamination::Auto => ContaminationRepr::Keyword("auto".to_string()),
            Contamination::Rate(r) => ContaminationRepr::Rate(r),
        }
    }
}

/// Score boundaries for the quality labels (0-100 scale).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent: 90.0,
            good: 75.0,
            fair: 50.0,
        }
    }
}

/// Per-stage switches. Profiling always runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggles {
    pub scoring: bool,
    pub planning: bool,
    pub anomaly: bool,
    /// Execution needs a plan, so it is skipped when planning is off.
    pub execution: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            scoring: true,
            planning: true,
            anomaly: true,
            execution: true,
        }
    }
}

/// Configuration for the remediation pipeline.
///
/// Use [`RemediationConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_remediation::config::{RemediationConfig, OutlierTreatment, VoteRule};
///
/// let config = RemediationConfig::builder()
///     .missing_drop_threshold(0.6)
///     .outlier_treatment(OutlierTreatment::Remove)
///     .anomaly_vote(VoteRule::Unanimous)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Columns with a missing ratio above this are dropped.
    /// Default: 0.70
    pub missing_drop_threshold: f64,

    /// Missing ratios below this get simple imputation, at or above it advanced.
    /// Default: 0.30
    pub impute_simple_threshold: f64,

    /// Missing ratios below this are left alone.
    /// Default: 0.10
    pub impute_floor: f64,

    /// Share of values that must parse as dates for a text column to be date-like.
    /// Default: 0.80
    pub datetime_parse_threshold: f64,

    /// Distinct ratio at which a text column may be an identifier.
    /// Default: 0.95
    pub identifier_ratio: f64,

    /// Distinct ratio above which a text column is high-cardinality.
    /// Default: 0.50
    pub high_cardinality_ratio: f64,

    /// Outlier handling applied after the plan.
    /// Default: Clip
    pub outlier_treatment: OutlierTreatment,

    /// Detectors run by the anomaly ensemble.
    /// Default: all three
    pub anomaly_methods: BTreeSet<AnomalyMethod>,

    /// Expected anomaly rate.
    /// Default: Auto
    pub anomaly_contamination: Contamination,

    /// Vote combination rule.
    /// Default: Majority
    pub anomaly_vote: VoteRule,

    /// Minimum rows for anomaly detection.
    /// Default: 10
    pub anomaly_min_rows: usize,

    /// Rows above this are randomly sampled down before detection.
    /// Default: 5000
    pub anomaly_max_rows: usize,

    /// Seed for sampling and the isolation forest.
    /// Default: 42
    pub anomaly_seed: u64,

    /// Neighbours considered by the density detector.
    /// Default: 20
    pub density_neighbors: usize,

    /// Trees grown by the isolation detector.
    /// Default: 100
    pub isolation_trees: usize,

    /// Minimum standardized mean shift for a column to be reported as an
    /// anomaly indicator.
    /// Default: 0.5
    pub importance_threshold: f64,

    /// Label boundaries for the overall quality score.
    pub quality_thresholds: QualityThresholds,

    /// Narrow numeric columns to the smallest lossless width after remediation.
    /// Default: false
    pub enable_downcast: bool,

    /// Run anomaly detection on its own thread while the executor works.
    /// Default: true
    pub concurrent_anomaly: bool,

    /// Stage switches.
    pub stages: StageToggles,

    /// Worker threads used by batch runs.
    /// Default: 4
    pub max_parallel_runs: usize,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            missing_drop_threshold: 0.70,
            impute_simple_threshold: 0.30,
            impute_floor: 0.10,
            datetime_parse_threshold: 0.80,
            identifier_ratio: 0.95,
            high_cardinality_ratio: 0.50,
            outlier_treatment: OutlierTreatment::default(),
            anomaly_methods: AnomalyMethod::ALL.into_iter().collect(),
            anomaly_contamination: Contamination::default(),
            anomaly_vote: VoteRule::default(),
            anomaly_min_rows: 10,
            anomaly_max_rows: 5000,
            anomaly_seed: 42,
            density_neighbors: 20,
            isolation_trees: 100,
            importance_threshold: 0.5,
            quality_thresholds: QualityThresholds::default(),
            enable_downcast: false,
            concurrent_anomaly: true,
            stages: StageToggles::default(),
            max_parallel_runs: 4,
        }
    }
}

impl RemediationConfig {
    /// Create a new configuration builder.
    pub fn builder() -> RemediationConfigBuilder {
        RemediationConfigBuilder::default()
    }

    /// Load a JSON configuration file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: RemediationConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let ratios = [
            ("missing_drop_threshold", self.missing_drop_threshold),
            ("impute_simple_threshold", self.impute_simple_threshold),
            ("impute_floor", self.impute_floor),
            ("datetime_parse_threshold", self.datetime_parse_threshold),
            ("identifier_ratio", self.identifier_ratio),
            ("high_cardinality_ratio", self.high_cardinality_ratio),
        ];
        for (field, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if !(self.impute_floor <= self.impute_simple_threshold
            && self.impute_simple_threshold <= self.missing_drop_threshold)
        {
            return Err(ConfigValidationError::ThresholdOrder {
                floor: self.impute_floor,
                simple: self.impute_simple_threshold,
                drop: self.missing_drop_threshold,
            });
        }

        if self.anomaly_methods.is_empty() {
            return Err(ConfigValidationError::NoAnomalyMethods);
        }

        if let Contamination::Rate(rate) = self.anomaly_contamination
            && !(rate > 0.0 && rate <= 0.5)
        {
            return Err(ConfigValidationError::InvalidContamination(rate));
        }

        let counts = [
            ("anomaly_min_rows", self.anomaly_min_rows),
            ("anomaly_max_rows", self.anomaly_max_rows),
            ("density_neighbors", self.density_neighbors),
            ("isolation_trees", self.isolation_trees),
            ("max_parallel_runs", self.max_parallel_runs),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigValidationError::ZeroCount(field.to_string()));
            }
        }

        if self.anomaly_max_rows < self.anomaly_min_rows {
            return Err(ConfigValidationError::SampleBelowMinimum {
                max_rows: self.anomaly_max_rows,
                min_rows: self.anomaly_min_rows,
            });
        }

        if !self.importance_threshold.is_finite() || self.importance_threshold < 0.0 {
            return Err(ConfigValidationError::InvalidImportanceThreshold(
                self.importance_threshold,
            ));
        }

        let q = self.quality_thresholds;
        if !(0.0 <= q.fair && q.fair <= q.good && q.good <= q.excellent && q.excellent <= 100.0) {
            return Err(ConfigValidationError::QualityThresholdOrder {
                fair: q.fair,
                good: q.good,
                excellent: q.excellent,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error(
        "Thresholds must satisfy impute_floor <= impute_simple_threshold <= missing_drop_threshold (got {floor}, {simple}, {drop})"
    )]
    ThresholdOrder { floor: f64, simple: f64, drop: f64 },

    #[error("At least one anomaly method must be enabled")]
    NoAnomalyMethods,

    #[error("Invalid contamination rate: {0} (must be in (0, 0.5] or \"auto\")")]
    InvalidContamination(f64),

    #[error("'{0}' must be at least 1")]
    ZeroCount(String),

    #[error("anomaly_max_rows ({max_rows}) must not be below anomaly_min_rows ({min_rows})")]
    SampleBelowMinimum { max_rows: usize, min_rows: usize },

    #[error("Invalid importance threshold: {0} (must be a non-negative number)")]
    InvalidImportanceThreshold(f64),

    #[error(
        "Quality thresholds must satisfy 0 <= fair <= good <= excellent <= 100 (got {fair}, {good}, {excellent})"
    )]
    QualityThresholdOrder { fair: f64, good: f64, excellent: f64 },
}

impl From<ConfigValidationError> for RemediationError {
    fn from(e: ConfigValidationError) -> Self {
        RemediationError::InvalidConfig(e.to_string())
    }
}

/// Builder for [`RemediationConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct RemediationConfigBuilder {
    missing_drop_threshold: Option<f64>,
    impute_simple_threshold: Option<f64>,
    impute_floor: Option<f64>,
    datetime_parse_threshold: Option<f64>,
    identifier_ratio: Option<f64>,
    high_cardinality_ratio: Option<f64>,
    outlier_treatment: Option<OutlierTreatment>,
    anomaly_methods: Option<BTreeSet<AnomalyMethod>>,
    anomaly_contamination: Option<Contamination>,
    anomaly_vote: Option<VoteRule>,
    anomaly_min_rows: Option<usize>,
    anomaly_max_rows: Option<usize>,
    anomaly_seed: Option<u64>,
    density_neighbors: Option<usize>,
    isolation_trees: Option<usize>,
    importance_threshold: Option<f64>,
    quality_thresholds: Option<QualityThresholds>,
    enable_downcast: Option<bool>,
    concurrent_anomaly: Option<bool>,
    stages: Option<StageToggles>,
    max_parallel_runs: Option<usize>,
}

impl RemediationConfigBuilder {
    /// Set the missing ratio above which a column is dropped.
    ///
    /// # Arguments
    /// * `threshold` - Value between 0.0 and 1.0 (e.g., 0.7 = 70%)
    pub fn missing_drop_threshold(mut self, threshold: f64) -> Self {
        self.missing_drop_threshold = Some(threshold);
        self
    }

    /// Set the missing ratio that separates simple from advanced imputation.
    pub fn impute_simple_threshold(mut self, threshold: f64) -> Self {
        self.impute_simple_threshold = Some(threshold);
        self
    }

    /// Set the missing ratio below which no imputation is proposed.
    pub fn impute_floor(mut self, threshold: f64) -> Self {
        self.impute_floor = Some(threshold);
        self
    }

    /// Set the share of values that must parse as dates.
    pub fn datetime_parse_threshold(mut self, threshold: f64) -> Self {
        self.datetime_parse_threshold = Some(threshold);
        self
    }

    pub fn identifier_ratio(mut self, ratio: f64) -> Self {
        self.identifier_ratio = Some(ratio);
        self
    }

    pub fn high_cardinality_ratio(mut self, ratio: f64) -> Self {
        self.high_cardinality_ratio = Some(ratio);
        self
    }

    /// Set the outlier treatment.
    pub fn outlier_treatment(mut self, treatment: OutlierTreatment) -> Self {
        self.outlier_treatment = Some(treatment);
        self
    }

    /// Set the detectors the anomaly ensemble runs.
    pub fn anomaly_methods(mut self, methods: impl IntoIterator<Item = AnomalyMethod>) -> Self {
        self.anomaly_methods = Some(methods.into_iter().collect());
        self
    }

    /// Set the expected anomaly rate.
    pub fn anomaly_contamination(mut self, contamination: Contamination) -> Self {
        self.anomaly_contamination = Some(contamination);
        self
    }

    /// Set the vote combination rule.
    pub fn anomaly_vote(mut self, vote: VoteRule) -> Self {
        self.anomaly_vote = Some(vote);
        self
    }

    pub fn anomaly_min_rows(mut self, rows: usize) -> Self {
        self.anomaly_min_rows = Some(rows);
        self
    }

    /// Set the row count above which detection runs on a random sample.
    pub fn anomaly_max_rows(mut self, rows: usize) -> Self {
        self.anomaly_max_rows = Some(rows);
        self
    }

    pub fn anomaly_seed(mut self, seed: u64) -> Self {
        self.anomaly_seed = Some(seed);
        self
    }

    pub fn density_neighbors(mut self, k: usize) -> Self {
        self.density_neighbors = Some(k);
        self
    }

    pub fn isolation_trees(mut self, trees: usize) -> Self {
        self.isolation_trees = Some(trees);
        self
    }

    pub fn importance_threshold(mut self, threshold: f64) -> Self {
        self.importance_threshold = Some(threshold);
        self
    }

    /// Set the label boundaries for the quality score.
    pub fn quality_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.quality_thresholds = Some(thresholds);
        self
    }

    /// Enable or disable numeric downcasting after remediation.
    pub fn enable_downcast(mut self, enable: bool) -> Self {
        self.enable_downcast = Some(enable);
        self
    }

    /// Run the anomaly ensemble concurrently with the executor.
    pub fn concurrent_anomaly(mut self, concurrent: bool) -> Self {
        self.concurrent_anomaly = Some(concurrent);
        self
    }

    /// Set all stage switches at once.
    pub fn stages(mut self, stages: StageToggles) -> Self {
        self.stages = Some(stages);
        self
    }

    pub fn max_parallel_runs(mut self, workers: usize) -> Self {
        self.max_parallel_runs = Some(workers);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `RemediationConfig` or an error if validation fails.
    pub fn build(self) -> Result<RemediationConfig, ConfigValidationError> {
        let defaults = RemediationConfig::default();
        let config = RemediationConfig {
            missing_drop_threshold: self
                .missing_drop_threshold
                .unwrap_or(defaults.missing_drop_threshold),
            impute_simple_threshold: self
                .impute_simple_threshold
                .unwrap_or(defaults.impute_simple_threshold),
            impute_floor: self.impute_floor.unwrap_or(defaults.impute_floor),
            datetime_parse_threshold: self
                .datetime_parse_threshold
                .unwrap_or(defaults.datetime_parse_threshold),
            identifier_ratio: self.identifier_ratio.unwrap_or(defaults.identifier_ratio),
            high_cardinality_ratio: self
                .high_cardinality_ratio
                .unwrap_or(defaults.high_cardinality_ratio),
            outlier_treatment: self.outlier_treatment.unwrap_or_default(),
            anomaly_methods: self.anomaly_methods.unwrap_or(defaults.anomaly_methods),
            anomaly_contamination: self.anomaly_contamination.unwrap_or_default(),
            anomaly_vote: self.anomaly_vote.unwrap_or_default(),
            anomaly_min_rows: self.anomaly_min_rows.unwrap_or(defaults.anomaly_min_rows),
            anomaly_max_rows: self.anomaly_max_rows.unwrap_or(defaults.anomaly_max_rows),
            anomaly_seed: self.anomaly_seed.unwrap_or(defaults.anomaly_seed),
            density_neighbors: self.density_neighbors.unwrap_or(defaults.density_neighbors),
            isolation_trees: self.isolation_trees.unwrap_or(defaults.isolation_trees),
            importance_threshold: self
                .importance_threshold
                .unwrap_or(defaults.importance_threshold),
            quality_thresholds: self.quality_thresholds.unwrap_or_default(),
            enable_downcast: self.enable_downcast.unwrap_or(defaults.enable_downcast),
            concurrent_anomaly: self
                .concurrent_anomaly
                .unwrap_or(defaults.concurrent_anomaly),
            stages: self.stages.unwrap_or_default(),
            max_parallel_runs: self.max_parallel_runs.unwrap_or(defaults.max_parallel_runs),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RemediationConfig::default();
        assert_eq!(config.missing_drop_threshold, 0.70);
        assert_eq!(config.impute_simple_threshold, 0.30);
        assert_eq!(config.impute_floor, 0.10);
        assert_eq!(config.outlier_treatment, OutlierTreatment::Clip);
        assert_eq!(config.anomaly_vote, VoteRule::Majority);
        assert_eq!(config.anomaly_contamination, Contamination::Auto);
        assert_eq!(config.anomaly_methods.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = RemediationConfig::builder()
            .missing_drop_threshold(0.6)
            .outlier_treatment(OutlierTreatment::Remove)
            .anomaly_methods([AnomalyMethod::Isolation])
            .anomaly_contamination(Contamination::Rate(0.05))
            .anomaly_vote(VoteRule::Any)
            .build()
            .unwrap();

        assert_eq!(config.missing_drop_threshold, 0.6);
        assert_eq!(config.outlier_treatment, OutlierTreatment::Remove);
        assert_eq!(
            config.anomaly_methods.iter().copied().collect::<Vec<_>>(),
            vec![AnomalyMethod::Isolation]
        );
        assert_eq!(config.anomaly_contamination, Contamination::Rate(0.05));
    }

    #[test]
    fn test_validation_invalid_threshold() {
        let result = RemediationConfig::builder()
            .missing_drop_threshold(1.5)
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_inverted_thresholds() {
        let result = RemediationConfig::builder()
            .impute_floor(0.4)
            .impute_simple_threshold(0.3)
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::ThresholdOrder { .. }
        ));
    }

    #[test]
    fn test_validation_empty_methods() {
        let result = RemediationConfig::builder()
            .anomaly_methods(Vec::<AnomalyMethod>::new())
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::NoAnomalyMethods
        ));
    }

    #[test]
    fn test_validation_contamination_range() {
        for rate in [0.0, 0.6, -0.1] {
            let result = RemediationConfig::builder()
                .anomaly_contamination(Contamination::Rate(rate))
                .build();
            assert!(matches!(
                result.unwrap_err(),
                ConfigValidationError::InvalidContamination(_)
            ));
        }
    }

    #[test]
    fn test_vote_rule_accepts() {
        assert!(VoteRule::Majority.accepts(2, 3));
        assert!(!VoteRule::Majority.accepts(1, 2));
        assert!(VoteRule::Unanimous.accepts(3, 3));
        assert!(!VoteRule::Unanimous.accepts(2, 3));
        assert!(VoteRule::Any.accepts(1, 3));
        assert!(!VoteRule::Any.accepts(0, 3));
        assert!(!VoteRule::Any.accepts(1, 0));
    }

    #[test]
    fn test_contamination_serialization() {
        assert_eq!(
            serde_json::to_string(&Contamination::Auto).unwrap(),
            "\"auto\""
        );
        assert_eq!(
            serde_json::to_string(&Contamination::Rate(0.05)).unwrap(),
            "0.05"
        );
        let parsed: Contamination = serde_json::from_str("\"AUTO\"").unwrap();
        assert_eq!(parsed, Contamination::Auto);
        let parsed: Contamination = serde_json::from_str("0.1").unwrap();
        assert_eq!(parsed, Contamination::Rate(0.1));
        assert!(serde_json::from_str::<Contamination>("\"often\"").is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let json = r#"{
            "missing_drop_threshold": 0.8,
            "outlier_treatment": "ignore",
            "anomaly_methods": ["density", "covariance"],
            "anomaly_contamination": 0.02,
            "anomaly_vote": "unanimous",
            "stages": { "anomaly": false }
        }"#;

        let config: RemediationConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.missing_drop_threshold, 0.8);
        assert_eq!(config.impute_simple_threshold, 0.30);
        assert_eq!(config.outlier_treatment, OutlierTreatment::Ignore);
        assert!(config.anomaly_methods.contains(&AnomalyMethod::Density));
        assert!(!config.anomaly_methods.contains(&AnomalyMethod::Isolation));
        assert_eq!(config.anomaly_contamination, Contamination::Rate(0.02));
        assert_eq!(config.anomaly_vote, VoteRule::Unanimous);
        assert!(!config.stages.anomaly);
        assert!(config.stages.execution);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = RemediationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: RemediationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.anomaly_methods, config.anomaly_methods);
        assert_eq!(back.quality_thresholds, config.quality_thresholds);
    }
}
