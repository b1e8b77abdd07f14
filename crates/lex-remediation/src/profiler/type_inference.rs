//! Semantic type inference for column analysis.

use crate::types::SemanticType;
use crate::utils::{DtypeCategory, name_has_identifier_token};
use once_cell::sync::Lazy;
use regex::Regex;

// Value shapes that mark a text column as a key rather than a category
static ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{5,}$").expect("Invalid regex: numeric ID"),
        Regex::new(r"^0\d+$").expect("Invalid regex: zero-padded code"),
        Regex::new(r"^[A-Z]{2,}\d+$").expect("Invalid regex: code pattern"),
        Regex::new(r"^[A-Za-z]{1,4}[-_]\d{2,}$").expect("Invalid regex: prefixed code"),
        Regex::new(r"^[a-fA-F0-9]{8}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{12}$")
            .expect("Invalid regex: UUID"),
        Regex::new(r"^[a-f0-9]{16,}$").expect("Invalid regex: hash"),
        Regex::new(r"^[\w\.-]+@[\w\.-]+\.\w+$").expect("Invalid regex: email"),
    ]
});

/// Share of sampled values that must look like keys.
const ID_PATTERN_MAJORITY: f64 = 0.7;

/// Text columns with at most this many distinct values stay low-cardinality.
pub(crate) const LOW_CARDINALITY_MAX_DISTINCT: usize = 10;

/// Ratios the inference rules compare against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InferenceThresholds {
    pub datetime_parse: f64,
    pub identifier_ratio: f64,
    pub high_cardinality_ratio: f64,
}

/// What the profiler learned about a column before naming its type.
#[derive(Debug)]
pub(crate) struct ColumnEvidence<'a> {
    pub name: &'a str,
    pub storage: DtypeCategory,
    pub value_count: usize,
    pub distinct_count: usize,
    pub distinct_ratio: f64,
    /// Every value is an integer (numeric storage or numeric text)
    pub all_integral: bool,
    pub numeric_text: bool,
    pub datetime_parse_ratio: Option<f64>,
    /// Sample of non-missing text values
    pub samples: &'a [String],
}

/// Decide the semantic type of a column.
pub(crate) fn infer_semantic_type(
    evidence: &ColumnEvidence<'_>,
    thresholds: &InferenceThresholds,
) -> SemanticType {
    if evidence.value_count == 0 {
        return SemanticType::Unknown;
    }

    match evidence.storage {
        DtypeCategory::Datetime => SemanticType::DatetimeLike,
        DtypeCategory::Boolean => SemanticType::CategoricalLowCardinality,
        DtypeCategory::Other => SemanticType::Unknown,
        DtypeCategory::Numeric => infer_number_type(evidence),
        DtypeCategory::String if evidence.numeric_text => infer_number_type(evidence),
        DtypeCategory::String => infer_text_type(evidence, thresholds),
    }
}

// A number column is a key only when it is named like one and never repeats.
fn infer_number_type(evidence: &ColumnEvidence<'_>) -> SemanticType {
    if evidence.value_count > 1
        && evidence.all_integral
        && evidence.distinct_count == evidence.value_count
        && name_has_identifier_token(evidence.name)
    {
        SemanticType::IdentifierLike
    } else {
        SemanticType::Numeric
    }
}

fn infer_text_type(evidence: &ColumnEvidence<'_>, thresholds: &InferenceThresholds) -> SemanticType {
    if evidence
        .datetime_parse_ratio
        .is_some_and(|r| r >= thresholds.datetime_parse)
    {
        return SemanticType::DatetimeLike;
    }

    if evidence.value_count > 1
        && evidence.distinct_ratio >= thresholds.identifier_ratio
        && (name_has_identifier_token(evidence.name) || matches_id_patterns(evidence.samples))
    {
        return SemanticType::IdentifierLike;
    }

    if evidence.distinct_ratio <= thresholds.high_cardinality_ratio
        || evidence.distinct_count <= LOW_CARDINALITY_MAX_DISTINCT
    {
        SemanticType::CategoricalLowCardinality
    } else {
        SemanticType::CategoricalHighCardinality
    }
}

/// Whether most sampled values look like keys (codes, UUIDs, emails).
pub(crate) fn matches_id_patterns(samples: &[String]) -> bool {
    if samples.is_empty() {
        return false;
    }
    let matched = samples
        .iter()
        .filter(|value| ID_PATTERNS.iter().any(|re| re.is_match(value.trim())))
        .count();
    matched as f64 / samples.len() as f64 > ID_PATTERN_MAJORITY
}
