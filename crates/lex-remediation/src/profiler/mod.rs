//! Data profiling module for dataset analysis.
//!
//! The [`ColumnProfiler`] measures every column once per run:
//! - missing and distinct ratios, constancy
//! - outlier bounds for numeric columns (interquartile rule)
//! - the semantic type that drives planning and anomaly detection
//!
//! Distinct counts are taken over corrected values, so a text column holding
//! `"1"` and `"1.0"` is already constant before it is cast.

mod statistics;
mod type_inference;

use crate::config::RemediationConfig;
use crate::error::{RemediationError, Result, ResultExt};
use crate::types::{ColumnProfile, DatasetProfile, SemanticType};
use crate::utils::{
    DtypeCategory, cell_keys, drop_duplicate_rows, get_dtype_category, numeric_values,
    parse_datetime_millis, parse_numeric_string, string_values,
};
use polars::prelude::*;
use rand::prelude::*;
use std::collections::HashSet;
use tracing::debug;

use statistics::{
    all_integral, count_outliers, distinct_numbers, distinct_strings, iqr_bounds, numeric_summary,
};
use type_inference::{ColumnEvidence, InferenceThresholds, infer_semantic_type};

/// Text values sampled per column for identifier pattern checks.
const PATTERN_SAMPLE_SIZE: usize = 100;

/// Data profiler for analyzing dataset structure and quality signals.
#[derive(Debug, Clone)]
pub struct ColumnProfiler {
    thresholds: InferenceThresholds,
}

impl ColumnProfiler {
    pub fn new(config: &RemediationConfig) -> Self {
        Self {
            thresholds: InferenceThresholds {
                datetime_parse: config.datetime_parse_threshold,
                identifier_ratio: config.identifier_ratio,
                high_cardinality_ratio: config.high_cardinality_ratio,
            },
        }
    }

    /// Profile an entire dataset.
    ///
    /// When duplicate rows exist the columns are profiled a second time over
    /// the first occurrence of each row, since deduplication runs before any
    /// column action.
    pub fn profile(&self, df: &DataFrame) -> Result<DatasetProfile> {
        if df.height() == 0 || df.width() == 0 {
            return Err(RemediationError::DataEmpty {
                rows: df.height(),
                columns: df.width(),
            });
        }

        let column_profiles = self.profile_columns(df)?;

        let deduplicated =
            drop_duplicate_rows(df).context("Failed to detect duplicate rows")?;
        let duplicate_count = df.height() - deduplicated.height();
        let deduplicated_profiles = if duplicate_count > 0 {
            Some(self.profile_columns(&deduplicated)?)
        } else {
            None
        };

        let missing_total = column_profiles.iter().map(|c| c.missing_count).sum();
        let outlier_total = column_profiles.iter().map(|c| c.outlier_count).sum();
        let numeric: Vec<&ColumnProfile> = column_profiles
            .iter()
            .filter(|c| c.inferred_semantic_type == SemanticType::Numeric)
            .collect();
        let numeric_missing = numeric.iter().map(|c| c.missing_count).sum();
        let numeric_cells = df.height() * numeric.len();

        debug!(
            rows = df.height(),
            columns = df.width(),
            duplicate_count,
            missing_total,
            outlier_total,
            "Profiled dataset"
        );

        Ok(DatasetProfile {
            rows: df.height(),
            columns: df.width(),
            column_profiles,
            duplicate_count,
            missing_total,
            outlier_total,
            numeric_cells,
            numeric_missing,
            deduplicated_profiles,
        })
    }

    fn profile_columns(&self, df: &DataFrame) -> Result<Vec<ColumnProfile>> {
        df.get_columns()
            .iter()
            .map(|column| {
                let series = column.as_materialized_series();
                self.profile_series(series)
                    .context(format!("Failed to profile column '{}'", series.name()))
            })
            .collect()
    }

    /// Profile a single column.
    pub fn profile_series(&self, series: &Series) -> Result<ColumnProfile> {
        let name = series.name().to_string();
        let rows = series.len();
        let storage = get_dtype_category(series.dtype());

        let mut numbers: Vec<f64> = Vec::new();
        let mut samples: Vec<String> = Vec::new();
        let mut numeric_parse_ratio = None;
        let mut datetime_parse_ratio = None;
        let mut numeric_text = false;

        let (value_count, distinct_count) = match storage {
            DtypeCategory::Numeric => {
                numbers = numeric_values(series)?.into_iter().flatten().collect();
                (numbers.len(), distinct_numbers(&numbers))
            }
            DtypeCategory::String => {
                let values = string_values(series)?;
                let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
                samples = sample_text(&present);

                if present.is_empty() {
                    (0, 0)
                } else {
                    let parsed: Vec<f64> = present
                        .iter()
                        .filter_map(|v| parse_numeric_string(v))
                        .collect();
                    numeric_parse_ratio = Some(parsed.len() as f64 / present.len() as f64);
                    numeric_text = parsed.len() == present.len();

                    if numeric_text {
                        numbers = parsed;
                        (present.len(), distinct_numbers(&numbers))
                    } else {
                        let stamps: Vec<i64> = present
                            .iter()
                            .filter_map(|v| parse_datetime_millis(v))
                            .collect();
                        let ratio = stamps.len() as f64 / present.len() as f64;
                        datetime_parse_ratio = Some(ratio);

                        let distinct = if ratio >= self.thresholds.datetime_parse {
                            stamps.iter().collect::<HashSet<_>>().len()
                        } else {
                            distinct_strings(present.iter().copied())
                        };
                        (present.len(), distinct)
                    }
                }
            }
            DtypeCategory::Datetime | DtypeCategory::Boolean | DtypeCategory::Other => {
                let keys = cell_keys(series)?;
                let present: Vec<&str> = keys.iter().flatten().map(String::as_str).collect();
                (present.len(), distinct_strings(present.iter().copied()))
            }
        };

        let missing_count = rows - value_count;
        let missing_ratio = if rows > 0 {
            missing_count as f64 / rows as f64
        } else {
            1.0
        };
        let distinct_ratio = if value_count > 0 {
            distinct_count as f64 / value_count as f64
        } else {
            0.0
        };

        let evidence = ColumnEvidence {
            name: &name,
            storage,
            value_count,
            distinct_count,
            distinct_ratio,
            all_integral: !numbers.is_empty() && all_integral(&numbers),
            numeric_text,
            datetime_parse_ratio,
            samples: &samples,
        };
        let semantic_type = infer_semantic_type(&evidence, &self.thresholds);

        let (outlier_bounds, outlier_count, summary) = if semantic_type == SemanticType::Numeric {
            let bounds = iqr_bounds(&numbers);
            let count = bounds.map_or(0, |b| count_outliers(&numbers, &b));
            (bounds, count, numeric_summary(&numbers))
        } else {
            (None, 0, None)
        };

        debug!(
            column = %name,
            semantic_type = %semantic_type,
            missing_ratio,
            distinct_count,
            outlier_count,
            "Profiled column"
        );

        Ok(ColumnProfile {
            name,
            dtype_signature: format!("{}", series.dtype()),
            storage,
            value_count,
            missing_count,
            missing_ratio,
            distinct_count,
            distinct_ratio,
            // A single row cannot show variation, so it never counts as constant
            is_constant: rows > 1 && distinct_count <= 1,
            outlier_bounds,
            outlier_count,
            inferred_semantic_type: semantic_type,
            numeric_parse_ratio,
            datetime_parse_ratio,
            numeric_summary: summary,
        })
    }
}

// Seeded sample so repeated runs see the same values.
fn sample_text(present: &[&str]) -> Vec<String> {
    let sample_size = present.len().min(PATTERN_SAMPLE_SIZE);
    let mut rng = StdRng::seed_from_u64(42);
    present
        .choose_multiple(&mut rng, sample_size)
        .map(|v| v.to_string())
        .collect()
}
