//! Shared utilities for the remediation pipeline.
//!
//! Value extraction, parsing and small statistics used by the profiler, the
//! executor and the anomaly ensemble. Keeping them in one place means the
//! profiler predicts exactly what the executor will later do to a column.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for remediation purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Date or datetime types
    Datetime,
    /// Boolean type
    Boolean,
    /// String/categorical text
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Check if a DataType is a date or datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if is_datetime_dtype(dtype) {
        DtypeCategory::Datetime
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Value Extraction
// =============================================================================

/// Extract a numeric Series as `f64` options. `NaN` is read as missing.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let float_series = series.cast(&DataType::Float64)?;
    Ok(float_series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Extract a Series as string options (values rendered through a String cast).
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let str_series = series.cast(&DataType::String)?;
    Ok(str_series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Number of missing cells: nulls, plus `NaN` in float columns.
pub fn missing_count(series: &Series) -> usize {
    let nulls = series.null_count();
    match series.dtype() {
        DataType::Float32 | DataType::Float64 => match numeric_values(series) {
            Ok(values) => values.iter().filter(|v| v.is_none()).count(),
            Err(_) => nulls,
        },
        _ => nulls,
    }
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Clean a string for numeric parsing by removing formatting characters.
///
/// ```rust,ignore
/// assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
/// assert_eq!(clean_numeric_string("  42%  "), "42");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Try to parse a string as a number.
///
/// Handles currency symbols, percentages and thousands separators. Codes with
/// a leading zero (`"007"`, `"01234"`) are not numbers: casting them would
/// lose the zeros. `inf`/`nan` spellings are rejected too.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() || !cleaned.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    let unsigned = cleaned.trim_start_matches(['-', '+']);
    let int_part = unsigned.split(['.', 'e', 'E']).next().unwrap_or("");
    if int_part.len() > 1 && int_part.starts_with('0') {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// Shapes a date string can take; a cheap filter before trying chrono formats.
static DATE_SHAPES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{4}[-/.]\d{1,2}[-/.]\d{1,2}").expect("Invalid regex: YYYY-MM-DD"),
        Regex::new(r"^\d{1,2}[-/.]\d{1,2}[-/.]\d{4}").expect("Invalid regex: DD-MM-YYYY"),
        Regex::new(r"(?i)^\d{1,2}\s+[a-z]{3,9}\.?\s+\d{4}$").expect("Invalid regex: D Mon YYYY"),
        Regex::new(r"(?i)^[a-z]{3,9}\.?\s+\d{1,2},?\s+\d{4}$").expect("Invalid regex: Mon D YYYY"),
    ]
});

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 11] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Try to parse a string as a date or datetime.
pub fn parse_datetime_string(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if trimmed.is_empty() || !DATE_SHAPES.iter().any(|re| re.is_match(trimmed)) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    // "15 Mar. 2024" style abbreviations
    let normalized = trimmed.replace('.', "");
    if normalized != trimmed {
        for fmt in ["%d %b %Y", "%b %d, %Y", "%b %d %Y"] {
            if let Ok(d) = NaiveDate::parse_from_str(&normalized, fmt) {
                return d.and_hms_opt(0, 0, 0);
            }
        }
    }
    None
}

/// Parse a date string to epoch milliseconds.
pub fn parse_datetime_millis(s: &str) -> Option<i64> {
    parse_datetime_string(s).map(|dt| dt.and_utc().timestamp_millis())
}

/// Identifier-bearing name tokens (`customer_id`, `orderKey`, `uuid`).
const IDENTIFIER_TOKENS: [&str; 8] = [
    "id", "key", "uuid", "guid", "identifier", "code", "index", "idx",
];

/// Whether a column name carries an identifier token.
pub fn name_has_identifier_token(name: &str) -> bool {
    let trimmed = name.trim();
    // camelCase suffixes: "userId", "orderKey"
    if trimmed.ends_with("Id") || trimmed.ends_with("ID") || trimmed.ends_with("Key") {
        return true;
    }
    trimmed
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| IDENTIFIER_TOKENS.contains(&token))
}

// =============================================================================
// Small Statistics
// =============================================================================

/// Quantile of sorted values by linear interpolation between closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = pos - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Sort a copy of the values ascending.
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Median of the values, `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(quantile_sorted(&sorted_copy(values), 0.5))
}

/// Arithmetic mean, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1). Zero for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Population standard deviation (n). Zero when empty.
pub fn population_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / n as f64;
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64).sqrt()
}

/// Most frequent value. Ties go to the value seen first.
pub fn string_mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, value) in values.iter().enumerate() {
        if let Some(v) = value {
            let entry = counts.entry(v.as_str()).or_insert((0, position));
            entry.0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, pa)), (_, (cb, pb))| ca.cmp(cb).then(pb.cmp(pa)))
        .map(|(value, _)| value.to_string())
}

// =============================================================================
// Row Identity
// =============================================================================

/// Render each cell of a Series as a comparable key.
pub(crate) fn cell_keys(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    match string_values(series) {
        Ok(values) => Ok(values),
        Err(_) => {
            let mut keys = Vec::with_capacity(series.len());
            for i in 0..series.len() {
                let value = series.get(i)?;
                keys.push(if value.is_null() {
                    None
                } else {
                    Some(format!("{:?}", value))
                });
            }
            Ok(keys)
        }
    }
}

/// Drop exact duplicate rows, keeping the first occurrence in row order.
///
/// Missing cells compare equal to each other.
pub fn drop_duplicate_rows(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.unique_stable(None, UniqueKeepStrategy::First, None)
}

/// Number of rows that repeat an earlier row exactly.
pub fn duplicate_row_count(df: &DataFrame) -> PolarsResult<usize> {
    Ok(df.height() - drop_duplicate_rows(df)?.height())
}

// =============================================================================
// Tests
// =============================================================================
