//! Statistical helpers for column profiling.

use crate::types::{NumericSummary, OutlierBounds};
use crate::utils::{median, quantile_sorted, sample_std, sorted_copy};
use std::collections::HashSet;

/// Fewer values than this leave a column without outlier bounds.
pub(crate) const MIN_VALUES_FOR_BOUNDS: usize = 4;

/// Tukey fence multiplier.
pub(crate) const IQR_MULTIPLIER: f64 = 1.5;

/// Interquartile-range bounds, `None` for short columns or a zero spread.
pub(crate) fn iqr_bounds(values: &[f64]) -> Option<OutlierBounds> {
    if values.len() < MIN_VALUES_FOR_BOUNDS {
        return None;
    }

    let sorted = sorted_copy(values);
    let q1 = quantile_sorted(&sorted, 0.25);
    let q3 = quantile_sorted(&sorted, 0.75);
    let iqr = q3 - q1;
    if iqr <= 0.0 || !iqr.is_finite() {
        return None;
    }

    Some(OutlierBounds {
        low: q1 - IQR_MULTIPLIER * iqr,
        high: q3 + IQR_MULTIPLIER * iqr,
        q1,
        q3,
        iqr,
    })
}

pub(crate) fn count_outliers(values: &[f64], bounds: &OutlierBounds) -> usize {
    values.iter().filter(|v| bounds.is_outlier(**v)).count()
}

pub(crate) fn numeric_summary(values: &[f64]) -> Option<NumericSummary> {
    let mid = median(values)?;
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(NumericSummary {
        mean,
        std: sample_std(values),
        min,
        max,
        median: mid,
    })
}

/// Distinct numbers, with `-0.0` and `0.0` counted once.
pub(crate) fn distinct_numbers(values: &[f64]) -> usize {
    values
        .iter()
        .map(|v| if *v == 0.0 { 0u64 } else { v.to_bits() })
        .collect::<HashSet<_>>()
        .len()
}

pub(crate) fn distinct_strings<'a>(values: impl IntoIterator<Item = &'a str>) -> usize {
    values.into_iter().collect::<HashSet<_>>().len()
}

pub(crate) fn all_integral(values: &[f64]) -> bool {
    values.iter().all(|v| v.fract() == 0.0)
}
