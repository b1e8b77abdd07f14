//! Statistical imputation methods.
//!
//! Median for numbers, mode for text and booleans, median timestamp for
//! dates. Filled columns keep their dtype.

use super::{ImputeOutcome, missing_to_null};
use crate::utils::{
    DtypeCategory, get_dtype_category, is_integer_dtype, median, missing_count, numeric_values,
    string_mode, string_values,
};
use polars::prelude::*;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill every missing value with the column's central value.
    ///
    /// Columns with no values to learn from come back unchanged.
    pub fn impute(series: &Series) -> PolarsResult<ImputeOutcome> {
        let before = missing_count(series);
        if before == 0 {
            return Ok(ImputeOutcome::unchanged(series.clone()));
        }

        let filled = match get_dtype_category(series.dtype()) {
            DtypeCategory::Numeric => Self::fill_numeric_median(series)?,
            DtypeCategory::String => Self::fill_string_mode(series)?,
            DtypeCategory::Boolean => Self::fill_boolean_mode(series)?,
            DtypeCategory::Datetime => Self::fill_temporal_median(series)?,
            DtypeCategory::Other => None,
        };

        Ok(match filled {
            Some((series, fill_value)) => {
                let after = missing_count(&series);
                ImputeOutcome {
                    series,
                    filled: before - after,
                    fill_value: Some(fill_value),
                }
            }
            None => ImputeOutcome::unchanged(missing_to_null(series)?),
        })
    }

    /// Median fill. Integer columns get the rounded median.
    ///
    /// Only missing cells change; present values keep their exact bits.
    fn fill_numeric_median(series: &Series) -> PolarsResult<Option<(Series, String)>> {
        let dtype = series.dtype().clone();
        if is_integer_dtype(&dtype) {
            return Self::fill_integer_median(series);
        }

        let present: Vec<f64> = numeric_values(series)?.into_iter().flatten().collect();
        let Some(mid) = median(&present) else {
            return Ok(None);
        };
        let out = missing_to_null(series)?
            .cast(&DataType::Float64)?
            .f64()?
            .fill_null_with_values(mid)?
            .into_series()
            .cast(&dtype)?;
        Ok(Some((out, format!("{}", mid))))
    }

    /// Integer median computed on the native values, widened to 64 bits
    /// with the signedness of the column.
    fn fill_integer_median(series: &Series) -> PolarsResult<Option<(Series, String)>> {
        let dtype = series.dtype().clone();
        if dtype.is_unsigned_integer() {
            let wide = series.cast(&DataType::UInt64)?;
            let ca = wide.u64()?;
            let present: Vec<i128> = ca.into_iter().flatten().map(i128::from).collect();
            let Some(fill) = integer_median(present).and_then(|m| u64::try_from(m).ok()) else {
                return Ok(None);
            };
            let out = ca.fill_null_with_values(fill)?.into_series().cast(&dtype)?;
            Ok(Some((out, fill.to_string())))
        } else {
            let wide = series.cast(&DataType::Int64)?;
            let ca = wide.i64()?;
            let present: Vec<i128> = ca.into_iter().flatten().map(i128::from).collect();
            let Some(fill) = integer_median(present).and_then(|m| i64::try_from(m).ok()) else {
                return Ok(None);
            };
            let out = ca.fill_null_with_values(fill)?.into_series().cast(&dtype)?;
            Ok(Some((out, fill.to_string())))
        }
    }

    fn fill_string_mode(series: &Series) -> PolarsResult<Option<(Series, String)>> {
        let values = string_values(series)?;
        let Some(mode) = string_mode(&values) else {
            return Ok(None);
        };
        let filled: Vec<Option<String>> = values
            .into_iter()
            .map(|v| Some(v.unwrap_or_else(|| mode.clone())))
            .collect();
        let out = Series::new(series.name().clone(), filled).cast(series.dtype())?;
        Ok(Some((out, mode)))
    }

    fn fill_boolean_mode(series: &Series) -> PolarsResult<Option<(Series, String)>> {
        let values: Vec<Option<bool>> = series.bool()?.into_iter().collect();
        let as_text: Vec<Option<String>> =
            values.iter().map(|v| v.map(|b| b.to_string())).collect();
        let Some(mode) = string_mode(&as_text) else {
            return Ok(None);
        };
        let fill = mode == "true";
        let filled: Vec<Option<bool>> = values.into_iter().map(|v| Some(v.unwrap_or(fill))).collect();
        Ok(Some((Series::new(series.name().clone(), filled), mode)))
    }

    /// Median of the physical timestamps, cast back to the column's dtype.
    fn fill_temporal_median(series: &Series) -> PolarsResult<Option<(Series, String)>> {
        let dtype = series.dtype().clone();
        let physical = series.to_physical_repr().cast(&DataType::Int64)?;
        let stamps = physical.i64()?;
        let present: Vec<i128> = stamps.into_iter().flatten().map(i128::from).collect();
        let Some(fill) = integer_median(present).and_then(|m| i64::try_from(m).ok()) else {
            return Ok(None);
        };

        let out = stamps.fill_null_with_values(fill)?.into_series().cast(&dtype)?;
        Ok(Some((out, fill.to_string())))
    }
}

/// Middle value, or the mean of the two middle values rounded half away
/// from zero.
fn integer_median(mut values: Vec<i128>) -> Option<i128> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        return Some(values[mid]);
    }
    let sum = values[mid - 1] + values[mid];
    Some(if sum >= 0 { (sum + 1) / 2 } else { (sum - 1) / 2 })
}
