//! Outlier handling module.
//!
//! Applies the configured treatment to values outside each numeric column's
//! IQR bounds. Bounds come from the profile, never from the data being
//! treated, so imputation earlier in the run cannot move them.

use crate::config::OutlierTreatment;
use crate::types::{ColumnProfile, OutlierBounds, OutlierTreatmentRecord};
use crate::utils::{is_integer_dtype, is_numeric_dtype, numeric_values};
use polars::prelude::*;
use tracing::{debug, warn};

/// Handles outlier treatment after the plan has run.
#[derive(Debug, Clone, Copy)]
pub struct OutlierHandler {
    treatment: OutlierTreatment,
}

impl OutlierHandler {
    pub fn new(treatment: OutlierTreatment) -> Self {
        Self { treatment }
    }

    /// Treat every profiled column that has bounds and is still numeric.
    ///
    /// Returns one record per column where at least one value was affected.
    pub fn treat(
        &self,
        df: &mut DataFrame,
        profiles: &[ColumnProfile],
    ) -> Vec<OutlierTreatmentRecord> {
        if self.treatment == OutlierTreatment::Ignore {
            debug!("Kept all outliers as configured");
            return Vec::new();
        }

        let mut records = Vec::new();
        for profile in profiles {
            let Some(bounds) = profile.outlier_bounds else {
                continue;
            };
            let eligible = df
                .column(&profile.name)
                .map(|c| is_numeric_dtype(c.dtype()))
                .unwrap_or(false);
            if !eligible {
                continue;
            }

            let rows_before = df.height();
            let result = match self.treatment {
                OutlierTreatment::Clip => Self::clip(df, &profile.name, &bounds),
                OutlierTreatment::Remove => Self::remove(df, &profile.name, &bounds),
                OutlierTreatment::Ignore => Ok(0),
            };

            match result {
                Ok(0) => {}
                Ok(affected) => {
                    debug!(
                        column = %profile.name,
                        treatment = %self.treatment,
                        affected,
                        low = bounds.low,
                        high = bounds.high,
                        "Treated outliers"
                    );
                    records.push(OutlierTreatmentRecord {
                        column: profile.name.clone(),
                        treatment: self.treatment,
                        low: bounds.low,
                        high: bounds.high,
                        values_affected: affected,
                        rows_before,
                        rows_after: df.height(),
                    });
                }
                Err(e) => warn!("Failed to treat outliers in {}: {}", profile.name, e),
            }
        }
        records
    }

    /// Replace out-of-range values with the nearest bound.
    ///
    /// In-range cells are left as they are. Integer columns stay integer
    /// unless a clipped value is fractional, in which case the column
    /// becomes Float64.
    fn clip(df: &mut DataFrame, column: &str, bounds: &OutlierBounds) -> PolarsResult<usize> {
        let series = df.column(column)?.as_materialized_series();
        let dtype = series.dtype().clone();
        let values = numeric_values(series)?;

        let replacements: Vec<Option<f64>> = values
            .iter()
            .map(|v| {
                v.filter(|x| bounds.is_outlier(*x))
                    .map(|x| x.clamp(bounds.low, bounds.high))
            })
            .collect();
        let affected = replacements.iter().flatten().count();
        if affected == 0 {
            return Ok(0);
        }

        let keeps_integers = replacements.iter().flatten().all(|v| v.fract() == 0.0);
        let out = if is_integer_dtype(&dtype) && keeps_integers {
            Self::replace_integers(series, &replacements)?
        } else {
            let clipped: Vec<Option<f64>> = values
                .iter()
                .zip(&replacements)
                .map(|(v, r)| r.or(*v))
                .collect();
            let out = Series::new(column.into(), clipped);
            if dtype == DataType::Float32 {
                out.cast(&DataType::Float32)?
            } else {
                out
            }
        };
        df.replace(column, out)?;
        Ok(affected)
    }

    /// Swap in whole-number replacements on the native integer values.
    fn replace_integers(series: &Series, replacements: &[Option<f64>]) -> PolarsResult<Series> {
        let dtype = series.dtype();
        let out = if dtype.is_unsigned_integer() {
            let wide = series.cast(&DataType::UInt64)?;
            let ca: UInt64Chunked = wide
                .u64()?
                .into_iter()
                .zip(replacements)
                .map(|(v, r)| r.map_or(v, |b| Some(b as u64)))
                .collect();
            ca.into_series()
        } else {
            let wide = series.cast(&DataType::Int64)?;
            let ca: Int64Chunked = wide
                .i64()?
                .into_iter()
                .zip(replacements)
                .map(|(v, r)| r.map_or(v, |b| Some(b as i64)))
                .collect();
            ca.into_series()
        };
        out.with_name(series.name().clone()).cast(dtype)
    }

    /// Remove rows holding an out-of-range value. Missing values are kept.
    fn remove(df: &mut DataFrame, column: &str, bounds: &OutlierBounds) -> PolarsResult<usize> {
        let values = numeric_values(df.column(column)?.as_materialized_series())?;
        let keep: Vec<bool> = values
            .iter()
            .map(|v| v.is_none_or(|x| !bounds.is_outlier(x)))
            .collect();

        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            let mask = BooleanChunked::from_slice("keep".into(), &keep);
            *df = df.filter(&mask)?;
        }
        Ok(removed)
    }
}
