//! Imputation module for handling missing values.
//!
//! This module provides the two strategies the planner chooses between:
//! - Statistical imputation (median, mode, median timestamp)
//! - Directional imputation (forward fill, backward fill, statistical fallback)

mod directional;
mod statistical;

pub use directional::DirectionalImputer;
pub use statistical::StatisticalImputer;

use polars::prelude::*;

/// A filled column and how much was filled.
#[derive(Debug, Clone)]
pub struct ImputeOutcome {
    pub series: Series,
    /// Values that went from missing to present
    pub filled: usize,
    /// Value used by a statistical fill, rendered as text
    pub fill_value: Option<String>,
}

impl ImputeOutcome {
    fn unchanged(series: Series) -> Self {
        Self {
            series,
            filled: 0,
            fill_value: None,
        }
    }
}

/// Float columns use `NaN` as a second kind of missing; fold it into null.
pub(crate) fn missing_to_null(series: &Series) -> PolarsResult<Series> {
    match series.dtype() {
        DataType::Float32 | DataType::Float64 => {
            let values: Vec<Option<f64>> = crate::utils::numeric_values(series)?;
            Series::new(series.name().clone(), values).cast(series.dtype())
        }
        _ => Ok(series.clone()),
    }
}
