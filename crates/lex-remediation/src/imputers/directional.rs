//! Forward/backward fill imputation.

use super::{ImputeOutcome, StatisticalImputer, missing_to_null};
use crate::utils::missing_count;
use polars::prelude::*;

/// Carries neighbouring values into gaps, in row order.
pub struct DirectionalImputer;

impl DirectionalImputer {
    /// Forward fill, then backward fill for leading gaps.
    pub fn fill(series: &Series) -> PolarsResult<ImputeOutcome> {
        let before = missing_count(series);
        if before == 0 {
            return Ok(ImputeOutcome::unchanged(series.clone()));
        }

        let nulled = missing_to_null(series)?;
        let filled = nulled.fill_null(FillNullStrategy::Forward(None))?;
        let filled = filled.fill_null(FillNullStrategy::Backward(None))?;
        let after = missing_count(&filled);

        Ok(ImputeOutcome {
            series: filled,
            filled: before - after,
            fill_value: None,
        })
    }

    /// Directional fill with a statistical fallback for anything left.
    pub fn fill_with_fallback(series: &Series) -> PolarsResult<ImputeOutcome> {
        let directional = Self::fill(series)?;
        let fallback = StatisticalImputer::impute(&directional.series)?;
        Ok(ImputeOutcome {
            series: fallback.series,
            filled: directional.filled + fallback.filled,
            fill_value: fallback.fill_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_then_backward() {
        let series = Series::new("v".into(), &[None, Some(2.0), None, None, Some(5.0), None]);
        let outcome = DirectionalImputer::fill(&series).unwrap();

        let values: Vec<Option<f64>> = outcome.series.f64().unwrap().into_iter().collect();
        assert_eq!(
            values,
            vec![Some(2.0), Some(2.0), Some(2.0), Some(2.0), Some(5.0), Some(5.0)]
        );
        assert_eq!(outcome.filled, 4);
    }

    #[test]
    fn test_text_fill() {
        let series = Series::new("c".into(), &[Some("a"), None, Some("b")]);
        let outcome = DirectionalImputer::fill(&series).unwrap();
        assert_eq!(outcome.series.str().unwrap().get(1), Some("a"));
    }

    #[test]
    fn test_nan_is_filled() {
        let series = Series::new("v".into(), &[Some(1.0), Some(f64::NAN), Some(3.0)]);
        let outcome = DirectionalImputer::fill(&series).unwrap();
        assert_eq!(outcome.series.f64().unwrap().get(1), Some(1.0));
        assert_eq!(outcome.filled, 1);
    }

    #[test]
    fn test_all_missing_stays_missing() {
        let series = Series::new("v".into(), &[Option::<i64>::None, None]);
        let outcome = DirectionalImputer::fill_with_fallback(&series).unwrap();
        assert_eq!(outcome.filled, 0);
        assert_eq!(outcome.series.null_count(), 2);
    }
}
