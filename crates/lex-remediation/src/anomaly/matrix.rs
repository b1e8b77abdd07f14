//! Feature matrix preparation for the detectors.

use crate::utils::{
    DtypeCategory, get_dtype_category, median, numeric_values, parse_numeric_string,
    population_std, string_values,
};
use polars::prelude::*;
use rand::prelude::*;

/// Numeric columns over the analyzed rows, raw and standardized.
#[derive(Debug, Clone)]
pub(crate) struct FeatureMatrix {
    pub columns: Vec<String>,
    /// Original row index of each analyzed row
    pub row_index: Vec<usize>,
    pub sampled: bool,
    /// Column-major values as loaded, missing kept
    pub raw: Vec<Vec<Option<f64>>>,
    /// Row-major, median-filled and z-scored
    pub standardized: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn rows(&self) -> usize {
        self.row_index.len()
    }

    /// Build the matrix, sampling `max_rows` rows with a seeded RNG when the
    /// dataset is larger.
    pub fn prepare(
        df: &DataFrame,
        columns: &[&str],
        max_rows: usize,
        seed: u64,
    ) -> PolarsResult<Self> {
        let height = df.height();
        let (row_index, sampled) = if height > max_rows {
            let mut rng = StdRng::seed_from_u64(seed);
            let all: Vec<usize> = (0..height).collect();
            let mut picked: Vec<usize> = all.choose_multiple(&mut rng, max_rows).copied().collect();
            picked.sort_unstable();
            (picked, true)
        } else {
            ((0..height).collect(), false)
        };

        let mut raw = Vec::with_capacity(columns.len());
        for name in columns {
            let series = df.column(name)?.as_materialized_series();
            let values = column_numbers(series)?;
            raw.push(row_index.iter().map(|&i| values[i]).collect::<Vec<_>>());
        }

        let standardized = standardize(&raw, row_index.len());

        Ok(Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            row_index,
            sampled,
            raw,
            standardized,
        })
    }
}

/// Numbers held by a column; numeric-like text is parsed. Infinities count
/// as missing.
fn column_numbers(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let values = match get_dtype_category(series.dtype()) {
        DtypeCategory::Numeric => numeric_values(series)?,
        DtypeCategory::String => string_values(series)?
            .into_iter()
            .map(|v| v.and_then(|s| parse_numeric_string(&s)))
            .collect(),
        _ => vec![None; series.len()],
    };
    Ok(values.into_iter().map(|v| v.filter(|x| x.is_finite())).collect())
}

/// Median-fill each column, z-score it, and transpose to rows.
fn standardize(raw: &[Vec<Option<f64>>], rows: usize) -> Vec<Vec<f64>> {
    let mut matrix = vec![Vec::with_capacity(raw.len()); rows];

    for column in raw {
        let present: Vec<f64> = column.iter().flatten().copied().collect();
        let fill = median(&present).unwrap_or(0.0);
        let filled: Vec<f64> = column.iter().map(|v| v.unwrap_or(fill)).collect();

        let mean = filled.iter().sum::<f64>() / filled.len().max(1) as f64;
        let std = population_std(&filled);
        for (row, value) in matrix.iter_mut().zip(&filled) {
            row.push(if std > 0.0 { (value - mean) / std } else { 0.0 });
        }
    }

    matrix
}
