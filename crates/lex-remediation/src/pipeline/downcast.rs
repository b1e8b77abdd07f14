//! Lossless narrowing of numeric columns.

use crate::types::DowncastRecord;
use crate::utils::{is_integer_dtype, is_numeric_dtype, numeric_values};
use polars::prelude::*;
use tracing::{debug, warn};

/// Signed integer widths tried in order, narrowest first.
const INTEGER_TARGETS: [(DataType, i64, i64); 3] = [
    (DataType::Int8, i8::MIN as i64, i8::MAX as i64),
    (DataType::Int16, i16::MIN as i64, i16::MAX as i64),
    (DataType::Int32, i32::MIN as i64, i32::MAX as i64),
];

fn byte_width(dtype: &DataType) -> usize {
    match dtype {
        DataType::Int8 | DataType::UInt8 => 1,
        DataType::Int16 | DataType::UInt16 => 2,
        DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
        _ => 8,
    }
}

/// Narrowest dtype that holds every value of `series` exactly, if narrower
/// than the current one.
fn narrower_dtype(series: &Series) -> PolarsResult<Option<DataType>> {
    let dtype = series.dtype();
    if !is_numeric_dtype(dtype) {
        return Ok(None);
    }
    let values: Vec<f64> = numeric_values(series)?.into_iter().flatten().collect();
    if values.is_empty() {
        return Ok(None);
    }

    if is_integer_dtype(dtype) {
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let target = INTEGER_TARGETS
            .iter()
            .find(|(_, lo, hi)| min >= *lo as f64 && max <= *hi as f64)
            .map(|(t, _, _)| t.clone());
        return Ok(target.filter(|t| byte_width(t) < byte_width(dtype)));
    }

    if *dtype == DataType::Float64 && values.iter().all(|v| (*v as f32) as f64 == *v) {
        return Ok(Some(DataType::Float32));
    }
    Ok(None)
}

/// Narrow numeric columns in place. Values never change.
pub(crate) fn downcast_columns(df: &mut DataFrame) -> Vec<DowncastRecord> {
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let mut records = Vec::new();

    for name in names {
        let Ok(column) = df.column(&name) else {
            continue;
        };
        let series = column.as_materialized_series().clone();
        let target = match narrower_dtype(&series) {
            Ok(Some(target)) => target,
            Ok(None) => continue,
            Err(e) => {
                warn!("Failed to inspect {} for downcasting: {}", name, e);
                continue;
            }
        };

        let from = series.dtype().to_string();
        match series.cast(&target).and_then(|cast| df.replace(&name, cast).map(|_| ())) {
            Ok(()) => {
                debug!(column = %name, from = %from, to = %target, "Downcast column");
                records.push(DowncastRecord {
                    column: name,
                    from,
                    to: target.to_string(),
                });
            }
            Err(e) => warn!("Failed to downcast {}: {}", name, e),
        }
    }
    records
}
