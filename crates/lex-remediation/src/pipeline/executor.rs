//! Plan execution.
//!
//! [`RemediationExecutor`] applies a plan to a working copy of the dataset,
//! one action at a time, re-checking each action against the current data.
//! A failed or stale action is logged and skipped; the rest of the plan
//! still runs.

use crate::config::{OutlierTreatment, RemediationConfig};
use crate::error::{RemediationError, Result};
use crate::imputers::{DirectionalImputer, StatisticalImputer};
use crate::pipeline::downcast::downcast_columns;
use crate::pipeline::outliers::OutlierHandler;
use crate::types::{
    ActionKind, DatasetProfile, ExecutionLog, ExecutionRecord, ImputeStrategy, ProposedAction,
};
use crate::utils::{
    DtypeCategory, clean_numeric_string, drop_duplicate_rows, get_dtype_category,
    parse_datetime_millis, parse_numeric_string, string_values,
};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// What one action did to the data.
struct Applied {
    values_affected: usize,
    unparseable_count: usize,
    note: Option<String>,
}

impl Applied {
    fn affected(values_affected: usize) -> Self {
        Self {
            values_affected,
            unparseable_count: 0,
            note: None,
        }
    }
}

/// Executes a remediation plan against a DataFrame.
#[derive(Debug, Clone)]
pub struct RemediationExecutor {
    outlier_treatment: OutlierTreatment,
    enable_downcast: bool,
}

impl RemediationExecutor {
    pub fn new(config: &RemediationConfig) -> Self {
        Self {
            outlier_treatment: config.outlier_treatment,
            enable_downcast: config.enable_downcast,
        }
    }

    /// Apply `plan` in order, then outlier treatment and optional downcasting.
    ///
    /// `profile` must describe `df` before any action; outlier bounds are read
    /// from its planning basis.
    pub fn execute(
        &self,
        mut df: DataFrame,
        plan: &[ProposedAction],
        profile: &DatasetProfile,
    ) -> (DataFrame, ExecutionLog) {
        let mut log = ExecutionLog {
            rows_before: df.height(),
            columns_before: df.width(),
            ..Default::default()
        };

        info!("Executing {} planned actions...", plan.len());

        for action in plan {
            let rows_before = df.height();
            let record = match Self::apply(&mut df, action) {
                Ok(applied) => {
                    debug!(
                        action = %action,
                        values_affected = applied.values_affected,
                        unparseable = applied.unparseable_count,
                        "Applied action"
                    );
                    ExecutionRecord {
                        action: action.clone(),
                        applied: true,
                        rows_before,
                        rows_after: df.height(),
                        values_affected: applied.values_affected,
                        unparseable_count: applied.unparseable_count,
                        note: applied.note,
                    }
                }
                Err(e) => {
                    warn!(action = %action, code = e.error_code(), "Skipped action: {}", e);
                    ExecutionRecord {
                        action: action.clone(),
                        applied: false,
                        rows_before,
                        rows_after: df.height(),
                        values_affected: 0,
                        unparseable_count: 0,
                        note: Some(e.to_string()),
                    }
                }
            };
            log.records.push(record);
        }

        log.outlier_treatments =
            OutlierHandler::new(self.outlier_treatment).treat(&mut df, profile.planning_profiles());

        if self.enable_downcast {
            log.downcasts = downcast_columns(&mut df);
        }

        log.rows_after = df.height();
        log.columns_after = df.width();

        info!(
            applied = log.applied_count(),
            skipped = log.records.len() - log.applied_count(),
            rows_before = log.rows_before,
            rows_after = log.rows_after,
            columns_before = log.columns_before,
            columns_after = log.columns_after,
            "Plan executed"
        );

        (df, log)
    }

    fn apply(df: &mut DataFrame, action: &ProposedAction) -> Result<Applied> {
        let Some(column) = action.column.as_deref() else {
            return match action.action_kind {
                ActionKind::Dedupe => Self::dedupe(df),
                kind => Err(RemediationError::Internal(format!(
                    "'{}' action has no target column",
                    kind
                ))),
            };
        };

        // Stale-action guard
        if df.column(column).is_err() {
            return Err(RemediationError::ColumnVanished(column.to_string()));
        }

        match action.action_kind {
            ActionKind::Dedupe => Self::dedupe(df),
            ActionKind::DropColumn => Self::drop_column(df, column),
            ActionKind::CastType => Self::cast_numeric(df, column),
            ActionKind::ParseDatetime => Self::parse_datetime(df, column),
            ActionKind::Impute => {
                Self::impute(df, column, action.strategy.unwrap_or(ImputeStrategy::Simple))
            }
        }
    }

    fn dedupe(df: &mut DataFrame) -> Result<Applied> {
        let deduplicated = drop_duplicate_rows(df)?;
        let removed = df.height() - deduplicated.height();
        if removed > 0 {
            *df = deduplicated;
        }
        Ok(Applied::affected(removed))
    }

    fn drop_column(df: &mut DataFrame, column: &str) -> Result<Applied> {
        let removed = df.drop_in_place(column)?;
        Ok(Applied::affected(removed.len()))
    }

    /// Text column as it currently stands, or an error if it is no longer text.
    fn text_values(df: &DataFrame, column: &str, target: &str) -> Result<Vec<Option<String>>> {
        let series = df.column(column)?.as_materialized_series();
        if get_dtype_category(series.dtype()) != DtypeCategory::String {
            return Err(RemediationError::StageFailed {
                stage: target.to_string(),
                reason: format!("column '{}' is {} rather than text", column, series.dtype()),
            });
        }
        Ok(string_values(series)?)
    }

    fn cast_numeric(df: &mut DataFrame, column: &str) -> Result<Applied> {
        let values = Self::text_values(df, column, "cast_type")?;

        let mut unparseable = 0;
        let parsed: Vec<Option<f64>> = values
            .iter()
            .map(|v| {
                let v = v.as_deref()?;
                let number = parse_numeric_string(v);
                if number.is_none() {
                    unparseable += 1;
                }
                number
            })
            .collect();
        let converted = parsed.iter().flatten().count();

        let integral = parsed
            .iter()
            .flatten()
            .all(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64);
        let series = if integral {
            // Whole numbers are re-read from the text so digits past f64 precision survive.
            let ints: Vec<Option<i64>> = values
                .iter()
                .zip(&parsed)
                .map(|(text, v)| {
                    let x = (*v)?;
                    let exact = text
                        .as_deref()
                        .and_then(|t| clean_numeric_string(t).parse::<i64>().ok());
                    Some(exact.unwrap_or(x as i64))
                })
                .collect();
            Series::new(column.into(), ints)
        } else {
            Series::new(column.into(), parsed)
        };
        let dtype = series.dtype().clone();
        df.replace(column, series)?;

        Ok(Applied {
            values_affected: converted,
            unparseable_count: unparseable,
            note: Self::unparseable_note(column, &dtype.to_string(), unparseable),
        })
    }

    fn parse_datetime(df: &mut DataFrame, column: &str) -> Result<Applied> {
        let values = Self::text_values(df, column, "parse_datetime")?;

        let mut unparseable = 0;
        let stamps: Vec<Option<i64>> = values
            .iter()
            .map(|v| {
                let v = v.as_deref()?;
                let stamp = parse_datetime_millis(v);
                if stamp.is_none() {
                    unparseable += 1;
                }
                stamp
            })
            .collect();
        let converted = stamps.iter().flatten().count();

        let series = Series::new(column.into(), stamps)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        df.replace(column, series)?;

        Ok(Applied {
            values_affected: converted,
            unparseable_count: unparseable,
            note: Self::unparseable_note(column, "datetime", unparseable),
        })
    }

    fn unparseable_note(column: &str, target: &str, count: usize) -> Option<String> {
        if count == 0 {
            return None;
        }
        let e = RemediationError::UnparseableValue {
            column: column.to_string(),
            target: target.to_string(),
            count,
        };
        warn!(column, count, "Left unparseable values missing");
        Some(e.to_string())
    }

    fn impute(df: &mut DataFrame, column: &str, strategy: ImputeStrategy) -> Result<Applied> {
        let series = df.column(column)?.as_materialized_series().clone();
        let outcome = match strategy {
            ImputeStrategy::Simple => StatisticalImputer::impute(&series)?,
            ImputeStrategy::Advanced => DirectionalImputer::fill_with_fallback(&series)?,
        };
        let note = outcome.fill_value.as_ref().map(|v| format!("filled with {}", v));
        let filled = outcome.filled;
        df.replace(column, outcome.series)?;

        Ok(Applied {
            values_affected: filled,
            unparseable_count: 0,
            note,
        })
    }
}
