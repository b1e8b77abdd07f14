//! Per-column planning rules.

use crate::types::{ColumnProfile, ImputeStrategy, ProposedAction};

/// Type correction a column needs before any other treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Coercion {
    Cast,
    ParseDatetime,
}

/// Thresholds the rule table reads.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlanningThresholds {
    pub missing_drop: f64,
    pub impute_simple: f64,
    pub impute_floor: f64,
    pub datetime_parse: f64,
}

impl PlanningThresholds {
    pub(crate) fn drop_reason(&self) -> String {
        format!("missing>{}%", percent(self.missing_drop))
    }

    pub(crate) fn simple_reason(&self) -> String {
        format!(
            "missing {}–{}%",
            percent(self.impute_floor),
            percent(self.impute_simple)
        )
    }

    pub(crate) fn advanced_reason(&self) -> String {
        format!(
            "missing {}–{}%",
            percent(self.impute_simple),
            percent(self.missing_drop)
        )
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.0}", ratio * 100.0)
}

pub(crate) fn coercion_for(column: &ColumnProfile, thresholds: &PlanningThresholds) -> Option<Coercion> {
    if column.is_numeric_text() {
        Some(Coercion::Cast)
    } else if column.is_datetime_text(thresholds.datetime_parse) {
        Some(Coercion::ParseDatetime)
    } else {
        None
    }
}

/// Missing ratio once coercion has turned unparseable values into missing ones.
pub(crate) fn projected_missing_ratio(column: &ColumnProfile, coercion: Option<Coercion>) -> f64 {
    let rows = column.row_count();
    if rows == 0 {
        return 1.0;
    }
    let parse_ratio = match coercion {
        Some(Coercion::Cast) => column.numeric_parse_ratio,
        Some(Coercion::ParseDatetime) => column.datetime_parse_ratio,
        None => None,
    };
    let unparseable = parse_ratio.map_or(0, |ratio| {
        let parsed = (ratio * column.value_count as f64).round() as usize;
        column.value_count.saturating_sub(parsed)
    });
    (column.missing_count + unparseable) as f64 / rows as f64
}

/// Actions for one column, in group order. A drop excludes everything else.
pub(crate) fn column_actions(
    column: &ColumnProfile,
    thresholds: &PlanningThresholds,
) -> Vec<ProposedAction> {
    let coercion = coercion_for(column, thresholds);
    let missing = projected_missing_ratio(column, coercion);

    if missing > thresholds.missing_drop {
        return vec![ProposedAction::drop_column(&column.name, thresholds.drop_reason())];
    }
    if column.is_constant {
        return vec![ProposedAction::drop_column(&column.name, "constant")];
    }

    let mut actions = Vec::new();
    match coercion {
        Some(Coercion::Cast) => actions.push(ProposedAction::cast_type(
            &column.name,
            "numeric-like text",
        )),
        Some(Coercion::ParseDatetime) => actions.push(ProposedAction::parse_datetime(
            &column.name,
            "date-like text",
        )),
        None => {}
    }

    if missing >= thresholds.impute_floor {
        let action = if missing < thresholds.impute_simple {
            ProposedAction::impute(&column.name, ImputeStrategy::Simple, thresholds.simple_reason())
        } else {
            ProposedAction::impute(
                &column.name,
                ImputeStrategy::Advanced,
                thresholds.advanced_reason(),
            )
        };
        actions.push(action);
    }

    actions
}
