//! Remediation planning module.
//!
//! The [`ActionPlanner`] turns a dataset profile into an ordered list of
//! [`ProposedAction`]s using a fixed rule table:
//!
//! 1. `dedupe` once, first, when duplicate rows exist
//! 2. `drop_column` for mostly-missing or constant columns
//! 3. `cast_type` for numeric-like text
//! 4. `parse_datetime` for date-like text
//! 5. `impute` for columns with a moderate share of missing values
//!
//! Rules read the planning basis: profiles over deduplicated rows when
//! duplicates exist, since deduplication runs before every column action.

mod rules;

use crate::config::RemediationConfig;
use crate::types::{DatasetProfile, ProposedAction};
use rules::{PlanningThresholds, column_actions};
use tracing::debug;

/// Deterministic rule-based planner.
#[derive(Debug, Clone)]
pub struct ActionPlanner {
    thresholds: PlanningThresholds,
}

impl ActionPlanner {
    pub fn new(config: &RemediationConfig) -> Self {
        Self {
            thresholds: PlanningThresholds {
                missing_drop: config.missing_drop_threshold,
                impute_simple: config.impute_simple_threshold,
                impute_floor: config.impute_floor,
                datetime_parse: config.datetime_parse_threshold,
            },
        }
    }

    /// Build the plan. Same profile in, same plan out.
    pub fn plan(&self, profile: &DatasetProfile) -> Vec<ProposedAction> {
        let mut actions = Vec::new();

        if profile.duplicate_count > 0 {
            actions.push(ProposedAction::dedupe(format!(
                "{} duplicate rows",
                profile.duplicate_count
            )));
        }

        for column in profile.planning_profiles() {
            actions.extend(column_actions(column, &self.thresholds));
        }

        // Stable: columns keep dataset order inside each group
        actions.sort_by_key(|a| a.action_kind);

        for action in &actions {
            debug!(action = %action, "Planned action");
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::ColumnProfiler;
    use crate::types::{ActionKind, ImputeStrategy};
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn plan_for(df: &DataFrame) -> Vec<ProposedAction> {
        let config = RemediationConfig::default();
        let profile = ColumnProfiler::new(&config).profile(df).unwrap();
        ActionPlanner::new(&config).plan(&profile)
    }

    #[test]
    fn test_plan_drop_and_advanced_impute() {
        let ages: Vec<Option<i64>> = (0..100)
            .map(|i| if i % 10 < 3 { None } else { Some((i * 37) % 60 + 18) })
            .collect();
        let names: Vec<String> = (0..100).map(|i| format!("p{}", i)).collect();
        let df = df![
            "id" => vec![1i64; 100],
            "name" => names,
            "age" => ages,
        ]
        .unwrap();

        assert_eq!(
            plan_for(&df),
            vec![
                ProposedAction::drop_column("id", "constant"),
                ProposedAction::impute("age", ImputeStrategy::Advanced, "missing 30–70%"),
            ]
        );
    }

    #[test]
    fn test_plan_group_order() {
        let df = df![
            "a" => [Some(1.0), None, Some(3.0), Some(4.0), Some(5.0), Some(6.0), Some(7.0), Some(8.0), Some(9.0), Some(10.0)],
            "price" => ["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"],
            "gone" => [None::<i64>, None, None, None, None, None, None, None, Some(1), Some(2)],
        ]
        .unwrap();
        let kinds: Vec<(ActionKind, String)> = plan_for(&df)
            .into_iter()
            .map(|a| (a.action_kind, a.target().to_string()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ActionKind::DropColumn, "gone".to_string()),
                (ActionKind::CastType, "price".to_string()),
                (ActionKind::Impute, "a".to_string()),
            ]
        );
    }

    #[test]
    fn test_dedupe_first_and_planning_basis() {
        // `b` is 25% missing as loaded but 40% missing once the duplicates are gone
        let df = df![
            "a" => [1i64, 1, 1, 1, 2, 3, 4, 5],
            "b" => [Some("x"), Some("x"), Some("x"), Some("x"), None, None, Some("y"), Some("z")],
        ]
        .unwrap();
        let plan = plan_for(&df);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0], ProposedAction::dedupe("3 duplicate rows"));
        assert_eq!(
            plan[1],
            ProposedAction::impute("b", ImputeStrategy::Advanced, "missing 30–70%")
        );
    }

    #[test]
    fn test_clean_dataset_has_empty_plan() {
        let df = df!["a" => [1i64, 2, 3, 4], "b" => ["w", "x", "y", "z"]].unwrap();
        assert!(plan_for(&df).is_empty());
    }

    #[test]
    fn test_plan_is_deterministic() {
        let df = df![
            "a" => [Some(1i64), None, Some(3), Some(4)],
            "b" => ["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"],
        ]
        .unwrap();
        assert_eq!(plan_for(&df), plan_for(&df));
    }
}
