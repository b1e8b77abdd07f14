//! Property tests for scoring, planning bands and vote combination.

use lex_remediation::anomaly::tally_votes;
use lex_remediation::quality::score_counts;
use lex_remediation::{
    ActionKind, ActionPlanner, AnomalyVote, ColumnProfiler, ImputeStrategy, QualityScorer,
    RemediationConfig, VoteRule,
};
use polars::prelude::*;
use proptest::prelude::*;

/// `rows` rows with the first `missing` values of `v` removed.
fn frame_with_missing(rows: usize, missing: usize) -> DataFrame {
    let keys: Vec<i64> = (0..rows as i64).collect();
    let values: Vec<Option<f64>> = (0..rows)
        .map(|i| if i < missing { None } else { Some(i as f64 * 0.5) })
        .collect();
    df! { "key" => keys, "v" => values }.unwrap()
}

/// Readings 1..=rows plus a few far extremes, and a unique tag per row.
fn frame_columns(rows: usize, extremes: usize) -> (Vec<Option<f64>>, Vec<Option<String>>) {
    let values: Vec<Option<f64>> = (1..=rows)
        .map(|v| Some(v as f64))
        .chain((0..extremes).map(|i| Some(1_000.0 + i as f64 * 250.0)))
        .collect();
    let tags = (0..values.len()).map(|i| Some(format!("r{}", i))).collect();
    (values, tags)
}

fn actions_for(plan: &[lex_remediation::ProposedAction], column: &str) -> Vec<(ActionKind, Option<ImputeStrategy>)> {
    plan.iter()
        .filter(|a| a.column.as_deref() == Some(column))
        .map(|a| (a.action_kind, a.strategy))
        .collect()
}

proptest! {
    #[test]
    fn score_never_rises_with_more_missing_cells(
        rows in 1usize..500,
        columns in 1usize..20,
        duplicates in 0usize..50,
        outliers in 0usize..50,
        a in 0usize..10_000,
        b in 0usize..10_000,
    ) {
        let (fewer, more) = (a.min(b), a.max(b));
        let numeric = rows * columns;
        let before = score_counts(rows, columns, fewer, duplicates, numeric, fewer, outliers).overall();
        let after = score_counts(rows, columns, more, duplicates, numeric, more, outliers).overall();

        prop_assert!(after <= before);
        prop_assert!((0.0..=100.0).contains(&after));
    }

    #[test]
    fn score_never_rises_with_more_duplicates_or_outliers(
        rows in 1usize..500,
        missing in 0usize..100,
        extra_duplicates in 0usize..100,
        extra_outliers in 0usize..100,
    ) {
        let base = score_counts(rows, 4, missing, 0, rows * 4, 0, 0).overall();
        let worse = score_counts(rows, 4, missing, extra_duplicates, rows * 4, 0, extra_outliers).overall();

        prop_assert!(worse <= base);
    }

    #[test]
    fn injecting_a_missing_cell_never_raises_score(
        rows in 20usize..60,
        extremes in 0usize..4,
        target_row in any::<prop::sample::Index>(),
        numeric_target in any::<bool>(),
    ) {
        let config = RemediationConfig::default();
        let (values, tags) = frame_columns(rows, extremes);
        let row = target_row.index(values.len());

        let mut blanked_values = values.clone();
        let mut blanked_tags = tags.clone();
        if numeric_target {
            blanked_values[row] = None;
        } else {
            blanked_tags[row] = None;
        }

        let score = |values: Vec<Option<f64>>, tags: Vec<Option<String>>| {
            let df = df! { "reading" => values, "tag" => tags }.unwrap();
            let profile = ColumnProfiler::new(&config).profile(&df).unwrap();
            QualityScorer::new(&config).score(&profile).overall_score
        };

        let before = score(values, tags);
        let after = score(blanked_values, blanked_tags);

        prop_assert!(after < before, "score rose from {} to {}", before, after);
    }

    #[test]
    fn missing_ratio_selects_one_band(missing in 0usize..=100) {
        let config = RemediationConfig::default();
        let df = frame_with_missing(100, missing);
        let profile = ColumnProfiler::new(&config).profile(&df).unwrap();
        let plan = ActionPlanner::new(&config).plan(&profile);
        let actions = actions_for(&plan, "v");

        let ratio = missing as f64 / 100.0;
        if ratio > 0.70 {
            prop_assert_eq!(actions, vec![(ActionKind::DropColumn, None)]);
        } else if ratio >= 0.30 {
            prop_assert_eq!(actions, vec![(ActionKind::Impute, Some(ImputeStrategy::Advanced))]);
        } else if ratio >= 0.10 {
            prop_assert_eq!(actions, vec![(ActionKind::Impute, Some(ImputeStrategy::Simple))]);
        } else {
            prop_assert!(actions.is_empty());
        }
    }

    #[test]
    fn plan_is_deterministic(missing in 0usize..=100) {
        let config = RemediationConfig::default();
        let df = frame_with_missing(100, missing);
        let profile = ColumnProfiler::new(&config).profile(&df).unwrap();
        let planner = ActionPlanner::new(&config);

        prop_assert_eq!(planner.plan(&profile), planner.plan(&profile));
    }

    #[test]
    fn vote_rules_nest(
        flags in prop::collection::vec(prop::collection::vec(any::<bool>(), 30), 1..=3),
    ) {
        let runs: Vec<Vec<AnomalyVote>> = flags
            .iter()
            .enumerate()
            .map(|(d, row_flags)| {
                row_flags
                    .iter()
                    .enumerate()
                    .map(|(row_index, &is_anomaly)| AnomalyVote {
                        detector_name: format!("d{}", d),
                        row_index,
                        is_anomaly,
                        score: if is_anomaly { 1.0 } else { 0.0 },
                    })
                    .collect()
            })
            .collect();

        let unanimous = tally_votes(&runs, VoteRule::Unanimous);
        let majority = tally_votes(&runs, VoteRule::Majority);
        let any = tally_votes(&runs, VoteRule::Any);

        prop_assert!(unanimous.is_subset(&majority));
        prop_assert!(majority.is_subset(&any));
    }
}
