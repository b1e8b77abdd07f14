//! Data quality scoring module.
//!
//! Scores a [`DatasetProfile`](crate::types::DatasetProfile) on completeness,
//! uniqueness and consistency, labels the result, and lists prioritized
//! findings.

mod scorer;

pub use scorer::{QualityScorer, ScoreBreakdown, column_score, label_for, score_counts};
