use crate::config::RemediationConfig;
use crate::pipeline::PipelineState;
use crate::types::{AnomalyReport, DatasetProfile, ExecutionLog, ProposedAction, QualityReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time spent in one state of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: PipelineState,
    pub duration_ms: u64,
}

/// Everything a run produced.
///
/// A stage that was disabled leaves its field out of the JSON entirely; a
/// stage that ran and found nothing is present with empty contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationReport {
    // Metadata
    pub run_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub final_state: PipelineState,
    /// States the run passed through, in order
    pub stage_history: Vec<StageTiming>,

    // Shape
    pub rows_before: usize,
    pub columns_before: usize,
    pub rows_after: usize,
    pub columns_after: usize,

    pub profile: DatasetProfile,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<ProposedAction>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionLog>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<AnomalyReport>,

    /// Quality of the remediated data, when both scoring and execution ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_after: Option<QualityReport>,

    pub config: RemediationConfig,
}

impl RemediationReport {
    /// Change in overall quality score, when both scores exist.
    pub fn score_delta(&self) -> Option<f64> {
        match (&self.quality, &self.quality_after) {
            (Some(before), Some(after)) => Some(after.overall_score - before.overall_score),
            _ => None,
        }
    }

    /// States that ran, in order.
    pub fn stages_run(&self) -> Vec<PipelineState> {
        self.stage_history.iter().map(|t| t.stage).collect()
    }
}
