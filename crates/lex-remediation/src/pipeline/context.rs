//! Per-run context handed to every stage.

use crate::config::RemediationConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide run counter. Ids start at 1.
static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Identity and configuration of one pipeline run.
///
/// Cloning is cheap; the configuration is shared.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: u64,
    pub config: Arc<RemediationConfig>,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    /// Allocate the next run id and stamp the start time.
    pub fn new(config: Arc<RemediationConfig>) -> Self {
        Self {
            run_id: NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
            config,
            started_at: Utc::now(),
        }
    }

    /// Milliseconds since the run started.
    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }
}

static_assertions::assert_impl_all!(RunContext: Send, Sync);
