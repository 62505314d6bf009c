//! Terminal outcome of one stage execution.

use super::{StageId, StageStatus};
use crate::errors::ErrorRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything the orchestrator needs to fold one stage's terminal state into
/// the pipeline state.
///
/// The executor produces exactly one outcome per dispatched stage; the stage
/// ends either in the completed set or in the failed set, never both and
/// never neither. For stages run against a cloned state in a concurrent
/// group, the outcome is the delta the orchestrator's merge step applies to
/// the shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    /// The stage this outcome belongs to.
    pub stage: StageId,

    /// Terminal status (`Completed` or `Failed`).
    pub status: StageStatus,

    /// Data sections produced on success.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,

    /// Resource tallies produced on success.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub resource_usage: HashMap<String, u64>,

    /// Wall-clock duration of the final attempt, in milliseconds.
    pub duration_ms: u64,

    /// Number of handler invocations consumed (0 for a breaker rejection).
    pub attempts: u32,

    /// The terminal error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,

    /// Checkpoint written after this stage completed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
}

impl StageOutcome {
    /// Creates a completed outcome.
    #[must_use]
    pub fn completed(
        stage: impl Into<StageId>,
        data: HashMap<String, serde_json::Value>,
        resource_usage: HashMap<String, u64>,
        duration_ms: u64,
        attempts: u32,
    ) -> Self {
        Self {
            stage: stage.into(),
            status: StageStatus::Completed,
            data,
            resource_usage,
            duration_ms,
            attempts,
            error: None,
            checkpoint_id: None,
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(
        stage: impl Into<StageId>,
        error: ErrorRecord,
        duration_ms: u64,
        attempts: u32,
    ) -> Self {
        Self {
            stage: stage.into(),
            status: StageStatus::Failed,
            data: HashMap::new(),
            resource_usage: HashMap::new(),
            duration_ms,
            attempts,
            error: Some(error),
            checkpoint_id: None,
        }
    }

    /// Attaches the checkpoint id written for this outcome.
    #[must_use]
    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    /// Returns true if the stage completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
