//! Typed run lifecycle events and the sink seam that receives them.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use serde::{Deserialize, Serialize};

use crate::core::StageId;
use crate::errors::ErrorKind;

/// A lifecycle transition emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// A run started, fresh or resumed.
    RunStarted {
        /// The case being enriched.
        case_id: String,
        /// Checkpoint the run resumed from, if any.
        resumed_from: Option<String>,
    },

    /// A stage attempt is about to invoke its handler.
    StageStarted {
        /// The stage.
        stage: StageId,
        /// 1-based attempt number.
        attempt: u32,
    },

    /// A stage reached `Completed`.
    StageCompleted {
        /// The stage.
        stage: StageId,
        /// Duration of the successful attempt in milliseconds.
        duration_ms: u64,
        /// Attempts consumed.
        attempts: u32,
    },

    /// An attempt failed and another one is scheduled after a backoff.
    StageRetrying {
        /// The stage.
        stage: StageId,
        /// The attempt that just failed.
        attempt: u32,
        /// Sleep before the next attempt, in milliseconds.
        delay_ms: u64,
        /// Why the attempt failed.
        reason: String,
    },

    /// A stage reached `Failed`.
    StageFailed {
        /// The stage.
        stage: StageId,
        /// Failure classification.
        kind: ErrorKind,
        /// Terminal error message.
        message: String,
        /// Attempts consumed.
        attempts: u32,
    },

    /// The breaker opened for a stage after retries were exhausted.
    BreakerOpened {
        /// The stage.
        stage: StageId,
    },

    /// The breaker refused a stage without invoking its handler.
    BreakerRejected {
        /// The stage.
        stage: StageId,
        /// Remaining cool-down in milliseconds.
        remaining_ms: u64,
    },

    /// A checkpoint was written after a stage completed.
    CheckpointSaved {
        /// The stage just completed.
        stage: StageId,
        /// The new checkpoint id.
        checkpoint_id: String,
    },

    /// A checkpoint write failed; the run continues without it.
    CheckpointFailed {
        /// The stage whose checkpoint could not be written.
        stage: StageId,
        /// The store error.
        message: String,
    },

    /// The run finished processing every group.
    RunCompleted {
        /// The case.
        case_id: String,
        /// Total run duration in milliseconds.
        duration_ms: u64,
        /// Number of completed stages.
        completed: usize,
        /// Number of failed stages.
        failed: usize,
    },

    /// A critical stage failed; remaining groups were skipped.
    RunAborted {
        /// The case.
        case_id: String,
        /// The critical stage that failed.
        stage: StageId,
    },
}

impl RunEvent {
    /// Short dotted name for logs and filtering.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run.started",
            Self::StageStarted { .. } => "stage.started",
            Self::StageCompleted { .. } => "stage.completed",
            Self::StageRetrying { .. } => "stage.retrying",
            Self::StageFailed { .. } => "stage.failed",
            Self::BreakerOpened { .. } => "breaker.opened",
            Self::BreakerRejected { .. } => "breaker.rejected",
            Self::CheckpointSaved { .. } => "checkpoint.saved",
            Self::CheckpointFailed { .. } => "checkpoint.failed",
            Self::RunCompleted { .. } => "run.completed",
            Self::RunAborted { .. } => "run.aborted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind() {
        let event = RunEvent::StageStarted {
            stage: "scrape".to_string(),
            attempt: 1,
        };
        assert_eq!(event.kind(), "stage.started");
    }

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::StageFailed {
            stage: "liens".to_string(),
            kind: ErrorKind::Timeout,
            message: "deadline elapsed".to_string(),
            attempts: 3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"stage_failed""#));
        assert!(json.contains(r#""kind":"timeout""#));
    }
}
