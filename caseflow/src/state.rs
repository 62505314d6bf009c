//! Pipeline state: the single mutable record threaded through a run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::{StageId, StageOutcome, StageStatus};
use crate::errors::ErrorRecord;

/// Accumulated results, status and metrics for one pipeline run.
///
/// Exactly one task owns the state at any time: the orchestrator for
/// sequential groups, a per-sibling clone inside concurrent groups. Only the
/// orchestrator's merge step, on the single coordinating task, combines
/// clones back together, so the state itself needs no locking.
///
/// Invariant: a stage id is never present in both `completed_stages` and
/// `failed_stages`, and a stage only runs once all of its dependencies are
/// in `completed_stages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// The case this run enriches.
    pub case_id: String,

    /// Stages that reached `Completed`.
    pub completed_stages: BTreeSet<StageId>,

    /// Stages that reached `Failed`, with their terminal error.
    pub failed_stages: BTreeMap<StageId, ErrorRecord>,

    /// Accumulated data sections keyed by logical name
    /// (e.g. `"property"`, `"liens"`, `"ml_prediction"`).
    pub data: BTreeMap<String, serde_json::Value>,

    /// Wall-clock duration of each completed or failed stage, in
    /// milliseconds.
    pub stage_timings: BTreeMap<StageId, u64>,

    /// Resource tallies summed across all stage invocations.
    pub resource_usage: BTreeMap<String, u64>,

    /// Every failure observed during the run, in application order.
    pub errors: Vec<ErrorRecord>,

    /// Id of the most recent checkpoint written for this state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
}

impl PipelineState {
    /// Creates a fresh state for a new run.
    #[must_use]
    pub fn new(case_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            completed_stages: BTreeSet::new(),
            failed_stages: BTreeMap::new(),
            data: BTreeMap::new(),
            stage_timings: BTreeMap::new(),
            resource_usage: BTreeMap::new(),
            errors: Vec::new(),
            checkpoint_id: None,
        }
    }

    /// Returns true if every id in `deps` has completed.
    #[must_use]
    pub fn dependencies_met<'a>(&self, deps: impl IntoIterator<Item = &'a StageId>) -> bool {
        deps.into_iter().all(|d| self.completed_stages.contains(d))
    }

    /// Returns true if the stage already reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self, stage: &str) -> bool {
        self.completed_stages.contains(stage) || self.failed_stages.contains_key(stage)
    }

    /// Folds a terminal stage outcome into this state.
    ///
    /// This is the only mutation path for stage results; it keeps the
    /// completed/failed sets disjoint. Applying sibling outcomes in
    /// ascending sorted stage-id order makes the merge deterministic:
    /// should two siblings write the same data section (they are defined
    /// not to), the higher stage id wins.
    pub fn apply_outcome(&mut self, outcome: &StageOutcome) {
        match outcome.status {
            StageStatus::Completed => {
                self.failed_stages.remove(&outcome.stage);
                self.completed_stages.insert(outcome.stage.clone());
                for (key, value) in &outcome.data {
                    self.data.insert(key.clone(), value.clone());
                }
                for (key, count) in &outcome.resource_usage {
                    *self.resource_usage.entry(key.clone()).or_insert(0) += count;
                }
            }
            StageStatus::Failed => {
                if let Some(record) = &outcome.error {
                    self.completed_stages.remove(&outcome.stage);
                    self.failed_stages
                        .insert(outcome.stage.clone(), record.clone());
                    self.errors.push(record.clone());
                }
            }
            StageStatus::Pending | StageStatus::Running => {}
        }
        self.stage_timings
            .insert(outcome.stage.clone(), outcome.duration_ms);
        if let Some(id) = &outcome.checkpoint_id {
            self.checkpoint_id = Some(id.clone());
        }
    }

    /// Takes the serializable snapshot used for checkpointing.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            data: self.data.clone(),
            completed_stages: self.completed_stages.clone(),
            stage_timings: self.stage_timings.clone(),
            resource_usage: self.resource_usage.clone(),
        }
    }
}

/// The subset of [`PipelineState`] persisted in a checkpoint.
///
/// Failed stages and error records are deliberately excluded: a resumed run
/// re-attempts anything that had not completed when the checkpoint was
/// taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Accumulated data sections.
    pub data: BTreeMap<String, serde_json::Value>,
    /// Completed stage ids.
    pub completed_stages: BTreeSet<StageId>,
    /// Per-stage durations in milliseconds.
    pub stage_timings: BTreeMap<StageId, u64>,
    /// Resource tallies.
    pub resource_usage: BTreeMap<String, u64>,
}

impl StateSnapshot {
    /// Reconstructs a pipeline state from this snapshot.
    #[must_use]
    pub fn restore(self, case_id: impl Into<String>, checkpoint_id: impl Into<String>) -> PipelineState {
        PipelineState {
            case_id: case_id.into(),
            completed_stages: self.completed_stages,
            failed_stages: BTreeMap::new(),
            data: self.data,
            stage_timings: self.stage_timings,
            resource_usage: self.resource_usage,
            errors: Vec::new(),
            checkpoint_id: Some(checkpoint_id.into()),
        }
    }
}
