//! Durable pipeline snapshots and the store seam behind them.
//!
//! Checkpoints are append-only: an id, once written, is never overwritten.
//! Ids are human-traceable (`{case}_{stage}_{unix_ms}`) so an operator can
//! read progress straight off a store listing.

mod file;
mod memory;

pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

use crate::errors::{CaseflowError, CheckpointNotFoundError};
use crate::state::{PipelineState, StateSnapshot};
use crate::utils::{iso_timestamp, unix_time_ms};

/// Errors from the checkpoint store itself (not from resume lookups).
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The underlying storage failed.
    #[error("checkpoint io error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot payload could not be (de)serialized.
    #[error("checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The persisted form of one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Unique, immutable checkpoint id.
    pub checkpoint_id: String,
    /// The case this checkpoint belongs to.
    pub case_number: String,
    /// The stage that had just completed when the checkpoint was taken.
    pub stage: String,
    /// Serialized [`StateSnapshot`] JSON.
    pub state: String,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
}

/// Trait for durable key-value storage of checkpoint records.
#[async_trait]
pub trait CheckpointStore: Send + Sync + Debug {
    /// Writes a record. Ids are generated per run, per stage, per
    /// timestamp, so overwrites are not expected.
    async fn put(&self, record: CheckpointRecord) -> Result<(), CheckpointError>;

    /// Reads a record by id, `None` if absent.
    async fn get(&self, checkpoint_id: &str) -> Result<Option<CheckpointRecord>, CheckpointError>;
}

/// Serializes the resumable subset of `state`, writes it under a fresh id
/// and returns that id.
///
/// # Errors
///
/// Returns [`CheckpointError`] if serialization or the store write fails.
pub async fn create_checkpoint(
    store: &dyn CheckpointStore,
    state: &PipelineState,
    stage: &str,
) -> Result<String, CheckpointError> {
    let checkpoint_id = format!("{}_{}_{}", state.case_id, stage, unix_time_ms());
    let snapshot = serde_json::to_string(&state.snapshot())?;
    let record = CheckpointRecord {
        checkpoint_id: checkpoint_id.clone(),
        case_number: state.case_id.clone(),
        stage: stage.to_string(),
        state: snapshot,
        created_at: iso_timestamp(),
    };
    store.put(record).await?;
    Ok(checkpoint_id)
}

/// Reconstructs a [`PipelineState`] from a stored checkpoint.
///
/// The restored state carries the snapshot's completed stages, data,
/// timings and resource tallies; execution resumes at the first group not
/// fully contained in the completed set.
///
/// # Errors
///
/// Returns [`CheckpointNotFoundError`] if the id is unknown (fatal, never
/// retried), or a store/serialization error if the record cannot be read.
pub async fn resume(
    store: &dyn CheckpointStore,
    checkpoint_id: &str,
) -> Result<PipelineState, CaseflowError> {
    let record = store
        .get(checkpoint_id)
        .await
        .map_err(|err| CaseflowError::CheckpointStore(err.to_string()))?
        .ok_or_else(|| CheckpointNotFoundError::new(checkpoint_id))?;

    let snapshot: StateSnapshot = serde_json::from_str(&record.state)?;
    Ok(snapshot.restore(record.case_number, checkpoint_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_create_checkpoint_id_format() {
        let store = InMemoryCheckpointStore::new();
        let state = PipelineState::new("2024-CA-001234");

        let id = tokio_test::assert_ok!(create_checkpoint(&store, &state, "scrape").await);
        assert!(id.starts_with("2024-CA-001234_scrape_"));

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.case_number, "2024-CA-001234");
        assert_eq!(record.stage, "scrape");
        assert!(record.created_at.contains('T'));
    }

    #[tokio::test]
    async fn test_round_trip_restores_state() {
        use crate::core::StageOutcome;
        use std::collections::HashMap;

        let store = InMemoryCheckpointStore::new();
        let mut state = PipelineState::new("2024-CA-9");
        state.apply_outcome(&StageOutcome::completed(
            "scrape",
            HashMap::from([("docket".to_string(), serde_json::json!({"pages": 4}))]),
            HashMap::from([("http_calls".to_string(), 2)]),
            41,
            1,
        ));

        let id = create_checkpoint(&store, &state, "scrape").await.unwrap();
        let restored = resume(&store, &id).await.unwrap();

        assert_eq!(restored.completed_stages, state.completed_stages);
        assert_eq!(restored.data, state.data);
        assert_eq!(restored.stage_timings, state.stage_timings);
        assert_eq!(restored.resource_usage, state.resource_usage);
        assert_eq!(restored.checkpoint_id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_resume_unknown_id_is_fatal() {
        let store = InMemoryCheckpointStore::new();
        let err = resume(&store, "nope_nothing_0").await.unwrap_err();
        assert!(matches!(err, CaseflowError::CheckpointNotFound(_)));
    }
}
