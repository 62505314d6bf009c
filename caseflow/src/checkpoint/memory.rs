//! In-memory checkpoint store for tests and single-process runs.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{CheckpointError, CheckpointRecord, CheckpointStore};

/// Stores checkpoint records in a process-local map.
///
/// Nothing survives a restart; use [`super::FileCheckpointStore`] when
/// resume must work across crashes.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    records: RwLock<HashMap<String, CheckpointRecord>>,
}

impl InMemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Removes all records, for test isolation.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn put(&self, record: CheckpointRecord) -> Result<(), CheckpointError> {
        self.records
            .write()
            .insert(record.checkpoint_id.clone(), record);
        Ok(())
    }

    async fn get(&self, checkpoint_id: &str) -> Result<Option<CheckpointRecord>, CheckpointError> {
        Ok(self.records.read().get(checkpoint_id).cloned())
    }
}
