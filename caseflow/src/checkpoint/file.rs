//! File-backed checkpoint store: one JSON document per record.

use async_trait::async_trait;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{CheckpointError, CheckpointRecord, CheckpointStore};

/// Persists each checkpoint record as `<dir>/<id>.json`, so resume works
/// across process restarts.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the store's root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, checkpoint_id: &str) -> PathBuf {
        // Checkpoint ids embed case numbers, which may carry path
        // separators or other characters unsafe in file names.
        let safe: String = checkpoint_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn put(&self, record: CheckpointRecord) -> Result<(), CheckpointError> {
        let path = self.path_for(&record.checkpoint_id);
        let payload = serde_json::to_vec_pretty(&record)?;
        fs::write(path, payload)?;
        Ok(())
    }

    async fn get(&self, checkpoint_id: &str) -> Result<Option<CheckpointRecord>, CheckpointError> {
        let path = self.path_for(checkpoint_id);
        let payload = match fs::read(path) {
            Ok(payload) => payload,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: CheckpointRecord = serde_json::from_slice(&payload)?;
        Ok(Some(record))
    }
}
