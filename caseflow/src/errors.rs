//! Error taxonomy for the orchestration engine.
//!
//! Handler-level failures never cross the orchestrator boundary as raw
//! errors: the executor converts every one of them into an [`ErrorRecord`]
//! on the pipeline state. The only errors surfaced to the caller are the
//! fatal configuration and resume conditions ([`CyclicDependencyError`],
//! [`ValidationError`], [`CheckpointNotFoundError`]) and checkpoint-store
//! I/O failures during an explicit resume.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::StageId;

/// The main error type surfaced by orchestrator entry points.
#[derive(Debug, Error)]
pub enum CaseflowError {
    /// The stage graph contains a dependency cycle.
    #[error("{0}")]
    CyclicDependency(#[from] CyclicDependencyError),

    /// The stage configuration is structurally invalid.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A resume request referenced a checkpoint that does not exist.
    #[error("{0}")]
    CheckpointNotFound(#[from] CheckpointNotFoundError),

    /// The checkpoint store failed while reading or writing.
    #[error("checkpoint store error: {0}")]
    CheckpointStore(String),

    /// Snapshot serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Classification of a stage failure.
///
/// The kind decides whether an attempt was consumed and whether the failure
/// may be retried: transient and timeout failures consume attempts and are
/// retried until `max_retries`; a circuit rejection consumes nothing; a
/// fatal handler error ends the stage on the spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Recoverable failure (network flake, upstream 5xx). Retryable.
    Transient,
    /// The per-attempt deadline elapsed. Retryable.
    Timeout,
    /// The circuit breaker refused the call before the handler ran.
    CircuitOpen,
    /// Unrecoverable handler failure; retrying cannot help.
    Fatal,
}

impl ErrorKind {
    /// Returns true if a failure of this kind may consume another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Timeout => write!(f, "timeout"),
            Self::CircuitOpen => write!(f, "circuit_open"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Captured record of one stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// The stage that failed.
    pub stage: StageId,
    /// Failure classification.
    pub kind: ErrorKind,
    /// Human-readable message from the handler or executor.
    pub message: String,
    /// The attempt on which this failure was observed (0 for a circuit
    /// rejection, which consumes no attempt).
    pub attempt: u32,
}

impl ErrorRecord {
    /// Creates a new error record.
    #[must_use]
    pub fn new(
        stage: impl Into<StageId>,
        kind: ErrorKind,
        message: impl Into<String>,
        attempt: u32,
    ) -> Self {
        Self {
            stage: stage.into(),
            kind,
            message: message.into(),
            attempt,
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stage '{}' failed ({}, attempt {}): {}",
            self.stage, self.kind, self.attempt, self.message
        )
    }
}

/// Error raised when the dependency graph is not a DAG.
///
/// Fatal: surfaced to the caller immediately, never retried.
#[derive(Debug, Clone, Error)]
#[error("cyclic dependency in stage graph: {}", cycle_path.join(" -> "))]
pub struct CyclicDependencyError {
    /// The stages forming the cycle, first repeated at the end.
    pub cycle_path: Vec<StageId>,
}

impl CyclicDependencyError {
    /// Creates a new cyclic dependency error.
    #[must_use]
    pub fn new(cycle_path: Vec<StageId>) -> Self {
        Self { cycle_path }
    }
}

/// Error raised when stage configuration is structurally invalid
/// (empty id, self-dependency, unknown dependency, duplicate id, missing
/// handler).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved.
    pub stages: Vec<StageId>,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<StageId>) -> Self {
        self.stages = stages;
        self
    }
}

/// Error raised when a resume request names an unknown checkpoint.
#[derive(Debug, Clone, Error)]
#[error("checkpoint not found: {checkpoint_id}")]
pub struct CheckpointNotFoundError {
    /// The requested checkpoint id.
    pub checkpoint_id: String,
}

impl CheckpointNotFoundError {
    /// Creates a new checkpoint-not-found error.
    #[must_use]
    pub fn new(checkpoint_id: impl Into<String>) -> Self {
        Self {
            checkpoint_id: checkpoint_id.into(),
        }
    }
}
