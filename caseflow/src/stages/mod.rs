//! Stage handler trait and implementations.
//!
//! Handlers are the boundary to the excluded business logic (scrapers,
//! property lookups, lien analysis, ML scoring, bid calculation). The engine
//! treats them as opaque: a handler reads the accumulated state and returns
//! a partial result, or fails. Handlers must tolerate being invoked up to
//! `max_retries` times without duplicating externally visible side effects;
//! idempotency is theirs to guarantee, not the executor's.

mod registry;

pub use registry::HandlerRegistry;

use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

use crate::core::PartialResult;
use crate::state::PipelineState;

/// Failure modes a handler can report.
///
/// Transient failures consume an attempt and are retried; fatal failures
/// end the stage immediately. Timeouts are imposed by the executor, never
/// reported by handlers themselves.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// Recoverable failure; the executor may retry.
    #[error("{message}")]
    Transient {
        /// What went wrong.
        message: String,
    },

    /// Unrecoverable failure; retrying cannot help.
    #[error("{message}")]
    Fatal {
        /// What went wrong.
        message: String,
    },
}

impl StageError {
    /// Creates a transient (retryable) error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a fatal (non-retryable) error.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Returns true if the executor may retry after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<anyhow::Error> for StageError {
    /// Unclassified handler errors default to transient, so plain `?`
    /// propagation inside handler glue gets retry behavior.
    fn from(err: anyhow::Error) -> Self {
        Self::Transient {
            message: format!("{err:#}"),
        }
    }
}

/// Trait for the unit of work behind one stage.
#[async_trait]
pub trait StageHandler: Send + Sync + Debug {
    /// Executes the stage against the current pipeline state.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] describing whether the failure is worth
    /// retrying.
    async fn run(&self, state: &PipelineState) -> Result<PartialResult, StageError>;
}

/// A handler built from an async-free closure, for wiring and tests.
pub struct FnHandler<F>
where
    F: Fn(&PipelineState) -> Result<PartialResult, StageError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&PipelineState) -> Result<PartialResult, StageError> + Send + Sync,
{
    /// Creates a new function-based handler.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnHandler<F>
where
    F: Fn(&PipelineState) -> Result<PartialResult, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> StageHandler for FnHandler<F>
where
    F: Fn(&PipelineState) -> Result<PartialResult, StageError> + Send + Sync,
{
    async fn run(&self, state: &PipelineState) -> Result<PartialResult, StageError> {
        (self.func)(state)
    }
}

/// A handler that succeeds with no data.
#[derive(Debug, Clone, Default)]
pub struct NoOpHandler;

impl NoOpHandler {
    /// Creates a new no-op handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageHandler for NoOpHandler {
    async fn run(&self, _state: &PipelineState) -> Result<PartialResult, StageError> {
        Ok(PartialResult::empty())
    }
}
