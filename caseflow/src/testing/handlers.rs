//! Deterministic handlers with call tracking.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::core::PartialResult;
use crate::stages::{StageError, StageHandler};
use crate::state::PipelineState;

/// Always succeeds with a fixed partial result.
#[derive(Debug, Clone, Default)]
pub struct StaticHandler {
    result: PartialResult,
}

impl StaticHandler {
    /// Succeeds with no data.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Succeeds with a single data section.
    #[must_use]
    pub fn section(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            result: PartialResult::section(key, value),
        }
    }

    /// Succeeds with the given result.
    #[must_use]
    pub fn with_result(result: PartialResult) -> Self {
        Self { result }
    }
}

#[async_trait]
impl StageHandler for StaticHandler {
    async fn run(&self, _state: &PipelineState) -> Result<PartialResult, StageError> {
        Ok(self.result.clone())
    }
}

/// Always fails, counting invocations.
#[derive(Debug)]
pub struct FailingHandler {
    error: StageError,
    calls: Mutex<usize>,
}

impl FailingHandler {
    /// Fails with a transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            error: StageError::transient(message),
            calls: Mutex::new(0),
        }
    }

    /// Fails with a fatal error.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            error: StageError::fatal(message),
            calls: Mutex::new(0),
        }
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl StageHandler for FailingHandler {
    async fn run(&self, _state: &PipelineState) -> Result<PartialResult, StageError> {
        *self.calls.lock() += 1;
        Err(self.error.clone())
    }
}

/// Fails transiently a fixed number of times, then delegates to `inner`.
#[derive(Debug)]
pub struct FlakyHandler {
    failures_before_success: usize,
    inner: StaticHandler,
    calls: Mutex<usize>,
}

impl FlakyHandler {
    /// Creates a handler that fails `failures_before_success` times.
    #[must_use]
    pub fn new(failures_before_success: usize, inner: StaticHandler) -> Self {
        Self {
            failures_before_success,
            inner,
            calls: Mutex::new(0),
        }
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl StageHandler for FlakyHandler {
    async fn run(&self, state: &PipelineState) -> Result<PartialResult, StageError> {
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };
        if call <= self.failures_before_success {
            return Err(StageError::transient(format!("flaky failure {call}")));
        }
        self.inner.run(state).await
    }
}

/// Sleeps for a fixed duration, then succeeds with no data. Pairs with
/// paused-clock tests to exercise deadlines.
#[derive(Debug, Clone)]
pub struct SleepingHandler {
    delay: Duration,
}

impl SleepingHandler {
    /// Creates a handler that sleeps for `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl StageHandler for SleepingHandler {
    async fn run(&self, _state: &PipelineState) -> Result<PartialResult, StageError> {
        tokio::time::sleep(self.delay).await;
        Ok(PartialResult::empty())
    }
}

/// Wraps another handler and counts invocations.
#[derive(Debug)]
pub struct CountingHandler {
    inner: Arc<dyn StageHandler>,
    calls: Mutex<usize>,
}

impl CountingHandler {
    /// Creates a counting wrapper around `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn StageHandler>) -> Self {
        Self {
            inner,
            calls: Mutex::new(0),
        }
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl StageHandler for CountingHandler {
    async fn run(&self, state: &PipelineState) -> Result<PartialResult, StageError> {
        *self.calls.lock() += 1;
        self.inner.run(state).await
    }
}
