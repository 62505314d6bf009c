//! Per-stage circuit breaker.
//!
//! The breaker remembers which stages have chronically failed and refuses
//! to dispatch them again until a cool-down elapses. One breaker instance
//! belongs to one orchestrator; it is passed by `Arc`, never held in
//! process-global state, so concurrent runs do not interfere.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::core::StageId;

/// Default cool-down before a chronically failing stage may run again.
pub const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct BreakerRecord {
    opened_at: Instant,
}

/// Failure memory keyed by stage id.
///
/// A breaker is opened only after a stage exhausts all of its retries, and
/// closed on any successful execution. While open, calls are refused
/// without invoking the handler and without consuming an attempt. Once the
/// cool-down elapses the breaker behaves as closed again; no half-open
/// bookkeeping is kept.
#[derive(Debug)]
pub struct CircuitBreaker {
    cool_down: Duration,
    records: DashMap<StageId, BreakerRecord>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_COOL_DOWN)
    }
}

impl CircuitBreaker {
    /// Creates a breaker with the given cool-down.
    #[must_use]
    pub fn new(cool_down: Duration) -> Self {
        Self {
            cool_down,
            records: DashMap::new(),
        }
    }

    /// Returns true if the stage is currently refused.
    ///
    /// An entry whose cool-down has elapsed is pruned on the way out.
    #[must_use]
    pub fn is_open(&self, stage: &str) -> bool {
        let expired = match self.records.get(stage) {
            Some(record) => record.opened_at.elapsed() >= self.cool_down,
            None => return false,
        };
        if expired {
            self.records.remove(stage);
            return false;
        }
        true
    }

    /// Opens the breaker for a stage. Called after retries are exhausted.
    pub fn open(&self, stage: impl Into<StageId>) {
        self.records.insert(
            stage.into(),
            BreakerRecord {
                opened_at: Instant::now(),
            },
        );
    }

    /// Clears the breaker for a stage. Called on successful execution.
    pub fn close(&self, stage: &str) {
        self.records.remove(stage);
    }

    /// Time remaining until the stage is accepted again, if open.
    #[must_use]
    pub fn remaining_cool_down(&self, stage: &str) -> Option<Duration> {
        self.records
            .get(stage)
            .and_then(|record| self.cool_down.checked_sub(record.opened_at.elapsed()))
            .filter(|remaining| !remaining.is_zero())
    }

    /// Clears all breaker state.
    pub fn reset(&self) {
        self.records.clear();
    }

    /// Number of stages currently tracked as open (including entries whose
    /// cool-down has elapsed but has not yet been pruned).
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.records.len()
    }
}
