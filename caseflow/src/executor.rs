//! Stage execution: breaker check, deadline, retry loop, outcome capture.

use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use crate::breaker::CircuitBreaker;
use crate::checkpoint::{create_checkpoint, CheckpointStore};
use crate::config::StageConfig;
use crate::core::StageOutcome;
use crate::errors::{ErrorKind, ErrorRecord};
use crate::events::{EventSink, RunEvent};
use crate::retry::RetryPolicy;
use crate::stages::StageHandler;
use crate::state::PipelineState;

/// Runs one stage to a terminal state.
///
/// Exactly one of `completed_stages` / `failed_stages` holds the stage id
/// after [`execute`](StageExecutor::execute) returns. All handler failures
/// are captured as [`ErrorRecord`]s on the state; nothing escapes as a raw
/// error.
pub struct StageExecutor {
    breaker: Arc<CircuitBreaker>,
    store: Arc<dyn CheckpointStore>,
    retry: RetryPolicy,
    sink: Arc<dyn EventSink>,
}

impl StageExecutor {
    /// Creates a new executor.
    #[must_use]
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        store: Arc<dyn CheckpointStore>,
        retry: RetryPolicy,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            breaker,
            store,
            retry,
            sink,
        }
    }

    /// Executes `handler` for `config` against `state`.
    ///
    /// Behavior:
    /// 1. An open breaker fails the stage immediately with
    ///    [`ErrorKind::CircuitOpen`], consuming no attempt.
    /// 2. Otherwise the handler runs under the per-attempt deadline, up to
    ///    `max_retries` times, sleeping per the retry policy between
    ///    attempts. A fatal handler error ends the attempts early.
    /// 3. On success the partial result is folded into `state`, the breaker
    ///    closes and a checkpoint is written. On terminal failure the
    ///    breaker opens and the error is recorded on `state`.
    pub async fn execute(
        &self,
        state: &mut PipelineState,
        config: &StageConfig,
        handler: Arc<dyn StageHandler>,
    ) -> StageOutcome {
        if self.breaker.is_open(&config.id) {
            return self.reject_open_circuit(state, config);
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.sink.try_emit(&RunEvent::StageStarted {
                stage: config.id.clone(),
                attempt,
            });

            let started = Instant::now();
            let attempt_result =
                tokio::time::timeout(config.timeout(), handler.run(state)).await;
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let (kind, message) = match attempt_result {
                Ok(Ok(partial)) => {
                    return self
                        .complete(state, config, partial.data, partial.resource_usage, duration_ms, attempt)
                        .await;
                }
                Ok(Err(err)) => {
                    let kind = if err.is_retryable() {
                        ErrorKind::Transient
                    } else {
                        ErrorKind::Fatal
                    };
                    (kind, err.to_string())
                }
                Err(_elapsed) => (
                    ErrorKind::Timeout,
                    format!("handler exceeded {}ms deadline", config.timeout_ms),
                ),
            };

            let exhausted = attempt >= config.max_retries || kind == ErrorKind::Fatal;
            if exhausted {
                return self.fail(state, config, kind, message, duration_ms, attempt);
            }

            let delay = self.retry.delay_for(attempt);
            self.sink.try_emit(&RunEvent::StageRetrying {
                stage: config.id.clone(),
                attempt,
                delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                reason: message,
            });
            tokio::time::sleep(delay).await;
        }
    }

    fn reject_open_circuit(
        &self,
        state: &mut PipelineState,
        config: &StageConfig,
    ) -> StageOutcome {
        let remaining = self
            .breaker
            .remaining_cool_down(&config.id)
            .unwrap_or_default();
        let remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX);
        self.sink.try_emit(&RunEvent::BreakerRejected {
            stage: config.id.clone(),
            remaining_ms,
        });

        let record = ErrorRecord::new(
            &config.id,
            ErrorKind::CircuitOpen,
            format!("circuit open for another {remaining_ms}ms"),
            0,
        );
        self.sink.try_emit(&RunEvent::StageFailed {
            stage: config.id.clone(),
            kind: ErrorKind::CircuitOpen,
            message: record.message.clone(),
            attempts: 0,
        });
        let outcome = StageOutcome::failed(&config.id, record, 0, 0);
        state.apply_outcome(&outcome);
        outcome
    }

    async fn complete(
        &self,
        state: &mut PipelineState,
        config: &StageConfig,
        data: std::collections::HashMap<String, serde_json::Value>,
        resource_usage: std::collections::HashMap<String, u64>,
        duration_ms: u64,
        attempts: u32,
    ) -> StageOutcome {
        let mut outcome =
            StageOutcome::completed(&config.id, data, resource_usage, duration_ms, attempts);
        state.apply_outcome(&outcome);
        self.breaker.close(&config.id);

        match create_checkpoint(self.store.as_ref(), state, &config.id).await {
            Ok(checkpoint_id) => {
                state.checkpoint_id = Some(checkpoint_id.clone());
                self.sink.try_emit(&RunEvent::CheckpointSaved {
                    stage: config.id.clone(),
                    checkpoint_id: checkpoint_id.clone(),
                });
                outcome = outcome.with_checkpoint_id(checkpoint_id);
            }
            Err(err) => {
                warn!(stage = %config.id, error = %err, "checkpoint write failed");
                self.sink.try_emit(&RunEvent::CheckpointFailed {
                    stage: config.id.clone(),
                    message: err.to_string(),
                });
            }
        }

        self.sink.try_emit(&RunEvent::StageCompleted {
            stage: config.id.clone(),
            duration_ms,
            attempts,
        });
        outcome
    }

    fn fail(
        &self,
        state: &mut PipelineState,
        config: &StageConfig,
        kind: ErrorKind,
        message: String,
        duration_ms: u64,
        attempts: u32,
    ) -> StageOutcome {
        self.breaker.open(&config.id);
        self.sink.try_emit(&RunEvent::BreakerOpened {
            stage: config.id.clone(),
        });
        self.sink.try_emit(&RunEvent::StageFailed {
            stage: config.id.clone(),
            kind,
            message: message.clone(),
            attempts,
        });

        let record = ErrorRecord::new(&config.id, kind, message, attempts);
        let outcome = StageOutcome::failed(&config.id, record, duration_ms, attempts);
        state.apply_outcome(&outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::events::CollectingEventSink;
    use crate::testing::{FailingHandler, FlakyHandler, SleepingHandler, StaticHandler};
    use std::time::Duration;

    fn executor_with(
        breaker: Arc<CircuitBreaker>,
        sink: Arc<CollectingEventSink>,
    ) -> (StageExecutor, Arc<InMemoryCheckpointStore>) {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let retry = RetryPolicy::new().with_base_delay_ms(1);
        let executor = StageExecutor::new(breaker, store.clone(), retry, sink);
        (executor, store)
    }

    fn default_executor() -> (StageExecutor, Arc<InMemoryCheckpointStore>) {
        executor_with(
            Arc::new(CircuitBreaker::default()),
            Arc::new(CollectingEventSink::new()),
        )
    }

    #[tokio::test]
    async fn test_success_records_completion_and_checkpoint() {
        let (executor, store) = default_executor();
        let mut state = PipelineState::new("2024-CA-1");
        let config = StageConfig::new("property_lookup");
        let handler = Arc::new(StaticHandler::section(
            "property",
            serde_json::json!({"sqft": 1850}),
        ));

        let outcome = executor.execute(&mut state, &config, handler).await;

        assert!(outcome.is_success());
        assert!(state.completed_stages.contains("property_lookup"));
        assert_eq!(
            state.data.get("property"),
            Some(&serde_json::json!({"sqft": 1850}))
        );
        assert!(state.stage_timings.contains_key("property_lookup"));
        assert_eq!(store.len(), 1);
        assert_eq!(state.checkpoint_id, outcome.checkpoint_id);
    }

    #[tokio::test]
    async fn test_always_failing_handler_consumes_exact_attempts() {
        let breaker = Arc::new(CircuitBreaker::default());
        let (executor, _store) =
            executor_with(breaker.clone(), Arc::new(CollectingEventSink::new()));
        let mut state = PipelineState::new("case");
        let config = StageConfig::new("lien_search").with_max_retries(3);
        let handler = Arc::new(FailingHandler::transient("503 from registry"));

        let outcome = executor.execute(&mut state, &config, handler.clone()).await;

        assert_eq!(handler.call_count(), 3);
        assert!(!outcome.is_success());
        assert!(state.failed_stages.contains_key("lien_search"));
        assert!(!state.completed_stages.contains("lien_search"));
        assert!(breaker.is_open("lien_search"));
        assert_eq!(state.errors.len(), 1);
        assert_eq!(outcome.error.as_ref().map(|e| e.kind), Some(ErrorKind::Transient));
    }

    #[tokio::test]
    async fn test_fatal_error_stops_retrying() {
        let (executor, _store) = default_executor();
        let mut state = PipelineState::new("case");
        let config = StageConfig::new("ml_scoring").with_max_retries(5);
        let handler = Arc::new(FailingHandler::fatal("bad credentials"));

        let outcome = executor.execute(&mut state, &config, handler.clone()).await;

        assert_eq!(handler.call_count(), 1);
        assert_eq!(outcome.error.as_ref().map(|e| e.kind), Some(ErrorKind::Fatal));
    }

    #[tokio::test]
    async fn test_flaky_handler_eventually_succeeds() {
        let breaker = Arc::new(CircuitBreaker::default());
        let (executor, _store) =
            executor_with(breaker.clone(), Arc::new(CollectingEventSink::new()));
        let mut state = PipelineState::new("case");
        let config = StageConfig::new("scrape").with_max_retries(5);
        let handler = Arc::new(FlakyHandler::new(
            2,
            StaticHandler::section("docket", serde_json::json!({"pages": 2})),
        ));

        let outcome = executor.execute(&mut state, &config, handler.clone()).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(handler.call_count(), 3);
        assert!(!breaker.is_open("scrape"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_as_timeout_kind() {
        let (executor, _store) = default_executor();
        let mut state = PipelineState::new("case");
        let config = StageConfig::new("slow_scrape")
            .with_timeout_ms(1_000)
            .with_max_retries(2);
        let handler = Arc::new(SleepingHandler::new(Duration::from_millis(5_000)));

        let outcome = executor.execute(&mut state, &config, handler).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.error.as_ref().map(|e| e.kind), Some(ErrorKind::Timeout));
        assert_eq!(outcome.attempts, 2);
        assert!(state.failed_stages.contains_key("slow_scrape"));
    }

    #[tokio::test]
    async fn test_open_breaker_rejects_without_invoking_handler() {
        let breaker = Arc::new(CircuitBreaker::default());
        breaker.open("lien_search");
        let sink = Arc::new(CollectingEventSink::new());
        let (executor, store) = executor_with(breaker, sink.clone());
        let mut state = PipelineState::new("case");
        let config = StageConfig::new("lien_search");
        let handler = Arc::new(FailingHandler::transient("should not run"));

        let outcome = executor.execute(&mut state, &config, handler.clone()).await;

        assert_eq!(handler.call_count(), 0);
        assert_eq!(outcome.attempts, 0);
        assert_eq!(
            outcome.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::CircuitOpen)
        );
        assert!(store.is_empty());
        assert_eq!(sink.events_of_kind("breaker.rejected").len(), 1);
    }

    #[tokio::test]
    async fn test_success_emits_lifecycle_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let (executor, _store) =
            executor_with(Arc::new(CircuitBreaker::default()), sink.clone());
        let mut state = PipelineState::new("case");
        let config = StageConfig::new("scrape");

        executor
            .execute(&mut state, &config, Arc::new(StaticHandler::empty()))
            .await;

        assert_eq!(sink.events_of_kind("stage.started").len(), 1);
        assert_eq!(sink.events_of_kind("checkpoint.saved").len(), 1);
        assert_eq!(sink.events_of_kind("stage.completed").len(), 1);
    }
}
