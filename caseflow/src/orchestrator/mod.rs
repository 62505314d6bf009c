//! Run driver: plans groups, dispatches stages, merges results.


use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use crate::breaker::CircuitBreaker;
use crate::checkpoint::{self, CheckpointStore, InMemoryCheckpointStore};
use crate::config::{OrchestratorConfig, StageConfig};
use crate::core::{RunStatus, StageId, StageOutcome};
use crate::decision::{max_bid, Recommendation};
use crate::errors::{CaseflowError, ErrorRecord, ValidationError};
use crate::events::{EventSink, NoOpEventSink, RunEvent};
use crate::executor::StageExecutor;
use crate::observability::log_run_summary;
use crate::planner::ExecutionPlanner;
use crate::stages::HandlerRegistry;
use crate::state::PipelineState;
use crate::utils::generate_uuid;

/// Final report for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique id of this run.
    pub run_id: String,
    /// The case that was enriched.
    pub case_id: String,
    /// Terminal run status.
    pub status: RunStatus,
    /// True if the run completed with no failed stages.
    pub success: bool,
    /// Extracted bid recommendation.
    pub recommendation: Recommendation,
    /// Extracted maximum bid, if the decision stage produced one.
    pub max_bid: Option<f64>,
    /// Per-stage durations in milliseconds.
    pub stage_timings: BTreeMap<StageId, u64>,
    /// Resource tallies summed across the run.
    pub resource_usage: BTreeMap<String, u64>,
    /// Every failure observed during the run.
    pub errors: Vec<ErrorRecord>,
    /// Stages that ended in the failed set.
    pub failed_stages: Vec<StageId>,
    /// Most recent checkpoint written during the run.
    pub checkpoint_id: Option<String>,
    /// Total run duration in milliseconds.
    pub duration_ms: u64,
    /// The final pipeline state.
    pub state: PipelineState,
}

/// Drives one case through the planned group sequence.
///
/// The orchestrator owns every piece of cross-stage machinery explicitly
/// (breaker, checkpoint store, event sink); nothing lives in process-global
/// state, so concurrent orchestrators never interfere.
pub struct Orchestrator {
    configs: Vec<StageConfig>,
    handlers: HandlerRegistry,
    store: Arc<dyn CheckpointStore>,
    breaker: Arc<CircuitBreaker>,
    sink: Arc<dyn EventSink>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Creates an orchestrator with default config, an in-memory checkpoint
    /// store and no event sink.
    #[must_use]
    pub fn new(configs: Vec<StageConfig>, handlers: HandlerRegistry) -> Self {
        let config = OrchestratorConfig::default();
        Self {
            configs,
            handlers,
            store: Arc::new(InMemoryCheckpointStore::new()),
            breaker: Arc::new(CircuitBreaker::new(config.breaker_cool_down())),
            sink: Arc::new(NoOpEventSink),
            config,
        }
    }

    /// Sets the checkpoint store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the orchestrator config, rebuilding the breaker with the new
    /// cool-down.
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.breaker = Arc::new(CircuitBreaker::new(config.breaker_cool_down()));
        self.config = config;
        self
    }

    /// The breaker owned by this orchestrator. Breaker state persists
    /// across runs of the same instance.
    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Runs one case through the pipeline, optionally resuming from a
    /// checkpoint.
    ///
    /// Partial failures never surface here: they are recorded on the
    /// returned [`RunResult`] with `success = false`.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions: invalid stage
    /// configuration, a cyclic dependency graph, or an unresolvable resume
    /// request.
    pub async fn run(
        &self,
        case_id: &str,
        resume_checkpoint_id: Option<&str>,
    ) -> Result<RunResult, CaseflowError> {
        let run_started = Instant::now();
        self.validate()?;
        let groups = ExecutionPlanner::plan(&self.configs)?;
        let by_id: HashMap<&str, &StageConfig> =
            self.configs.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut state = match resume_checkpoint_id {
            Some(id) => {
                let state = checkpoint::resume(self.store.as_ref(), id).await?;
                if state.case_id != case_id {
                    return Err(ValidationError::new(format!(
                        "checkpoint '{id}' belongs to case '{}', not '{case_id}'",
                        state.case_id
                    ))
                    .into());
                }
                state
            }
            None => PipelineState::new(case_id),
        };

        self.sink.try_emit(&RunEvent::RunStarted {
            case_id: state.case_id.clone(),
            resumed_from: resume_checkpoint_id.map(String::from),
        });

        let executor = Arc::new(StageExecutor::new(
            self.breaker.clone(),
            self.store.clone(),
            self.config.retry,
            self.sink.clone(),
        ));

        let mut status = RunStatus::Running;
        'groups: for group in &groups {
            // Members already completed (a resumed run) are skipped; members
            // whose dependencies did not complete are never dispatched and
            // stay pending in neither terminal set.
            let mut pending: Vec<&StageConfig> = Vec::new();
            for stage in &group.stages {
                let Some(&config) = by_id.get(stage.as_str()) else {
                    continue;
                };
                if state.completed_stages.contains(stage) {
                    continue;
                }
                if !state.dependencies_met(&config.depends_on) {
                    continue;
                }
                pending.push(config);
            }
            if pending.is_empty() {
                continue;
            }

            let outcomes = if pending.len() == 1 {
                let config = pending[0];
                let handler = self.handler_for(&config.id)?;
                vec![executor.execute(&mut state, config, handler).await]
            } else {
                self.dispatch_concurrent(&executor, &mut state, &pending)
                    .await?
            };

            for outcome in &outcomes {
                let critical = by_id
                    .get(outcome.stage.as_str())
                    .is_some_and(|c| c.critical);
                if critical && !outcome.is_success() {
                    status = RunStatus::Aborted;
                    self.sink.try_emit(&RunEvent::RunAborted {
                        case_id: state.case_id.clone(),
                        stage: outcome.stage.clone(),
                    });
                    break 'groups;
                }
            }
        }

        if status != RunStatus::Aborted {
            status = RunStatus::Completed;
        }
        let duration_ms =
            u64::try_from(run_started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if status == RunStatus::Completed {
            self.sink.try_emit(&RunEvent::RunCompleted {
                case_id: state.case_id.clone(),
                duration_ms,
                completed: state.completed_stages.len(),
                failed: state.failed_stages.len(),
            });
        }

        let result = RunResult {
            run_id: generate_uuid(),
            case_id: state.case_id.clone(),
            status,
            success: status == RunStatus::Completed && state.failed_stages.is_empty(),
            recommendation: Recommendation::from_state(&state),
            max_bid: max_bid(&state),
            stage_timings: state.stage_timings.clone(),
            resource_usage: state.resource_usage.clone(),
            errors: state.errors.clone(),
            failed_stages: state.failed_stages.keys().cloned().collect(),
            checkpoint_id: state.checkpoint_id.clone(),
            duration_ms,
            state,
        };
        log_run_summary(&result);
        Ok(result)
    }

    /// Fan-out/fan-in for a multi-member group: each sibling runs against
    /// its own clone of the state; after the join barrier, outcomes are
    /// applied to the shared state in ascending sorted stage-id order.
    /// Siblings are not cancelled when one of them fails.
    async fn dispatch_concurrent(
        &self,
        executor: &Arc<StageExecutor>,
        state: &mut PipelineState,
        pending: &[&StageConfig],
    ) -> Result<Vec<StageOutcome>, CaseflowError> {
        let mut handles = Vec::with_capacity(pending.len());
        for config in pending {
            let executor = Arc::clone(executor);
            let config = (*config).clone();
            let handler = self.handler_for(&config.id)?;
            let mut local = state.clone();
            handles.push(tokio::spawn(async move {
                executor.execute(&mut local, &config, handler).await
            }));
        }

        let joined = futures::future::join_all(handles).await;
        let mut outcomes = Vec::with_capacity(joined.len());
        for (config, join_result) in pending.iter().zip(joined) {
            match join_result {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    let record = ErrorRecord::new(
                        &config.id,
                        crate::errors::ErrorKind::Fatal,
                        format!("stage task did not finish: {err}"),
                        0,
                    );
                    outcomes.push(StageOutcome::failed(&config.id, record, 0, 0));
                }
            }
        }

        outcomes.sort_by(|a, b| a.stage.cmp(&b.stage));
        for outcome in &outcomes {
            state.apply_outcome(outcome);
        }
        Ok(outcomes)
    }

    fn handler_for(
        &self,
        stage: &str,
    ) -> Result<Arc<dyn crate::stages::StageHandler>, CaseflowError> {
        self.handlers.get(stage).ok_or_else(|| {
            ValidationError::new(format!("no handler registered for stage '{stage}'"))
                .with_stages(vec![stage.to_string()])
                .into()
        })
    }

    fn validate(&self) -> Result<(), CaseflowError> {
        for config in &self.configs {
            config.validate()?;
            if !self.handlers.contains(&config.id) {
                return Err(ValidationError::new(format!(
                    "no handler registered for stage '{}'",
                    config.id
                ))
                .with_stages(vec![config.id.clone()])
                .into());
            }
        }
        Ok(())
    }
}
