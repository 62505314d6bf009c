//! Tracing setup and end-of-run summary logging.

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::orchestrator::RunResult;

/// Initializes the global tracing subscriber from `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

/// Logs one wide event summarizing a finished run.
pub fn log_run_summary(result: &RunResult) {
    info!(
        run_id = %result.run_id,
        case_id = %result.case_id,
        status = %result.status,
        success = result.success,
        recommendation = %result.recommendation,
        max_bid = ?result.max_bid,
        duration_ms = result.duration_ms,
        completed_stages = result.state.completed_stages.len(),
        failed_stages = result.failed_stages.len(),
        errors = result.errors.len(),
        checkpoint_id = ?result.checkpoint_id,
        "run finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
