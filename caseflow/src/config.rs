//! Stage and orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::core::StageId;
use crate::errors::ValidationError;
use crate::retry::RetryPolicy;

/// Static description of one stage: identity, budget and placement in the
/// dependency graph. Immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Unique stage identifier.
    pub id: StageId,

    /// Per-attempt deadline in milliseconds.
    pub timeout_ms: u64,

    /// Maximum handler invocations before the stage is marked failed.
    pub max_retries: u32,

    /// Whether this stage may share a group with other parallel-eligible
    /// siblings from the same topological layer.
    pub parallel_eligible: bool,

    /// Stage ids that must complete before this stage runs.
    pub depends_on: BTreeSet<StageId>,

    /// Whether a terminal failure of this stage aborts the rest of the run.
    pub critical: bool,
}

impl StageConfig {
    /// Creates a stage config with the pipeline defaults: 30s timeout,
    /// 3 attempts, sequential, no dependencies, non-critical.
    #[must_use]
    pub fn new(id: impl Into<StageId>) -> Self {
        Self {
            id: id.into(),
            timeout_ms: 30_000,
            max_retries: 3,
            parallel_eligible: false,
            depends_on: BTreeSet::new(),
            critical: false,
        }
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Allows this stage to run concurrently with eligible siblings.
    #[must_use]
    pub fn parallel(mut self) -> Self {
        self.parallel_eligible = true;
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<StageId>) -> Self {
        self.depends_on.insert(dep.into());
        self
    }

    /// Sets all dependencies at once.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<StageId>>) -> Self {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the stage as critical.
    #[must_use]
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Returns the per-attempt deadline as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates the configuration in isolation.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty id, a self-dependency, a zero timeout
    /// or zero attempts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::new("stage id cannot be empty"));
        }
        if self.depends_on.contains(&self.id) {
            return Err(ValidationError::new(format!(
                "stage '{}' cannot depend on itself",
                self.id
            ))
            .with_stages(vec![self.id.clone()]));
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::new(format!(
                "stage '{}' must have a non-zero timeout",
                self.id
            ))
            .with_stages(vec![self.id.clone()]));
        }
        if self.max_retries == 0 {
            return Err(ValidationError::new(format!(
                "stage '{}' must allow at least one attempt",
                self.id
            ))
            .with_stages(vec![self.id.clone()]));
        }
        Ok(())
    }
}

/// Tunables shared by every stage of one orchestrator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How long an opened breaker refuses calls, in milliseconds.
    pub breaker_cool_down_ms: u64,

    /// Delay policy between retry attempts.
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            breaker_cool_down_ms: 300_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates the default configuration (300s cool-down, exponential
    /// base-2s backoff).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the breaker cool-down.
    #[must_use]
    pub fn with_breaker_cool_down_ms(mut self, cool_down_ms: u64) -> Self {
        self.breaker_cool_down_ms = cool_down_ms;
        self
    }

    /// Sets the retry delay policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the breaker cool-down as a [`Duration`].
    #[must_use]
    pub fn breaker_cool_down(&self) -> Duration {
        Duration::from_millis(self.breaker_cool_down_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_config_defaults() {
        let config = StageConfig::new("property_lookup");
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.max_retries, 3);
        assert!(!config.parallel_eligible);
        assert!(!config.critical);
        assert!(config.depends_on.is_empty());
    }

    #[test]
    fn test_stage_config_builder() {
        let config = StageConfig::new("lien_search")
            .with_timeout_ms(10_000)
            .with_max_retries(5)
            .parallel()
            .with_dependency("property_lookup")
            .critical();

        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.max_retries, 5);
        assert!(config.parallel_eligible);
        assert!(config.critical);
        assert!(config.depends_on.contains("property_lookup"));
    }

    #[test]
    fn test_validate_rejects_self_dependency() {
        let config = StageConfig::new("scrape").with_dependency("scrape");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        assert!(StageConfig::new("  ").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_budgets() {
        assert!(StageConfig::new("a").with_timeout_ms(0).validate().is_err());
        assert!(StageConfig::new("a").with_max_retries(0).validate().is_err());
    }

    #[test]
    fn test_orchestrator_config_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.breaker_cool_down(), Duration::from_secs(300));
        assert_eq!(config.retry.base_delay_ms, 2_000);
    }
}
