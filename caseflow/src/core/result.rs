//! Partial result returned by stage handlers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The data a stage handler contributes to the pipeline.
///
/// Handlers return named data sections (e.g. `"property"`, `"liens"`,
/// `"ml_prediction"`) that the executor merges into the pipeline state, plus
/// resource tallies (external-call counts, per-tier usage) summed across the
/// run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialResult {
    /// Data sections keyed by logical name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,

    /// Resource usage tallies contributed by this invocation.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub resource_usage: HashMap<String, u64>,
}

impl PartialResult {
    /// Creates an empty partial result.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a partial result with a single data section.
    #[must_use]
    pub fn section(key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut data = HashMap::new();
        data.insert(key.into(), value);
        Self {
            data,
            resource_usage: HashMap::new(),
        }
    }

    /// Adds a data section.
    #[must_use]
    pub fn with_section(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Adds to a resource tally.
    #[must_use]
    pub fn with_resource(mut self, key: impl Into<String>, count: u64) -> Self {
        *self.resource_usage.entry(key.into()).or_insert(0) += count;
        self
    }

    /// Returns true if the result carries no data and no tallies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.resource_usage.is_empty()
    }

    /// Gets a data section by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}
