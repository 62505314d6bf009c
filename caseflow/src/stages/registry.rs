//! Registry mapping stage ids to their handlers.

use std::collections::HashMap;
use std::sync::Arc;

use super::StageHandler;
use crate::core::StageId;

/// Holds the handler behind each configured stage.
///
/// The orchestrator resolves every planned stage through the registry up
/// front; a missing entry is a fatal configuration error, caught before any
/// stage runs.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<StageId, Arc<dyn StageHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a stage id, replacing any previous entry.
    #[must_use]
    pub fn register(mut self, stage: impl Into<StageId>, handler: Arc<dyn StageHandler>) -> Self {
        self.handlers.insert(stage.into(), handler);
        self
    }

    /// Looks up the handler for a stage.
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<Arc<dyn StageHandler>> {
        self.handlers.get(stage).cloned()
    }

    /// Returns true if a handler is registered for the stage.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.handlers.contains_key(stage)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
