//! # Caseflow
//!
//! A stage-orchestration engine for multi-stage enrichment pipelines, built
//! for foreclosure-auction case enrichment.
//!
//! Caseflow decides which stage runs when, enforces dependency order, runs
//! independent stages concurrently, retries and circuit-breaks failing
//! stages, checkpoints progress for crash recovery, and merges partial
//! results deterministically. The business logic of each stage (scrapers,
//! property lookups, lien analysis, scoring, bid calculation) stays behind
//! the [`stages::StageHandler`] seam.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use caseflow::prelude::*;
//! use std::sync::Arc;
//!
//! let configs = vec![
//!     StageConfig::new("scrape").critical(),
//!     StageConfig::new("property_lookup").with_dependency("scrape").parallel(),
//!     StageConfig::new("lien_search").with_dependency("scrape").parallel(),
//!     StageConfig::new("bid_calc").with_dependencies(["property_lookup", "lien_search"]),
//! ];
//!
//! let handlers = HandlerRegistry::new()
//!     .register("scrape", Arc::new(ScrapeHandler::new(court_client)))
//!     /* ... */;
//!
//! let orchestrator = Orchestrator::new(configs, handlers);
//! let result = orchestrator.run("2024-CA-001234", None).await?;
//! println!("{} (max bid {:?})", result.recommendation, result.max_bid);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod breaker;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod decision;
pub mod errors;
pub mod events;
pub mod executor;
pub mod observability;
pub mod orchestrator;
pub mod planner;
pub mod retry;
pub mod stages;
pub mod state;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::breaker::CircuitBreaker;
    pub use crate::checkpoint::{
        create_checkpoint, resume, CheckpointRecord, CheckpointStore, FileCheckpointStore,
        InMemoryCheckpointStore,
    };
    pub use crate::config::{OrchestratorConfig, StageConfig};
    pub use crate::core::{PartialResult, RunStatus, StageId, StageOutcome, StageStatus};
    pub use crate::decision::{max_bid, Recommendation};
    pub use crate::errors::{
        CaseflowError, CheckpointNotFoundError, CyclicDependencyError, ErrorKind, ErrorRecord,
        ValidationError,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RunEvent,
    };
    pub use crate::executor::StageExecutor;
    pub use crate::orchestrator::{Orchestrator, RunResult};
    pub use crate::planner::{ExecutionPlanner, StageGroup};
    pub use crate::retry::{BackoffStrategy, JitterStrategy, RetryPolicy};
    pub use crate::stages::{FnHandler, HandlerRegistry, NoOpHandler, StageError, StageHandler};
    pub use crate::state::{PipelineState, StateSnapshot};
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
