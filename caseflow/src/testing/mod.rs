//! Reusable stage handlers for tests.
//!
//! These live in the library (not behind `cfg(test)`) so downstream crates
//! can drive the orchestrator in their own test suites.

mod handlers;

pub use handlers::{
    CountingHandler, FailingHandler, FlakyHandler, SleepingHandler, StaticHandler,
};
