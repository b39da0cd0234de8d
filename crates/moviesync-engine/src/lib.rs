//! Incremental film sync: locate changed films, fetch their aggregates,
//! transform them and load them into the target database.

#![warn(clippy::pedantic)]

pub mod checkpoint;
pub mod config;
pub mod connection;
pub mod context;
pub mod errors;
pub mod execution;
pub mod fetch;
pub mod load;
pub mod locate;
pub mod orchestrator;
pub mod resolve;
pub mod result;
pub mod schema;
pub mod stage_io;
pub mod transform;

#[cfg(test)]
mod test_support;

// Re-export public API for convenience
pub use checkpoint::Promotion;
pub use context::SyncContext;
pub use errors::PipelineError;
pub use execution::{DryRunResult, ExecutionOptions, PipelineOutcome};
pub use orchestrator::{check_pipeline, confirm_load, execute_pipeline, run_pipeline};
pub use result::{CheckResult, PipelineCounts, PipelineResult};
