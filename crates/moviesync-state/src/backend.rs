//! Checkpoint store trait definition.
//!
//! [`CheckpointStore`] is the key-value contract the pipeline uses to read
//! and write watermarks, plus a small run-history log. Model types live in
//! [`moviesync_types::state`].

use moviesync_types::state::{CheckpointKey, PipelineId, RunRecord, RunStats, RunStatus};

use crate::error;

/// Storage contract for pipeline checkpoints.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn CheckpointStore>`.
pub trait CheckpointStore: Send + Sync {
    /// Read the value stored under `key` for a pipeline.
    ///
    /// Returns `Ok(None)` when nothing has been pushed yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn pull(&self, pipeline: &PipelineId, key: CheckpointKey) -> error::Result<Option<String>>;

    /// Upsert the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn push(&self, pipeline: &PipelineId, key: CheckpointKey, value: &str) -> error::Result<()>;

    /// Compare-and-set: update `key` only if its current value matches `expected`.
    ///
    /// Returns `true` if the update was applied, `false` if the current value didn't match.
    /// When `expected` is `None`, succeeds only if the key does not exist (insert-if-absent).
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn compare_and_set(
        &self,
        pipeline: &PipelineId,
        key: CheckpointKey,
        expected: Option<&str>,
        new_value: &str,
    ) -> error::Result<bool>;

    /// Begin a new run, returning its unique ID.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn start_run(&self, pipeline: &PipelineId) -> error::Result<i64>;

    /// Finalize a run with status and aggregate stats.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn complete_run(&self, run_id: i64, status: RunStatus, stats: &RunStats)
        -> error::Result<()>;

    /// Most recent runs for a pipeline, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn recent_runs(&self, pipeline: &PipelineId, limit: usize) -> error::Result<Vec<RunRecord>>;
}
