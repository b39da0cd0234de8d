//! Execution options and outcome types for pipeline runs.

use moviesync_types::change_set::ChangeSet;
use moviesync_types::record::Batch;
use moviesync_types::watermark::Watermark;

use crate::result::PipelineResult;

/// Options controlling how a pipeline run executes.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Locate, fetch and transform, but skip the load and leave the
    /// checkpoint store untouched.
    pub dry_run: bool,
}

/// Result of a dry-run pipeline execution.
#[derive(Debug, Clone)]
pub struct DryRunResult {
    pub watermark: Option<Watermark>,
    pub change_set: ChangeSet,
    /// Transformed records that a real run would load.
    pub batch: Batch,
    pub duration_secs: f64,
}

/// Either a normal pipeline result or a dry-run result.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Run(PipelineResult),
    DryRun(DryRunResult),
}
