//! Pipeline execution result types.

use moviesync_types::error::ValidationResult;
use moviesync_types::load::LoadReport;
use moviesync_types::phase::RunPhase;
use moviesync_types::watermark::Watermark;

use crate::checkpoint::Promotion;

/// Record counts for a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineCounts {
    pub ids_located: u64,
    pub records_fetched: u64,
    pub records_transformed: u64,
    pub records_written: u64,
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub run_id: i64,
    pub counts: PipelineCounts,
    /// Confirmed watermark the run started from.
    pub watermark: Option<Watermark>,
    /// Watermark staged by this run, if anything was located.
    pub candidate: Option<Watermark>,
    pub load: Option<LoadReport>,
    /// `None` when nothing was staged or `auto_promote` is off.
    pub promotion: Option<Promotion>,
    /// Phases the run went through, `Idle` first.
    pub phases: Vec<RunPhase>,
    pub duration_secs: f64,
}

/// Result of a pipeline check.
#[derive(Debug)]
pub struct CheckResult {
    pub config_validation: ValidationResult,
    pub source_validation: ValidationResult,
    pub target_validation: ValidationResult,
    pub state_ok: bool,
}

impl CheckResult {
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.state_ok
            && !self.config_validation.is_failed()
            && !self.source_validation.is_failed()
            && !self.target_validation.is_failed()
    }
}
