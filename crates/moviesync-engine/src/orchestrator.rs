//! Pipeline orchestrator: drives locate → fetch → transform → load, records
//! run history and promotes the watermark after a confirmed load.

use std::time::Instant;

use anyhow::Result;
use moviesync_state::CheckpointStore;
use moviesync_types::change_set::ChangeSet;
use moviesync_types::error::ValidationResult;
use moviesync_types::load::LoadReport;
use moviesync_types::phase::{RunPhase, StageOutput};
use moviesync_types::state::{PipelineId, RunStats, RunStatus};
use moviesync_types::watermark::Watermark;
use rusqlite::{Connection, OpenFlags};

use crate::checkpoint::{promote_candidate, read_confirmed, stage_candidate, Promotion};
use crate::config::types::PipelineConfig;
use crate::config::validator::validate_pipeline;
use crate::connection::open_source;
use crate::context::SyncContext;
use crate::errors::PipelineError;
use crate::execution::{DryRunResult, ExecutionOptions, PipelineOutcome};
use crate::fetch::fetch;
use crate::load::load;
use crate::locate::locate;
use crate::resolve::{create_state_store, ConnectionResolver, RegistryResolver};
use crate::result::{CheckResult, PipelineCounts, PipelineResult};
use crate::schema::{FILM_TABLE, SOURCE_TABLES};

/// Tracks the phase of a single run and rejects illegal transitions.
#[derive(Debug, Clone)]
pub struct RunTracker {
    phase: RunPhase,
    history: Vec<RunPhase>,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
            history: vec![RunPhase::Idle],
        }
    }

    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    #[must_use]
    pub fn history(&self) -> &[RunPhase] {
        &self.history
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Infrastructure`] if the transition is not
    /// allowed from the current phase.
    pub fn advance(&mut self, next: RunPhase) -> Result<(), PipelineError> {
        if !self.phase.can_transition_to(next) {
            return Err(PipelineError::Infrastructure(anyhow::anyhow!(
                "illegal run phase transition {} -> {next}",
                self.phase
            )));
        }
        tracing::debug!(from = %self.phase, to = %next, "Run phase transition");
        self.phase = next;
        self.history.push(next);
        Ok(())
    }

    /// Mark the run failed unless it already finished.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = RunPhase::Failed;
            self.history.push(RunPhase::Failed);
        }
    }
}

/// Run a pipeline end to end.
///
/// # Errors
///
/// Returns the first stage or infrastructure error. The confirmed watermark
/// is left untouched in that case.
pub fn run_pipeline(
    config: &PipelineConfig,
    options: &ExecutionOptions,
) -> Result<PipelineOutcome, PipelineError> {
    let resolver = RegistryResolver::from_config(config);
    let ctx = SyncContext::from_config(config, &resolver)?;
    let store = create_state_store(config)?;
    execute_pipeline(&ctx, store.as_ref(), options)
}

/// Run a pipeline from an already resolved context and store.
///
/// # Errors
///
/// See [`run_pipeline`].
pub fn execute_pipeline(
    ctx: &SyncContext,
    store: &dyn CheckpointStore,
    options: &ExecutionOptions,
) -> Result<PipelineOutcome, PipelineError> {
    let start = Instant::now();
    tracing::info!(
        pipeline = ctx.pipeline.as_str(),
        dry_run = options.dry_run,
        chunk_size = ctx.chunk_size,
        load_mode = %ctx.load_mode,
        "Starting pipeline run"
    );

    let watermark = read_confirmed(store, &ctx.pipeline)?;

    if options.dry_run {
        return execute_dry_run(ctx, watermark, start).map(PipelineOutcome::DryRun);
    }

    let run_id = store.start_run(&ctx.pipeline)?;
    let mut tracker = RunTracker::new();
    let mut counts = PipelineCounts::default();

    match execute_stages(ctx, store, watermark.as_ref(), &mut tracker, &mut counts) {
        Ok(finished) => {
            let stats = run_stats(&counts, None);
            store.complete_run(run_id, RunStatus::Completed, &stats)?;
            let duration_secs = start.elapsed().as_secs_f64();
            tracing::info!(
                pipeline = ctx.pipeline.as_str(),
                run_id,
                ids_located = counts.ids_located,
                records_written = counts.records_written,
                duration_secs,
                "Pipeline run completed"
            );
            Ok(PipelineOutcome::Run(PipelineResult {
                run_id,
                counts,
                watermark,
                candidate: finished.candidate,
                load: finished.load,
                promotion: finished.promotion,
                phases: tracker.history().to_vec(),
                duration_secs,
            }))
        }
        Err(err) => {
            let failed_in = tracker.phase();
            tracker.fail();
            tracing::error!(
                pipeline = ctx.pipeline.as_str(),
                run_id,
                phase = %failed_in,
                category = %err.category(),
                error = %err,
                "Pipeline run failed; watermark not advanced"
            );
            let stats = run_stats(&counts, Some(err.to_string()));
            if let Err(state_err) = store.complete_run(run_id, RunStatus::Failed, &stats) {
                tracing::error!(run_id, error = %state_err, "Failed to record run failure");
            }
            Err(err)
        }
    }
}

struct FinishedStages {
    candidate: Option<Watermark>,
    load: Option<LoadReport>,
    promotion: Option<Promotion>,
}

fn execute_stages(
    ctx: &SyncContext,
    store: &dyn CheckpointStore,
    watermark: Option<&Watermark>,
    tracker: &mut RunTracker,
    counts: &mut PipelineCounts,
) -> Result<FinishedStages, PipelineError> {
    tracker.advance(RunPhase::Locating)?;
    let change_set = match locate(ctx, watermark)? {
        StageOutput::Ready(cs) => cs,
        StageOutput::Empty => {
            tracker.advance(RunPhase::Done)?;
            return Ok(FinishedStages {
                candidate: None,
                load: None,
                promotion: None,
            });
        }
    };
    counts.ids_located = change_set.len() as u64;
    let candidate = change_set.candidate_watermark().cloned();

    tracker.advance(RunPhase::Fetching)?;
    let batch = match fetch(ctx, &change_set)? {
        StageOutput::Ready(batch) => batch,
        StageOutput::Empty => {
            tracker.advance(RunPhase::Done)?;
            let promotion = confirm_load(ctx, store, candidate.as_ref())?;
            return Ok(FinishedStages {
                candidate,
                load: None,
                promotion,
            });
        }
    };
    counts.records_fetched = batch.len() as u64;

    tracker.advance(RunPhase::Transforming)?;
    let batch = match ctx.transformer.apply(&batch)? {
        StageOutput::Ready(batch) => batch,
        StageOutput::Empty => {
            tracker.advance(RunPhase::Done)?;
            let promotion = confirm_load(ctx, store, candidate.as_ref())?;
            return Ok(FinishedStages {
                candidate,
                load: None,
                promotion,
            });
        }
    };
    counts.records_transformed = batch.len() as u64;

    tracker.advance(RunPhase::Loading)?;
    let report = load(ctx, &batch)?;
    for step in &report.steps {
        tracker.advance(RunPhase::from(*step))?;
    }
    counts.records_written = report.rows_written;
    tracker.advance(RunPhase::Done)?;

    let promotion = confirm_load(ctx, store, candidate.as_ref())?;
    Ok(FinishedStages {
        candidate,
        load: Some(report),
        promotion,
    })
}

/// Stage the candidate of a confirmed load and promote it when the context
/// asks for it.
///
/// # Errors
///
/// Returns [`PipelineError::State`] if the checkpoint store fails.
pub fn confirm_load(
    ctx: &SyncContext,
    store: &dyn CheckpointStore,
    candidate: Option<&Watermark>,
) -> Result<Option<Promotion>, PipelineError> {
    let Some(candidate) = candidate else {
        return Ok(None);
    };
    stage_candidate(store, &ctx.pipeline, candidate)?;
    if !ctx.auto_promote {
        tracing::info!(
            pipeline = ctx.pipeline.as_str(),
            candidate = %candidate,
            "Candidate watermark staged; promote it to confirm"
        );
        return Ok(None);
    }
    promote_candidate(store, &ctx.pipeline).map(Some)
}

fn execute_dry_run(
    ctx: &SyncContext,
    watermark: Option<Watermark>,
    start: Instant,
) -> Result<DryRunResult, PipelineError> {
    let change_set = locate(ctx, watermark.as_ref())?
        .into_option()
        .unwrap_or_else(ChangeSet::empty);
    let batch = fetch(ctx, &change_set)?
        .into_option()
        .map(|batch| ctx.transformer.apply(&batch))
        .transpose()?
        .and_then(StageOutput::into_option)
        .unwrap_or_default();

    tracing::info!(
        pipeline = ctx.pipeline.as_str(),
        ids = change_set.len(),
        records = batch.len(),
        "Dry run complete; nothing loaded"
    );
    Ok(DryRunResult {
        watermark,
        change_set,
        batch,
        duration_secs: start.elapsed().as_secs_f64(),
    })
}

fn run_stats(counts: &PipelineCounts, error_message: Option<String>) -> RunStats {
    RunStats {
        ids_located: counts.ids_located,
        records_fetched: counts.records_fetched,
        records_written: counts.records_written,
        error_message,
    }
}

/// Validate configuration, source layout, target reachability and the
/// checkpoint store without changing anything.
///
/// # Errors
///
/// Returns an error only if the check itself cannot proceed.
pub fn check_pipeline(config: &PipelineConfig) -> Result<CheckResult> {
    tracing::info!(
        pipeline = config.pipeline.as_str(),
        "Checking pipeline configuration"
    );

    let config_validation = match validate_pipeline(config) {
        Ok(()) => ValidationResult::success("configuration is valid"),
        Err(e) => ValidationResult::failed(e.to_string()),
    };

    let resolver = RegistryResolver::from_config(config);
    let source_validation = match resolver.resolve(&config.source_connection_id) {
        Ok(desc) => match open_source(&desc) {
            Ok(conn) => check_source_tables(&conn),
            Err(e) => ValidationResult::failed(e.to_string()),
        },
        Err(e) => ValidationResult::failed(e.to_string()),
    };
    let target_validation = match resolver.resolve(&config.target_connection_id) {
        Ok(desc) => check_target(&desc.database_path()),
        Err(e) => ValidationResult::failed(e.to_string()),
    };

    let state_ok = match create_state_store(config) {
        Ok(store) => store.recent_runs(&PipelineId::new(config.pipeline.clone()), 1).is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Checkpoint store unavailable");
            false
        }
    };

    Ok(CheckResult {
        config_validation,
        source_validation,
        target_validation,
        state_ok,
    })
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [table],
        |row| row.get(0),
    )
}

fn check_source_tables(conn: &Connection) -> ValidationResult {
    let mut missing = Vec::new();
    for table in SOURCE_TABLES {
        match table_exists(conn, table) {
            Ok(true) => {}
            Ok(false) => missing.push(*table),
            Err(e) => return ValidationResult::failed(format!("cannot inspect source: {e}")),
        }
    }
    if missing.is_empty() {
        ValidationResult::success(format!("{} source tables present", SOURCE_TABLES.len()))
    } else {
        ValidationResult::failed(format!("missing source table(s): {}", missing.join(", ")))
    }
}

fn check_target(path: &std::path::Path) -> ValidationResult {
    if !path.exists() {
        return ValidationResult::warning(format!(
            "{} does not exist yet; it will be created on first load",
            path.display()
        ));
    }
    let conn = match Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY) {
        Ok(conn) => conn,
        Err(e) => return ValidationResult::failed(format!("cannot open {}: {e}", path.display())),
    };
    match table_exists(&conn, FILM_TABLE) {
        Ok(true) => ValidationResult::success(format!("{} is reachable", path.display())),
        Ok(false) => ValidationResult::warning(format!(
            "{} has no {FILM_TABLE} table yet; it will be created on first load",
            path.display()
        )),
        Err(e) => ValidationResult::failed(format!("cannot inspect {}: {e}", path.display())),
    }
}
