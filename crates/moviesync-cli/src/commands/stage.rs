//! Single-stage commands exchanging JSON files, for schedulers that run the
//! stages as separate tasks.

use std::path::Path;

use anyhow::Result;
use moviesync_engine::checkpoint::read_confirmed;
use moviesync_engine::resolve::create_state_store;
use moviesync_engine::stage_io::{read_json, write_json};
use moviesync_engine::confirm_load;
use moviesync_types::change_set::ChangeSet;
use moviesync_types::record::Batch;
use moviesync_types::watermark::Watermark;

use super::{describe_promotion, load_config, sync_context};

/// `locate`: write the change set since the confirmed (or given) watermark.
pub fn locate(pipeline_path: &Path, out: &Path, watermark: Option<&str>) -> Result<()> {
    let config = load_config(pipeline_path)?;
    let ctx = sync_context(&config)?;

    let watermark = match watermark {
        Some(raw) => Some(Watermark::parse_lenient(raw)),
        None => read_confirmed(create_state_store(&config)?.as_ref(), &ctx.pipeline)?,
    };

    let change_set = moviesync_engine::locate::locate(&ctx, watermark.as_ref())?
        .into_option()
        .unwrap_or_else(ChangeSet::empty);
    write_json(out, &change_set)?;

    println!("Located {} changed film(s) -> {}", change_set.len(), out.display());
    if let Some(candidate) = change_set.candidate_watermark() {
        println!("  Candidate watermark: {candidate}");
    }
    Ok(())
}

/// `fetch`: write the aggregate batch for a change set.
pub fn fetch(pipeline_path: &Path, changes: &Path, out: &Path) -> Result<()> {
    let config = load_config(pipeline_path)?;
    let ctx = sync_context(&config)?;

    let change_set: ChangeSet = read_json(changes)?;
    let batch = moviesync_engine::fetch::fetch(&ctx, &change_set)?
        .into_option()
        .unwrap_or_default();
    write_json(out, &batch)?;

    println!("Fetched {} record(s) -> {}", batch.len(), out.display());
    Ok(())
}

/// `transform`: apply the configured rules to a batch file.
pub fn transform(pipeline_path: &Path, input: &Path, out: &Path) -> Result<()> {
    let config = load_config(pipeline_path)?;
    let ctx = sync_context(&config)?;

    let batch: Batch = read_json(input)?;
    let transformed = ctx.transformer.apply(&batch)?.into_option().unwrap_or_default();
    write_json(out, &transformed)?;

    println!(
        "Transformed {} record(s) into {} -> {}",
        batch.len(),
        transformed.len(),
        out.display()
    );
    Ok(())
}

/// `load`: write a batch file to the target. With `--changes`, the change
/// set's candidate watermark is staged (and promoted if configured) once the
/// load succeeded.
pub fn load(pipeline_path: &Path, input: &Path, changes: Option<&Path>) -> Result<()> {
    let config = load_config(pipeline_path)?;
    let ctx = sync_context(&config)?;

    let change_set: Option<ChangeSet> = changes.map(read_json::<ChangeSet>).transpose()?;
    let batch: Batch = read_json(input)?;

    let report = moviesync_engine::load::load(&ctx, &batch)?;
    println!(
        "Loaded {} of {} record(s) ({} mode); {} row(s) in target",
        report.rows_written, report.rows_submitted, report.mode, report.rows_in_table
    );

    if let Some(candidate) = change_set.as_ref().and_then(ChangeSet::candidate_watermark) {
        let store = create_state_store(&config)?;
        match confirm_load(&ctx, store.as_ref(), Some(candidate))? {
            Some(promotion) => println!("  Watermark: {}", describe_promotion(&promotion)),
            None => println!("  Candidate watermark {candidate} staged"),
        }
    }
    Ok(())
}
