use std::path::Path;

use anyhow::Result;
use moviesync_engine::checkpoint::{read_candidate, read_confirmed};
use moviesync_engine::resolve::create_state_store;
use moviesync_types::state::PipelineId;

use super::load_config;

/// Execute the `status` command: show both watermarks and recent runs.
pub fn execute(pipeline_path: &Path, limit: usize) -> Result<()> {
    let config = load_config(pipeline_path)?;
    let store = create_state_store(&config)?;
    let pipeline = PipelineId::new(config.pipeline.clone());

    println!("Pipeline '{pipeline}'");
    match read_confirmed(store.as_ref(), &pipeline)? {
        Some(watermark) => println!("  Confirmed watermark: {watermark}"),
        None => println!("  Confirmed watermark: (none)"),
    }
    match read_candidate(store.as_ref(), &pipeline)? {
        Some(watermark) => println!("  Candidate watermark: {watermark}"),
        None => println!("  Candidate watermark: (none)"),
    }

    let runs = store.recent_runs(&pipeline, limit)?;
    if runs.is_empty() {
        println!("  No runs recorded.");
        return Ok(());
    }
    println!("  Recent runs:");
    for run in runs {
        println!(
            "    #{:<5} {:<9} {}  located={} written={}",
            run.id,
            run.status.as_str(),
            run.started_at,
            run.stats.ids_located,
            run.stats.records_written
        );
        if let Some(message) = &run.stats.error_message {
            println!("           error: {message}");
        }
    }
    Ok(())
}
