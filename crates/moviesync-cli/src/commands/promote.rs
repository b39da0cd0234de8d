use std::path::Path;

use anyhow::Result;
use moviesync_engine::checkpoint::promote_candidate;
use moviesync_engine::resolve::create_state_store;
use moviesync_engine::Promotion;
use moviesync_types::state::PipelineId;

use super::{describe_promotion, load_config};

/// Execute the `promote` command: move the staged candidate to the confirmed
/// watermark.
pub fn execute(pipeline_path: &Path) -> Result<()> {
    let config = load_config(pipeline_path)?;
    let store = create_state_store(&config)?;

    let promotion = promote_candidate(store.as_ref(), &PipelineId::new(config.pipeline.clone()))?;
    println!("Pipeline '{}': {}", config.pipeline, describe_promotion(&promotion));

    if promotion == Promotion::Conflict {
        anyhow::bail!("Promotion lost a race with another writer; re-run promote");
    }
    Ok(())
}
