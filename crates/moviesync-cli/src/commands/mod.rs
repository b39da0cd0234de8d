pub mod check;
pub mod promote;
pub mod run;
pub mod stage;
pub mod status;

use std::path::Path;

use anyhow::{Context, Result};
use moviesync_engine::config::parser;
use moviesync_engine::config::types::PipelineConfig;
use moviesync_engine::config::validator;
use moviesync_engine::resolve::RegistryResolver;
use moviesync_engine::{Promotion, SyncContext};

/// Parse and validate a pipeline file.
pub(crate) fn load_config(pipeline_path: &Path) -> Result<PipelineConfig> {
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;
    validator::validate_pipeline(&config)?;
    Ok(config)
}

pub(crate) fn sync_context(config: &PipelineConfig) -> Result<SyncContext> {
    let resolver = RegistryResolver::from_config(config);
    Ok(SyncContext::from_config(config, &resolver)?)
}

/// One-line description of a promotion outcome.
pub(crate) fn describe_promotion(promotion: &Promotion) -> String {
    match promotion {
        Promotion::Promoted {
            previous: Some(previous),
            confirmed,
        } => format!("advanced {previous} -> {confirmed}"),
        Promotion::Promoted {
            previous: None,
            confirmed,
        } => format!("set to {confirmed}"),
        Promotion::Unchanged(watermark) => format!("unchanged at {watermark}"),
        Promotion::NoCandidate => "no candidate staged".to_string(),
        Promotion::Stale {
            confirmed,
            candidate,
        } => format!("kept {confirmed}; candidate {candidate} is older"),
        Promotion::Conflict => "confirmed watermark changed concurrently; not promoted".to_string(),
    }
}
