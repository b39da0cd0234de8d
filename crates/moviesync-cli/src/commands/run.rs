use std::path::Path;

use anyhow::Result;

use moviesync_engine::execution::{DryRunResult, ExecutionOptions, PipelineOutcome};
use moviesync_engine::{run_pipeline, PipelineResult};

use super::{describe_promotion, load_config};

/// Execute the `run` command: parse, validate, and run a pipeline.
pub fn execute(pipeline_path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let config = load_config(pipeline_path)?;

    tracing::info!(
        pipeline = config.pipeline.as_str(),
        source = config.source_connection_id.as_str(),
        target = config.target_connection_id.as_str(),
        fields = config.fields.len(),
        "Pipeline validated"
    );

    let outcome = run_pipeline(&config, &ExecutionOptions { dry_run }).map_err(|e| {
        anyhow::anyhow!("Pipeline '{}' failed ({}): {e}", config.pipeline, e.category())
    })?;

    match outcome {
        PipelineOutcome::Run(result) if json => println!("{}", result_json(&result)),
        PipelineOutcome::Run(result) => print_result(&config.pipeline, &result),
        PipelineOutcome::DryRun(dry) => print_dry_run(&config.pipeline, &dry, json)?,
    }
    Ok(())
}

fn print_result(pipeline: &str, result: &PipelineResult) {
    println!("Pipeline '{pipeline}' completed successfully.");
    println!("  Run id:          {}", result.run_id);
    println!("  Ids located:     {}", result.counts.ids_located);
    println!("  Records fetched: {}", result.counts.records_fetched);
    println!("  Records loaded:  {}", result.counts.records_written);
    if let Some(report) = &result.load {
        println!("  Load mode:       {}", report.mode);
        println!("  Rows in table:   {}", report.rows_in_table);
        if report.rows_skipped() > 0 {
            println!("  Rows skipped:    {}", report.rows_skipped());
        }
    }
    match &result.watermark {
        Some(watermark) => println!("  Started from:    {watermark}"),
        None => println!("  Started from:    (no confirmed watermark)"),
    }
    if let Some(candidate) = &result.candidate {
        println!("  Candidate:       {candidate}");
    }
    match &result.promotion {
        Some(promotion) => println!("  Watermark:       {}", describe_promotion(promotion)),
        None if result.candidate.is_some() => println!("  Watermark:       staged, not promoted"),
        None => println!("  Watermark:       not advanced"),
    }
    println!("  Duration:        {:.2}s", result.duration_secs);
}

fn result_json(result: &PipelineResult) -> serde_json::Value {
    serde_json::json!({
        "run_id": result.run_id,
        "ids_located": result.counts.ids_located,
        "records_fetched": result.counts.records_fetched,
        "records_transformed": result.counts.records_transformed,
        "records_written": result.counts.records_written,
        "watermark": result.watermark,
        "candidate": result.candidate,
        "load": result.load,
        "promotion": result.promotion.as_ref().map(describe_promotion),
        "phases": result.phases,
        "duration_secs": result.duration_secs,
    })
}

fn print_dry_run(pipeline: &str, dry: &DryRunResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&dry.batch)?);
        return Ok(());
    }
    println!("Dry run of '{pipeline}': nothing was written.");
    println!("  Ids located:     {}", dry.change_set.len());
    println!("  Records:         {}", dry.batch.len());
    if let Some(candidate) = dry.change_set.candidate_watermark() {
        println!("  Candidate:       {candidate}");
    }
    println!("  Duration:        {:.2}s", dry.duration_secs);
    for record in dry.batch.records() {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}
