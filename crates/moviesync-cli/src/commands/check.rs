use std::path::Path;

use anyhow::{Context, Result};
use moviesync_types::error::{ValidationResult, ValidationStatus};

use moviesync_engine::check_pipeline;
use moviesync_engine::config::parser;

/// Execute the `check` command: validate pipeline config, databases and the
/// state store.
pub fn execute(pipeline_path: &Path) -> Result<()> {
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;

    let result = check_pipeline(&config)?;

    print_validation("Configuration", &result.config_validation);
    print_validation("Source", &result.source_validation);
    print_validation("Target", &result.target_validation);
    if result.state_ok {
        println!("State store:       OK");
    } else {
        println!("State store:       FAILED");
    }

    if result.all_ok() {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}

fn print_validation(label: &str, result: &ValidationResult) {
    let status = match result.status {
        ValidationStatus::Success => "OK",
        ValidationStatus::Failed => "FAILED",
        ValidationStatus::Warning => "WARNING",
    };
    println!("{:18} {}", format!("{label}:"), status);
    if !result.message.is_empty() {
        for line in result.message.lines() {
            println!("  {line}");
        }
    }
}
