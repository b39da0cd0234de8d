mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "moviesync",
    version,
    about = "Incremental film catalogue sync between SQLite databases"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all four stages and promote the watermark
    Run {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Locate, fetch and transform only; write nothing
        #[arg(long)]
        dry_run: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate pipeline configuration, databases and state store
    Check {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
    },
    /// Find changed film ids and write them as a change set
    Locate {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Change set output file
        #[arg(long)]
        out: PathBuf,
        /// Start from this watermark instead of the confirmed one
        #[arg(long)]
        watermark: Option<String>,
    },
    /// Fetch aggregates for a change set
    Fetch {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Change set written by `locate`
        #[arg(long)]
        changes: PathBuf,
        /// Batch output file
        #[arg(long)]
        out: PathBuf,
    },
    /// Apply the pipeline's transform rules to a batch
    Transform {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Batch written by `fetch`
        #[arg(long)]
        input: PathBuf,
        /// Batch output file
        #[arg(long)]
        out: PathBuf,
    },
    /// Write a batch to the target database
    Load {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Batch written by `fetch` or `transform`
        #[arg(long)]
        input: PathBuf,
        /// Change set the batch came from; its candidate watermark is staged
        /// after a successful load
        #[arg(long)]
        changes: Option<PathBuf>,
    },
    /// Promote the staged candidate watermark
    Promote {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
    },
    /// Show watermarks and recent runs
    Status {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run {
            pipeline,
            dry_run,
            json,
        } => commands::run::execute(&pipeline, dry_run, json),
        Commands::Check { pipeline } => commands::check::execute(&pipeline),
        Commands::Locate {
            pipeline,
            out,
            watermark,
        } => commands::stage::locate(&pipeline, &out, watermark.as_deref()),
        Commands::Fetch {
            pipeline,
            changes,
            out,
        } => commands::stage::fetch(&pipeline, &changes, &out),
        Commands::Transform {
            pipeline,
            input,
            out,
        } => commands::stage::transform(&pipeline, &input, &out),
        Commands::Load {
            pipeline,
            input,
            changes,
        } => commands::stage::load(&pipeline, &input, changes.as_deref()),
        Commands::Promote { pipeline } => commands::promote::execute(&pipeline),
        Commands::Status { pipeline, limit } => commands::status::execute(&pipeline, limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn load_changes_is_optional() {
        let cli = Cli::try_parse_from(["moviesync", "load", "p.yaml", "--input", "b.json"]).unwrap();
        match cli.command {
            Commands::Load { changes, .. } => assert!(changes.is_none()),
            _ => panic!("expected load"),
        }
    }
}
