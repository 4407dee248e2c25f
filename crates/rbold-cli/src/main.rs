use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use rbold_pipeline::{resample_workflow, WorkflowConfig};

#[derive(Parser)]
#[command(name = "rbold")]
#[command(about = "Resample functional MRI timeseries onto surface and template grids")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the resampling workflow described by a JSON config file
    Resample {
        /// Workflow config file
        config: PathBuf,

        /// Override the worker thread count from the config
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Parse and sanity-check a workflow config without processing runs
    Check {
        /// Workflow config file
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resample { config, jobs } => {
            let mut config = WorkflowConfig::from_file(&config)?;
            if let Some(jobs) = jobs {
                config.jobs = Some(jobs);
            }
            let written = resample_workflow(&config)?;
            info!("Workflow complete: {} files written", written.len());
        }
        Commands::Check { config } => {
            let config = WorkflowConfig::from_file(&config)?;
            let combos = config.surface_combinations()?;
            println!(
                "ok: {} runs, {} surface combinations, {} templates",
                config.runs.len(),
                combos.len(),
                config.templates.len()
            );
        }
    }

    Ok(())
}
