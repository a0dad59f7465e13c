//! Grove Idle - Development Tools

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use grove_tools::catch_up::{self, CatchUpOutcome, CatchUpSummary};
use grove_tools::error::{Result, ToolError};
use grove_tools::simulate::{self, GameSummary};
use grove_tools::validate;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "grove-tools")]
#[command(about = "Development tools for Grove Idle")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate catalog files
    Validate {
        /// Catalog file or directory of catalogs
        #[arg(default_value = "assets/data")]
        path: PathBuf,
    },
    /// Advance a game headlessly and print a summary
    Simulate {
        /// Catalog file
        #[arg(long, default_value = "assets/data/catalog.ron")]
        catalog: PathBuf,
        /// Steps to advance
        #[arg(long, default_value_t = 3600)]
        steps: u64,
        /// Checkpoint to continue from
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        /// Where to write the resulting checkpoint
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Replay time spent away from a saved game
    CatchUp {
        /// Catalog file
        #[arg(long, default_value = "assets/data/catalog.ron")]
        catalog: PathBuf,
        /// Checkpoint to continue from
        #[arg(long)]
        checkpoint: PathBuf,
        /// Seconds elapsed since the checkpoint was saved
        #[arg(long)]
        elapsed: f64,
        /// Steps per batch (defaults to the catalog's)
        #[arg(long)]
        batch: Option<u32>,
        /// Where to write the resulting checkpoint
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { path } => run_validate(&path),
        Commands::Simulate {
            catalog,
            steps,
            checkpoint,
            save,
        } => run_simulate(&catalog, steps, checkpoint.as_deref(), save.as_deref()),
        Commands::CatchUp {
            catalog,
            checkpoint,
            elapsed,
            batch,
            save,
        } => run_catch_up(&catalog, &checkpoint, elapsed, batch, save.as_deref()),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_validate(path: &Path) -> Result<()> {
    tracing::info!("Validating catalogs in: {}", path.display());
    let summaries = validate::validate_path(path)?;
    tracing::info!(catalogs = summaries.len(), "Validation passed");
    print_json(&summaries)
}

fn run_simulate(
    catalog: &Path,
    steps: u64,
    checkpoint: Option<&Path>,
    save: Option<&Path>,
) -> Result<()> {
    let catalog = validate::load_catalog(catalog)?;
    let mut sim = simulate::load_game(catalog, checkpoint)?;
    let milestones = simulate::run_steps(&mut sim, steps);
    tracing::info!(steps, milestones, "Simulation finished");
    if let Some(path) = save {
        simulate::save_game(&sim, path)?;
    }
    print_json(&GameSummary::of(&sim))
}

fn run_catch_up(
    catalog: &Path,
    checkpoint: &Path,
    elapsed: f64,
    batch: Option<u32>,
    save: Option<&Path>,
) -> Result<()> {
    let catalog = validate::load_catalog(catalog)?;
    let mut sim = simulate::load_game(catalog, Some(checkpoint))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ToolError::Runtime)?;
    let outcome = runtime.block_on(async {
        let cancel = catch_up::ctrl_c_cancel();
        catch_up::drive(&mut sim, elapsed, batch, cancel).await
    })?;

    if let (CatchUpOutcome::Finished(_), Some(path)) = (&outcome, save) {
        simulate::save_game(&sim, path)?;
    }
    print_json(&CatchUpSummary::from(&outcome))
}
