//! Agrisim - runs a farm scenario from the command line
//!
//! ```text
//! agrisim run --scenario scenarios/demo.json --horizon 200 --seed 7
//! ```

use agrisim_core::{ActivityState, ScenarioConfig, SimTime, Simulation};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "agrisim")]
#[command(about = "Discrete-event farm decision simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario and print the activity summary
    Run {
        /// Scenario file (JSON)
        #[arg(long)]
        scenario: PathBuf,

        /// Override the scenario horizon
        #[arg(long)]
        horizon: Option<f64>,

        /// Override the scenario seed
        #[arg(long)]
        seed: Option<u64>,

        /// Debug-level logging (RUST_LOG still wins when set)
        #[arg(long, short)]
        verbose: bool,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "agrisim=debug,agrisim_core=debug"
    } else {
        "agrisim=info,agrisim_core=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_scenario(
    path: &Path,
    horizon: Option<f64>,
    seed: Option<u64>,
) -> Result<ScenarioConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;

    let mut scenario: ScenarioConfig = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse scenario {}", path.display()))?;
    if let Some(horizon) = horizon {
        scenario.horizon = horizon;
    }
    if let Some(seed) = seed {
        scenario.seed = seed;
    }
    scenario.validate()?;
    Ok(scenario)
}

fn format_time(time: SimTime) -> String {
    if time.is_neg_infinity() {
        "-".to_string()
    } else {
        time.to_string()
    }
}

fn run(scenario: PathBuf, horizon: Option<f64>, seed: Option<u64>) -> Result<()> {
    let run_id = Uuid::new_v4();
    let config = load_scenario(&scenario, horizon, seed)?;
    info!(%run_id, scenario = %scenario.display(), seed = config.seed, horizon = config.horizon, "starting run");

    let mut simulation = Simulation::farm(&config).context("invalid scenario")?;
    let summary = simulation.run().context("simulation aborted")?;

    let farmer = simulation
        .farmer()
        .context("scenario has no farmer model")?;
    let activities = farmer.knowledge_base().activities();

    println!("run {}", run_id);
    println!(
        "{} steps, {} events delivered, ended at t={}",
        summary.steps, summary.delivered, summary.end_time
    );
    println!();
    println!("{:<28} {:<8} {:>10} {:>10}", "activity", "state", "started", "done");
    for activity in activities {
        println!(
            "{:<28} {:<8} {:>10} {:>10}",
            activity.name(),
            activity.state().as_str(),
            format_time(activity.started_at()),
            format_time(activity.done_at()),
        );
    }

    let done = activities
        .iter()
        .filter(|a| a.state() == ActivityState::Done)
        .count();
    info!(%run_id, done, total = activities.len(), "run complete");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            scenario,
            horizon,
            seed,
            verbose,
        } => {
            init_tracing(verbose);
            run(scenario, horizon, seed)
        }
    }
}
