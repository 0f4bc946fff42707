//! Engine binary for the Township simulation.
//!
//! This is the main entry point that wires together the world, the agent
//! spawner, the offline oracles, and operator controls. It loads
//! configuration, initializes all subsystems, and runs the simulation loop
//! until a termination condition is met.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (positional argument, `TOWNSHIP_CONFIG`, or
//!    `township-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the grid from the world definition or the sample town
//! 4. Spawn the configured agents, or restore them with `--resume <file>`
//! 5. Create the oracle guard and operator state
//! 6. Run the simulation loop; Ctrl-C stops after the current step
//! 7. Write the movement log and the final snapshot

mod error;
mod output;
mod spawner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use township_core::clock::SimClock;
use township_core::config::{LogFormat, LoggingSection, SimulationConfig};
use township_core::operator::OperatorState;
use township_core::oracle::OracleGuard;
use township_core::runner;
use township_core::snapshot::SimulationSnapshot;
use township_core::stub::{HashEmbedding, StubCognition};
use township_core::tick::SimulationState;
use township_world::{Grid, WorldDefinition, sample_town};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::output::MovementWriter;

/// Config file used when neither an argument nor the environment names one.
const DEFAULT_CONFIG_PATH: &str = "township-config.yaml";

#[derive(Debug, Parser)]
#[command(
    name = "township-engine",
    about = "Run a Township simulation from a YAML config"
)]
struct Cli {
    /// Simulation config file (defaults to township-config.yaml when present)
    #[arg(env = "TOWNSHIP_CONFIG")]
    config: Option<PathBuf>,

    /// Restore agents and clock from a saved snapshot instead of spawning
    #[arg(long, value_name = "PATH")]
    resume: Option<PathBuf>,
}

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        simulation = %config.simulation.name,
        seed = config.simulation.seed,
        seconds_per_step = config.simulation.seconds_per_step,
        max_steps = config.simulation.max_steps,
        "township-engine starting"
    );

    // 3. Build the grid.
    let grid = load_grid(config.world.definition_path.as_deref())?;
    info!(
        world = grid.name(),
        width = grid.width(),
        height = grid.height(),
        tile_size = grid.tile_size(),
        "World loaded"
    );

    // 4. Spawn or restore agents.
    let fallback = config.world.fallback_address.as_str();
    let (mut sim_state, seed) = if let Some(path) = cli.resume.as_deref() {
        let snapshot = SimulationSnapshot::load(path)?;
        let seed = snapshot.meta.seed;
        info!(path = %path.display(), step = snapshot.meta.step, "Resuming from snapshot");
        (snapshot.restore(grid, fallback)?, seed)
    } else {
        let clock = SimClock::new(
            config.simulation.parsed_start_time()?,
            config.simulation.seconds_per_step,
        )?;
        let agents = spawner::spawn_agents(&config.agents, &config.agent, &grid, fallback)?;
        let seed = config.simulation.seed;
        (SimulationState::new(clock, grid, agents, seed, fallback), seed)
    };
    info!(
        agents = sim_state.agents.len(),
        start = %sim_state.clock.curr_time(),
        "Simulation state assembled"
    );

    // 5. Oracles and operator state.
    let mut guard = OracleGuard::new(
        Box::new(StubCognition::new()),
        Box::new(HashEmbedding::new(config.oracle.embedding_dimensions)),
        config.oracle.max_retries,
    );
    let operator = Arc::new(OperatorState::new(
        config.simulation.tick_interval_ms,
        config.simulation.max_steps,
    ));
    {
        let operator = Arc::clone(&operator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping after the current step");
                operator.request_stop();
            }
        });
    }

    // 6. Run the simulation.
    let mut writer = MovementWriter::new(&config.output.movement_dir, config.output.per_step_files)?;
    let result = runner::run_simulation(&mut sim_state, &mut guard, &operator, &mut writer).await?;
    runner::log_simulation_end(&result, &sim_state, &guard);

    // 7. Persist results.
    let log_path = output::write_movement_log(&config.output.movement_dir, &sim_state.movement_log)?;
    info!(
        path = %log_path.display(),
        steps_kept = sim_state.movement_log.len(),
        failed_step_files = writer.failed_writes(),
        "Movement log written"
    );
    SimulationSnapshot::capture(&sim_state, seed).save(&config.output.snapshot_path)?;

    info!(
        end_reason = ?result.end_reason,
        total_steps = result.total_steps,
        "township-engine shutdown complete"
    );

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` wins over the config level.
fn init_logging(logging: &LoggingSection) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

/// Load the simulation configuration.
///
/// An explicit path must exist. The default path falls back to built-in
/// defaults when absent.
fn load_config(explicit: Option<PathBuf>) -> Result<SimulationConfig, EngineError> {
    if let Some(path) = explicit {
        return Ok(SimulationConfig::from_file(&path)?);
    }
    let config_path = Path::new(DEFAULT_CONFIG_PATH);
    if config_path.exists() {
        Ok(SimulationConfig::from_file(config_path)?)
    } else {
        Ok(SimulationConfig::default())
    }
}

/// Build the grid from a JSON world definition, or the sample town.
fn load_grid(definition_path: Option<&Path>) -> Result<Grid, EngineError> {
    let definition = match definition_path {
        Some(path) => WorldDefinition::from_file(path)?,
        None => sample_town(),
    };
    Ok(Grid::from_definition(&definition)?)
}
