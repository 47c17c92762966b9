//! Engine binary for the freeserf simulation kernel.
//!
//! # Startup sequence
//!
//! 1. Initialize structured logging (tracing).
//! 2. Load [`SimulationConfig`] from `freeserf-config.yaml`, or defaults
//!    if the file is absent.
//! 3. Build a blank map of the configured dimensions.
//! 4. Construct the [`SimulationState`].
//! 5. Start the observer API if `observer.enabled`.
//! 6. Run the tick loop, multiplexing the tick interval against
//!    line-oriented commands read from stdin (a local operator console,
//!    not a network protocol) and a ctrl-c shutdown signal.
//! 7. On shutdown, flush a final snapshot and log a summary.

mod console;
mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use freeserf_observer::{AppState, ServerConfig};
use freeserf_sim::{Command, SimulationConfig, SimulationState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const CONFIG_PATH: &str = "freeserf-config.yaml";

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();
    info!("freeserf-engine starting");

    // 2. Configuration.
    let config = load_config()?;
    info!(
        cols = config.world.cols,
        rows = config.world.rows,
        player_count = config.world.player_count,
        tick_length_ms = config.tick.tick_length_ms,
        "configuration loaded"
    );

    // 3 & 4. Map + simulation state.
    let mut sim = SimulationState::new(&config.world, &config.priorities, config.tick.game_speed)?;
    sim.paused = config.tick.paused;
    info!(
        game_tick = sim.game_tick,
        players = sim.players.len(),
        "simulation state constructed"
    );

    // 5. Observer API.
    let observer_state = Arc::new(AppState::new());
    if config.observer.enabled {
        let server_config = ServerConfig {
            host: "0.0.0.0".to_owned(),
            port: config.observer.port,
        };
        let state_for_server = Arc::clone(&observer_state);
        tokio::spawn(async move {
            if let Err(err) = freeserf_observer::start_server(&server_config, state_for_server).await
            {
                warn!(%err, "observer server exited");
            }
        });
        info!(port = config.observer.port, "observer API started");
    }

    // 6. Tick loop.
    let tick_length = Duration::from_millis(u64::from(config.tick.tick_length_ms));
    let mut interval = tokio::time::interval(tick_length);
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

    let shutdown_reason = loop {
        tokio::select! {
            _ = interval.tick() => {
                let due = sim.due_game_ticks();
                for _ in 0..due {
                    let summary = freeserf_sim::tick::run(&mut sim)?;
                    debug!(tick = summary.game_tick, "tick complete");
                    refresh_observer(&observer_state, &sim, &summary).await;
                    maybe_autosave(&sim, &config.persistence)?;
                }
            }
            line = stdin_lines.next_line() => {
                match line? {
                    Some(line) => handle_console_line(&mut sim, &line),
                    None => break "stdin closed",
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break "ctrl-c received";
            }
        }
    };

    // 7. Shutdown: flush a final snapshot and summarize.
    info!(reason = shutdown_reason, "shutting down");
    save_snapshot(&sim, &config.persistence, "latest.snapshot.json")?;

    info!(
        game_tick = sim.game_tick,
        players = sim.players.len(),
        "freeserf-engine shutdown complete"
    );
    Ok(())
}

fn maybe_autosave(
    sim: &SimulationState,
    persistence: &freeserf_sim::config::PersistenceConfig,
) -> Result<(), EngineError> {
    let interval = persistence.autosave_interval_ticks;
    if interval == 0 || u64::from(sim.game_tick) % interval != 0 {
        return Ok(());
    }
    save_snapshot(sim, persistence, "autosave.snapshot.json")
}

fn save_snapshot(
    sim: &SimulationState,
    persistence: &freeserf_sim::config::PersistenceConfig,
    file_name: &str,
) -> Result<(), EngineError> {
    let snapshot_dir = PathBuf::from(&persistence.snapshot_dir);
    std::fs::create_dir_all(&snapshot_dir)?;
    let path = snapshot_dir.join(file_name);
    freeserf_persistence::save_to_path(&path, sim)?;
    info!(path = %path.display(), game_tick = sim.game_tick, "snapshot written");
    Ok(())
}

fn load_config() -> Result<SimulationConfig, EngineError> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        info!(path = CONFIG_PATH, "config file not found, using defaults");
        Ok(SimulationConfig::default())
    }
}

fn handle_console_line(sim: &mut SimulationState, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match console::parse_line(line) {
        Ok(command) => dispatch_command(sim, command),
        Err(reason) => warn!(%reason, %line, "rejected console command"),
    }
}

fn dispatch_command(sim: &mut SimulationState, command: Command) {
    match freeserf_sim::apply_command(sim, command) {
        Ok(outcome) => info!(?outcome, "command applied"),
        Err(err) => warn!(%err, "command failed"),
    }
}

async fn refresh_observer(
    state: &Arc<AppState>,
    sim: &SimulationState,
    summary: &freeserf_sim::TickSummary,
) {
    state.broadcast(summary);
    if let Ok(mut snapshot) = state.snapshot.try_write() {
        snapshot.game_tick = sim.game_tick;
        snapshot.game_speed = sim.game_speed;
        snapshot.paused = sim.paused;
        snapshot.map_cols = sim.map.cols();
        snapshot.map_rows = sim.map.rows();
        snapshot.players.clone_from(&sim.players);
    }
}
