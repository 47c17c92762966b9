//! The simulation state, the fixed seven-phase tick, per-player
//! bookkeeping, territory ownership, and the command surface that ties
//! the map (`freeserf-map`), entity arenas (`freeserf-entities`), and
//! road graph/scheduler (`freeserf-economy`) into one running game.
//!
//! This is the crate an embedding host depends on: build a
//! [`SimulationState`], apply [`commands::Command`]s between ticks, and
//! call [`tick::run`] once per due game tick (see
//! [`SimulationState::due_game_ticks`]).

pub mod building_update;
pub mod commands;
pub mod config;
pub mod error;
pub mod player;
pub mod serf_fsm;
pub mod state;
pub mod territory;
pub mod tick;

pub use commands::{apply_command, Command, CommandOutcome};
pub use config::SimulationConfig;
pub use error::SimError;
pub use player::PlayerState;
pub use state::SimulationState;
pub use tick::{TickError, TickSummary};
