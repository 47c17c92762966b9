//! Snapshot persistence for a running simulation.
//!
//! A snapshot captures an entire [`freeserf_sim::SimulationState`] —
//! map, entity arenas, RNG, and per-player bookkeeping — behind a
//! version tag, so the engine binary can save on shutdown and resume
//! from the same point later.

pub mod error;
pub mod snapshot;

pub use error::PersistError;
pub use snapshot::{load, load_from_path, save, save_to_path, SNAPSHOT_FORMAT_VERSION};
