//! Integration tests for snapshot save/load through the file-path API.
//!
//! Unlike the teacher's `emergence-db` integration suite, this crate's
//! persistence has no external service to stand up — a snapshot is a
//! plain file — so these tests run unconditionally under `cargo test`.

#![allow(clippy::unwrap_used)]

use freeserf_persistence::{load_from_path, save_to_path, PersistError};
use freeserf_sim::config::{PriorityConfig, WorldConfig};
use freeserf_sim::SimulationState;

fn sample_state() -> SimulationState {
    let world = WorldConfig {
        cols: 64,
        rows: 64,
        seed: (42, 17, 3),
        player_count: 3,
    };
    SimulationState::new(&world, &PriorityConfig::default(), 0x2_0000).unwrap()
}

fn scratch_path(name: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "freeserf-persistence-test-{name}-{}.json",
        std::process::id()
    ));
    path
}

#[test]
fn save_to_path_then_load_from_path_roundtrips() {
    let path = scratch_path("roundtrip");
    let state = sample_state();

    save_to_path(&path, &state).unwrap();
    let restored = load_from_path(&path).unwrap();

    assert_eq!(restored.game_tick, state.game_tick);
    assert_eq!(restored.game_speed, state.game_speed);
    assert_eq!(restored.map.cols(), state.map.cols());
    assert_eq!(restored.map.rows(), state.map.rows());
    assert_eq!(restored.players.len(), state.players.len());
    assert_eq!(restored.rng, state.rng);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn load_from_path_surfaces_io_error_for_missing_file() {
    let path = scratch_path("does-not-exist");
    let _ = std::fs::remove_file(&path);

    let result = load_from_path(&path);
    assert!(matches!(result, Err(PersistError::Io(_))));
}

#[test]
fn save_overwrites_an_existing_snapshot() {
    let path = scratch_path("overwrite");
    let first = sample_state();
    save_to_path(&path, &first).unwrap();

    let mut second = sample_state();
    second.game_tick = first.game_tick + 1000;
    save_to_path(&path, &second).unwrap();

    let restored = load_from_path(&path).unwrap();
    assert_eq!(restored.game_tick, second.game_tick);

    let _ = std::fs::remove_file(&path);
}
