//! Snapshot read/write over any [`std::io::Write`]/[`std::io::Read`].
//!
//! A snapshot is the entire [`SimulationState`] — map, entity arenas,
//! RNG, search counter, and per-player state — wrapped with a format
//! version so a future incompatible change can be detected cleanly
//! instead of producing a confusing deserialization error partway
//! through a section.
//!
//! The original save format lays out a fixed binary layout: an
//! allocation bitmap followed by fixed-size records per section, in the
//! order Globals, Players, Map, Serfs, Flags, Buildings, Inventories.
//! This crate preserves that *shape* — one self-describing section per
//! component, each of which already carries its own allocation bitmap
//! (an `Arena`'s `Vec<Option<T>>` slots serve that role directly) — but
//! serializes it as JSON via `serde_json` rather than hand-packed
//! bitfields. See `DESIGN.md` for the full rationale.

use std::io::{Read, Write};

use freeserf_sim::SimulationState;
use tracing::{debug, info};

use crate::error::PersistError;

/// The current on-disk/on-wire snapshot format version. Bump this any
/// time a change to `SimulationState`'s shape would make an old
/// snapshot fail to deserialize, so [`load`] can report
/// [`PersistError::VersionMismatch`] instead of a raw JSON error.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// The versioned envelope written to a snapshot stream.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Snapshot {
    version: u32,
    state: SimulationState,
}

/// Serialize `state` to `writer` as a versioned snapshot.
///
/// # Errors
///
/// Returns [`PersistError::Io`] if the write fails, or
/// [`PersistError::Serialization`] if `state` cannot be serialized
/// (this should never happen for a well-formed `SimulationState`).
pub fn save<W: Write>(writer: W, state: &SimulationState) -> Result<(), PersistError> {
    let snapshot = Snapshot {
        version: SNAPSHOT_FORMAT_VERSION,
        state: state.clone(),
    };
    serde_json::to_writer(writer, &snapshot)?;
    debug!(
        game_tick = snapshot.state.game_tick,
        version = SNAPSHOT_FORMAT_VERSION,
        "wrote snapshot"
    );
    Ok(())
}

/// Deserialize a [`SimulationState`] from `reader`.
///
/// # Errors
///
/// Returns [`PersistError::Io`] if the read fails,
/// [`PersistError::Serialization`] if the bytes are not a valid
/// snapshot, or [`PersistError::VersionMismatch`] if the snapshot was
/// written by an incompatible format version. A version mismatch and a
/// malformed body are both treated as fatal per the core's "corrupt
/// state during load is fatal" policy — neither is recoverable by the
/// caller.
pub fn load<R: Read>(reader: R) -> Result<SimulationState, PersistError> {
    let snapshot: Snapshot = serde_json::from_reader(reader)?;
    if snapshot.version != SNAPSHOT_FORMAT_VERSION {
        return Err(PersistError::VersionMismatch {
            found: snapshot.version,
            expected: SNAPSHOT_FORMAT_VERSION,
        });
    }
    info!(game_tick = snapshot.state.game_tick, "loaded snapshot");
    Ok(snapshot.state)
}

/// Write `state` to a snapshot file at `path`, creating or truncating
/// it as needed.
///
/// # Errors
///
/// See [`save`].
pub fn save_to_path(
    path: impl AsRef<std::path::Path>,
    state: &SimulationState,
) -> Result<(), PersistError> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    save(std::io::BufWriter::new(file), state)?;
    info!(path = %path.display(), "snapshot saved");
    Ok(())
}

/// Load a [`SimulationState`] from a snapshot file at `path`.
///
/// # Errors
///
/// See [`load`].
pub fn load_from_path(
    path: impl AsRef<std::path::Path>,
) -> Result<SimulationState, PersistError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let state = load(std::io::BufReader::new(file))?;
    info!(path = %path.display(), "snapshot loaded");
    Ok(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use freeserf_sim::config::{PriorityConfig, WorldConfig};

    use super::*;

    fn sample_state() -> SimulationState {
        let world = WorldConfig {
            cols: 32,
            rows: 32,
            seed: (7, 11, 13),
            player_count: 2,
        };
        SimulationState::new(&world, &PriorityConfig::default(), 0x1_0000).unwrap()
    }

    #[test]
    fn save_then_load_roundtrips_in_memory() {
        let state = sample_state();
        let mut buf = Vec::new();
        save(&mut buf, &state).unwrap();
        let restored = load(buf.as_slice()).unwrap();
        assert_eq!(restored.game_tick, state.game_tick);
        assert_eq!(restored.map.cols(), state.map.cols());
        assert_eq!(restored.players.len(), state.players.len());
    }

    #[test]
    fn load_rejects_a_future_format_version() {
        let state = sample_state();
        let snapshot = Snapshot {
            version: SNAPSHOT_FORMAT_VERSION + 1,
            state,
        };
        let mut buf = Vec::new();
        serde_json::to_writer(&mut buf, &snapshot).unwrap();
        let result = load(buf.as_slice());
        assert!(matches!(result, Err(PersistError::VersionMismatch { .. })));
    }

    #[test]
    fn load_rejects_garbage_bytes() {
        let result = load(b"not json at all".as_slice());
        assert!(matches!(result, Err(PersistError::Serialization(_))));
    }
}
