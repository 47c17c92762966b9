//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds the broadcast channel used to push a
//! [`TickBroadcast`] to every connected `WebSocket` client, plus an
//! in-memory [`SimulationSnapshot`] the REST handlers read from. The
//! engine binary owns the only writer: it refreshes the snapshot and
//! publishes a broadcast once per completed game tick, so a request
//! handler never blocks the tick loop.

use std::sync::Arc;

use freeserf_sim::PlayerState;
use tokio::sync::{broadcast, RwLock};

/// Capacity of the tick broadcast channel.
///
/// A subscriber that falls behind by more than this many ticks receives
/// a [`broadcast::error::RecvError::Lagged`] and resumes from the
/// newest message rather than blocking the channel.
const BROADCAST_CAPACITY: usize = 256;

/// The JSON-serializable message pushed over `/ws` after every tick.
///
/// This is exactly the shape of [`freeserf_sim::TickSummary`]; the
/// observer re-exports it under its own name rather than wrapping it,
/// since the summary is already a plain, self-contained DTO with
/// nothing from the simulation kernel's internals to hide.
pub type TickBroadcast = freeserf_sim::TickSummary;

/// In-memory snapshot of simulation state served by the REST handlers.
///
/// Updated once per game tick by the engine; every field here is cheap
/// to clone so a handler can read it without holding the lock across an
/// `await`.
#[derive(Debug, Clone)]
pub struct SimulationSnapshot {
    /// The most recently completed game tick.
    pub game_tick: u32,
    /// Current game speed (16.16 fixed-point ticks per real tick).
    pub game_speed: u32,
    /// Whether the simulation is currently paused.
    pub paused: bool,
    /// Map column count.
    pub map_cols: u32,
    /// Map row count.
    pub map_rows: u32,
    /// Per-player state, indexed the same way as
    /// [`freeserf_sim::SimulationState::players`].
    pub players: Vec<PlayerState>,
}

impl Default for SimulationSnapshot {
    fn default() -> Self {
        Self {
            game_tick: 0,
            game_speed: 0,
            paused: true,
            map_cols: 0,
            map_rows: 0,
            players: Vec::new(),
        }
    }
}

impl SimulationSnapshot {
    /// Find a player slot by its player number.
    #[must_use]
    pub fn player(&self, player: freeserf_types::PlayerNum) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.player == player)
    }
}

/// Shared state for the Axum application.
///
/// Cloning an `AppState` is cheap — the broadcast sender and the
/// snapshot lock are both reference-counted internally.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for tick summary messages.
    tx: broadcast::Sender<TickBroadcast>,
    /// The current simulation snapshot, refreshed once per tick.
    pub snapshot: Arc<RwLock<SimulationSnapshot>>,
}

impl AppState {
    /// Create a fresh application state with an empty snapshot and no
    /// subscribers yet.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            snapshot: Arc::new(RwLock::new(SimulationSnapshot::default())),
        }
    }

    /// Subscribe to the tick broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<TickBroadcast> {
        self.tx.subscribe()
    }

    /// Publish a tick summary to all connected clients.
    ///
    /// Returns the number of receivers that got the message. Zero is
    /// not an error — it just means no `WebSocket` client is connected.
    pub fn broadcast(&self, summary: &TickBroadcast) -> usize {
        self.tx.send(summary.clone()).unwrap_or(0)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_with_no_subscribers_returns_zero() {
        let state = AppState::new();
        assert_eq!(state.broadcast(&TickBroadcast::default()), 0);
    }

    #[test]
    fn subscriber_receives_broadcast_message() {
        let state = AppState::new();
        let mut rx = state.subscribe();
        let summary = TickBroadcast {
            game_tick: 7,
            ..TickBroadcast::default()
        };
        assert_eq!(state.broadcast(&summary), 1);
        let received = rx.try_recv().unwrap();
        assert_eq!(received.game_tick, 7);
    }

    #[test]
    fn snapshot_player_lookup_finds_matching_slot() {
        let mut snapshot = SimulationSnapshot::default();
        snapshot.players.push(PlayerState::new(0, 64, 64, 64));
        snapshot.players.push(PlayerState::new(1, 64, 64, 64));
        assert!(snapshot.player(1).is_some());
        assert!(snapshot.player(2).is_none());
    }
}
