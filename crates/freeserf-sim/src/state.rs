//! The simulation's single piece of global state.
//!
//! Every other module in this crate borrows pieces of a `SimulationState`
//! rather than owning anything itself — there is exactly one of these per
//! running game, matching the "no singletons" design note: the map, every
//! entity arena, the RNG, the flag-search generation counter, and the
//! per-player bookkeeping all live here as plain fields.

use freeserf_economy::SearchCounter;
use freeserf_entities::EntityStore;
use freeserf_map::{Map, MapUpdateConfig};
use freeserf_types::{PlayerNum, Rng};

use crate::config::{PriorityConfig, WorldConfig};
use crate::player::PlayerState;

/// One accumulated "game tick" per `0x1_0000` units of `game_speed` added
/// to the animation accumulator each real tick, matching the original
/// engine's 16.16 fixed-point speed control.
pub const SPEED_FRACTION_BITS: u32 = 16;

/// Everything that makes up one running game: the map, every entity
/// arena, the deterministic RNG, the flag-search generation counter, and
/// the per-player state slots.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SimulationState {
    /// The hex-tile map.
    pub map: Map,
    /// Flag/building/inventory/serf arenas.
    pub entities: EntityStore,
    /// Shared flag-search generation counter.
    pub search_counter: SearchCounter,
    /// The simulation's one and only randomness source.
    pub rng: Rng,
    /// Per-player state, indexed by `PlayerNum`.
    pub players: Vec<PlayerState>,
    /// Monotonic game tick counter, advanced by `Tick::run`.
    pub game_tick: u32,
    /// Current game speed: game ticks advanced per real tick, 16.16
    /// fixed-point (`0x1_0000` = 1.0).
    pub game_speed: u32,
    /// Sub-tick accumulator driving the fixed-point speed control.
    pub anim: u32,
    /// Whether the simulation is currently paused (no game ticks advance,
    /// though the real-time clock keeps running).
    pub paused: bool,
}

impl SimulationState {
    /// Build a fresh simulation: a blank map of the configured dimensions,
    /// empty entity arenas sized for it, and one inactive player slot per
    /// `world.player_count`.
    ///
    /// # Errors
    ///
    /// Returns [`freeserf_map::MapError`] if `world.cols`/`world.rows` are
    /// not powers of two.
    pub fn new(
        world: &WorldConfig,
        priorities: &PriorityConfig,
        game_speed: u32,
    ) -> Result<Self, freeserf_map::MapError> {
        let map = Map::new(world.cols, world.rows, MapUpdateConfig::default())?;
        let tile_count = map.tile_count() as u32;
        let entities = EntityStore::new(tile_count, u32::from(world.player_count));
        let players = (0..world.player_count)
            .map(|p| {
                PlayerState::new(
                    p,
                    priorities.flag_prio,
                    priorities.inventory_prio,
                    priorities.tool_prio,
                )
            })
            .collect();
        Ok(Self {
            map,
            entities,
            search_counter: SearchCounter::new(),
            rng: Rng::new(world.seed),
            players,
            game_tick: 0,
            game_speed,
            anim: 0,
            paused: false,
        })
    }

    /// The player slot for `player`, if it exists.
    #[must_use]
    pub fn player(&self, player: PlayerNum) -> Option<&PlayerState> {
        self.players.get(player as usize)
    }

    /// Mutable access to the player slot for `player`.
    pub fn player_mut(&mut self, player: PlayerNum) -> Option<&mut PlayerState> {
        self.players.get_mut(player as usize)
    }

    /// Realm-wide per-resource inventory totals across every player's
    /// inventories, for the long stats ring sample.
    #[must_use]
    pub fn resource_totals(&self) -> [u32; 26] {
        let mut totals = [0u32; 26];
        for (_, inv) in self.entities.inventories.iter() {
            for (slot, count) in totals.iter_mut().zip(inv.resources.iter()) {
                *slot = slot.saturating_add(u32::from(*count));
            }
        }
        totals
    }

    /// How many whole game ticks are due this real tick, given the
    /// current speed. Advances `anim` and returns the count (0 while
    /// paused or when speed hasn't accumulated a full tick yet).
    pub fn due_game_ticks(&mut self) -> u32 {
        if self.paused {
            return 0;
        }
        self.anim = self.anim.saturating_add(self.game_speed);
        let mut count = 0u32;
        while self.anim >= (1 << SPEED_FRACTION_BITS) {
            self.anim -= 1 << SPEED_FRACTION_BITS;
            count = count.saturating_add(1);
        }
        count
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn world() -> WorldConfig {
        WorldConfig {
            cols: 32,
            rows: 32,
            seed: (1, 2, 3),
            player_count: 2,
        }
    }

    #[test]
    fn new_state_has_inactive_player_slots() {
        let state = SimulationState::new(&world(), &PriorityConfig::default(), 0x1_0000).unwrap();
        assert_eq!(state.players.len(), 2);
        assert!(!state.players[0].active);
    }

    #[test]
    fn due_game_ticks_respects_speed() {
        let mut state = SimulationState::new(&world(), &PriorityConfig::default(), 0x1_0000).unwrap();
        assert_eq!(state.due_game_ticks(), 1);
        state.game_speed = 0;
        assert_eq!(state.due_game_ticks(), 0);
    }

    #[test]
    fn paused_state_advances_no_game_ticks() {
        let mut state = SimulationState::new(&world(), &PriorityConfig::default(), 0x2_0000).unwrap();
        state.paused = true;
        assert_eq!(state.due_game_ticks(), 0);
    }
}
