//! Per-player priorities, distribution ratios, knight occupation targets,
//! notification queue, and statistics history.

use std::collections::VecDeque;

use freeserf_types::{
    BuildingType, Notification, NotificationKind, PlayerNum, Resource, ThreatLevel,
    BUILDING_TYPE_COUNT_NON_CASTLE, KNIGHT_RANKS, MAX_KNIGHT_TO_SPAWN, MAX_NOTIFICATIONS,
    STATS_RING_LONG, STATS_RING_SHORT, TOOLS,
};

/// Ticks between reproduction-counter resets. Not specified verbatim by
/// the original save format; chosen so a freshly settled realm starts
/// producing generic serfs within the first in-game minute at default
/// speed. See `DESIGN.md`.
const REPRODUCTION_PERIOD_TICKS: u32 = 50;

/// How often (in ticks) land/building/military counts are sampled into
/// the short stats ring.
const STATS_SHORT_PERIOD_TICKS: u64 = 1500;

/// How often (in ticks) per-resource counts are sampled into the long
/// stats ring.
const STATS_LONG_PERIOD_TICKS: u64 = 6000;

/// What a player's reproduction counter reaching zero should do next;
/// the caller resolves this against the entity store (spawning a
/// generic serf needs a free inventory slot, promoting to a knight
/// needs a sword and shield in some owned inventory).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReproductionEvent {
    /// Spawn a fresh generic serf from the realm's best inventory.
    SpawnGeneric,
    /// Attempt to convert an idle generic serf into a rank-0 knight.
    TryKnightPromotion,
}

/// Per-type completed/incomplete building counters, 23 non-castle types.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BuildingCounts {
    /// Finished buildings of each type.
    pub completed: [u16; BUILDING_TYPE_COUNT_NON_CASTLE],
    /// Buildings of each type still under construction.
    pub incomplete: [u16; BUILDING_TYPE_COUNT_NON_CASTLE],
}

impl BuildingCounts {
    fn index_of(kind: BuildingType) -> Option<usize> {
        if kind == BuildingType::Castle {
            return None;
        }
        // `BuildingType` is `#[repr(u8)]` with `Castle = 0`; every other
        // variant is `(kind as u8) - 1` into this 23-entry table.
        Some((kind as u8).saturating_sub(1) as usize)
    }

    /// Record that a building of `kind` started construction.
    pub fn record_started(&mut self, kind: BuildingType) {
        if let Some(idx) = Self::index_of(kind) {
            if let Some(slot) = self.incomplete.get_mut(idx) {
                *slot = slot.saturating_add(1);
            }
        }
    }

    /// Move a building of `kind` from incomplete to completed.
    pub fn record_finished(&mut self, kind: BuildingType) {
        if let Some(idx) = Self::index_of(kind) {
            if let Some(slot) = self.incomplete.get_mut(idx) {
                *slot = slot.saturating_sub(1);
            }
            if let Some(slot) = self.completed.get_mut(idx) {
                *slot = slot.saturating_add(1);
            }
        }
    }

    /// Record that a finished building of `kind` was demolished.
    pub fn record_demolished(&mut self, kind: BuildingType, was_finished: bool) {
        if let Some(idx) = Self::index_of(kind) {
            let table = if was_finished {
                &mut self.completed
            } else {
                &mut self.incomplete
            };
            if let Some(slot) = table.get_mut(idx) {
                *slot = slot.saturating_sub(1);
            }
        }
    }
}

/// Sampled history rings: land/building/military counts every 1500
/// ticks, per-resource totals every 6000 ticks.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PlayerStats {
    /// Land area sampled every `STATS_SHORT_PERIOD_TICKS`.
    pub land: VecDeque<u32>,
    /// Building score sampled every `STATS_SHORT_PERIOD_TICKS`.
    pub buildings: VecDeque<u32>,
    /// Military score sampled every `STATS_SHORT_PERIOD_TICKS`.
    pub military: VecDeque<u32>,
    /// Per-resource inventory totals sampled every
    /// `STATS_LONG_PERIOD_TICKS`.
    pub resources: VecDeque<[u32; 26]>,
}

impl PlayerStats {
    fn push_short(&mut self, land: u32, buildings: u32, military: u32) {
        push_capped(&mut self.land, land, STATS_RING_SHORT);
        push_capped(&mut self.buildings, buildings, STATS_RING_SHORT);
        push_capped(&mut self.military, military, STATS_RING_SHORT);
    }

    fn push_long(&mut self, resources: [u32; 26]) {
        push_capped(&mut self.resources, resources, STATS_RING_LONG);
    }
}

fn push_capped<T>(ring: &mut VecDeque<T>, value: T, cap: usize) {
    if ring.len() >= cap {
        ring.pop_front();
    }
    ring.push_back(value);
}

/// Per-player mutable state: priorities, knight occupation targets,
/// reproduction bookkeeping, scores, notifications, and stats history.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlayerState {
    /// This player's slot number.
    pub player: PlayerNum,
    /// Whether this slot is in active play.
    pub active: bool,
    /// Whether this player is non-human (driven by the basic scheduler
    /// hooks rather than commands).
    pub ai: bool,
    /// Whether a castle has been placed for this player yet.
    pub has_castle: bool,
    /// Flag transport priority per resource (0..26).
    pub flag_prio: [u8; 26],
    /// Inventory stocking priority per resource (0..26).
    pub inventory_prio: [u8; 26],
    /// Tool-making priority per tool kind (0..9), indexed per
    /// [`freeserf_types::TOOLS`].
    pub tool_prio: [u8; 9],
    /// Minimum/maximum garrison size per threat level (0..4).
    pub knight_occupation: [(u8, u8); 4],
    /// Ticks remaining until the next reproduction check.
    pub reproduction_counter: u32,
    /// Accumulated serf-to-knight conversion backlog, capped at
    /// [`MAX_KNIGHT_TO_SPAWN`].
    pub knight_to_spawn: u8,
    /// Total owned tile count.
    pub total_land_area: u32,
    /// Aggregate building score.
    pub total_building_score: u32,
    /// Aggregate military score.
    pub total_military_score: u32,
    /// Per-building-type completed/incomplete counters.
    pub building_counts: BuildingCounts,
    /// Pending notifications, oldest first, capped at
    /// [`MAX_NOTIFICATIONS`].
    pub notifications: VecDeque<Notification>,
    /// Sampled statistics history.
    pub stats: PlayerStats,
    ticks_since_short_sample: u64,
    ticks_since_long_sample: u64,
}

impl PlayerState {
    /// Construct a fresh player slot with the given default priorities.
    #[must_use]
    pub fn new(player: PlayerNum, flag_prio: u8, inventory_prio: u8, tool_prio: u8) -> Self {
        Self {
            player,
            active: false,
            ai: false,
            has_castle: false,
            flag_prio: [flag_prio; 26],
            inventory_prio: [inventory_prio; 26],
            tool_prio: [tool_prio; 9],
            knight_occupation: [(1, 3), (1, 5), (2, 7), (3, 9)],
            reproduction_counter: REPRODUCTION_PERIOD_TICKS,
            knight_to_spawn: 0,
            total_land_area: 0,
            total_building_score: 0,
            total_military_score: 0,
            building_counts: BuildingCounts::default(),
            notifications: VecDeque::new(),
            stats: PlayerStats::default(),
            ticks_since_short_sample: 0,
            ticks_since_long_sample: 0,
        }
    }

    /// This player's configured flag-transport priority for `resource`.
    #[must_use]
    pub fn flag_priority(&self, resource: Resource) -> u8 {
        self.flag_prio.get(resource as usize).copied().unwrap_or(0)
    }

    /// This player's configured tool-making priority for `tool`. Returns
    /// 0 if `tool` is not one of the nine tool resources.
    #[must_use]
    pub fn tool_priority(&self, tool: Resource) -> u8 {
        TOOLS
            .iter()
            .position(|&t| t == tool)
            .and_then(|idx| self.tool_prio.get(idx))
            .copied()
            .unwrap_or(0)
    }

    /// The configured `(min, max)` garrison size for `level`.
    #[must_use]
    pub fn garrison_target(&self, level: ThreatLevel) -> (u8, u8) {
        self.knight_occupation
            .get(level.index())
            .copied()
            .unwrap_or((0, 0))
    }

    /// Append a notification, dropping the oldest if the queue is at
    /// capacity.
    pub fn notify(&mut self, kind: NotificationKind, pos: freeserf_map::Pos) {
        if self.notifications.len() >= MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
        self.notifications.push_back(Notification::new(kind, pos));
    }

    /// Advance per-tick bookkeeping: the reproduction counter and the
    /// statistics sampling cadence. Returns a reproduction event when
    /// the counter reaches zero; the caller resolves it against the
    /// entity store since spawning/promoting needs inventory access.
    ///
    /// `total_resources` is the realm-wide per-resource inventory total,
    /// passed in by the caller for the 6000-tick sample.
    pub fn tick(
        &mut self,
        elapsed_ticks: u32,
        total_resources: [u32; 26],
    ) -> Option<ReproductionEvent> {
        self.ticks_since_short_sample = self
            .ticks_since_short_sample
            .saturating_add(u64::from(elapsed_ticks));
        if self.ticks_since_short_sample >= STATS_SHORT_PERIOD_TICKS {
            self.ticks_since_short_sample = 0;
            self.stats.push_short(
                self.total_land_area,
                self.total_building_score,
                self.total_military_score,
            );
        }

        self.ticks_since_long_sample = self
            .ticks_since_long_sample
            .saturating_add(u64::from(elapsed_ticks));
        if self.ticks_since_long_sample >= STATS_LONG_PERIOD_TICKS {
            self.ticks_since_long_sample = 0;
            self.stats.push_long(total_resources);
        }

        if !self.active || !self.has_castle {
            return None;
        }

        self.reproduction_counter = self.reproduction_counter.saturating_sub(elapsed_ticks);
        if self.reproduction_counter > 0 {
            return None;
        }
        self.reproduction_counter = REPRODUCTION_PERIOD_TICKS;

        if self.knight_to_spawn < MAX_KNIGHT_TO_SPAWN {
            self.knight_to_spawn = self.knight_to_spawn.saturating_add(1);
            Some(ReproductionEvent::TryKnightPromotion)
        } else {
            self.knight_to_spawn = 0;
            Some(ReproductionEvent::SpawnGeneric)
        }
    }
}

/// Every knight rank, highest first — the order `demolish`'s
/// over-staffed-garrison discharge walks when picking the weakest knight
/// to release.
#[must_use]
pub fn knight_ranks_weakest_first() -> impl Iterator<Item = freeserf_types::SerfType> {
    KNIGHT_RANKS.into_iter()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn notify_caps_at_max_and_drops_oldest() {
        let mut player = PlayerState::new(0, 1, 1, 1);
        for i in 0..MAX_NOTIFICATIONS + 5 {
            player.notify(NotificationKind::MineEmpty, i as u32);
        }
        assert_eq!(player.notifications.len(), MAX_NOTIFICATIONS);
        assert_eq!(player.notifications.front().unwrap().pos, 5);
    }

    #[test]
    fn reproduction_counter_alternates_spawn_and_promotion() {
        let mut player = PlayerState::new(0, 1, 1, 1);
        player.active = true;
        player.has_castle = true;
        let first = player.tick(REPRODUCTION_PERIOD_TICKS, [0; 26]);
        assert_eq!(first, Some(ReproductionEvent::TryKnightPromotion));
        let second = player.tick(REPRODUCTION_PERIOD_TICKS, [0; 26]);
        assert_eq!(second, Some(ReproductionEvent::SpawnGeneric));
    }

    #[test]
    fn inactive_player_has_no_reproduction_events() {
        let mut player = PlayerState::new(0, 1, 1, 1);
        assert_eq!(player.tick(u32::MAX, [0; 26]), None);
    }

    #[test]
    fn building_counts_track_lifecycle() {
        let mut counts = BuildingCounts::default();
        counts.record_started(BuildingType::Sawmill);
        assert_eq!(counts.incomplete[BuildingType::Sawmill as usize - 1], 1);
        counts.record_finished(BuildingType::Sawmill);
        assert_eq!(counts.incomplete[BuildingType::Sawmill as usize - 1], 0);
        assert_eq!(counts.completed[BuildingType::Sawmill as usize - 1], 1);
    }

    #[test]
    fn stats_rings_cap_at_configured_size() {
        let mut stats = PlayerStats::default();
        for i in 0..(STATS_RING_SHORT + 10) {
            stats.push_short(i as u32, 0, 0);
        }
        assert_eq!(stats.land.len(), STATS_RING_SHORT);
    }
}
