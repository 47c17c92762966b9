//! The serf: one tagged-union state machine per worker, stepped once per
//! tick.
//!
//! Sixty-some original C states collapse here into one `SerfState` enum
//! whose variants carry exactly the payload that state needs — per the
//! "enum explosion" design note, this is still a single `match` the
//! compiler lowers to a jump table, but groups of states that differed
//! only by a baked-in constant (the six `PLANNING_*` variants, the
//! several `FREE_WALKING` terminal actions) now differ by an enum field
//! instead. The actual per-tick transition logic lives in `freeserf-sim`,
//! which has the map and road-graph access the transitions need; this
//! module only owns the data each state carries between ticks.

use freeserf_types::{BuildingId, Direction, FlagId, Resource, SerfType};
use serde::{Deserialize, Serialize};

use freeserf_map::Pos;

/// What a free-walking serf is walking toward doing once it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreeWalkingGoal {
    /// Felling a tree (lumberjack).
    Logging,
    /// Planting a sapling (forester).
    Planting,
    /// Quarrying stone (stonecutter).
    StoneCutting,
    /// Catching fish (fisher).
    Fishing,
    /// Tending a wheat field (farmer).
    Farming,
    /// Sampling ground for a deposit (geologist).
    SamplingGeoSpot,
    /// Engaging a hostile building, carrying the target building's id.
    KnightAttacking(BuildingId),
    /// Defending a contested tile in the field (knight).
    KnightDefending,
}

/// What a construction-walk ("building" FSM family) serf is doing at the
/// site: leveling the ground, or consuming delivered materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstructionPhase {
    /// Leveling the six hex corners of the site (`digging.substate`).
    Leveling {
        /// Which of the six corners is currently being leveled.
        corner: u8,
    },
    /// Consuming planks/stone at progress breakpoints
    /// (`building.material_step`).
    Delivering {
        /// Which material delivery step this is.
        step: u8,
    },
}

/// A production-cycle serf's current phase within its fixed-interval
/// loop (mining, smelting, milling, baking,...). The interpretation of
/// the numeric phase is per building type, resolved in `freeserf-sim`.
pub type ProductionPhase = u8;

/// Carried resource or routing marker for a walking/transporting serf.
/// `None` is "nothing carried"; the two special markers from the
/// original encoding become explicit variants instead of magic negative
/// numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkCargo {
    /// Nothing carried; walking to a target flag.
    ToFlag,
    /// Nothing carried; the destination was cleared mid-walk and must be
    /// re-resolved.
    DestinationCleared,
    /// Carrying a resource, scheduled out the given direction.
    Carrying(Resource, Direction),
}

/// The serf state machine. One `match` dispatches every per-tick
/// transition in `freeserf-sim`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SerfState {
    /// Resting inside an inventory, not yet dispatched.
    IdleInStock,
    /// Dispatched; about to leave the inventory and walk onto the road
    /// network.
    ReadyToLeaveInventory {
        /// The flag the serf will first walk to.
        dest_flag: FlagId,
        /// What the serf is carrying, if anything, as it leaves.
        cargo: Option<Resource>,
    },
    /// Walking the road network toward a flag or building, re-deciding
    /// direction at each flag from `other_end_dir` fetch markers.
    Walking {
        /// The flag this walk currently targets.
        dest_flag: FlagId,
        /// Cargo/routing state for this walk.
        cargo: WalkCargo,
    },
    /// A transporter actively shuttling a resource along one road
    /// segment.
    Transporting {
        /// The resource being carried.
        resource: Resource,
        /// The edge direction being walked.
        dir: Direction,
        /// Ticks waited so far at the current flag for a free slot.
        wait_counter: u8,
    },
    /// Delivering a carried resource into a building (final steps before
    /// `EnteringBuilding`).
    Delivering {
        /// The resource being delivered.
        resource: Resource,
        /// The destination building.
        building: BuildingId,
    },
    /// Fixed-length ramp animation: entering a building.
    EnteringBuilding {
        /// The building being entered.
        building: BuildingId,
        /// The state to transition to once the animation completes.
        next: Box<SerfState>,
    },
    /// Fixed-length ramp animation: leaving a building.
    LeavingBuilding {
        /// The state to transition to once the animation completes.
        next: Box<SerfState>,
    },
    /// About to enter a building once the current occupant leaves.
    ReadyToEnter {
        /// The building waiting to be entered.
        building: BuildingId,
    },
    /// About to leave a building once the ramp animation starts.
    ReadyToLeave,
    /// Leveling a construction site or consuming delivered materials.
    Digging {
        /// The building under construction.
        building: BuildingId,
        /// Current leveling/consumption phase.
        phase: ConstructionPhase,
    },
    /// Actively building (post-leveling) a non-castle structure.
    Building {
        /// The building under construction.
        building: BuildingId,
        /// Current leveling/consumption phase.
        phase: ConstructionPhase,
    },
    /// Building the castle specifically (distinct animation set in the
    /// original engine; functionally the same accounting).
    BuildingCastle {
        /// The castle building.
        building: BuildingId,
    },
    /// Inventory-to-flag handoff: moving a resource out to the attached
    /// flag.
    MoveResourceOut {
        /// The resource being moved out.
        resource: Resource,
        /// The destination flag.
        dest_flag: FlagId,
        /// What to do once the resource is handed off.
        next: Box<SerfState>,
    },
    /// Waiting inside the inventory for a free flag slot before handing
    /// off a queued resource.
    WaitForResourceOut,
    /// Dropping a resource onto the attached flag's slot.
    DropResourceOut {
        /// The resource being dropped.
        resource: Resource,
        /// The destination flag.
        dest_flag: FlagId,
    },
    /// Pathless movement: a Manhattan-on-hex descent toward a target
    /// tile, with collision avoidance.
    FreeWalking {
        /// Remaining column distance to the target.
        dist_col: i8,
        /// Remaining row distance to the target.
        dist_row: i8,
        /// Negative-direction retry counters used by the collision
        /// avoidance sub-routine.
        neg1: i8,
        /// See `neg1`.
        neg2: i8,
        /// Misc. state flags (original engine's `flags` byte).
        flags: u8,
        /// What the serf intends to do on arrival.
        goal: FreeWalkingGoal,
    },
    /// Picking a target tile by scanning a spiral around the home
    /// building, before transitioning to `FreeWalking`.
    Planning {
        /// The home building this serf is working for.
        building: BuildingId,
        /// What the serf will do once a target tile is found.
        goal: FreeWalkingGoal,
    },
    /// A geologist's random walk, planting prospecting signs.
    LookingForGeoSpot,
    /// A geologist sampling a specific spot, about to plant a sign.
    SamplingGeoSpot {
        /// Ticks spent sampling so far.
        progress: u8,
    },
    /// Felling a tree.
    Logging {
        /// Phase within the felling animation.
        phase: ProductionPhase,
    },
    /// Planting a sapling.
    Planting {
        /// Phase within the planting animation.
        phase: ProductionPhase,
    },
    /// Quarrying stone.
    StoneCutting {
        /// Phase within the quarrying animation.
        phase: ProductionPhase,
    },
    /// Catching fish.
    Fishing {
        /// Phase within the fishing animation.
        phase: ProductionPhase,
    },
    /// Tending a wheat field.
    Farming {
        /// Phase within the farming animation.
        phase: ProductionPhase,
    },
    /// Sawing lumber into planks.
    Sawing {
        /// Phase within the sawing cycle.
        phase: ProductionPhase,
    },
    /// The four-phase mining cycle: enter, dig, eat, exit with ore.
    Mining {
        /// Current phase, 0..4.
        phase: ProductionPhase,
    },
    /// Smelting ore into steel or gold bars.
    Smelting {
        /// Phase within the smelting cycle.
        phase: ProductionPhase,
        /// The resource being produced.
        output: Resource,
    },
    /// Milling wheat into flour.
    Milling {
        /// Phase within the milling cycle.
        phase: ProductionPhase,
    },
    /// Baking bread.
    Baking {
        /// Phase within the baking cycle.
        phase: ProductionPhase,
    },
    /// Raising pigs.
    PigFarming {
        /// Phase within the pig-farming cycle.
        phase: ProductionPhase,
    },
    /// Butchering pigs into meat.
    Butchering {
        /// Phase within the butchering cycle.
        phase: ProductionPhase,
    },
    /// Making a sword or shield.
    MakingWeapon {
        /// Phase within the weaponsmithing cycle.
        phase: ProductionPhase,
    },
    /// Making a tool.
    MakingTool {
        /// Phase within the toolmaking cycle.
        phase: ProductionPhase,
    },
    /// Building a boat.
    BuildingBoat {
        /// Phase within the boat-building cycle.
        phase: ProductionPhase,
    },
    /// A knight approaching a hostile military building.
    KnightEngagingBuilding {
        /// The building being sieged.
        target: BuildingId,
    },
    /// Selecting the defender's slot before a duel.
    KnightPrepareAttacking {
        /// The building being sieged.
        target: BuildingId,
    },
    /// Field-combat variant of `KnightPrepareAttacking` (not adjacent to
    /// a building).
    KnightPrepareAttackingFree,
    /// Field-combat variant for the defending knight.
    KnightPrepareDefendingFree,
    /// Running a rounds-of-d20 duel against a building's defender.
    KnightAttacking {
        /// Current round number.
        round: u8,
        /// The building being sieged.
        target: BuildingId,
    },
    /// Field-combat variant of `KnightAttacking`.
    KnightAttackingFree {
        /// Current round number.
        round: u8,
    },
    /// Waiting for the paired combatant to resolve the current round in
    /// a field fight.
    KnightAttackingFreeWait,
    /// Won the duel; walking home.
    KnightAttackingVictory,
    /// Lost the duel; dying.
    KnightAttackingDefeat,
    /// Field-combat variant of `KnightAttackingVictory`.
    KnightAttackingVictoryFree,
    /// Field-combat variant of `KnightAttackingDefeat`.
    KnightAttackingDefeatFree,
    /// Occupying a captured enemy building; triggers territory
    /// recomputation.
    OccupyEnemyBuilding,
    /// Walking out of a hut/tower/fortress/castle to engage a field
    /// fight.
    KnightLeaveForWalkToFight {
        /// The building being sieged.
        target: BuildingId,
    },
    /// Idling at a known position on a road segment, between transport
    /// jobs.
    IdleOnPath {
        /// The flag this segment connects to.
        flag: FlagId,
        /// The direction from that flag.
        dir: Direction,
    },
    /// Waiting, idle, on a path for a transporter slot to free up.
    WaitIdleOnPath,
    /// Woken at a flag to resume transporting.
    WakeAtFlag,
    /// Woken on a path to resume transporting.
    WakeOnPath,
    /// Scattering after a road segment was demolished out from under the
    /// serf.
    Scatter,
    /// A construction serf's terminal bookkeeping state once a building
    /// finishes.
    FinishedBuilding,
    /// Garrison bookkeeping: defending a hut.
    DefendingHut,
    /// Garrison bookkeeping: defending a tower.
    DefendingTower,
    /// Garrison bookkeeping: defending a fortress.
    DefendingFortress,
    /// Garrison bookkeeping: defending a castle.
    DefendingCastle,
    /// Recovery: walking outward looking for owned territory, for up to
    /// a fixed number of ticks before dying.
    Lost {
        /// Ticks spent lost so far.
        ticks: u16,
    },
    /// Recovery for a sailor whose water segment was demolished.
    LostSailor,
    /// Escaping a demolished/burning building.
    EscapeBuilding,
}

impl SerfState {
    /// A human-readable tag for logging/observer snapshots, independent
    /// of payload contents.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::IdleInStock => "idle_in_stock",
            Self::ReadyToLeaveInventory {.. } => "ready_to_leave_inventory",
            Self::Walking {.. } => "walking",
            Self::Transporting {.. } => "transporting",
            Self::Delivering {.. } => "delivering",
            Self::EnteringBuilding {.. } => "entering_building",
            Self::LeavingBuilding {.. } => "leaving_building",
            Self::ReadyToEnter {.. } => "ready_to_enter",
            Self::ReadyToLeave => "ready_to_leave",
            Self::Digging {.. } => "digging",
            Self::Building {.. } => "building",
            Self::BuildingCastle {.. } => "building_castle",
            Self::MoveResourceOut {.. } => "move_resource_out",
            Self::WaitForResourceOut => "wait_for_resource_out",
            Self::DropResourceOut {.. } => "drop_resource_out",
            Self::FreeWalking {.. } => "free_walking",
            Self::Planning {.. } => "planning",
            Self::LookingForGeoSpot => "looking_for_geo_spot",
            Self::SamplingGeoSpot {.. } => "sampling_geo_spot",
            Self::Logging {.. } => "logging",
            Self::Planting {.. } => "planting",
            Self::StoneCutting {.. } => "stonecutting",
            Self::Fishing {.. } => "fishing",
            Self::Farming {.. } => "farming",
            Self::Sawing {.. } => "sawing",
            Self::Mining {.. } => "mining",
            Self::Smelting {.. } => "smelting",
            Self::Milling {.. } => "milling",
            Self::Baking {.. } => "baking",
            Self::PigFarming {.. } => "pig_farming",
            Self::Butchering {.. } => "butchering",
            Self::MakingWeapon {.. } => "making_weapon",
            Self::MakingTool {.. } => "making_tool",
            Self::BuildingBoat {.. } => "building_boat",
            Self::KnightEngagingBuilding {.. } => "knight_engaging_building",
            Self::KnightPrepareAttacking {.. } => "knight_prepare_attacking",
            Self::KnightPrepareAttackingFree => "knight_prepare_attacking_free",
            Self::KnightPrepareDefendingFree => "knight_prepare_defending_free",
            Self::KnightAttacking {.. } => "knight_attacking",
            Self::KnightAttackingFree {.. } => "knight_attacking_free",
            Self::KnightAttackingFreeWait => "knight_attacking_free_wait",
            Self::KnightAttackingVictory => "knight_attacking_victory",
            Self::KnightAttackingDefeat => "knight_attacking_defeat",
            Self::KnightAttackingVictoryFree => "knight_attacking_victory_free",
            Self::KnightAttackingDefeatFree => "knight_attacking_defeat_free",
            Self::OccupyEnemyBuilding => "occupy_enemy_building",
            Self::KnightLeaveForWalkToFight {.. } => "knight_leave_for_walk_to_fight",
            Self::IdleOnPath {.. } => "idle_on_path",
            Self::WaitIdleOnPath => "wait_idle_on_path",
            Self::WakeAtFlag => "wake_at_flag",
            Self::WakeOnPath => "wake_on_path",
            Self::Scatter => "scatter",
            Self::FinishedBuilding => "finished_building",
            Self::DefendingHut => "defending_hut",
            Self::DefendingTower => "defending_tower",
            Self::DefendingFortress => "defending_fortress",
            Self::DefendingCastle => "defending_castle",
            Self::Lost {.. } => "lost",
            Self::LostSailor => "lost_sailor",
            Self::EscapeBuilding => "escape_building",
        }
    }
}

/// A worker unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Serf {
    /// Serf kind and owning player.
    pub kind: SerfType,
    /// Owning player.
    pub owner: freeserf_types::PlayerNum,
    /// Current animation id, selected by the active state's handler.
    pub animation: u16,
    /// Ticks remaining (1/1000-tick units) until the next micro-step.
    pub counter: i32,
    /// Current map position.
    pub pos: Pos,
    /// Tick timestamp of the last state update, for elapsed-time deltas.
    pub tick: u32,
    /// The current state and its payload.
    pub state: SerfState,
}

impl Serf {
    /// Construct a serf freshly spawned from an inventory.
    #[must_use]
    pub const fn new(kind: SerfType, owner: freeserf_types::PlayerNum, pos: Pos, tick: u32) -> Self {
        Self {
            kind,
            owner,
            animation: 0,
            counter: 0,
            pos,
            tick,
            state: SerfState::IdleInStock,
        }
    }

    /// Whether this serf is one of the five knight ranks.
    #[must_use]
    pub const fn is_knight(&self) -> bool {
        self.kind.knight_level().is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_serf_starts_idle_in_stock() {
        let serf = Serf::new(SerfType::Generic, 0, 0, 0);
        assert!(matches!(serf.state, SerfState::IdleInStock));
        assert_eq!(serf.state.tag(), "idle_in_stock");
    }

    #[test]
    fn knight_detection() {
        let knight = Serf::new(SerfType::Knight2, 0, 0, 0);
        let transporter = Serf::new(SerfType::Transporter, 0, 0, 0);
        assert!(knight.is_knight());
        assert!(!transporter.is_knight());
    }

    #[test]
    fn leaving_building_chains_next_state() {
        let state = SerfState::LeavingBuilding {
            next: Box::new(SerfState::ReadyToLeave),
        };
        assert_eq!(state.tag(), "leaving_building");
        if let SerfState::LeavingBuilding { next } = state {
            assert_eq!(next.tag(), "ready_to_leave");
        }
    }
}
