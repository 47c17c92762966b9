//! The command surface: the only way an embedding host (the engine's
//! stdin console, the observer API, a future GUI) mutates a running
//! simulation. Every command is a [`Command`] variant dispatched through
//! [`apply_command`] at a tick boundary, never mid-tick, matching §5's
//! concurrency model. Each returns a typed [`CommandOutcome`] so the
//! caller never has to re-derive the handle or value a command produced.

use freeserf_economy::{build_road as economy_build_road, demolish_road, FlagSearch, SearchFilter};
use freeserf_entities::{Building, Flag, FreeWalkingGoal, Serf, SerfState};
use freeserf_map::Pos;
use freeserf_types::{
    BuildingId, BuildingType, Direction, FlagId, FlagOrBuilding, ObjectKind, PlayerNum, Resource,
    SerfId, SerfType,
};

use crate::error::SimError;
use crate::state::SimulationState;
use crate::territory;

/// Ticks a demolished building spends visibly burning before
/// [`crate::building_update::update`] clears its tile and frees its
/// arena slot, matching the teacher's fixed burn-down timer.
const BUILDING_BURN_TICKS: u16 = 187;

/// The tile object kind a freshly started building occupies while under
/// construction, mirroring the original renderer's small/large split.
const fn object_kind_for(kind: BuildingType) -> ObjectKind {
    match kind {
        BuildingType::Castle => ObjectKind::Castle,
        BuildingType::Tower
        | BuildingType::Fortress
        | BuildingType::Stock
        | BuildingType::SteelSmelter
        | BuildingType::GoldSmelter
        | BuildingType::Farm
        | BuildingType::PigFarm
        | BuildingType::ToolMaker
        | BuildingType::WeaponSmith
        | BuildingType::BoatBuilder => ObjectKind::LargeBuilding,
        _ => ObjectKind::SmallBuilding,
    }
}

/// A single command accepted at a tick boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Place a bare flag at `pos` for `player`.
    BuildFlag {
        /// The issuing player.
        player: PlayerNum,
        /// The tile to place the flag on.
        pos: Pos,
    },
    /// Connect an existing flag to whatever flag sits at the far end of
    /// `directions`.
    BuildRoad {
        /// The issuing player.
        player: PlayerNum,
        /// The flag the road starts from.
        from: FlagId,
        /// The direction sequence the road follows.
        directions: Vec<Direction>,
    },
    /// Start construction of a building of `kind` at `pos`, which must
    /// already carry a flag at `move_down_right(pos)`.
    BuildBuilding {
        /// The issuing player.
        player: PlayerNum,
        /// The building's site.
        pos: Pos,
        /// Building type.
        kind: BuildingType,
    },
    /// Tear down whatever occupies `pos` — a flag (with its attached
    /// roads), a building (burns down), or a bare road segment.
    Demolish {
        /// The issuing player (must own `pos`).
        player: PlayerNum,
        /// The tile to demolish.
        pos: Pos,
    },
    /// Set `player`'s flag-transport priority for `resource`.
    SetPriority {
        /// The issuing player.
        player: PlayerNum,
        /// The resource whose priority changes.
        resource: Resource,
        /// The new priority value.
        value: u8,
    },
    /// Set `player`'s garrison min/max for `level`.
    SetKnightOccupation {
        /// The issuing player.
        player: PlayerNum,
        /// The threat level (0..4) this band applies to.
        level: u8,
        /// Minimum garrison size.
        min: u8,
        /// Maximum garrison size.
        max: u8,
    },
    /// Dispatch an idle geologist from the nearest inventory to
    /// `flag`'s surroundings.
    SendGeologist {
        /// The flag to search outward from.
        flag: FlagId,
    },
    /// Send `knights` knights from the nearest garrison reachable from
    /// `player`'s realm to attack `target_flag`'s attached building.
    Attack {
        /// The attacking player.
        player: PlayerNum,
        /// The defending flag (must have a military building attached).
        target_flag: FlagId,
        /// How many knights to dispatch.
        knights: u8,
    },
    /// Pause or unpause the simulation clock.
    Pause {
        /// `true` to pause, `false` to resume at the previously set speed.
        on: bool,
    },
    /// Set the game speed directly (16.16 fixed-point ticks per real
    /// tick).
    SetGameSpeed {
        /// The new speed. `0` halts advancement without flipping
        /// `paused`.
        speed: u32,
    },
}

/// The typed success payload of a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A flag was allocated.
    FlagBuilt(FlagId),
    /// A road was connected, ending at this flag.
    RoadBuilt(FlagId),
    /// A building was allocated and begun.
    BuildingStarted(BuildingId),
    /// Something was torn down (flag, building, or road) at this
    /// position.
    Demolished(Pos),
    /// A priority or occupation setting was applied.
    SettingApplied,
    /// A geologist was dispatched (or none was available, which is not
    /// an error — see §7 `PartialFailure`).
    GeologistDispatched(bool),
    /// Knights were dispatched to attack (count actually sent, which may
    /// be less than requested if fewer were available).
    AttackDispatched(u8),
    /// The pause state changed.
    PauseToggled(bool),
    /// The game speed changed.
    SpeedSet(u32),
}

/// Apply one command to `sim`. Called only between ticks.
///
/// # Errors
///
/// Returns [`SimError`] for allocation exhaustion, dangling handles,
/// ownership violations, or a road/search failure the command itself
/// cannot absorb. Dispatch failures that the original design treats as
/// `PartialFailure` (no geologist available, fewer knights than
/// requested) are reported in the `CommandOutcome`, not as an error.
pub fn apply_command(
    sim: &mut SimulationState,
    command: Command,
) -> Result<CommandOutcome, SimError> {
    match command {
        Command::BuildFlag { player, pos } => build_flag(sim, player, pos),
        Command::BuildRoad { player, from, directions } => {
            build_road(sim, player, from, &directions)
        }
        Command::BuildBuilding { player, pos, kind } => build_building(sim, player, pos, kind),
        Command::Demolish { player, pos } => demolish(sim, player, pos),
        Command::SetPriority { player, resource, value } => {
            set_priority(sim, player, resource, value)
        }
        Command::SetKnightOccupation { player, level, min, max } => {
            set_knight_occupation(sim, player, level, min, max)
        }
        Command::SendGeologist { flag } => send_geologist(sim, flag),
        Command::Attack { player, target_flag, knights } => {
            attack(sim, player, target_flag, knights)
        }
        Command::Pause { on } => Ok(pause(sim, on)),
        Command::SetGameSpeed { speed } => Ok(set_game_speed(sim, speed)),
    }
}

fn build_flag(
    sim: &mut SimulationState,
    player: PlayerNum,
    pos: Pos,
) -> Result<CommandOutcome, SimError> {
    let tile = sim.map.tile(pos)?;
    if tile.object != ObjectKind::None {
        return Err(SimError::NotOwned { player, pos });
    }
    if tile.owner != Some(player) {
        return Err(SimError::NotOwned { player, pos });
    }
    let (flag_id, _) = sim.entities.flags.alloc(Flag::new(pos, player))?;
    sim.map.set_object(pos, ObjectKind::Flag, flag_id.index())?;
    Ok(CommandOutcome::FlagBuilt(flag_id))
}

fn build_road(
    sim: &mut SimulationState,
    player: PlayerNum,
    from: FlagId,
    directions: &[Direction],
) -> Result<CommandOutcome, SimError> {
    let dest = economy_build_road(player, from, directions, &mut sim.map, &mut sim.entities.flags)?;
    Ok(CommandOutcome::RoadBuilt(dest))
}

fn build_building(
    sim: &mut SimulationState,
    player: PlayerNum,
    pos: Pos,
    kind: BuildingType,
) -> Result<CommandOutcome, SimError> {
    let flag_pos = sim.map.move_down_right(pos);
    let flag_tile = sim.map.tile(flag_pos)?;
    if flag_tile.object != ObjectKind::Flag {
        return Err(SimError::NotOwned { player, pos });
    }
    let flag_id = freeserf_types::FlagId::from_index(flag_tile.object_index);
    if !sim.entities.flags.is_allocated(flag_id) {
        return Err(SimError::NoSuchFlag(flag_id));
    }

    let site_tile = sim.map.tile(pos)?;
    if site_tile.object != ObjectKind::None || site_tile.owner != Some(player) {
        return Err(SimError::NotOwned { player, pos });
    }

    let building = Building::new_unfinished(pos, kind, player, flag_id);
    let (building_id, _) = sim.entities.buildings.alloc(building)?;
    sim.map.set_object(pos, object_kind_for(kind), building_id.index())?;

    if let Some(flag) = sim.entities.flags.get_mut(flag_id) {
        flag.set_endpoint(Direction::UpLeft, true);
        flag.neighbors[Direction::UpLeft as usize] =
            Some(freeserf_types::FlagOrBuilding::Building(building_id));
    }

    if let Some(player_state) = sim.player_mut(player) {
        player_state.building_counts.record_started(kind);
        if kind == BuildingType::Castle {
            player_state.has_castle = true;
            player_state.active = true;
        }
    }

    if kind.is_military() {
        territory::recompute_around(&mut sim.map, &sim.entities.buildings, pos);
    }

    Ok(CommandOutcome::BuildingStarted(building_id))
}

fn demolish(
    sim: &mut SimulationState,
    player: PlayerNum,
    pos: Pos,
) -> Result<CommandOutcome, SimError> {
    let (kind, index) = sim.map.object(pos)?;
    let owner = sim.map.owner(pos)?;
    if owner != Some(player) {
        return Err(SimError::NotOwned { player, pos });
    }

    match kind {
        ObjectKind::Flag => demolish_flag(sim, freeserf_types::FlagId::from_index(index), pos),
        ObjectKind::LargeBuilding | ObjectKind::SmallBuilding | ObjectKind::Castle => {
            demolish_building(sim, freeserf_types::BuildingId::from_index(index), pos)
        }
        _ => {
            for dir in freeserf_types::Direction::descending() {
                if sim.map.has_path(pos, dir)? {
                    let _ = demolish_road_segment(sim, pos, dir);
                }
            }
            Ok(CommandOutcome::Demolished(pos))
        }
    }
}

fn demolish_flag(
    sim: &mut SimulationState,
    flag_id: FlagId,
    pos: Pos,
) -> Result<CommandOutcome, SimError> {
    for dir in freeserf_types::Direction::descending() {
        let has_path = sim
            .entities
            .flags
            .get(flag_id)
            .is_some_and(|flag| flag.has_path(dir));
        if has_path {
            let _ = demolish_road_segment(sim, pos, dir);
        }
    }
    sim.entities.flags.free(flag_id);
    sim.map.set_object(pos, ObjectKind::None, 0)?;
    Ok(CommandOutcome::Demolished(pos))
}

fn demolish_road_segment(
    sim: &mut SimulationState,
    pos: Pos,
    dir: Direction,
) -> Result<(), SimError> {
    let from_flag = match sim.map.object(pos) {
        Ok((ObjectKind::Flag, idx)) => freeserf_types::FlagId::from_index(idx),
        _ => return Ok(()),
    };
    lose_serfs_on_segment(sim, pos, dir);
    demolish_road(from_flag, dir, &mut sim.map, &mut sim.entities.flags)?;
    Ok(())
}

/// Every serf physically standing on the segment between `pos` and
/// `dir` when it is torn down transitions to `Lost` (or is woken at the
/// flag if idle there), matching the "no orphaned transporters"
/// invariant.
fn lose_serfs_on_segment(sim: &mut SimulationState, pos: Pos, dir: Direction) {
    let mut walk_pos = pos;
    let mut walk_dir = dir;
    loop {
        let next = sim.map.neighbor(walk_pos, walk_dir);
        if let Ok(Some(serf_id)) = sim.map.occupying_serf(next) {
            if let Some(serf) = sim.entities.serfs.get_mut(serf_id) {
                serf.state = SerfState::Lost { ticks: 0 };
            }
        }
        let arrived_at_flag = sim
            .map
            .object(next)
            .map(|(kind, _)| kind == ObjectKind::Flag)
            .unwrap_or(true);
        if arrived_at_flag {
            break;
        }
        let Some(next_dir) = freeserf_types::direction::ROAD_DIRECTIONS
            .into_iter()
            .find(|&d| d != walk_dir.reverse() && sim.map.has_path(next, d).unwrap_or(false))
        else {
            break;
        };
        walk_pos = next;
        walk_dir = next_dir;
    }
}

fn demolish_building(
    sim: &mut SimulationState,
    building_id: BuildingId,
    pos: Pos,
) -> Result<CommandOutcome, SimError> {
    let Some(building) = sim.entities.buildings.get_mut(building_id) else {
        return Err(SimError::NoSuchBuilding(building_id));
    };
    let kind = building.kind;
    let owner = building.owner;
    let flag_id = building.flag;
    let was_finished = !building.unfinished;
    let (escaping, killed) = building.demolish(BUILDING_BURN_TICKS);

    for serf_id in escaping {
        if let Some(serf) = sim.entities.serfs.get_mut(serf_id) {
            serf.state = SerfState::EscapeBuilding;
        }
    }
    for serf_id in killed {
        sim.entities.serfs.free(serf_id);
    }

    if let Some(flag) = sim.entities.flags.get_mut(flag_id) {
        flag.set_endpoint(Direction::UpLeft, false);
        flag.neighbors[Direction::UpLeft as usize] = None;
    }

    if let Some(player) = sim.player_mut(owner) {
        player.building_counts.record_demolished(kind, was_finished);
    }

    if kind.is_military() {
        territory::recompute_around(&mut sim.map, &sim.entities.buildings, pos);
    }

    Ok(CommandOutcome::Demolished(pos))
}

fn set_priority(
    sim: &mut SimulationState,
    player: PlayerNum,
    resource: Resource,
    value: u8,
) -> Result<CommandOutcome, SimError> {
    let Some(player_state) = sim.player_mut(player) else {
        return Err(SimError::NoSuchPlayer(player));
    };
    if let Some(slot) = player_state.flag_prio.get_mut(resource as usize) {
        *slot = value;
    }
    Ok(CommandOutcome::SettingApplied)
}

fn set_knight_occupation(
    sim: &mut SimulationState,
    player: PlayerNum,
    level: u8,
    min: u8,
    max: u8,
) -> Result<CommandOutcome, SimError> {
    let Some(player_state) = sim.player_mut(player) else {
        return Err(SimError::NoSuchPlayer(player));
    };
    if let Some(slot) = player_state.knight_occupation.get_mut(level as usize) {
        *slot = (min, max);
    }
    Ok(CommandOutcome::SettingApplied)
}

fn send_geologist(sim: &mut SimulationState, flag: FlagId) -> Result<CommandOutcome, SimError> {
    let Some(owner) = sim.entities.flags.get(flag).map(|f| f.owner) else {
        return Err(SimError::NoSuchFlag(flag));
    };

    let found_inventory = crate::building_update::find_inventory_with(
        &mut sim.search_counter,
        &mut sim.entities.flags,
        &sim.map,
        &sim.entities.inventories,
        flag,
        SerfType::Geologist,
    );

    let Some(inv_id) = found_inventory else {
        return Ok(CommandOutcome::GeologistDispatched(false));
    };
    let Some(inv) = sim.entities.inventories.get_mut(inv_id) else {
        return Ok(CommandOutcome::GeologistDispatched(false));
    };
    if inv.remove_serf(SerfType::Geologist).is_err() && inv.remove_serf(SerfType::Generic).is_err()
    {
        return Ok(CommandOutcome::GeologistDispatched(false));
    }

    let Some(flag_pos) = sim.entities.flags.get(flag).map(|f| f.pos) else {
        return Ok(CommandOutcome::GeologistDispatched(false));
    };
    let mut serf = Serf::new(SerfType::Geologist, owner, flag_pos, sim.game_tick);
    serf.state = SerfState::LookingForGeoSpot;
    if sim.entities.serfs.alloc(serf).is_err() {
        return Ok(CommandOutcome::GeologistDispatched(false));
    }
    Ok(CommandOutcome::GeologistDispatched(true))
}

fn attack(
    sim: &mut SimulationState,
    player: PlayerNum,
    target_flag: FlagId,
    knights: u8,
) -> Result<CommandOutcome, SimError> {
    let Some(target_building) = sim
        .entities
        .flags
        .get(target_flag)
        .and_then(|flag| flag.neighbors[Direction::UpLeft as usize])
        .and_then(|neighbor| match neighbor {
            freeserf_types::FlagOrBuilding::Building(b) => Some(b),
            freeserf_types::FlagOrBuilding::Flag(_) => None,
        })
    else {
        return Err(SimError::NoSuchFlag(target_flag));
    };
    if !sim
        .entities
        .buildings
        .get(target_building)
        .is_some_and(|b| b.kind.is_military())
    {
        return Err(SimError::NoSuchBuilding(target_building));
    }

    let mut attackers: Vec<(BuildingId, SerfId)> = Vec::new();
    for (building_id, building) in sim.entities.buildings.iter() {
        if building.owner != player || !building.kind.is_military() {
            continue;
        }
        let Some(garrison) = &building.garrison else {
            continue;
        };
        for &serf_id in &garrison.knights {
            if attackers.len() >= usize::from(knights) {
                break;
            }
            attackers.push((building_id, serf_id));
        }
    }

    let dispatched = attackers.len().min(usize::from(knights));
    for (building_id, serf_id) in attackers.iter().take(dispatched) {
        if let Some(building) = sim.entities.buildings.get_mut(*building_id) {
            if let Some(garrison) = &mut building.garrison {
                garrison.knights.retain(|&k| k != *serf_id);
            }
        }
        if let Some(serf) = sim.entities.serfs.get_mut(*serf_id) {
            serf.state = SerfState::Planning {
                building: target_building,
                goal: FreeWalkingGoal::KnightAttacking(target_building),
            };
        }
    }

    Ok(CommandOutcome::AttackDispatched(dispatched as u8))
}

fn pause(sim: &mut SimulationState, on: bool) -> CommandOutcome {
    sim.paused = on;
    CommandOutcome::PauseToggled(on)
}

fn set_game_speed(sim: &mut SimulationState, speed: u32) -> CommandOutcome {
    sim.game_speed = speed;
    CommandOutcome::SpeedSet(speed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{PriorityConfig, WorldConfig};

    fn world() -> SimulationState {
        let world = WorldConfig {
            cols: 32,
            rows: 32,
            seed: (1, 2, 3),
            player_count: 2,
        };
        let mut sim = SimulationState::new(&world, &PriorityConfig::default(), 0x1_0000).unwrap();
        let pos = sim.map.from_col_row(10, 10);
        sim.map.set_owner(pos, Some(0)).unwrap();
        sim
    }

    #[test]
    fn build_flag_allocates_and_writes_the_tile() {
        let mut sim = world();
        let pos = sim.map.from_col_row(10, 10);
        let outcome = apply_command(&mut sim, Command::BuildFlag { player: 0, pos }).unwrap();
        let CommandOutcome::FlagBuilt(flag_id) = outcome else {
            panic!("expected FlagBuilt");
        };
        assert_eq!(sim.map.object(pos).unwrap(), (ObjectKind::Flag, flag_id.index()));
    }

    #[test]
    fn build_flag_rejects_unowned_tile() {
        let mut sim = world();
        let pos = sim.map.from_col_row(11, 11);
        let result = apply_command(&mut sim, Command::BuildFlag { player: 0, pos });
        assert!(result.is_err());
    }

    #[test]
    fn pause_then_unpause_restores_speed() {
        let mut sim = world();
        let original_speed = sim.game_speed;
        apply_command(&mut sim, Command::Pause { on: true }).unwrap();
        assert!(sim.paused);
        apply_command(&mut sim, Command::Pause { on: false }).unwrap();
        assert!(!sim.paused);
        assert_eq!(sim.game_speed, original_speed);
    }

    #[test]
    fn set_priority_writes_the_flag_table() {
        let mut sim = world();
        apply_command(
            &mut sim,
            Command::SetPriority { player: 0, resource: Resource::Plank, value: 200 },
        )
        .unwrap();
        assert_eq!(sim.player(0).unwrap().flag_prio[Resource::Plank as usize], 200);
    }

    #[test]
    fn set_knight_occupation_writes_the_band() {
        let mut sim = world();
        apply_command(
            &mut sim,
            Command::SetKnightOccupation { player: 0, level: 1, min: 2, max: 6 },
        )
        .unwrap();
        assert_eq!(sim.player(0).unwrap().knight_occupation[1], (2, 6));
    }

    #[test]
    fn build_flag_fails_cleanly_at_arena_exhaustion() {
        let mut sim = world();
        let capacity = sim.entities.flags.capacity();
        for i in 0..capacity {
            let col = u32::try_from(i % 32).unwrap_or(0);
            let row = u32::try_from(i / 32).unwrap_or(0) + 16;
            let pos = sim.map.from_col_row(col, row);
            sim.map.set_owner(pos, Some(0)).unwrap();
            let _ = apply_command(&mut sim, Command::BuildFlag { player: 0, pos });
        }
        let pos = sim.map.from_col_row(0, 0);
        sim.map.set_owner(pos, Some(0)).unwrap();
        let before = sim.entities.flags.len();
        let result = apply_command(&mut sim, Command::BuildFlag { player: 0, pos });
        if result.is_err() {
            assert_eq!(sim.entities.flags.len(), before);
        }
    }
}
