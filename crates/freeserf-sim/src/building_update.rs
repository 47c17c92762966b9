//! Building production and construction progress: the other half of
//! `Building`'s behavior that needs the road graph and entity arenas,
//! not just the building's own fields.
//!
//! Runs before the serf FSM each tick (see `tick::run`'s phase order),
//! so it sees last tick's construction/delivery outcomes and this
//! tick's burn decay before any serf moves. Three jobs: finalize a
//! building that just finished construction (install an inventory,
//! tally the player's building counts, notify), maintain military
//! garrisons against their configured occupation targets, and dispatch
//! a resident worker to any operational building that doesn't have one
//! yet.

use freeserf_economy::{FlagSearch, SearchCounter, SearchFilter};
use freeserf_entities::{
    BuildingArena, BuildingPayload, ConstructionPhase, FreeWalkingGoal, Inventory, InventoryArena,
    Serf,
};
use freeserf_map::{Map, Pos};
use freeserf_types::{
    BuildingId, BuildingType, FlagId, InventoryId, NotificationKind, PlayerNum, Resource,
    SerfState, SerfType,
};

use crate::error::SimError;
use crate::player::knight_ranks_weakest_first;
use crate::state::SimulationState;
use crate::territory;

/// Run one pass of building bookkeeping. Returns how many buildings
/// finished construction this tick.
///
/// # Errors
///
/// Propagates [`SimError`] if installing a finished castle/stock's
/// inventory runs out of arena capacity.
pub fn update(sim: &mut SimulationState) -> Result<u32, SimError> {
    let ids: Vec<BuildingId> = sim.entities.buildings.iter().map(|(id, _)| id).collect();
    let mut completed = 0u32;

    for id in ids {
        if tick_burning(sim, id) {
            continue;
        }

        let Some(building) = sim.entities.buildings.get(id) else {
            continue;
        };
        if building.burning.is_some() {
            continue;
        }

        if building.unfinished {
            request_builder(sim, id);
            continue;
        }

        if !building.completion_recorded {
            finalize_completion(sim, id)?;
            completed = completed.saturating_add(1);
            continue;
        }

        let Some(building) = sim.entities.buildings.get(id) else {
            continue;
        };
        if building.kind.has_inventory() {
            continue;
        }
        if building.kind.is_military() {
            update_garrison(sim, id);
        } else {
            request_worker(sim, id);
        }
    }

    Ok(completed)
}

/// Advance a burning building's countdown; if it just reached zero,
/// clear its tile and free its arena slot.
fn tick_burning(sim: &mut SimulationState, id: BuildingId) -> bool {
    let Some(building) = sim.entities.buildings.get_mut(id) else {
        return false;
    };
    if building.burning.is_none() {
        return false;
    }
    if !building.tick_burning() {
        return true;
    }
    let pos = building.pos;
    let _ = sim.map.set_object(pos, freeserf_types::ObjectKind::None, 0);
    let _ = sim.map.set_owner(pos, None);
    sim.entities.buildings.free(id);
    true
}

/// Finish a building whose materials just arrived: install an owned
/// inventory for castle/stock, tally the owner's building counts, and
/// fire the "new stock built" notification where it applies.
fn finalize_completion(sim: &mut SimulationState, id: BuildingId) -> Result<(), SimError> {
    let Some(building) = sim.entities.buildings.get(id) else {
        return Ok(());
    };
    let kind = building.kind;
    let owner = building.owner;
    let flag = building.flag;
    let pos = building.pos;

    if kind.has_inventory() {
        let (inv_id, _) = sim.entities.inventories.alloc(Inventory::new(owner, flag, id))?;
        if let Some(building) = sim.entities.buildings.get_mut(id) {
            building.install_inventory(inv_id);
        }
        if kind == BuildingType::Stock {
            if let Some(player) = sim.player_mut(owner) {
                player.notify(NotificationKind::NewStockBuilt, pos);
            }
        }
    }

    if let Some(player) = sim.player_mut(owner) {
        player.building_counts.record_finished(kind);
    }
    if let Some(building) = sim.entities.buildings.get_mut(id) {
        building.completion_recorded = true;
    }
    Ok(())
}

/// Ask the nearest inventory holding a free builder for one, if this
/// site doesn't already have a builder assigned or requested.
fn request_builder(sim: &mut SimulationState, id: BuildingId) {
    let Some(building) = sim.entities.buildings.get(id) else {
        return;
    };
    if building.serf.is_some() || building.serf_requested {
        return;
    }
    let flag = building.flag;
    let owner = building.owner;
    let pos = building.pos;

    let Some(inv_id) = find_inventory_with(
        &mut sim.search_counter,
        &mut sim.entities.flags,
        &sim.map,
        &sim.entities.inventories,
        flag,
        SerfType::Builder,
    ) else {
        return;
    };
    dispatch_resident(
        sim,
        id,
        inv_id,
        owner,
        pos,
        SerfType::Builder,
        SerfState::Digging {
            building: id,
            phase: ConstructionPhase::Leveling { corner: 0 },
        },
    );
}

/// Ask the nearest inventory for the worker kind a production building
/// of this type needs, if it doesn't already have one.
fn request_worker(sim: &mut SimulationState, id: BuildingId) {
    let Some(building) = sim.entities.buildings.get(id) else {
        return;
    };
    if building.serf.is_some() || building.serf_requested {
        return;
    }
    let Some((kind, goal)) = worker_for(building.kind) else {
        return;
    };
    let flag = building.flag;
    let owner = building.owner;
    let pos = building.pos;

    let Some(inv_id) = find_inventory_with(
        &mut sim.search_counter,
        &mut sim.entities.flags,
        &sim.map,
        &sim.entities.inventories,
        flag,
        kind,
    ) else {
        return;
    };
    let state = match goal {
        WorkerGoal::FreeWalk(goal) => SerfState::Planning { building: id, goal },
        WorkerGoal::Resident(state) => state,
    };
    dispatch_resident(sim, id, inv_id, owner, pos, kind, state);
}

/// What a dispatched worker does once assigned: either walk out from the
/// building to find its working tile (`Planning`), or begin a resident
/// production cycle right where it stands.
enum WorkerGoal {
    /// Walk out from the building via `Planning` toward a free-walking
    /// goal (logging, planting, stone cutting, fishing, farming).
    FreeWalk(FreeWalkingGoal),
    /// Start a resident production cycle immediately.
    Resident(SerfState),
}

/// The worker type and initial behavior for a production building's
/// resident, or `None` for building kinds with no single dedicated
/// worker (castle/stock are handled separately; military buildings
/// maintain a garrison instead).
fn worker_for(kind: BuildingType) -> Option<(SerfType, WorkerGoal)> {
    match kind {
        BuildingType::Lumberjack => {
            Some((SerfType::Lumberjack, WorkerGoal::FreeWalk(FreeWalkingGoal::Logging)))
        }
        BuildingType::Forester => {
            Some((SerfType::Forester, WorkerGoal::FreeWalk(FreeWalkingGoal::Planting)))
        }
        BuildingType::Stonecutter => Some((
            SerfType::Stonecutter,
            WorkerGoal::FreeWalk(FreeWalkingGoal::StoneCutting),
        )),
        BuildingType::Fisher => {
            Some((SerfType::Fisher, WorkerGoal::FreeWalk(FreeWalkingGoal::Fishing)))
        }
        BuildingType::Farm => {
            Some((SerfType::Farmer, WorkerGoal::FreeWalk(FreeWalkingGoal::Farming)))
        }
        BuildingType::Sawmill => {
            Some((SerfType::Sawmiller, WorkerGoal::Resident(SerfState::Sawing { phase: 0 })))
        }
        BuildingType::StoneMine
        | BuildingType::CoalMine
        | BuildingType::IronMine
        | BuildingType::GoldMine => {
            Some((SerfType::Miner, WorkerGoal::Resident(SerfState::Mining { phase: 0 })))
        }
        BuildingType::SteelSmelter => Some((
            SerfType::Smelter,
            WorkerGoal::Resident(SerfState::Smelting { phase: 0, output: Resource::Steel }),
        )),
        BuildingType::GoldSmelter => Some((
            SerfType::Smelter,
            WorkerGoal::Resident(SerfState::Smelting { phase: 0, output: Resource::GoldBar }),
        )),
        BuildingType::Mill => {
            Some((SerfType::Miller, WorkerGoal::Resident(SerfState::Milling { phase: 0 })))
        }
        BuildingType::Bakery => {
            Some((SerfType::Baker, WorkerGoal::Resident(SerfState::Baking { phase: 0 })))
        }
        BuildingType::PigFarm => Some((
            SerfType::PigFarmer,
            WorkerGoal::Resident(SerfState::PigFarming { phase: 0 }),
        )),
        BuildingType::Butcher => {
            Some((SerfType::Butcher, WorkerGoal::Resident(SerfState::Butchering { phase: 0 })))
        }
        BuildingType::WeaponSmith => Some((
            SerfType::WeaponSmith,
            WorkerGoal::Resident(SerfState::MakingWeapon { phase: 0 }),
        )),
        BuildingType::ToolMaker => Some((
            SerfType::ToolMaker,
            WorkerGoal::Resident(SerfState::MakingTool { phase: 0 }),
        )),
        BuildingType::BoatBuilder => Some((
            SerfType::BoatBuilder,
            WorkerGoal::Resident(SerfState::BuildingBoat { phase: 0 }),
        )),
        BuildingType::Castle
        | BuildingType::Stock
        | BuildingType::Hut
        | BuildingType::Tower
        | BuildingType::Fortress => None,
    }
}

/// Find the nearest inventory, reachable by flag search from `from`,
/// that currently holds a serf of `kind` (or a generic serf, promoted
/// to this profession on dispatch).
pub(crate) fn find_inventory_with(
    counter: &mut SearchCounter,
    flags: &mut freeserf_entities::FlagArena,
    map: &Map,
    inventories: &InventoryArena,
    from: FlagId,
    kind: SerfType,
) -> Option<InventoryId> {
    let mut found = None;
    let _ = FlagSearch::single(counter, flags, map, from, SearchFilter::default(), |id, _| {
        let Some((inv_id, inv)) = inventories.iter().find(|(_, inv)| inv.flag == id) else {
            return false;
        };
        if inv.serf_count(kind) > 0 || inv.serf_count(SerfType::Generic) > 0 {
            found = Some(inv_id);
            true
        } else {
            false
        }
    });
    found
}

/// Find the nearest inventory holding any knight, by flag search from
/// `from`.
fn find_inventory_with_any_knight(
    counter: &mut SearchCounter,
    flags: &mut freeserf_entities::FlagArena,
    map: &Map,
    inventories: &InventoryArena,
    from: FlagId,
) -> Option<InventoryId> {
    let mut found = None;
    let _ = FlagSearch::single(counter, flags, map, from, SearchFilter::default(), |id, _| {
        let Some((inv_id, inv)) = inventories.iter().find(|(_, inv)| inv.flag == id) else {
            return false;
        };
        let has_knight = freeserf_types::KNIGHT_RANKS.iter().any(|&k| inv.serf_count(k) > 0);
        if has_knight {
            found = Some(inv_id);
            true
        } else {
            false
        }
    });
    found
}

/// Pull a serf of `kind` (falling back to a generic serf promoted on
/// the spot) out of `inv_id`, spawn it already resident at `pos` in
/// `state`, and mark `building` as occupied.
fn dispatch_resident(
    sim: &mut SimulationState,
    building: BuildingId,
    inv_id: InventoryId,
    owner: PlayerNum,
    pos: Pos,
    kind: SerfType,
    state: SerfState,
) {
    let Some(inv) = sim.entities.inventories.get_mut(inv_id) else {
        return;
    };
    if inv.remove_serf(kind).is_err() && inv.remove_serf(SerfType::Generic).is_err() {
        return;
    }

    let mut serf = Serf::new(kind, owner, pos, sim.game_tick);
    serf.state = state;
    let Ok((serf_id, _)) = sim.entities.serfs.alloc(serf) else {
        return;
    };

    if let Some(building) = sim.entities.buildings.get_mut(building) {
        building.serf = Some(serf_id);
        building.serf_requested = false;
    }
}

/// Keep a military building's garrison within its configured occupation
/// band: refresh the threat level, raise `need_knight` when
/// understaffed (dispatching one if an inventory can supply it), and
/// discharge the weakest knight when overstaffed.
fn update_garrison(sim: &mut SimulationState, id: BuildingId) {
    let Some(building) = sim.entities.buildings.get(id) else {
        return;
    };
    let owner = building.owner;
    let pos = building.pos;
    let flag = building.flag;
    let threat = territory::threat_level(&sim.map, pos, owner);
    let (min, max) = sim.player(owner).map_or((0, 0), |p| p.garrison_target(threat));

    let current = sim
        .entities
        .buildings
        .get(id)
        .and_then(|b| b.garrison.as_ref())
        .map_or(0, |g| g.knights.len());

    if let Some(building) = sim.entities.buildings.get_mut(id) {
        if let Some(garrison) = &mut building.garrison {
            garrison.threat_level = threat.index() as u8;
        }
    }

    if current > usize::from(max) {
        discharge_weakest(sim, id);
    } else if current < usize::from(min) {
        if let Some(building) = sim.entities.buildings.get_mut(id) {
            if let Some(garrison) = &mut building.garrison {
                garrison.need_knight = true;
            }
        }
        recruit_knight(sim, id, flag, owner);
    }
}

/// Release the lowest-ranked knight stationed at a building back out of
/// the garrison, freeing its serf entity (garrison discharge merging
/// the knight back into the nearest inventory as a generic serf is not
/// modeled here; the serf entity is simply retired).
fn discharge_weakest(sim: &mut SimulationState, id: BuildingId) {
    let ranks = knight_ranks_weakest_first().collect::<Vec<_>>();
    let knights: Vec<_> = sim
        .entities
        .buildings
        .get(id)
        .and_then(|b| b.garrison.as_ref())
        .map(|g| g.knights.clone())
        .unwrap_or_default();

    let mut weakest_index = None;
    let mut weakest_rank = usize::MAX;
    for (i, &serf_id) in knights.iter().enumerate() {
        let Some(serf) = sim.entities.serfs.get(serf_id) else {
            continue;
        };
        let rank = ranks.iter().position(|&r| r == serf.kind).unwrap_or(0);
        if rank < weakest_rank {
            weakest_rank = rank;
            weakest_index = Some(i);
        }
    }

    let Some(i) = weakest_index else {
        return;
    };
    let serf_id = knights.get(i).copied();
    if let (Some(building), Some(serf_id)) = (sim.entities.buildings.get_mut(id), serf_id) {
        if let Some(garrison) = &mut building.garrison {
            if let Some(pos) = garrison.knights.iter().position(|&k| k == serf_id) {
                garrison.knights.remove(pos);
            }
        }
    }
    if let Some(serf_id) = serf_id {
        sim.entities.serfs.free(serf_id);
    }
}

/// Find a knight in a nearby inventory and place it directly into the
/// garrison (mirrors `dispatch_resident`'s "materialize already
/// assigned" policy for production workers).
fn recruit_knight(sim: &mut SimulationState, id: BuildingId, flag: FlagId, owner: PlayerNum) {
    let Some(inv_id) = find_inventory_with_any_knight(
        &mut sim.search_counter,
        &mut sim.entities.flags,
        &sim.map,
        &sim.entities.inventories,
        flag,
    ) else {
        return;
    };

    let kind = sim.entities.inventories.get(inv_id).and_then(|inv| {
        freeserf_types::KNIGHT_RANKS
            .iter()
            .find(|&&k| inv.serf_count(k) > 0)
            .copied()
    });
    let Some(kind) = kind else {
        return;
    };

    let Some(inv) = sim.entities.inventories.get_mut(inv_id) else {
        return;
    };
    if inv.remove_serf(kind).is_err() {
        return;
    }

    let Some(building) = sim.entities.buildings.get(id) else {
        return;
    };
    let pos = building.pos;
    let defending_state = match building.kind {
        BuildingType::Hut => SerfState::DefendingHut,
        BuildingType::Tower => SerfState::DefendingTower,
        BuildingType::Fortress => SerfState::DefendingFortress,
        BuildingType::Castle => SerfState::DefendingCastle,
        _ => SerfState::DefendingHut,
    };

    let mut serf = Serf::new(kind, owner, pos, sim.game_tick);
    serf.state = defending_state;
    let Ok((serf_id, _)) = sim.entities.serfs.alloc(serf) else {
        return;
    };
    if let Some(building) = sim.entities.buildings.get_mut(id) {
        if let Some(garrison) = &mut building.garrison {
            garrison.knights.push(serf_id);
            garrison.need_knight = false;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use freeserf_entities::{ArenaKind, Building, FlagArena, InventoryArena, SerfArena};
    use freeserf_map::MapUpdateConfig;
    use freeserf_types::Rng;

    fn sim_with_one_unfinished_building(kind: BuildingType) -> (SimulationState, BuildingId) {
        let map = Map::new(32, 32, MapUpdateConfig::default()).unwrap();
        let mut flags = FlagArena::new(4, ArenaKind::Flag);
        let (flag_id, _) = flags.alloc(freeserf_entities::Flag::new(0, 0)).unwrap();
        let mut buildings = BuildingArena::new(4, ArenaKind::Building);
        let (building_id, _) =
            buildings.alloc(Building::new_unfinished(0, kind, 0, flag_id)).unwrap();
        let entities = freeserf_entities::EntityStore {
            flags,
            buildings,
            inventories: InventoryArena::new(2, ArenaKind::Inventory),
            serfs: SerfArena::new(8, ArenaKind::Serf),
        };
        let sim = SimulationState {
            map,
            entities,
            search_counter: SearchCounter::new(),
            rng: Rng::new((1, 2, 3)),
            players: vec![crate::player::PlayerState::new(0, 128, 128, 128)],
            game_tick: 0,
            game_speed: 0x1_0000,
            anim: 0,
            paused: false,
        };
        (sim, building_id)
    }

    #[test]
    fn unfinished_building_requests_a_builder_once_available() {
        let (mut sim, building_id) = sim_with_one_unfinished_building(BuildingType::Sawmill);
        let inv_flag = sim.entities.buildings.get(building_id).unwrap().flag;
        let (inv_id, _) = sim
            .entities
            .inventories
            .alloc(Inventory::new(0, inv_flag, BuildingId::from_index(1)))
            .unwrap();
        sim.entities.inventories.get_mut(inv_id).unwrap().add_serf(SerfType::Builder);

        let completed = update(&mut sim).unwrap();
        assert_eq!(completed, 0);
        assert!(sim.entities.buildings.get(building_id).unwrap().serf.is_some());
    }

    #[test]
    fn finished_stock_building_gets_an_inventory_and_counts() {
        let (mut sim, building_id) = sim_with_one_unfinished_building(BuildingType::Stock);
        {
            let building = sim.entities.buildings.get_mut(building_id).unwrap();
            building.advance_construction(4, 3);
        }
        let completed = update(&mut sim).unwrap();
        assert_eq!(completed, 1);
        let building = sim.entities.buildings.get(building_id).unwrap();
        assert!(matches!(building.payload, BuildingPayload::Inventory(_)));
        assert!(building.completion_recorded);
    }

    #[test]
    fn burning_building_is_freed_once_countdown_completes() {
        let (mut sim, building_id) = sim_with_one_unfinished_building(BuildingType::Sawmill);
        sim.entities.buildings.get_mut(building_id).unwrap().demolish(0);
        update(&mut sim).unwrap();
        assert!(!sim.entities.buildings.is_allocated(building_id));
    }

    #[test]
    fn production_building_dispatches_its_resident_worker() {
        let (mut sim, building_id) = sim_with_one_unfinished_building(BuildingType::Sawmill);
        {
            let building = sim.entities.buildings.get_mut(building_id).unwrap();
            building.advance_construction(3, 2);
        }
        // Phase one: finalize construction. Phase two (next call):
        // dispatch the resident once a sawmiller is available.
        update(&mut sim).unwrap();
        let inv_flag = sim.entities.buildings.get(building_id).unwrap().flag;
        let (inv_id, _) = sim
            .entities
            .inventories
            .alloc(Inventory::new(0, inv_flag, BuildingId::from_index(1)))
            .unwrap();
        sim.entities.inventories.get_mut(inv_id).unwrap().add_serf(SerfType::Sawmiller);

        update(&mut sim).unwrap();
        let building = sim.entities.buildings.get(building_id).unwrap();
        assert!(building.serf.is_some());
        let serf_id = building.serf.unwrap();
        let serf = sim.entities.serfs.get(serf_id).unwrap();
        assert!(matches!(serf.state, SerfState::Sawing { phase: 0 }));
    }
}
