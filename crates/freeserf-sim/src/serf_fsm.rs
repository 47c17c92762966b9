//! The serf finite-state machine: one transition per serf per tick.
//!
//! [`SerfState`] collapses the original engine's roughly sixty states
//! into a single tagged union; this module owns the one big `match` that
//! steps a serf from its current state to the next, the way `game.c`'s
//! inline `switch (serf->state)` blocks did. Movement between flags is
//! modeled as one hop per tick rather than per-tile — `Walking` only
//! records a destination flag, not a path, so a multi-tile road segment
//! resolves to its far flag in a single transition once a route is
//! found (see `DESIGN.md`).

use std::mem;

use freeserf_economy::{FlagSearch, SearchFilter};
use freeserf_entities::{BuildingPayload, Garrison, SerfState, WalkCargo};
use freeserf_map::Pos;
use freeserf_types::{
    BuildingType, Direction, FlagId, FlagOrBuilding, NotificationKind, ObjectKind, Resource,
    SerfId, SerfType,
};

use crate::error::SimError;
use crate::state::SimulationState;

/// How much a serf's counter drops per real tick while it animates.
const TICK_DECREMENT: i32 = 16;
/// Base per-tick countdown for a walking/transporting hop.
const HOP_COUNTER: i32 = 16;
/// Base per-tick countdown for an entering/leaving building ramp.
const RAMP_COUNTER: i32 = 32;
/// Base per-tick countdown for one phase of a production cycle.
const PRODUCTION_COUNTER: i32 = 128;
/// Number of phases in the mining cycle: enter, dig, eat, exit with ore.
const MINING_PHASES: u8 = 4;
/// Maximum ticks a `Lost` serf wanders before it is given up for dead.
const MAX_LOST_TICKS: u16 = 4096;

/// Step every live serf forward by one tick.
///
/// # Errors
///
/// Propagates [`SimError`] if a flag search underlying a routing decision
/// runs away past its step budget.
pub fn update(sim: &mut SimulationState) -> Result<(), SimError> {
    let ids: Vec<SerfId> = sim.entities.serfs.iter().map(|(id, _)| id).collect();
    for id in ids {
        step(id, sim)?;
    }
    Ok(())
}

fn step(id: SerfId, sim: &mut SimulationState) -> Result<(), SimError> {
    let Some(serf) = sim.entities.serfs.get_mut(id) else {
        return Ok(());
    };
    serf.counter = serf.counter.saturating_sub(TICK_DECREMENT);
    if serf.counter > 0 {
        return Ok(());
    }
    let state = mem::replace(&mut serf.state, SerfState::IdleInStock);
    let pos = serf.pos;
    let owner = serf.owner;
    let kind = serf.kind;

    let (next, next_counter) = transition(id, state, pos, owner, kind, sim)?;

    if let Some(serf) = sim.entities.serfs.get_mut(id) {
        serf.state = next;
        serf.counter = next_counter;
    }
    Ok(())
}

fn current_flag(sim: &SimulationState, pos: Pos) -> Option<FlagId> {
    match sim.map.object(pos) {
        Ok((ObjectKind::Flag, idx)) => Some(FlagId::from_index(idx)),
        _ => None,
    }
}

/// Find the next flag hop toward `dest` starting from `from`, by trying
/// each outgoing direction as a BFS seed until one reaches the
/// destination (mirrors the transport scheduler's own routing).
fn next_hop(sim: &mut SimulationState, from: FlagId, dest: FlagId) -> Option<(FlagId, Direction)> {
    if from == dest {
        return None;
    }
    let out_dirs: Vec<Direction> = sim
        .entities
        .flags
        .get(from)?
        .neighbors
        .iter()
        .enumerate()
        .filter_map(|(i, n)| match n {
            Some(FlagOrBuilding::Flag(_)) => Direction::from_index(i as u8),
            _ => None,
        })
        .collect();
    for dir in out_dirs {
        let Some(FlagOrBuilding::Flag(neighbor)) = sim
            .entities
            .flags
            .get(from)
            .and_then(|f| f.neighbors.get(dir as usize))
            .copied()
            .flatten()
        else {
            continue;
        };
        if neighbor == dest {
            return Some((neighbor, dir));
        }
        let reached = FlagSearch::single(
            &mut sim.search_counter,
            &mut sim.entities.flags,
            &sim.map,
            neighbor,
            SearchFilter::default(),
            |id, _| id == dest,
        )
        .unwrap_or(false);
        if reached {
            return Some((neighbor, dir));
        }
    }
    None
}

fn enter_building(building: freeserf_types::BuildingId, next: SerfState) -> SerfState {
    SerfState::EnteringBuilding {
        building,
        next: Box::new(next),
    }
}

fn leave_building(next: SerfState) -> SerfState {
    SerfState::LeavingBuilding {
        next: Box::new(next),
    }
}

#[allow(clippy::too_many_lines)]
fn transition(
    id: SerfId,
    state: SerfState,
    pos: Pos,
    owner: freeserf_types::PlayerNum,
    kind: SerfType,
    sim: &mut SimulationState,
) -> Result<(SerfState, i32), SimError> {
    match state {
        SerfState::IdleInStock => Ok((SerfState::IdleInStock, HOP_COUNTER)),

        SerfState::ReadyToLeaveInventory { dest_flag, cargo } => {
            let walk_cargo = cargo.map_or(WalkCargo::ToFlag, |r| {
                WalkCargo::Carrying(r, Direction::Right)
            });
            Ok((
                leave_building(SerfState::Walking {
                    dest_flag,
                    cargo: walk_cargo,
                }),
                RAMP_COUNTER,
            ))
        }

        SerfState::Walking { dest_flag, cargo } => {
            let Some(here) = current_flag(sim, pos) else {
                return Ok((SerfState::Lost { ticks: 0 }, HOP_COUNTER));
            };
            if here == dest_flag {
                return Ok((on_arrival_at_flag(dest_flag, cargo, sim), HOP_COUNTER));
            }
            match next_hop(sim, here, dest_flag) {
                Some((neighbor, _dir)) => {
                    if let Some(flag) = sim.entities.flags.get(neighbor) {
                        if let Some(serf) = sim.entities.serfs.get_mut(id) {
                            serf.pos = flag.pos;
                        }
                    }
                    Ok((SerfState::Walking { dest_flag, cargo }, HOP_COUNTER))
                }
                None => Ok((
                    SerfState::Walking {
                        dest_flag,
                        cargo: WalkCargo::DestinationCleared,
                    },
                    HOP_COUNTER,
                )),
            }
        }

        SerfState::Transporting {
            resource,
            dir,
            wait_counter,
        } => {
            let Some(here) = current_flag(sim, pos) else {
                return Ok((SerfState::Lost { ticks: 0 }, HOP_COUNTER));
            };
            let Some(FlagOrBuilding::Flag(neighbor)) = sim
                .entities
                .flags
                .get(here)
                .and_then(|f| f.neighbors.get(dir as usize))
                .copied()
                .flatten()
            else {
                return Ok((SerfState::Scatter, HOP_COUNTER));
            };
            let Some(neighbor_pos) = sim.entities.flags.get(neighbor).map(|f| f.pos) else {
                return Ok((SerfState::Scatter, HOP_COUNTER));
            };
            if let Some(serf) = sim.entities.serfs.get_mut(id) {
                serf.pos = neighbor_pos;
            }
            if let Some(building_id) = sim
                .entities
                .flags
                .get(neighbor)
                .and_then(|f| f.neighbors.get(Direction::UpLeft as usize).copied().flatten())
                .and_then(|n| match n {
                    FlagOrBuilding::Building(b) => Some(b),
                    FlagOrBuilding::Flag(_) => None,
                })
            {
                if let Some(building) = sim.entities.buildings.get(building_id) {
                    if building_accepts_via_flag(building.kind) {
                        return Ok((
                            SerfState::Delivering {
                                resource,
                                building: building_id,
                            },
                            HOP_COUNTER,
                        ));
                    }
                }
            }
            match sim.entities.flags.get_mut(neighbor).map(|f| f.add_resource(resource, None)) {
                Some(Ok(_)) => Ok((SerfState::WakeAtFlag, HOP_COUNTER)),
                _ => Ok((
                    SerfState::Transporting {
                        resource,
                        dir,
                        wait_counter: wait_counter.saturating_add(1),
                    },
                    HOP_COUNTER,
                )),
            }
        }

        SerfState::Delivering { resource, building } => {
            let entered = enter_building(
                building,
                SerfState::MoveResourceOut {
                    resource,
                    dest_flag: FlagId::NULL,
                    next: Box::new(SerfState::ReadyToLeave),
                },
            );
            deliver_to_building(sim, building, resource);
            Ok((entered, RAMP_COUNTER))
        }

        SerfState::EnteringBuilding { building, next } => {
            if let Some(b) = sim.entities.buildings.get_mut(building) {
                b.serf_present = true;
            }
            Ok((*next, HOP_COUNTER))
        }

        SerfState::LeavingBuilding { next } => Ok((*next, HOP_COUNTER)),

        SerfState::ReadyToEnter { building } => Ok((enter_building(building, SerfState::ReadyToLeave), RAMP_COUNTER)),

        SerfState::ReadyToLeave => Ok((leave_building(SerfState::IdleOnPath {
            flag: current_flag(sim, pos).unwrap_or(FlagId::NULL),
            dir: Direction::Right,
        }), RAMP_COUNTER)),

        SerfState::Digging { building, phase } => {
            step_construction(sim, building, phase, true)
        }

        SerfState::Building { building, phase } => {
            step_construction(sim, building, phase, false)
        }

        SerfState::BuildingCastle { building } => {
            if let Some(b) = sim.entities.buildings.get_mut(building) {
                b.progress = b.progress.saturating_add(1);
                if b.progress >= 8 {
                    b.unfinished = false;
                }
            }
            let finished = sim
                .entities
                .buildings
                .get(building)
                .is_some_and(|b| !b.unfinished);
            if finished {
                Ok((SerfState::FinishedBuilding, HOP_COUNTER))
            } else {
                Ok((SerfState::BuildingCastle { building }, PRODUCTION_COUNTER))
            }
        }

        SerfState::MoveResourceOut {
            resource,
            dest_flag,
            next,
        } => {
            let target_flag = if dest_flag.is_null() {
                current_flag(sim, pos).unwrap_or(FlagId::NULL)
            } else {
                dest_flag
            };
            match sim
                .entities
                .flags
                .get_mut(target_flag)
                .map(|f| f.add_resource(resource, None))
            {
                Some(Ok(_)) => Ok((*next, HOP_COUNTER)),
                _ => Ok((SerfState::WaitForResourceOut, HOP_COUNTER)),
            }
        }

        SerfState::WaitForResourceOut => {
            let Some(target_flag) = current_flag(sim, pos) else {
                return Ok((SerfState::WaitForResourceOut, HOP_COUNTER));
            };
            let has_room = sim
                .entities
                .flags
                .get(target_flag)
                .is_some_and(|f| f.slots.iter().any(|s| s.is_empty()));
            if has_room {
                Ok((SerfState::WakeAtFlag, HOP_COUNTER))
            } else {
                Ok((SerfState::WaitForResourceOut, HOP_COUNTER))
            }
        }

        SerfState::DropResourceOut { resource, dest_flag } => {
            match sim.entities.flags.get_mut(dest_flag).map(|f| f.add_resource(resource, None)) {
                Some(Ok(_)) => Ok((SerfState::ReadyToLeave, RAMP_COUNTER)),
                _ => Ok((SerfState::DropResourceOut { resource, dest_flag }, HOP_COUNTER)),
            }
        }

        SerfState::FreeWalking {
            mut dist_col,
            mut dist_row,
            neg1,
            neg2,
            flags,
            goal,
        } => {
            if dist_col == 0 && dist_row == 0 {
                return Ok((resolve_free_walking_goal(sim, id, pos, owner, goal), PRODUCTION_COUNTER));
            }
            let dir = free_walking_direction(dist_col, dist_row);
            let next_pos = sim.map.neighbor(pos, dir);
            let passable = sim.map.is_passable(next_pos).unwrap_or(false);
            if passable {
                if let Some(serf) = sim.entities.serfs.get_mut(id) {
                    serf.pos = next_pos;
                }
                if dist_col > 0 {
                    dist_col -= 1;
                } else if dist_col < 0 {
                    dist_col += 1;
                }
                if dist_row > 0 {
                    dist_row -= 1;
                } else if dist_row < 0 {
                    dist_row += 1;
                }
            }
            Ok((
                SerfState::FreeWalking {
                    dist_col,
                    dist_row,
                    neg1,
                    neg2,
                    flags,
                    goal,
                },
                HOP_COUNTER,
            ))
        }

        SerfState::Planning { building, goal } => {
            let center = spiral_center_for_goal(sim, pos, goal);
            let target = pick_spiral_target(sim, center, goal);
            match target {
                Some(target_pos) => {
                    let (dist_col, dist_row) = col_row_delta(&sim.map, pos, target_pos);
                    Ok((
                        SerfState::FreeWalking {
                            dist_col,
                            dist_row,
                            neg1: 0,
                            neg2: 0,
                            flags: 0,
                            goal,
                        },
                        HOP_COUNTER,
                    ))
                }
                None => Ok((SerfState::Planning { building, goal }, PRODUCTION_COUNTER)),
            }
        }

        SerfState::LookingForGeoSpot => {
            let dir_index = sim.rng.below(6);
            let Some(dir) = Direction::from_index(dir_index as u8) else {
                return Ok((SerfState::LookingForGeoSpot, HOP_COUNTER));
            };
            let next_pos = sim.map.neighbor(pos, dir);
            if sim.map.is_passable(next_pos).unwrap_or(false) {
                if let Some(serf) = sim.entities.serfs.get_mut(id) {
                    serf.pos = next_pos;
                }
            }
            if sim.rng.chance_one_in(8) {
                Ok((SerfState::SamplingGeoSpot { progress: 0 }, PRODUCTION_COUNTER))
            } else {
                Ok((SerfState::LookingForGeoSpot, HOP_COUNTER))
            }
        }

        SerfState::SamplingGeoSpot { progress } => {
            if progress < 3 {
                Ok((SerfState::SamplingGeoSpot { progress: progress + 1 }, PRODUCTION_COUNTER))
            } else {
                plant_geology_sign(sim, pos, owner);
                Ok((SerfState::LookingForGeoSpot, HOP_COUNTER))
            }
        }

        SerfState::Logging { phase } => production_step(
            sim, pos, owner, phase, 4,
            |p| SerfState::Logging { phase: p },
            |sim, pos, owner| {
                let _ = sim.map.set_object(pos, ObjectKind::FelledTree(0), 0);
                drop_off_to_home_flag(sim, pos, owner, Resource::Lumber);
            },
        ),

        SerfState::Planting { phase } => production_step(
            sim, pos, owner, phase, 3,
            |p| SerfState::Planting { phase: p },
            |sim, pos, _owner| {
                let _ = sim.map.set_object(pos, ObjectKind::NewTree, 0);
            },
        ),

        SerfState::StoneCutting { phase } => production_step(
            sim, pos, owner, phase, 4,
            |p| SerfState::StoneCutting { phase: p },
            |sim, pos, owner| drop_off_to_home_flag(sim, pos, owner, Resource::Stone),
        ),

        SerfState::Fishing { phase } => production_step(
            sim, pos, owner, phase, 4,
            |p| SerfState::Fishing { phase: p },
            |sim, pos, owner| {
                if sim.map.remove_fish(pos, 1).is_ok() {
                    drop_off_to_home_flag(sim, pos, owner, Resource::Fish);
                }
            },
        ),

        SerfState::Farming { phase } => production_step(
            sim, pos, owner, phase, 4,
            |p| SerfState::Farming { phase: p },
            |sim, pos, _owner| {
                let _ = sim.map.set_object(pos, ObjectKind::Seeds(0), 0);
            },
        ),

        SerfState::Sawing { phase } => production_step(
            sim, pos, owner, phase, 4,
            |p| SerfState::Sawing { phase: p },
            |sim, pos, owner| drop_off_to_home_flag(sim, pos, owner, Resource::Plank),
        ),

        SerfState::Mining { phase } => {
            if phase + 1 >= MINING_PHASES {
                mine_extract(sim, pos, owner);
                Ok((SerfState::Mining { phase: 0 }, PRODUCTION_COUNTER))
            } else {
                Ok((SerfState::Mining { phase: phase + 1 }, PRODUCTION_COUNTER))
            }
        }

        SerfState::Smelting { phase, output } => production_step(
            sim, pos, owner, phase, 3,
            move |p| SerfState::Smelting { phase: p, output },
            move |sim, pos, owner| drop_off_to_home_flag(sim, pos, owner, output),
        ),

        SerfState::Milling { phase } => production_step(
            sim, pos, owner, phase, 2,
            |p| SerfState::Milling { phase: p },
            |sim, pos, owner| drop_off_to_home_flag(sim, pos, owner, Resource::Flour),
        ),

        SerfState::Baking { phase } => production_step(
            sim, pos, owner, phase, 2,
            |p| SerfState::Baking { phase: p },
            |sim, pos, owner| drop_off_to_home_flag(sim, pos, owner, Resource::Bread),
        ),

        SerfState::PigFarming { phase } => production_step(
            sim, pos, owner, phase, 4,
            |p| SerfState::PigFarming { phase: p },
            |sim, pos, owner| drop_off_to_home_flag(sim, pos, owner, Resource::Pig),
        ),

        SerfState::Butchering { phase } => production_step(
            sim, pos, owner, phase, 2,
            |p| SerfState::Butchering { phase: p },
            |sim, pos, owner| drop_off_to_home_flag(sim, pos, owner, Resource::Meat),
        ),

        SerfState::MakingWeapon { phase } => production_step(
            sim, pos, owner, phase, 3,
            |p| SerfState::MakingWeapon { phase: p },
            |sim, pos, owner| drop_off_to_home_flag(sim, pos, owner, Resource::Sword),
        ),

        SerfState::MakingTool { phase } => production_step(
            sim, pos, owner, phase, 3,
            |p| SerfState::MakingTool { phase: p },
            |sim, pos, owner| drop_off_to_home_flag(sim, pos, owner, Resource::Hammer),
        ),

        SerfState::BuildingBoat { phase } => production_step(
            sim, pos, owner, phase, 3,
            |p| SerfState::BuildingBoat { phase: p },
            |sim, pos, owner| drop_off_to_home_flag(sim, pos, owner, Resource::Boat),
        ),

        SerfState::KnightEngagingBuilding { target } => {
            Ok((SerfState::KnightPrepareAttacking { target }, HOP_COUNTER))
        }
        SerfState::KnightPrepareAttacking { target } => {
            Ok((SerfState::KnightAttacking { round: 0, target }, HOP_COUNTER))
        }
        SerfState::KnightPrepareAttackingFree => Ok((SerfState::KnightAttackingFree { round: 0 }, HOP_COUNTER)),
        SerfState::KnightPrepareDefendingFree => Ok((SerfState::KnightAttackingFreeWait, HOP_COUNTER)),

        SerfState::KnightAttacking { round, target } => duel_round(sim, id, kind, round, target),
        SerfState::KnightAttackingFree { round } => duel_round_free(sim, kind, round),
        SerfState::KnightAttackingFreeWait => Ok((SerfState::KnightAttackingFreeWait, HOP_COUNTER)),

        SerfState::KnightAttackingVictory | SerfState::KnightAttackingVictoryFree => {
            if let Some(player) = sim.player_mut(owner) {
                player.notify(NotificationKind::VictoryFight, pos);
            }
            Ok((SerfState::Walking {
                dest_flag: current_flag(sim, pos).unwrap_or(FlagId::NULL),
                cargo: WalkCargo::ToFlag,
            }, HOP_COUNTER))
        }

        SerfState::KnightAttackingDefeat | SerfState::KnightAttackingDefeatFree => {
            if let Some(player) = sim.player_mut(owner) {
                player.notify(NotificationKind::DefeatFight, pos);
            }
            sim.entities.serfs.free(id);
            Ok((SerfState::IdleInStock, i32::MAX))
        }

        SerfState::OccupyEnemyBuilding => {
            if let Some(player) = sim.player_mut(owner) {
                player.notify(NotificationKind::VictoryFight, pos);
            }
            let building_id = sim
                .map
                .object(pos)
                .ok()
                .and_then(|(k, idx)| (k == ObjectKind::SmallBuilding || k == ObjectKind::LargeBuilding || k == ObjectKind::Castle).then_some(idx))
                .map(freeserf_types::BuildingId::from_index);
            if let Some(building_id) = building_id {
                if let Some(building) = sim.entities.buildings.get_mut(building_id) {
                    building.owner = owner;
                    if building.garrison.is_none() && building.kind.is_military() {
                        building.garrison = Some(Garrison::default());
                    }
                }
                let _ = sim.map.set_owner(pos, Some(owner));
                crate::territory::recompute_around(&mut sim.map, &sim.entities.buildings, pos);
            }
            Ok((SerfState::DefendingHut, HOP_COUNTER))
        }

        SerfState::KnightLeaveForWalkToFight { target } => {
            Ok((leave_building(SerfState::KnightEngagingBuilding { target }), RAMP_COUNTER))
        }

        SerfState::IdleOnPath { flag, dir } => {
            let has_slot = sim
                .entities
                .flags
                .get(flag)
                .is_some_and(|f| f.other_end_dir.get(dir as usize).is_some_and(|o| o.pickup_slot.is_some()));
            if has_slot {
                Ok((SerfState::WakeOnPath, HOP_COUNTER))
            } else {
                Ok((SerfState::IdleOnPath { flag, dir }, HOP_COUNTER))
            }
        }

        SerfState::WaitIdleOnPath => Ok((SerfState::WaitIdleOnPath, HOP_COUNTER)),

        SerfState::WakeAtFlag => {
            let Some(flag) = current_flag(sim, pos) else {
                return Ok((SerfState::Scatter, HOP_COUNTER));
            };
            let picked = sim.entities.flags.get_mut(flag).and_then(|f| {
                let idx = f
                    .slots
                    .iter()
                    .position(|s| !s.is_empty() && s.scheduled_dir.is_some())?;
                let slot = f.slots[idx];
                f.clear_slot(idx);
                Some(slot)
            });
            match picked {
                Some(slot) => Ok((
                    SerfState::Transporting {
                        resource: slot.resource.unwrap_or(Resource::Plank),
                        dir: slot.scheduled_dir.unwrap_or(Direction::Right),
                        wait_counter: 0,
                    },
                    HOP_COUNTER,
                )),
                None => Ok((SerfState::IdleOnPath { flag, dir: Direction::Right }, HOP_COUNTER)),
            }
        }

        SerfState::WakeOnPath => Ok((SerfState::WakeAtFlag, HOP_COUNTER)),

        SerfState::Scatter => {
            let dir_index = sim.rng.below(6);
            if let Some(dir) = Direction::from_index(dir_index as u8) {
                let next_pos = sim.map.neighbor(pos, dir);
                if sim.map.is_passable(next_pos).unwrap_or(false) {
                    if let Some(serf) = sim.entities.serfs.get_mut(id) {
                        serf.pos = next_pos;
                    }
                }
            }
            Ok((SerfState::Lost { ticks: 0 }, HOP_COUNTER))
        }

        SerfState::FinishedBuilding => {
            sim.entities.serfs.free(id);
            Ok((SerfState::IdleInStock, i32::MAX))
        }

        SerfState::DefendingHut => Ok((SerfState::DefendingHut, HOP_COUNTER)),
        SerfState::DefendingTower => Ok((SerfState::DefendingTower, HOP_COUNTER)),
        SerfState::DefendingFortress => Ok((SerfState::DefendingFortress, HOP_COUNTER)),
        SerfState::DefendingCastle => Ok((SerfState::DefendingCastle, HOP_COUNTER)),

        SerfState::Lost { ticks } => {
            if ticks >= MAX_LOST_TICKS {
                sim.entities.serfs.free(id);
                return Ok((SerfState::IdleInStock, i32::MAX));
            }
            if sim.map.owner(pos).unwrap_or(None) == Some(owner) {
                if let Some(flag) = nearest_owned_flag(sim, pos, owner) {
                    return Ok((
                        SerfState::Walking {
                            dest_flag: flag,
                            cargo: WalkCargo::ToFlag,
                        },
                        HOP_COUNTER,
                    ));
                }
            }
            let dir_index = sim.rng.below(6);
            if let Some(dir) = Direction::from_index(dir_index as u8) {
                let next_pos = sim.map.neighbor(pos, dir);
                if sim.map.is_passable(next_pos).unwrap_or(false) {
                    if let Some(serf) = sim.entities.serfs.get_mut(id) {
                        serf.pos = next_pos;
                    }
                }
            }
            Ok((SerfState::Lost { ticks: ticks.saturating_add(1) }, HOP_COUNTER))
        }

        SerfState::LostSailor => Ok((SerfState::Lost { ticks: 0 }, HOP_COUNTER)),

        SerfState::EscapeBuilding => {
            let dir_index = sim.rng.below(6);
            if let Some(dir) = Direction::from_index(dir_index as u8) {
                let next_pos = sim.map.neighbor(pos, dir);
                if sim.map.is_passable(next_pos).unwrap_or(false) {
                    if let Some(serf) = sim.entities.serfs.get_mut(id) {
                        serf.pos = next_pos;
                    }
                    return Ok((SerfState::Lost { ticks: 0 }, HOP_COUNTER));
                }
            }
            Ok((SerfState::EscapeBuilding, HOP_COUNTER))
        }
    }
}

fn building_accepts_via_flag(kind: BuildingType) -> bool {
    kind.has_inventory()
}

fn deliver_to_building(sim: &mut SimulationState, building: freeserf_types::BuildingId, resource: Resource) {
    let Some(b) = sim.entities.buildings.get_mut(building) else {
        return;
    };
    if b.unfinished {
        match resource {
            Resource::Plank => {
                let BuildingPayload::Unfinished { planks_needed, .. } = &mut b.payload else {
                    return;
                };
                *planks_needed = planks_needed.saturating_sub(1);
                b.advance_construction(1, 0);
            }
            Resource::Stone => {
                let BuildingPayload::Unfinished { stone_needed, .. } = &mut b.payload else {
                    return;
                };
                *stone_needed = stone_needed.saturating_sub(1);
                b.advance_construction(0, 1);
            }
            _ => {}
        }
    } else {
        let _ = b.stock1.deliver(1);
    }
}

fn on_arrival_at_flag(flag: FlagId, cargo: WalkCargo, sim: &mut SimulationState) -> SerfState {
    let building = sim
        .entities
        .flags
        .get(flag)
        .and_then(|f| f.neighbors.get(Direction::UpLeft as usize).copied().flatten())
        .and_then(|n| match n {
            FlagOrBuilding::Building(b) => Some(b),
            FlagOrBuilding::Flag(_) => None,
        });
    match (building, cargo) {
        (Some(building), WalkCargo::Carrying(resource, _)) => {
            enter_building(building, SerfState::Delivering { resource, building })
        }
        (Some(building), _) => SerfState::ReadyToEnter { building },
        (None, WalkCargo::Carrying(resource, dir)) => SerfState::Transporting {
            resource,
            dir,
            wait_counter: 0,
        },
        (None, _) => SerfState::IdleOnPath { flag, dir: Direction::Right },
    }
}

fn step_construction(
    sim: &mut SimulationState,
    building: freeserf_types::BuildingId,
    phase: freeserf_entities::ConstructionPhase,
    leveling: bool,
) -> Result<(SerfState, i32), SimError> {
    use freeserf_entities::ConstructionPhase as Phase;
    match phase {
        Phase::Leveling { corner } if leveling => {
            if corner + 1 >= 6 {
                if let Some(b) = sim.entities.buildings.get_mut(building) {
                    if let BuildingPayload::Unfinished { level, .. } = &mut b.payload {
                        *level = 0;
                    }
                }
                Ok((
                    SerfState::Building {
                        building,
                        phase: Phase::Delivering { step: 0 },
                    },
                    RAMP_COUNTER,
                ))
            } else {
                Ok((
                    SerfState::Digging {
                        building,
                        phase: Phase::Leveling { corner: corner + 1 },
                    },
                    PRODUCTION_COUNTER,
                ))
            }
        }
        Phase::Delivering { step } => {
            let finished = sim.entities.buildings.get(building).is_some_and(|b| !b.unfinished);
            if finished {
                Ok((SerfState::FinishedBuilding, HOP_COUNTER))
            } else {
                Ok((
                    SerfState::Building {
                        building,
                        phase: Phase::Delivering { step: step.saturating_add(1) },
                    },
                    PRODUCTION_COUNTER,
                ))
            }
        }
        other => Ok((SerfState::Building { building, phase: other }, PRODUCTION_COUNTER)),
    }
}

fn production_step(
    sim: &mut SimulationState,
    pos: Pos,
    owner: freeserf_types::PlayerNum,
    phase: u8,
    cycle_len: u8,
    make_state: impl Fn(u8) -> SerfState,
    on_complete: impl FnOnce(&mut SimulationState, Pos, freeserf_types::PlayerNum),
) -> Result<(SerfState, i32), SimError> {
    if phase + 1 >= cycle_len {
        on_complete(sim, pos, owner);
        Ok((make_state(0), PRODUCTION_COUNTER))
    } else {
        Ok((make_state(phase + 1), PRODUCTION_COUNTER))
    }
}

fn drop_off_to_home_flag(sim: &mut SimulationState, pos: Pos, owner: freeserf_types::PlayerNum, resource: Resource) {
    let home_flag = sim.map.move_down_right(pos);
    if let Some(flag_id) = current_flag(sim, home_flag) {
        let _ = sim.entities.flags.get_mut(flag_id).map(|f| f.add_resource(resource, None));
    }
    let _ = owner;
}

fn mine_extract(sim: &mut SimulationState, pos: Pos, owner: freeserf_types::PlayerNum) {
    let deposit = sim.map.ground_deposit(pos).ok().flatten();
    match deposit {
        Some((kind, amount)) if amount > 0 => {
            if sim.map.remove_ground_deposit(pos, 1).is_ok() {
                let resource = match kind {
                    freeserf_types::GroundDeposit::Gold => Resource::GoldOre,
                    freeserf_types::GroundDeposit::Iron => Resource::IronOre,
                    freeserf_types::GroundDeposit::Coal => Resource::Coal,
                    freeserf_types::GroundDeposit::Stone => Resource::Stone,
                    freeserf_types::GroundDeposit::None => return,
                };
                drop_off_to_home_flag(sim, pos, owner, resource);
            }
            let exhausted = sim.map.ground_deposit(pos).ok().flatten().is_none();
            if exhausted {
                if let Some(player) = sim.player_mut(owner) {
                    player.notify(NotificationKind::MineEmpty, pos);
                }
            }
        }
        _ => {
            if let Some(player) = sim.player_mut(owner) {
                player.notify(NotificationKind::MineEmpty, pos);
            }
        }
    }
}

fn plant_geology_sign(sim: &mut SimulationState, pos: Pos, owner: freeserf_types::PlayerNum) {
    let deposit = sim.map.ground_deposit(pos).ok().flatten();
    let (sign, notify) = match deposit {
        Some((freeserf_types::GroundDeposit::Gold, amount)) => (
            if amount > 8 {
                freeserf_types::SignKind::LargeGold
            } else {
                freeserf_types::SignKind::SmallGold
            },
            Some(NotificationKind::FoundGold),
        ),
        Some((freeserf_types::GroundDeposit::Iron, amount)) => (
            if amount > 8 {
                freeserf_types::SignKind::LargeIron
            } else {
                freeserf_types::SignKind::SmallIron
            },
            Some(NotificationKind::FoundIron),
        ),
        Some((freeserf_types::GroundDeposit::Coal, amount)) => (
            if amount > 8 {
                freeserf_types::SignKind::LargeCoal
            } else {
                freeserf_types::SignKind::SmallCoal
            },
            Some(NotificationKind::FoundCoal),
        ),
        Some((freeserf_types::GroundDeposit::Stone, amount)) => (
            if amount > 8 {
                freeserf_types::SignKind::LargeStone
            } else {
                freeserf_types::SignKind::SmallStone
            },
            Some(NotificationKind::FoundStone),
        ),
        _ => (freeserf_types::SignKind::Empty, None),
    };
    let _ = sim.map.set_object(pos, ObjectKind::Sign(sign), 0);
    if let Some(kind) = notify {
        if let Some(player) = sim.player_mut(owner) {
            player.notify(kind, pos);
        }
    }
}

fn resolve_free_walking_goal(
    sim: &mut SimulationState,
    _id: SerfId,
    pos: Pos,
    _owner: freeserf_types::PlayerNum,
    goal: freeserf_entities::FreeWalkingGoal,
) -> SerfState {
    let _ = pos;
    use freeserf_entities::FreeWalkingGoal as Goal;
    match goal {
        Goal::Logging => SerfState::Logging { phase: 0 },
        Goal::Planting => SerfState::Planting { phase: 0 },
        Goal::StoneCutting => SerfState::StoneCutting { phase: 0 },
        Goal::Fishing => SerfState::Fishing { phase: 0 },
        Goal::Farming => SerfState::Farming { phase: 0 },
        Goal::SamplingGeoSpot => SerfState::SamplingGeoSpot { progress: 0 },
        Goal::KnightAttacking(target) => SerfState::KnightEngagingBuilding { target },
        Goal::KnightDefending => SerfState::KnightPrepareDefendingFree,
    }
}

/// Where a `Planning` serf's spiral search should center: its own position
/// for ordinary work goals, or the target building's position when the
/// goal is to engage that building.
fn spiral_center_for_goal(sim: &SimulationState, pos: Pos, goal: freeserf_entities::FreeWalkingGoal) -> Pos {
    use freeserf_entities::FreeWalkingGoal as Goal;
    match goal {
        Goal::KnightAttacking(target) => sim
            .entities
            .buildings
            .get(target)
            .map_or(pos, |building| building.pos),
        _ => pos,
    }
}

fn pick_spiral_target(
    sim: &SimulationState,
    center: Pos,
    goal: freeserf_entities::FreeWalkingGoal,
) -> Option<Pos> {
    use freeserf_entities::FreeWalkingGoal as Goal;
    sim.map.spiral_positions(center).into_iter().find(|&pos| {
        let Ok(tile_ok) = sim.map.is_passable(pos) else {
            return false;
        };
        if !tile_ok {
            return false;
        }
        match goal {
            Goal::SamplingGeoSpot => true,
            Goal::Logging => matches!(sim.map.object(pos), Ok((ObjectKind::Tree(8) | ObjectKind::Pine(8), _))),
            Goal::Fishing => sim.map.tile(pos).is_ok_and(|t| t.deep_water),
            _ => true,
        }
    })
}

fn col_row_delta(map: &freeserf_map::Map, from: Pos, to: Pos) -> (i8, i8) {
    let (fc, fr) = map.to_col_row(from);
    let (tc, tr) = map.to_col_row(to);
    let dc = i64::from(tc) - i64::from(fc);
    let dr = i64::from(tr) - i64::from(fr);
    (
        dc.clamp(i64::from(i8::MIN), i64::from(i8::MAX)) as i8,
        dr.clamp(i64::from(i8::MIN), i64::from(i8::MAX)) as i8,
    )
}

fn free_walking_direction(dist_col: i8, dist_row: i8) -> Direction {
    if dist_col.abs() >= dist_row.abs() {
        if dist_col > 0 { Direction::Right } else { Direction::Left }
    } else if dist_row > 0 {
        Direction::DownRight
    } else {
        Direction::UpLeft
    }
}

fn nearest_owned_flag(sim: &SimulationState, pos: Pos, owner: freeserf_types::PlayerNum) -> Option<FlagId> {
    sim.entities
        .flags
        .iter()
        .filter(|(_, f)| f.owner == owner)
        .min_by_key(|(_, f)| {
            let (fc, fr) = sim.map.to_col_row(f.pos);
            let (pc, pr) = sim.map.to_col_row(pos);
            (i64::from(fc) - i64::from(pc)).abs() + (i64::from(fr) - i64::from(pr)).abs()
        })
        .map(|(id, _)| id)
}

/// The knight at the head of a besieged building's garrison, if any.
fn defending_knight(sim: &SimulationState, target: freeserf_types::BuildingId) -> Option<(SerfId, SerfType)> {
    let building = sim.entities.buildings.get(target)?;
    let garrison = building.garrison.as_ref()?;
    let defender_id = *garrison.knights.first()?;
    let defender = sim.entities.serfs.get(defender_id)?;
    Some((defender_id, defender.kind))
}

/// One round of a building-siege duel: attacker level vs. the level of the
/// knight at the head of the target's garrison. On a win the defeated
/// defender is removed from the garrison; once the garrison is empty the
/// attacker moves on to occupy the building, otherwise the next defender
/// steps up.
fn duel_round(
    sim: &mut SimulationState,
    id: SerfId,
    kind: SerfType,
    round: u8,
    target: freeserf_types::BuildingId,
) -> Result<(SerfState, i32), SimError> {
    let attacker_level = kind.knight_level().unwrap_or(0);
    let defender = defending_knight(sim, target);
    let defender_level = defender.map_or(0, |(_, k)| k.knight_level().unwrap_or(0));
    let roll = sim.rng.die(20);
    let win = u16::from(roll).saturating_add(u16::from(attacker_level) * 2)
        > 14u16.saturating_add(u16::from(defender_level) * 2);

    if round < 3 {
        return Ok((SerfState::KnightAttacking { round: round + 1, target }, PRODUCTION_COUNTER));
    }
    if !win {
        return Ok((SerfState::KnightAttackingDefeat, HOP_COUNTER));
    }

    if let Some((defender_id, _)) = defender {
        sim.entities.serfs.free(defender_id);
        if let Some(building) = sim.entities.buildings.get_mut(target) {
            if let Some(garrison) = building.garrison.as_mut() {
                garrison.knights.retain(|&s| s != defender_id);
            }
        }
    }

    let knights_remaining = sim
        .entities
        .buildings
        .get(target)
        .and_then(|b| b.garrison.as_ref())
        .is_some_and(|g| !g.knights.is_empty());

    if knights_remaining {
        Ok((SerfState::KnightPrepareAttacking { target }, HOP_COUNTER))
    } else {
        if let Some(building_pos) = sim.entities.buildings.get(target).map(|b| b.pos) {
            if let Some(serf) = sim.entities.serfs.get_mut(id) {
                serf.pos = building_pos;
            }
        }
        Ok((SerfState::OccupyEnemyBuilding, HOP_COUNTER))
    }
}

/// One round of a field duel: attacker level against a flat threshold,
/// since no paired defending serf is tracked for open-field combat.
fn duel_round_free(sim: &mut SimulationState, kind: SerfType, round: u8) -> Result<(SerfState, i32), SimError> {
    let attacker_level = kind.knight_level().unwrap_or(0);
    let roll = sim.rng.die(20);
    let win = u16::from(roll).saturating_add(u16::from(attacker_level) * 2) > 14;
    if round >= 3 {
        return Ok(if win {
            (SerfState::KnightAttackingVictoryFree, HOP_COUNTER)
        } else {
            (SerfState::KnightAttackingDefeatFree, HOP_COUNTER)
        });
    }
    Ok((SerfState::KnightAttackingFree { round: round + 1 }, PRODUCTION_COUNTER))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use freeserf_economy::SearchCounter;
    use freeserf_entities::{ArenaKind, EntityStore, Flag, FlagArena, InventoryArena, SerfArena};
    use freeserf_map::{Map, MapUpdateConfig};
    use freeserf_types::{GroundDeposit, Rng};

    fn empty_sim() -> SimulationState {
        let map = Map::new(32, 32, MapUpdateConfig::default()).unwrap();
        let entities = EntityStore {
            flags: FlagArena::new(8, ArenaKind::Flag),
            buildings: freeserf_entities::BuildingArena::new(8, ArenaKind::Building),
            inventories: InventoryArena::new(4, ArenaKind::Inventory),
            serfs: SerfArena::new(8, ArenaKind::Serf),
        };
        SimulationState {
            map,
            entities,
            search_counter: SearchCounter::new(),
            rng: Rng::new((5, 7, 9)),
            players: vec![crate::player::PlayerState::new(0, 128, 128, 128)],
            game_tick: 0,
            game_speed: 0x1_0000,
            anim: 0,
            paused: false,
        }
    }

    fn spawn_serf(sim: &mut SimulationState, pos: Pos, state: SerfState) -> SerfId {
        let mut serf = freeserf_entities::Serf::new(SerfType::Generic, 0, pos, 0);
        serf.state = state;
        serf.counter = 0;
        sim.entities.serfs.alloc(serf).unwrap().0
    }

    #[test]
    fn idle_in_stock_is_a_fixed_point_without_dispatch() {
        let mut sim = empty_sim();
        let id = spawn_serf(&mut sim, 0, SerfState::IdleInStock);

        update(&mut sim).unwrap();

        let serf = sim.entities.serfs.get(id).unwrap();
        assert!(matches!(serf.state, SerfState::IdleInStock));
        assert_eq!(serf.counter, HOP_COUNTER);
    }

    #[test]
    fn walking_serf_with_no_home_building_lands_idle_on_path() {
        let mut sim = empty_sim();
        let flag_pos: Pos = 0;
        let (flag_id, _) = sim.entities.flags.alloc(Flag::new(flag_pos, 0)).unwrap();
        sim.map
            .set_object(flag_pos, ObjectKind::Flag, flag_id.index())
            .unwrap();

        let id = spawn_serf(
            &mut sim,
            flag_pos,
            SerfState::Walking {
                dest_flag: flag_id,
                cargo: WalkCargo::ToFlag,
            },
        );

        update(&mut sim).unwrap();

        let serf = sim.entities.serfs.get(id).unwrap();
        assert!(matches!(
            serf.state,
            SerfState::IdleOnPath { flag, .. } if flag == flag_id
        ));
    }

    #[test]
    fn mining_cycle_extracts_ore_then_notifies_on_exhaustion() {
        let mut sim = empty_sim();
        let mine_pos: Pos = 0;
        sim.map.tile_mut(mine_pos).unwrap().resource =
            freeserf_map::TileResource::Deposit(GroundDeposit::Coal, 1);

        let flag_pos = sim.map.move_down_right(mine_pos);
        let (flag_id, _) = sim.entities.flags.alloc(Flag::new(flag_pos, 0)).unwrap();
        sim.map
            .set_object(flag_pos, ObjectKind::Flag, flag_id.index())
            .unwrap();

        let id = spawn_serf(
            &mut sim,
            mine_pos,
            SerfState::Mining {
                phase: MINING_PHASES - 1,
            },
        );

        update(&mut sim).unwrap();

        assert!(sim.entities.serfs.get(id).is_some());
        assert_eq!(sim.map.ground_deposit(mine_pos).unwrap(), None);
        let flag = sim.entities.flags.get(flag_id).unwrap();
        assert_eq!(flag.slots[0].resource, Some(Resource::Coal));
        let player = sim.player_mut(0).unwrap();
        assert!(player
            .notifications
            .iter()
            .any(|n| n.kind == NotificationKind::MineEmpty));
    }

    #[test]
    fn lost_serf_gives_up_and_is_freed_after_max_ticks() {
        let mut sim = empty_sim();
        let id = spawn_serf(
            &mut sim,
            0,
            SerfState::Lost {
                ticks: MAX_LOST_TICKS,
            },
        );

        update(&mut sim).unwrap();

        assert!(sim.entities.serfs.get(id).is_none());
    }

    #[test]
    fn finished_building_frees_the_serf() {
        let mut sim = empty_sim();
        let id = spawn_serf(&mut sim, 0, SerfState::FinishedBuilding);

        update(&mut sim).unwrap();

        assert!(sim.entities.serfs.get(id).is_none());
    }
}
