//! Per-flag transport scheduling: deciding, for each resource waiting on
//! a flag, which direction a transporter should carry it, and requesting
//! new transporters for busy road segments.

use freeserf_entities::{BuildingArena, FlagArena, InventoryArena};
use freeserf_map::Map;
use freeserf_types::{
    enums::{is_building_routable, FOODS},
    Direction, FlagId, FlagOrBuilding, InventoryId, Resource,
};

use crate::error::SchedulerError;
use crate::flagsearch::{FlagSearch, SearchCounter, SearchFilter};

/// A priority-good-enough-to-stop-early threshold for
/// `schedule_to_unknown_destination`'s building search.
const GOOD_ENOUGH_PRIORITY: u8 = 204;

/// Per-resource flag transport priorities, indexed by `Resource as
/// usize`, as configured on the owning player.
pub type FlagPriorities = [u8; 26];

/// Stateless entry point for one scheduler pass over every flag with
/// resources waiting.
pub struct TransportScheduler;

impl TransportScheduler {
    /// Run one scheduling pass: for every flag with `resources_waiting`
    /// set, clear the bit and attempt to assign a dispatch direction to
    /// each of its unscheduled resource slots, then re-prioritize each
    /// direction's next pickup and request transporters where a segment
    /// is short-handed.
    ///
    /// # Errors
    ///
    /// Propagates [`SearchError`](crate::error::SearchError) wrapped as
    /// [`SchedulerError`] only in the unreachable runaway case; ordinary
    /// "no destination found" outcomes are absorbed per-slot rather than
    /// aborting the whole pass.
    pub fn update(
        flags: &mut FlagArena,
        buildings: &BuildingArena,
        inventories: &InventoryArena,
        map: &Map,
        counter: &mut SearchCounter,
        flag_prio: &FlagPriorities,
    ) -> Result<(), SchedulerError> {
        let pending: Vec<FlagId> = flags
        .iter()
        .filter(|(_, flag)| flag.resources_waiting)
        .map(|(id, _)| id)
        .collect();

        for flag_id in pending {
            if let Some(flag) = flags.get_mut(flag_id) {
                flag.resources_waiting = false;
            }
            Self::schedule_flag(flag_id, flags, buildings, inventories, map, counter);
        }

        let dirs: Vec<(FlagId, Direction)> = flags
        .iter()
        .flat_map(|(id, flag)| {
            freeserf_types::direction::ROAD_DIRECTIONS
            .into_iter()
            .filter(move |&dir| flag.has_path(dir))
            .map(move |dir| (id, dir))
        })
        .collect();
        for (flag_id, dir) in dirs {
            Self::prioritize_pickup(flag_id, dir, flags, flag_prio);
        }
        Ok(())
    }

    fn schedule_flag(
        flag_id: FlagId,
        flags: &mut FlagArena,
        buildings: &BuildingArena,
        inventories: &InventoryArena,
        map: &Map,
        counter: &mut SearchCounter,
    ) {
        let slot_count = flags.get(flag_id).map_or(0, |f| f.slots.len());
        for slot_index in 0..slot_count {
            let Some((resource, destination, already_scheduled)) =
            flags.get(flag_id).and_then(|f| f.slots.get(slot_index)).map(|s| {
                (s.resource, s.destination, s.scheduled_dir.is_some())
            })
            else {
                continue;
            };
            let Some(resource) = resource else { continue };
            if already_scheduled {
                continue;
            }

            let outcome = if let Some(dest) = destination {
                Self::schedule_to_known_destination(flag_id, slot_index, dest, flags, map, counter)
            } else {
                Self::schedule_to_unknown_destination(
                    flag_id,
                    slot_index,
                    resource,
                    flags,
                    buildings,
                    inventories,
                    map,
                    counter,
                )
            };

            if outcome.is_none() {
                if let Some(flag) = flags.get_mut(flag_id) {
                    if let Some(slot) = flag.slots.get_mut(slot_index) {
                        slot.destination = None;
                    }
                }
            }
        }
    }

    /// Try every outgoing road direction as a BFS source, most-idle edge
    /// first (idleness classes 0,1,2,3 — §4.5), until one reaches
    /// `destination`. Records that direction as the slot's `scheduled_dir`.
    fn schedule_to_known_destination(
        flag_id: FlagId,
        slot_index: usize,
        destination: FlagId,
        flags: &mut FlagArena,
        map: &Map,
        counter: &mut SearchCounter,
    ) -> Option<Direction> {
        let flag = flags.get(flag_id)?;
        let mut out_dirs: Vec<(Direction, u8)> = flag
        .neighbors
        .iter()
        .enumerate()
        .filter_map(|(i, n)| match n {
            Some(FlagOrBuilding::Flag(_)) => Direction::from_index(i as u8),
            _ => None,
        })
        .map(|dir| {
            let class = flag
            .length
            .get(dir as usize)
            .map_or(3, idleness_class);
            (dir, class)
        })
        .collect();
        out_dirs.sort_by_key(|&(_, class)| class);

        for (dir, _) in out_dirs {
            let Some(FlagOrBuilding::Flag(neighbor)) =
            flags.get(flag_id).and_then(|f| f.neighbors.get(dir as usize)).copied().flatten()
            else {
                continue;
            };
            let found = FlagSearch::single(
                counter,
                flags,
                map,
                neighbor,
                SearchFilter::default(),
                |id, _| id == destination,
            )
            .unwrap_or(false);
            if found || neighbor == destination {
                if let Some(flag) = flags.get_mut(flag_id) {
                    if let Some(slot) = flag.slots.get_mut(slot_index) {
                        slot.scheduled_dir = Some(dir);
                    }
                }
                return Some(dir);
            }
        }
        None
    }

    /// Route a resource with no known destination: either to the nearest
    /// building that accepts its resource group, or to the nearest
    /// inventory that accepts resources. Destination choice rests solely
    /// on the target's own request priority (§4.5); `flag_prio` only
    /// governs pickup ordering once a direction is scheduled, in
    /// `prioritize_pickup`.
    #[allow(clippy::too_many_arguments)]
    fn schedule_to_unknown_destination(
        flag_id: FlagId,
        slot_index: usize,
        resource: Resource,
        flags: &mut FlagArena,
        buildings: &BuildingArena,
        inventories: &InventoryArena,
        map: &Map,
        counter: &mut SearchCounter,
    ) -> Option<Direction> {
        let target = if is_building_routable(resource) {
            Self::find_accepting_building_flag(flag_id, resource, flags, buildings, map, counter)
        } else {
            Self::find_accepting_inventory_flag(flag_id, flags, inventories, map, counter)
        }?;

        Self::schedule_to_known_destination(flag_id, slot_index, target, flags, map, counter)
    }

    fn find_accepting_building_flag(
        flag_id: FlagId,
        resource: Resource,
        flags: &mut FlagArena,
        buildings: &BuildingArena,
        map: &Map,
        counter: &mut SearchCounter,
    ) -> Option<FlagId> {
        let is_food = FOODS.contains(&resource);
        let mut best: Option<(FlagId, u8)> = None;
        FlagSearch::single(
            counter,
            flags,
            map,
            flag_id,
            SearchFilter::default(),
            |id, flag| {
                let Some(FlagOrBuilding::Building(building_id)) =
                flag.neighbors.get(Direction::UpLeft as usize).copied().flatten()
                else {
                    return false;
                };
                let Some(building) = buildings.get(building_id) else {
                    return false;
                };
                if building.unfinished {
                    return false;
                }
                let accepts = is_food || building_accepts(building.kind, resource);
                if !accepts {
                    return false;
                }
                let priority = building.stock1.request_priority(255);
                match best {
                    Some((_, best_prio)) if best_prio >= priority => {}
                    _ => best = Some((id, priority)),
                }
                priority >= GOOD_ENOUGH_PRIORITY
            },
        )
        .ok()?;
        best.map(|(id, _)| id)
    }

    fn find_accepting_inventory_flag(
        flag_id: FlagId,
        flags: &mut FlagArena,
        inventories: &InventoryArena,
        map: &Map,
        counter: &mut SearchCounter,
    ) -> Option<FlagId> {
        let mut found = None;
        FlagSearch::single(
            counter,
            flags,
            map,
            flag_id,
            SearchFilter::default(),
            |id, _| {
                let accepts = inventories
                .iter()
                .any(|(_, inv)| inv.flag == id && inv.accepts_resources());
                if accepts {
                    found = Some(id);
                }
                accepts
            },
        )
        .ok()?;
        found
    }

    /// Among slots scheduled out direction `dir`, select the one with
    /// the highest `flag_prio[resource]` and record it as the next
    /// pickup.
    pub fn prioritize_pickup(
        flag_id: FlagId,
        dir: Direction,
        flags: &mut FlagArena,
        flag_prio: &FlagPriorities,
    ) {
        let Some(flag) = flags.get_mut(flag_id) else {
            return;
        };
        let best = flag
        .slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.scheduled_dir == Some(dir))
        .filter_map(|(i, slot)| slot.resource.map(|r| (i, r)))
        .max_by_key(|(_, resource)| flag_prio.get(*resource as usize).copied().unwrap_or(0));

        if let Some(entry) = flag.other_end_dir.get_mut(dir as usize) {
            entry.pickup_slot = best.map(|(i, _)| i as u8);
        }
    }

    /// Check whether direction `dir` out of `flag_id` needs a new
    /// transporter: fewer are assigned than the segment's category
    /// allows, and none has been requested yet. Returns the nearer
    /// candidate inventory for the caller to dispatch a serf from, if a
    /// two-source search from both endpoints finds one with available
    /// transporters/sailors or a generic serf to promote.
    pub fn call_transporter(
        flag_id: FlagId,
        dir: Direction,
        is_water: bool,
        flags: &mut FlagArena,
        inventories: &InventoryArena,
        map: &Map,
        counter: &mut SearchCounter,
    ) -> Option<InventoryId> {
        let flag = flags.get(flag_id)?;
        let length = *flag.length.get(dir as usize)?;
        let category = length.category as usize;
        let max = freeserf_types::MAX_TRANSPORTERS_BY_CATEGORY
        .get(category)
        .copied()
        .unwrap_or(1);
        if length.transporter_count >= max || length.transporter_requested {
            return None;
        }
        let far_end = match flag.neighbors.get(dir as usize).copied().flatten() {
            Some(FlagOrBuilding::Flag(other)) => other,
            _ => return None,
        };

        let wanted_kind = if is_water {
            freeserf_types::SerfType::Sailor
        } else {
            freeserf_types::SerfType::Transporter
        };

        let mut search = FlagSearch::new(counter, flags);
        search.add_source(flag_id, flags);
        search.add_source(far_end, flags);
        let mut candidate = None;
        search
        .execute(map, flags, SearchFilter::default(), |id, _| {
            let Some(inv) = inventories.iter().find(|(_, inv)| inv.flag == id) else {
                return false;
            };
            if inv.1.serf_count(wanted_kind) > 0 || inv.1.serf_count(freeserf_types::SerfType::Generic) > 0
            {
                candidate = Some(inv.0);
                true
            } else {
                false
            }
        })
        .ok()?;

        if candidate.is_some() {
            if let Some(flag) = flags.get_mut(flag_id) {
                if let Some(l) = flag.length.get_mut(dir as usize) {
                    l.transporter_requested = true;
                }
            }
            if let Some(other) = flags.get_mut(far_end) {
                if let Some(back_dir) = other
                .neighbors
                .iter()
                .position(|n| *n == Some(FlagOrBuilding::Flag(flag_id)))
                .and_then(|i| Direction::from_index(i as u8))
                {
                    if let Some(l) = other.length.get_mut(back_dir as usize) {
                        l.transporter_requested = true;
                    }
                }
            }
        }
        candidate
    }
}

/// How idle a road segment is, as an 0..=3 class where 0 is most idle
/// (§4.5's "idle-transporter mask"): derived from how much spare
/// transporter capacity the segment's category still allows.
fn idleness_class(length: &freeserf_entities::LengthField) -> u8 {
    let max = freeserf_types::MAX_TRANSPORTERS_BY_CATEGORY
    .get(length.category as usize)
    .copied()
    .unwrap_or(1);
    match max.saturating_sub(length.transporter_count) {
        0 => 3,
        1 => 2,
        2 => 1,
        _ => 0,
    }
}

fn building_accepts(kind: freeserf_types::BuildingType, resource: Resource) -> bool {
    use freeserf_types::BuildingType as B;
    match (kind, resource) {
        (B::Sawmill, Resource::Lumber)
        | (B::SteelSmelter, Resource::IronOre | Resource::Coal)
        | (B::GoldSmelter, Resource::GoldOre | Resource::Coal)
        | (B::ToolMaker, Resource::Plank | Resource::Steel)
        | (B::WeaponSmith, Resource::Steel | Resource::Coal)
        | (B::Mill, Resource::Wheat)
        | (B::Bakery, Resource::Flour)
        | (B::Butcher, Resource::Pig)
        | (B::PigFarm, Resource::Wheat) => true,
        (B::Stock | B::Castle, _) => true,
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use freeserf_entities::{ArenaKind, Flag};
    use freeserf_map::MapUpdateConfig;

    #[test]
    fn prioritize_pickup_selects_highest_priority_resource() {
        let mut flags = FlagArena::new(4, ArenaKind::Flag);
        let (id, _) = flags.alloc(Flag::new(0, 0)).unwrap();
        {
            let flag = flags.get_mut(id).unwrap();
            flag.slots[0].resource = Some(Resource::Lumber);
            flag.slots[0].scheduled_dir = Some(Direction::Right);
            flag.slots[1].resource = Some(Resource::GoldBar);
            flag.slots[1].scheduled_dir = Some(Direction::Right);
        }
        let mut prio = [0u8; 26];
        prio[Resource::Lumber as usize] = 10;
        prio[Resource::GoldBar as usize] = 200;
        TransportScheduler::prioritize_pickup(id, Direction::Right, &mut flags, &prio);
        let flag = flags.get(id).unwrap();
        assert_eq!(
            flag.other_end_dir[Direction::Right as usize].pickup_slot,
            Some(1)
        );
    }

    #[test]
    fn call_transporter_skips_when_already_requested() {
        let mut flags = FlagArena::new(4, ArenaKind::Flag);
        let mut map = Map::new(32, 32, MapUpdateConfig::default()).unwrap();
        let inventories = InventoryArena::new(1, ArenaKind::Inventory);
        let (id, _) = flags.alloc(Flag::new(0, 0)).unwrap();
        {
            let flag = flags.get_mut(id).unwrap();
            flag.set_path(Direction::Right);
            flag.length[Direction::Right as usize].transporter_requested = true;
        }
        let mut counter = SearchCounter::new();
        let result = TransportScheduler::call_transporter(
            id,
            Direction::Right,
            false,
            &mut flags,
            &inventories,
            &mut map,
            &mut counter,
        );
        assert!(result.is_none());
    }
}
