//! Military-influence territory ownership.
//!
//! Every military building radiates influence that falls off with
//! distance; a tile's owner is whichever player's buildings radiate the
//! most influence onto it. Recomputed incrementally around a changed
//! building rather than over the whole map, since only a change to a
//! military building's presence or level can move a border.

use freeserf_entities::{BuildingArena, SerfArena};
use freeserf_map::{Map, Pos};
use freeserf_types::{BuildingType, PlayerNum, ThreatLevel};

/// Influence contributed by a military building at distance class 0..10,
/// indexed `[type_rank][distance_class]`. `type_rank` 0 = Hut, 1 = Tower,
/// 2 = Fortress/Castle.
const MILITARY_INFLUENCE: [[i32; 10]; 3] = [
    [16, 10, 6, 4, 2, 1, 0, 0, 0, 0],
    [24, 18, 13, 9, 6, 4, 2, 1, 0, 0],
    [32, 26, 20, 15, 11, 8, 5, 3, 1, 0],
];

const INFLUENCE_RADIUS: i64 = 9;

fn chebyshev(map: &Map, a: Pos, b: Pos) -> u32 {
    let (ac, ar) = map.to_col_row(a);
    let (bc, br) = map.to_col_row(b);
    let cols = i64::from(map.cols());
    let rows = i64::from(map.rows());
    let dc = wrap_dist(i64::from(ac), i64::from(bc), cols);
    let dr = wrap_dist(i64::from(ar), i64::from(br), rows);
    dc.max(dr) as u32
}

fn wrap_dist(a: i64, b: i64, bound: i64) -> i64 {
    let raw = (a - b).abs();
    raw.min(bound - raw)
}

/// Recompute ownership of every tile within [`INFLUENCE_RADIUS`] of
/// `changed_building`'s position, and of every other military building
/// within that same radius (a captured/demolished building can shift the
/// border around its neighbors too).
pub fn recompute_around(map: &mut Map, buildings: &BuildingArena, changed_pos: Pos) {
    let military: Vec<(Pos, PlayerNum, u8)> = buildings
        .iter()
        .filter(|(_, b)| b.kind.is_military() && !b.unfinished)
        .filter(|(_, b)| chebyshev(map, b.pos, changed_pos) <= INFLUENCE_RADIUS as u32 * 2)
        .filter_map(|(_, b)| b.kind.influence_rank().map(|rank| (b.pos, b.owner, rank)))
        .collect();

    let tile_count = map.tile_count() as u32;
    let (ccol, crow) = map.to_col_row(changed_pos);
    for drow in -INFLUENCE_RADIUS..=INFLUENCE_RADIUS {
        for dcol in -INFLUENCE_RADIUS..=INFLUENCE_RADIUS {
            let pos = map.pos_add(
                map.from_col_row(ccol, crow),
                (dcol as i32, drow as i32),
            );
            if pos >= tile_count {
                continue;
            }
            recompute_tile(map, &military, pos);
        }
    }
}

fn recompute_tile(map: &mut Map, military: &[(Pos, PlayerNum, u8)], pos: Pos) {
    let mut best: Option<(PlayerNum, i32)> = None;
    for &(building_pos, owner, rank) in military {
        let dist = chebyshev(map, building_pos, pos);
        if dist >= 10 {
            continue;
        }
        let influence = MILITARY_INFLUENCE
            .get(rank as usize)
            .and_then(|row| row.get(dist as usize))
            .copied()
            .unwrap_or(0);
        if influence <= 0 {
            continue;
        }
        match best {
            Some((_, best_influence)) if best_influence >= influence => {}
            _ => best = Some((owner, influence)),
        }
    }
    let owner = best.map(|(player, _)| player);
    let _ = map.set_owner(pos, owner);
}

/// The Chebyshev distance class (0..=3) from `pos` to the nearest
/// enemy-owned tile, for `Garrison::threat_level`. Scans outward ring by
/// ring up to distance 3; beyond that the building is interior.
#[must_use]
pub fn threat_level(map: &Map, pos: Pos, owner: PlayerNum) -> ThreatLevel {
    for dist in 0..=3i32 {
        for drow in -dist..=dist {
            for dcol in -dist..=dist {
                if dcol.abs().max(drow.abs()) != dist {
                    continue;
                }
                let candidate = map.pos_add(pos, (dcol, drow));
                if map.owner(candidate).unwrap_or(None).is_some_and(|o| o != owner) {
                    return ThreatLevel::from_distance(dist as u32);
                }
            }
        }
    }
    ThreatLevel::Interior
}

/// Sum land area (owned tile count) and building/military scores for
/// every active player, writing the totals back into each
/// [`crate::player::PlayerState`]. Called once per tick before the stats
/// sample.
pub fn recompute_totals(
    map: &Map,
    buildings: &BuildingArena,
    serfs: &SerfArena,
    players: &mut [crate::player::PlayerState],
) {
    let mut land = vec![0u32; players.len()];
    for (_, tile) in map.iter() {
        if let Some(owner) = tile.owner {
            if let Some(slot) = land.get_mut(owner as usize) {
                *slot = slot.saturating_add(1);
            }
        }
    }

    let mut building_score = vec![0u32; players.len()];
    let mut military_score = vec![0u32; players.len()];
    for (_, building) in buildings.iter() {
        if let Some(slot) = building_score.get_mut(building.owner as usize) {
            *slot = slot.saturating_add(if building.unfinished { 1 } else { 2 });
        }
    }
    for (_, serf) in serfs.iter() {
        if serf.is_knight() {
            if let Some(slot) = military_score.get_mut(serf.owner as usize) {
                *slot = slot.saturating_add(1);
            }
        }
    }

    for player in players.iter_mut() {
        let idx = player.player as usize;
        player.total_land_area = land.get(idx).copied().unwrap_or(0);
        player.total_building_score = building_score.get(idx).copied().unwrap_or(0);
        player.total_military_score = military_score.get(idx).copied().unwrap_or(0);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use freeserf_entities::{ArenaKind, Building};
    use freeserf_map::MapUpdateConfig;
    use freeserf_types::{BuildingType, FlagId};

    #[test]
    fn recompute_assigns_nearest_building_owner() {
        let mut map = Map::new(32, 32, MapUpdateConfig::default()).unwrap();
        let mut buildings = BuildingArena::new(4, ArenaKind::Building);
        let pos = map.from_col_row(16, 16);
        let mut building = Building::new_unfinished(pos, BuildingType::Hut, 0, FlagId::from_index(1));
        building.unfinished = false;
        buildings.alloc(building).unwrap();
        recompute_around(&mut map, &buildings, pos);
        assert_eq!(map.owner(pos).unwrap(), Some(0));
    }

    #[test]
    fn threat_level_is_interior_when_no_enemy_nearby() {
        let map = Map::new(32, 32, MapUpdateConfig::default()).unwrap();
        let pos = map.from_col_row(16, 16);
        assert_eq!(threat_level(&map, pos, 0), ThreatLevel::Interior);
    }
}
