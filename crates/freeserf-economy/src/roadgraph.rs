//! Road construction, demolition, and mid-path flag insertion.
//!
//! Roads connect two flags through a sequence of intermediate tiles. A
//! path must be entirely over land or entirely over water; building it
//! writes the map's path bits, links the two flags' per-direction
//! bookkeeping with reciprocal `other_end_dir` entries, and records the
//! segment's length category.

use freeserf_entities::FlagArena;
use freeserf_map::{Map, Pos};
use freeserf_types::{constants::road_length_category, Direction, FlagOrBuilding, ObjectKind, PlayerNum};

use crate::error::RoadError;

/// Walk `directions` from `from`'s position and connect it to whatever
/// flag sits at the far end, provided the whole path is passable,
/// player-owned, height-compatible, and uniformly land or water.
///
/// Returns the destination flag's handle.
///
/// # Errors
///
/// Returns [`RoadError::DanglingFlag`] if `from` is not a live flag,
/// [`RoadError::Blocked`] if an intermediate tile is occupied or out of
/// bounds, [`RoadError::NotOwned`] if a tile belongs to another player,
/// [`RoadError::TooSteep`] if a height step exceeds 4, or
/// [`RoadError::NoPath`] if the path is empty, self-crossing, mixes land
/// and water, or does not terminate on a flag.
pub fn build_road(
    player: PlayerNum,
    from: freeserf_types::FlagId,
    directions: &[Direction],
    map: &mut Map,
    flags: &mut FlagArena,
) -> Result<freeserf_types::FlagId, RoadError> {
    let &first_dir = directions.first().ok_or(RoadError::NoPath)?;
    let from_pos = flags.get(from).ok_or(RoadError::DanglingFlag)?.pos;
    if flags.get(from).is_some_and(|f| f.has_path(first_dir)) {
        return Err(RoadError::Blocked(from_pos));
    }

    let mut visited = vec![from_pos];
    let mut is_water: Option<bool> = None;
    let mut pos = from_pos;
    for (step, &dir) in directions.iter().enumerate() {
        let next = map.neighbor(pos, dir);
        if visited.contains(&next) {
            return Err(RoadError::NoPath);
        }

        let here_height = map.height(pos).map_err(|_| RoadError::Blocked(pos))?;
        let next_height = map.height(next).map_err(|_| RoadError::Blocked(next))?;
        if here_height.abs_diff(next_height) > 4 {
            return Err(RoadError::TooSteep(next));
        }

        let tile = map.tile(next).map_err(|_| RoadError::Blocked(next))?;
        if tile.owner != Some(player) {
            return Err(RoadError::NotOwned(next));
        }

        let is_final = step + 1 == directions.len();
        if is_final {
            if tile.object != ObjectKind::Flag {
                return Err(RoadError::NoPath);
            }
        } else if tile.object != ObjectKind::None {
            return Err(RoadError::Blocked(next));
        }

        let water_here = tile.deep_water;
        match is_water {
            None => is_water = Some(water_here),
            Some(expected) if expected != water_here => return Err(RoadError::NoPath),
            Some(_) => {}
        }

        visited.push(next);
        pos = next;
    }
    let water = is_water.unwrap_or(false);

    let dest_pos = pos;
    let dest_object_index = map
    .object(dest_pos)
    .map_err(|_| RoadError::Blocked(dest_pos))?
    .1;
    let dest = freeserf_types::FlagId::from_index(dest_object_index);
    if !flags.is_allocated(dest) {
        return Err(RoadError::DanglingFlag);
    }

    for window in visited.windows(2) {
        let [a, b] = window else { continue };
        let dir = step_direction(map, *a, *b).ok_or(RoadError::NoPath)?;
        map.add_path(*a, dir).map_err(|_| RoadError::Blocked(*a))?;
    }

    let last_dir = directions.last().copied().ok_or(RoadError::NoPath)?;
    let reverse_dir = last_dir.reverse();
    let length = directions.len() as u32;
    let category = road_length_category(length);

    link_endpoint(flags, from, first_dir, dest, category, water);
    link_endpoint(flags, dest, reverse_dir, from, category, water);

    Ok(dest)
}

fn step_direction(map: &Map, from: Pos, to: Pos) -> Option<Direction> {
    freeserf_types::direction::ROAD_DIRECTIONS
    .into_iter()
    .find(|&dir| map.neighbor(from, dir) == to)
}

fn link_endpoint(
    flags: &mut FlagArena,
    at: freeserf_types::FlagId,
    dir: Direction,
    other: freeserf_types::FlagId,
    category: u8,
    water: bool,
) {
    let Some(flag) = flags.get_mut(at) else {
        return;
    };
    flag.set_path(dir);
    flag.set_water(dir, water);
    flag.set_endpoint(dir, false);
    flag.neighbors[dir as usize] = Some(FlagOrBuilding::Flag(other));
    if let Some(length) = flag.length.get_mut(dir as usize) {
        length.category = category;
        length.transporter_count = 0;
        length.transporter_requested = false;
    }
}

/// Tear down the road attached to `at` in direction `dir`, clearing the
/// map's path bits along the segment and both endpoints' bookkeeping.
///
/// # Errors
///
/// Returns [`RoadError::DanglingFlag`] if `at` is not a live flag, or
/// [`RoadError::NoPath`] if no road is attached in `dir`.
pub fn demolish_road(
    at: freeserf_types::FlagId,
    dir: Direction,
    map: &mut Map,
    flags: &mut FlagArena,
) -> Result<(), RoadError> {
    let (from_pos, other) = {
        let flag = flags.get(at).ok_or(RoadError::DanglingFlag)?;
        if !flag.has_path(dir) {
            return Err(RoadError::NoPath);
        }
        (flag.pos, flag.neighbors.get(dir as usize).copied().flatten())
    };

    let mut pos = from_pos;
    let mut walking = dir;
    loop {
        let next = map.neighbor(pos, walking);
        map.remove_path(pos, walking).map_err(|_| RoadError::Blocked(pos))?;
        let arrived_at_flag = map
        .object(next)
        .map(|(kind, _)| kind == ObjectKind::Flag)
        .unwrap_or(false);
        if arrived_at_flag {
            break;
        }
        let Some(next_dir) = find_continuation(map, next, walking) else {
            break;
        };
        pos = next;
        walking = next_dir;
    }

    if let Some(flag) = flags.get_mut(at) {
        flag.clear_path(dir);
    }
    if let Some(FlagOrBuilding::Flag(other_id)) = other {
        if let Some(other_flag) = flags.get_mut(other_id) {
            let back_dir = other_flag
            .neighbors
            .iter()
            .position(|n| *n == Some(FlagOrBuilding::Flag(at)))
            .and_then(|idx| Direction::from_index(idx as u8));
            if let Some(back_dir) = back_dir {
                other_flag.clear_path(back_dir);
            }
        }
    }
    Ok(())
}

/// A road segment's single remaining path bit on the far side of the
/// tile just vacated, used by [`demolish_road`] to keep walking a
/// multi-tile segment to its terminating flag.
fn find_continuation(map: &Map, pos: Pos, came_from: Direction) -> Option<Direction> {
    let tile = map.tile(pos).ok()?;
    freeserf_types::direction::ROAD_DIRECTIONS
    .into_iter()
    .find(|&dir| dir != came_from.reverse() && tile.has_path(dir))
}

/// Insert a new flag in the middle of an existing road segment, splitting
/// it into two shorter segments that each keep half the original segment's
/// transporter/water bookkeeping pattern.
///
/// The original-endpoint-to-new-flag segment reuses `category`/`water` as
/// given; callers recompute the accurate per-segment category from the
/// actual tile count if they need it to differ between the two halves.
///
/// # Errors
///
/// Returns [`RoadError::DanglingFlag`] if either flag handle is not live.
pub fn split_path_at_flag(
    new_flag: freeserf_types::FlagId,
    old_end: freeserf_types::FlagId,
    dir_from_old_end: Direction,
    category: u8,
    water: bool,
    flags: &mut FlagArena,
) -> Result<(), RoadError> {
    if !flags.is_allocated(new_flag) {
        return Err(RoadError::DanglingFlag);
    }
    let dir_from_new = dir_from_old_end.reverse();
    link_endpoint(flags, old_end, dir_from_old_end, new_flag, category, water);
    link_endpoint(flags, new_flag, dir_from_new, old_end, category, water);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use freeserf_entities::Flag;
    use freeserf_map::MapUpdateConfig;

    fn setup() -> (Map, FlagArena, freeserf_types::FlagId, freeserf_types::FlagId) {
        let mut map = Map::new(32, 32, MapUpdateConfig::default()).unwrap();
        let mut flags = FlagArena::new(8, freeserf_entities::ArenaKind::Flag);
        let a_pos = map.from_col_row(5, 5);
        let b_pos = map.neighbor(a_pos, Direction::Right);
        for pos in [a_pos, b_pos] {
            map.set_owner(pos, Some(0)).unwrap();
        }
        map.set_object(a_pos, ObjectKind::Flag, 0).unwrap();
        map.set_object(b_pos, ObjectKind::Flag, 0).unwrap();
        let (a, _) = flags.alloc(Flag::new(a_pos, 0)).unwrap();
        let (b, _) = flags.alloc(Flag::new(b_pos, 0)).unwrap();
        map.set_object(a_pos, ObjectKind::Flag, a.index()).unwrap();
        map.set_object(b_pos, ObjectKind::Flag, b.index()).unwrap();
        (map, flags, a, b)
    }

    #[test]
    fn build_road_links_both_endpoints() {
        let (mut map, mut flags, a, b) = setup();
        let dest = build_road(0, a, &[Direction::Right], &mut map, &mut flags).unwrap();
        assert_eq!(dest, b);
        assert!(flags.get(a).unwrap().has_path(Direction::Right));
        assert!(flags.get(b).unwrap().has_path(Direction::Left));
        assert_eq!(
            flags.get(a).unwrap().neighbors[Direction::Right as usize],
            Some(FlagOrBuilding::Flag(b))
        );
    }

    #[test]
    fn build_road_rejects_unowned_tile() {
        let (mut map, mut flags, a, _b) = setup();
        let next = map.neighbor(flags.get(a).unwrap().pos, Direction::Right);
        map.set_owner(next, Some(1)).unwrap();
        assert!(build_road(0, a, &[Direction::Right], &mut map, &mut flags).is_err());
    }

    #[test]
    fn build_road_rejects_missing_destination_flag() {
        let (mut map, mut flags, a, b) = setup();
        let b_pos = flags.get(b).unwrap().pos;
        map.set_object(b_pos, ObjectKind::None, 0).unwrap();
        assert!(build_road(0, a, &[Direction::Right], &mut map, &mut flags).is_err());
    }

    #[test]
    fn demolish_road_clears_both_sides() {
        let (mut map, mut flags, a, b) = setup();
        build_road(0, a, &[Direction::Right], &mut map, &mut flags).unwrap();
        demolish_road(a, Direction::Right, &mut map, &mut flags).unwrap();
        assert!(!flags.get(a).unwrap().has_path(Direction::Right));
        assert!(!flags.get(b).unwrap().has_path(Direction::Left));
    }
}
