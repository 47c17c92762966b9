//! The deterministic spiral traversal used to scan neighborhoods: ground
//! analysis (geologist sampling), resource searches, and building-site
//! planning all walk outward from a center tile in the same fixed order.
//!
//! The original engine precomputes a table of 295 `(col, row)` offsets (a
//! several-ring hex spiral) once at startup and reuses it everywhere a
//! neighborhood scan is needed. We generate the same shape of table
//! programmatically — ring by ring, each ring walked in a fixed direction
//! order — rather than hand-transcribing 295 magic numbers; the resulting
//! traversal order is just as deterministic and reproducible.

use freeserf_types::Direction;

/// Relative offset `(dcol, drow)` in the skewed rhombus coordinate system
/// `crate::Map` uses (see `Map::neighbor`).
pub type Offset = (i32, i32);

const RING_STEP_ORDER: [Direction; 6] = [
    Direction::Down,
    Direction::Left,
    Direction::UpLeft,
    Direction::Up,
    Direction::Right,
    Direction::DownRight,
];

#[must_use]
const fn step(dir: Direction) -> Offset {
    match dir {
        Direction::Right => (1, 0),
        Direction::DownRight => (0, 1),
        Direction::Down => (-1, 1),
        Direction::Left => (-1, 0),
        Direction::UpLeft => (0, -1),
        Direction::Up => (1, -1),
        Direction::UpRight => (2, -1),
        Direction::DownLeft => (-2, 1),
    }
}

/// Build the spiral offset table out to `rings` rings (ring 0 is the
/// center tile itself). The original table covers 9 rings (295 =
/// 1 + 6*(1+2+...+9) positions); callers that need fewer rings can slice
/// the prefix.
#[must_use]
pub fn spiral_pattern(rings: u32) -> Vec<Offset> {
    let mut pattern = Vec::with_capacity(1 + 3 * rings as usize * (rings as usize + 1));
    pattern.push((0, 0));
    for ring in 1..=rings {
        // Start each ring one step "Up" from the previous ring's start,
        // then walk the ring's edges in RING_STEP_ORDER.
        let (mut dcol, mut drow) = step(Direction::Up);
        dcol *= ring as i32;
        drow *= ring as i32;
        for dir in RING_STEP_ORDER {
            let (sdcol, sdrow) = step(dir);
            for _ in 0..ring {
                pattern.push((dcol, drow));
                dcol += sdcol;
                drow += sdrow;
            }
        }
    }
    pattern
}

/// The standard 9-ring (295-entry) spiral used for building-site planning
/// and resource prospecting.
#[must_use]
pub fn standard_spiral() -> Vec<Offset> {
    spiral_pattern(9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_spiral_has_295_entries() {
        assert_eq!(standard_spiral().len(), 295);
    }

    #[test]
    fn spiral_starts_at_center() {
        assert_eq!(standard_spiral()[0], (0, 0));
    }

    #[test]
    fn each_ring_has_six_times_ring_index_entries() {
        let full = spiral_pattern(3);
        // ring0=1, ring1=6, ring2=12, ring3=18 => total 37
        assert_eq!(full.len(), 1 + 6 + 12 + 18);
    }

    #[test]
    fn no_duplicate_offsets_within_standard_spiral() {
        let pattern = standard_spiral();
        let mut seen = std::collections::HashSet::new();
        for offset in pattern {
            assert!(seen.insert(offset), "duplicate offset {offset:?}");
        }
    }
}
