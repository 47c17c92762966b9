//! Hexagonal neighbor directions.
//!
//! Directions are numbered 0..6 starting at RIGHT and rotating
//! counterclockwise, matching the original engine's convention.

use serde::{Deserialize, Serialize};

/// One of the six hex-neighbor directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// Direction 0.
    Right = 0,
    /// Direction 1.
    DownRight = 1,
    /// Direction 2.
    Down = 2,
    /// Direction 3.
    Left = 3,
    /// Direction 4.
    UpLeft = 4,
    /// Direction 5.
    Up = 5,
    /// Direction 6 (diagonal, used only in free-walking collision checks).
    UpRight = 6,
    /// Direction 7 (diagonal, used only in free-walking collision checks).
    DownLeft = 7,
}

/// All six road-graph directions, in ascending numeric order.
pub const ROAD_DIRECTIONS: [Direction; 6] = [
    Direction::Right,
    Direction::DownRight,
    Direction::Down,
    Direction::Left,
    Direction::UpLeft,
    Direction::Up,
];

impl Direction {
    /// The opposite direction: `reverse(d) = (d + 3) mod 6` for the six
    /// road directions.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::DownRight => Self::UpLeft,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::UpLeft => Self::DownRight,
            Self::Up => Self::Down,
            Self::UpRight => Self::DownLeft,
            Self::DownLeft => Self::UpRight,
        }
    }

    /// The bit position of this direction within a 6-bit path mask.
    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Build a direction from its numeric index 0..6 for road directions.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Right),
            1 => Some(Self::DownRight),
            2 => Some(Self::Down),
            3 => Some(Self::Left),
            4 => Some(Self::UpLeft),
            5 => Some(Self::Up),
            _ => None,
        }
    }

    /// Iterate the six road directions in descending numeric order
    /// (5..0), the order `FlagSearch` visits neighbors in.
    #[must_use]
    pub fn descending() -> [Self; 6] {
        [
            Self::Up,
            Self::UpLeft,
            Self::Left,
            Self::Down,
            Self::DownRight,
            Self::Right,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_is_an_involution() {
        for dir in ROAD_DIRECTIONS {
            assert_eq!(dir.reverse().reverse(), dir);
        }
    }

    #[test]
    fn reverse_matches_formula() {
        for (i, dir) in ROAD_DIRECTIONS.iter().enumerate() {
            let expected = (i + 3) % 6;
            assert_eq!(dir.reverse(), ROAD_DIRECTIONS[expected]);
        }
    }

    #[test]
    fn bits_are_distinct_powers_of_two() {
        let mut mask = 0u8;
        for dir in ROAD_DIRECTIONS {
            assert_eq!(mask & dir.bit(), 0);
            mask |= dir.bit();
        }
        assert_eq!(mask, 0b0011_1111);
    }
}
