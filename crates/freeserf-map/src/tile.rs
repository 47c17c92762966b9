//! A single hex-tile's state.

use freeserf_types::{GroundDeposit, ObjectKind, PlayerNum, SerfId};
use serde::{Deserialize, Serialize};

/// Up- or down-pointing terrain type, 0..16. The upper and lower triangles
/// of a tile can differ (the original's two-triangle hex model).
pub type TerrainType = u8;

/// What a tile's resource field holds: either a ground deposit (gold,
/// iron, coal, stone) with an amount, or — for water tiles — a fish
/// count. The two are mutually exclusive because deep water tiles can
/// never host a ground deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileResource {
    /// No deposit, no fish.
    None,
    /// A ground deposit of the given kind and amount (0..16).
    Deposit(GroundDeposit, u8),
    /// A fish stock, amount 0..16, for water tiles.
    Fish(u8),
}

impl Default for TileResource {
    fn default() -> Self {
        Self::None
    }
}

/// One hex tile's full state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    /// Terrain elevation, 0..32.
    pub height: u8,
    /// Up-triangle terrain type, 0..16.
    pub terrain_up: TerrainType,
    /// Down-triangle terrain type, 0..16.
    pub terrain_down: TerrainType,
    /// What occupies this tile.
    pub object: ObjectKind,
    /// Arena index of the occupying flag/building, when `object` is one of
    /// those kinds. Zero (the null handle's index) otherwise.
    pub object_index: u32,
    /// 6-bit path mask, one bit per [`freeserf_types::Direction`].
    pub paths: u8,
    /// The tile's owner, if any.
    pub owner: Option<PlayerNum>,
    /// Whether this tile is entirely surrounded by water (and therefore
    /// may safely hold a fish resource with no flag ever built on it).
    pub deep_water: bool,
    /// Whether an idle serf is loitering on this tile, independent of
    /// `occupying_serf` (a serf can be "at" a tile without the tile being
    /// its recorded occupant slot, e.g. mid-transition).
    pub idle_serf: bool,
    /// The ground deposit or fish stock at this tile.
    pub resource: TileResource,
    /// The serf currently standing on this tile, if any.
    pub occupying_serf: Option<SerfId>,
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            height: 0,
            terrain_up: 0,
            terrain_down: 0,
            object: ObjectKind::None,
            object_index: 0,
            paths: 0,
            owner: None,
            deep_water: false,
            idle_serf: false,
            resource: TileResource::None,
            occupying_serf: None,
        }
    }
}

impl Tile {
    /// Whether this tile has a path bit set for `dir`.
    #[must_use]
    pub const fn has_path(&self, dir: freeserf_types::Direction) -> bool {
        self.paths & dir.bit() != 0
    }

    /// Whether a flag sits on this tile.
    #[must_use]
    pub const fn has_flag(&self) -> bool {
        matches!(self.object, ObjectKind::Flag)
    }

    /// Whether any building sits on this tile.
    #[must_use]
    pub const fn has_building(&self) -> bool {
        matches!(
            self.object,
            ObjectKind::SmallBuilding | ObjectKind::LargeBuilding | ObjectKind::Castle
        )
    }
}
