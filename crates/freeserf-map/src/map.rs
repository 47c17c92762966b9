//! The hex-tile grid itself: addressing, neighbor arithmetic, path-bit
//! maintenance, and the periodic terrain-growth wavefront.

use freeserf_types::{Direction, GroundDeposit, ObjectKind, PlayerNum, Rng, SerfId};
use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::spiral::standard_spiral;
use crate::tile::{Tile, TileResource};

/// A linear tile index: `(row << row_shift) | col`, matching the
/// persistence layout's position encoding.
pub type Pos = u32;

/// The six direction offsets in the skewed `(col, row)` coordinate system
/// the map uses. Unlike an axial offset grid, a direction's effect on
/// `(col, row)` does not depend on parity — this is the "rhombus" layout
/// the original engine uses.
const fn offset(dir: Direction) -> (i32, i32) {
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

/// Configuration for the periodic terrain-growth wavefront (`update()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapUpdateConfig {
    /// Number of ticks between successive `update()` passes.
    pub map_update_period: u32,
    /// Number of tiles visited per `update()` pass (the wavefront's
    /// spiral advances this many steps each call).
    pub tiles_per_update: u32,
}

impl Default for MapUpdateConfig {
    fn default() -> Self {
        Self {
            map_update_period: 40,
            tiles_per_update: 8,
        }
    }
}

/// The hex-tile lattice. Torus-like: neighbor arithmetic wraps at the
/// column/row boundaries rather than stopping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Map {
    cols: u32,
    rows: u32,
    row_shift: u32,
    tiles: Vec<Tile>,
    update_config: MapUpdateConfig,
    /// Index into `spiral_wavefront` of the next tile `update()` will
    /// visit; wraps back to the map origin after a full sweep.
    wavefront_cursor: u32,
    /// Running tick count fed to `update()`, used to decide when the next
    /// wavefront pass is due.
    ticks_since_update: u32,
}

impl Map {
    /// Build a blank map of the given dimensions, all tiles defaulted to
    /// grass-flat. `cols` and `rows` must each be a power of two.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::DimensionsNotPowerOfTwo`] if either dimension is
    /// not a power of two.
    pub fn new(cols: u32, rows: u32, update_config: MapUpdateConfig) -> Result<Self, MapError> {
        if !cols.is_power_of_two() || !rows.is_power_of_two() {
            return Err(MapError::DimensionsNotPowerOfTwo { cols, rows });
        }
        let tile_count = (cols as usize).saturating_mul(rows as usize);
        Ok(Self {
            cols,
            rows,
            row_shift: cols.trailing_zeros(),
            tiles: vec![Tile::default(); tile_count],
            update_config,
            wavefront_cursor: 0,
            ticks_since_update: 0,
        })
    }

    /// Column count.
    #[must_use]
    pub const fn cols(&self) -> u32 {
        self.cols
    }

    /// Row count.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Total tile count (`cols * rows`).
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Decompose a position into `(col, row)`.
    #[must_use]
    pub const fn to_col_row(&self, pos: Pos) -> (u32, u32) {
        let col = pos & (self.cols - 1);
        let row = pos >> self.row_shift;
        (col, row)
    }

    /// Compose a `(col, row)` pair (already reduced modulo the map
    /// dimensions) back into a position.
    #[must_use]
    pub const fn from_col_row(&self, col: u32, row: u32) -> Pos {
        (row << self.row_shift) | col
    }

    fn check_bounds(&self, pos: Pos) -> Result<(), MapError> {
        if (pos as usize) < self.tiles.len() {
            Ok(())
        } else {
            Err(MapError::OutOfBounds(pos))
        }
    }

    /// The neighboring position in direction `dir`, wrapping at the torus
    /// seam. Constant time: no loops, no allocation.
    #[must_use]
    pub fn neighbor(&self, pos: Pos, dir: Direction) -> Pos {
        let (col, row) = self.to_col_row(pos);
        let (dcol, drow) = offset(dir);
        let new_col = wrap_add(col, dcol, self.cols);
        let new_row = wrap_add(row, drow, self.rows);
        self.from_col_row(new_col, new_row)
    }

    /// Apply a spiral offset (from [`crate::spiral`]) to `pos`, wrapping
    /// at the torus seam.
    #[must_use]
    pub fn pos_add(&self, pos: Pos, offset: (i32, i32)) -> Pos {
        let (col, row) = self.to_col_row(pos);
        let new_col = wrap_add(col, offset.0, self.cols);
        let new_row = wrap_add(row, offset.1, self.rows);
        self.from_col_row(new_col, new_row)
    }

    /// `move_down_right`: the canonical position of a building's flag,
    /// one hex down-right of the building's own position.
    #[must_use]
    pub fn move_down_right(&self, pos: Pos) -> Pos {
        self.neighbor(pos, Direction::DownRight)
    }

    /// Immutable tile access.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn tile(&self, pos: Pos) -> Result<&Tile, MapError> {
        self.check_bounds(pos)?;
        self.tiles
        .get(pos as usize)
        .ok_or(MapError::OutOfBounds(pos))
    }

    /// Mutable tile access.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn tile_mut(&mut self, pos: Pos) -> Result<&mut Tile, MapError> {
        self.check_bounds(pos)?;
        self.tiles
        .get_mut(pos as usize)
        .ok_or(MapError::OutOfBounds(pos))
    }

    /// Iterate over every `(Pos, &Tile)` in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (Pos, &Tile)> {
        self.tiles.iter().enumerate().map(|(i, t)| (i as Pos, t))
    }

    /// Tile height, 0..32.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn height(&self, pos: Pos) -> Result<u8, MapError> {
        Ok(self.tile(pos)?.height)
    }

    /// Set a tile's height.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn set_height(&mut self, pos: Pos, height: u8) -> Result<(), MapError> {
        self.tile_mut(pos)?.height = height;
        Ok(())
    }

    /// The object occupying `pos` and its arena index (0 if none / not
    /// applicable).
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn object(&self, pos: Pos) -> Result<(ObjectKind, u32), MapError> {
        let tile = self.tile(pos)?;
        Ok((tile.object, tile.object_index))
    }

    /// Set the object occupying `pos`. Exactly one object occupies a tile
    /// — this always overwrites.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn set_object(&mut self, pos: Pos, kind: ObjectKind, index: u32) -> Result<(), MapError> {
        let tile = self.tile_mut(pos)?;
        tile.object = kind;
        tile.object_index = index;
        Ok(())
    }

    /// Whether `pos` has a path bit set for `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn has_path(&self, pos: Pos, dir: Direction) -> Result<bool, MapError> {
        Ok(self.tile(pos)?.has_path(dir))
    }

    /// Add a path bit at `pos` in direction `dir`, and the matching
    /// reverse bit on the neighbor across it.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn add_path(&mut self, pos: Pos, dir: Direction) -> Result<(), MapError> {
        let neighbor = self.neighbor(pos, dir);
        self.tile_mut(pos)?.paths |= dir.bit();
        self.tile_mut(neighbor)?.paths |= dir.reverse().bit();
        Ok(())
    }

    /// Remove a path bit at `pos` in direction `dir`, and the matching
    /// reverse bit on the neighbor.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn remove_path(&mut self, pos: Pos, dir: Direction) -> Result<(), MapError> {
        let neighbor = self.neighbor(pos, dir);
        self.tile_mut(pos)?.paths &= !dir.bit();
        self.tile_mut(neighbor)?.paths &= !dir.reverse().bit();
        Ok(())
    }

    /// The tile's owner, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn owner(&self, pos: Pos) -> Result<Option<PlayerNum>, MapError> {
        Ok(self.tile(pos)?.owner)
    }

    /// Set the tile's owner (or clear it with `None`).
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn set_owner(&mut self, pos: Pos, owner: Option<PlayerNum>) -> Result<(), MapError> {
        self.tile_mut(pos)?.owner = owner;
        Ok(())
    }

    /// The serf currently occupying `pos`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn occupying_serf(&self, pos: Pos) -> Result<Option<SerfId>, MapError> {
        Ok(self.tile(pos)?.occupying_serf)
    }

    /// Set (or clear) the serf occupying `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn set_occupying_serf(&mut self, pos: Pos, serf: Option<SerfId>) -> Result<(), MapError> {
        self.tile_mut(pos)?.occupying_serf = serf;
        Ok(())
    }

    /// Whether the tile is open for a serf to walk onto: passable object,
    /// and not already occupied.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn is_passable(&self, pos: Pos) -> Result<bool, MapError> {
        let tile = self.tile(pos)?;
        Ok(tile.object.is_passable() && tile.occupying_serf.is_none())
    }

    /// Height difference policy: the 4-connected height delta never
    /// exceeds 4. Checked across every
    /// direction from `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn height_delta_ok(&self, pos: Pos) -> Result<bool, MapError> {
        let here = self.height(pos)?;
        for dir in freeserf_types::direction::ROAD_DIRECTIONS {
            let neighbor = self.neighbor(pos, dir);
            let there = self.height(neighbor)?;
            if here.abs_diff(there) > 4 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Decrement a ground deposit by `n`. Clears to `GroundDeposit::None`
    /// if the remaining amount reaches zero.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid, or
    /// [`MapError::InsufficientDeposit`] if `n` exceeds the amount
    /// present.
    pub fn remove_ground_deposit(&mut self, pos: Pos, n: u8) -> Result<(), MapError> {
        let tile = self.tile_mut(pos)?;
        let TileResource::Deposit(kind, amount) = tile.resource else {
            return Err(MapError::InsufficientDeposit {
                    amount: n,
                    available: 0,
            });
        };
        let Some(remaining) = amount.checked_sub(n) else {
            return Err(MapError::InsufficientDeposit {
                    amount: n,
                    available: amount,
            });
        };
        tile.resource = if remaining == 0 {
            TileResource::None
        } else {
            TileResource::Deposit(kind, remaining)
        };
        Ok(())
    }

    /// Decrement a water tile's fish stock by `n`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid, or
    /// [`MapError::InsufficientDeposit`] if `n` exceeds the fish present.
    pub fn remove_fish(&mut self, pos: Pos, n: u8) -> Result<(), MapError> {
        let tile = self.tile_mut(pos)?;
        let TileResource::Fish(amount) = tile.resource else {
            return Err(MapError::InsufficientDeposit {
                    amount: n,
                    available: 0,
            });
        };
        let Some(remaining) = amount.checked_sub(n) else {
            return Err(MapError::InsufficientDeposit {
                    amount: n,
                    available: amount,
            });
        };
        tile.resource = TileResource::Fish(remaining);
        Ok(())
    }

    /// What ground-deposit lookup the geologist FSM needs: the deposit
    /// kind and amount at `pos`, or `None` if the tile holds none.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::OutOfBounds`] if `pos` is outside the grid.
    pub fn ground_deposit(&self, pos: Pos) -> Result<Option<(GroundDeposit, u8)>, MapError> {
        match self.tile(pos)?.resource {
            TileResource::Deposit(kind, amount) => Ok(Some((kind, amount))),
            _ => Ok(None),
        }
    }

    /// Advance the terrain-growth wavefront by one tick of real time.
    /// Every `map_update_period` ticks, walks `tiles_per_update` positions
    /// of the deterministic spiral starting from the current cursor,
    /// aging trees, cycling fields, decaying cadavers/signs, and
    /// simulating fish reproduction/diffusion on water tiles.
    pub fn update(&mut self, rng: &mut Rng) {
        self.ticks_since_update = self.ticks_since_update.saturating_add(1);
        if self.ticks_since_update < self.update_config.map_update_period {
            return;
        }
        self.ticks_since_update = 0;

        let total = self.tiles.len() as u32;
        if total == 0 {
            return;
        }
        for _ in 0..self.update_config.tiles_per_update {
            let pos = self.wavefront_cursor % total;
            self.wavefront_cursor = (self.wavefront_cursor + 1) % total;
            self.update_one_tile(pos, rng);
        }
    }

    fn update_one_tile(&mut self, pos: Pos, rng: &mut Rng) {
        let Some(tile) = self.tiles.get_mut(pos as usize) else {
            return;
        };
        match tile.object {
            ObjectKind::NewTree => tile.object = ObjectKind::Tree(0),
            ObjectKind::NewPine => tile.object = ObjectKind::Pine(0),
            ObjectKind::Tree(stage) if stage < 8 => {
                tile.object = ObjectKind::Tree(stage.saturating_add(1));
            }
            ObjectKind::Pine(stage) if stage < 8 => {
                tile.object = ObjectKind::Pine(stage.saturating_add(1));
            }
            ObjectKind::Seeds(stage) if stage < 5 => {
                tile.object = ObjectKind::Seeds(stage.saturating_add(1));
            }
            ObjectKind::Seeds(_) => tile.object = ObjectKind::Field(rng.below(8) as u8),
            ObjectKind::Field(stage) if stage < 5 => {
                tile.object = ObjectKind::Field(stage.saturating_add(1));
            }
            ObjectKind::Field(_) => tile.object = ObjectKind::FieldExpired,
            ObjectKind::FieldExpired => tile.object = ObjectKind::None,
            ObjectKind::Cadaver(stage) if stage < 2 => {
                tile.object = ObjectKind::Cadaver(stage.saturating_add(1));
            }
            ObjectKind::Cadaver(_) => tile.object = ObjectKind::None,
            ObjectKind::Sign(_) => tile.object = ObjectKind::None,
            ObjectKind::FelledTree(stage) if stage < 5 => {
                tile.object = ObjectKind::FelledTree(stage.saturating_add(1));
            }
            ObjectKind::FelledTree(_) => tile.object = ObjectKind::Stub,
            ObjectKind::FelledPine(stage) if stage < 5 => {
                tile.object = ObjectKind::FelledPine(stage.saturating_add(1));
            }
            ObjectKind::FelledPine(_) => tile.object = ObjectKind::Stub,
            _ => {}
        }

        if tile.deep_water {
            self.update_water_tile(pos, rng);
        }
    }

    fn update_water_tile(&mut self, pos: Pos, rng: &mut Rng) {
        let Some(tile) = self.tiles.get_mut(pos as usize) else {
            return;
        };
        let TileResource::Fish(amount) = tile.resource else {
            return;
        };
        let mut amount = amount;
        if amount < 10 && rng.chance_one_in(64) {
            amount = amount.saturating_add(1);
        }
        if let Some(t) = self.tiles.get_mut(pos as usize) {
            t.resource = TileResource::Fish(amount);
        }

        // Diffusion: move one fish to a random adjacent water tile.
        if amount == 0 {
            return;
        }
        let dir_index = rng.below(6);
        let Some(dir) = Direction::from_index(dir_index as u8) else {
            return;
        };
        let neighbor_pos = self.neighbor(pos, dir);
        let Some(neighbor) = self.tiles.get(neighbor_pos as usize) else {
            return;
        };
        if !neighbor.deep_water {
            return;
        }
        if let TileResource::Fish(n) = neighbor.resource {
            if let Some(here) = self.tiles.get_mut(pos as usize) {
                if let TileResource::Fish(a) = here.resource {
                    here.resource = TileResource::Fish(a.saturating_sub(1));
                }
            }
            if let Some(there) = self.tiles.get_mut(neighbor_pos as usize) {
                there.resource = TileResource::Fish(n.saturating_add(1));
            }
        }
    }

    /// The standard 9-ring spiral, translated to absolute positions
    /// around `center`. Used by building-site planning and geologist
    /// prospecting.
    #[must_use]
    pub fn spiral_positions(&self, center: Pos) -> Vec<Pos> {
        standard_spiral()
        .into_iter()
        .map(|o| self.pos_add(center, o))
        .collect()
    }
}

/// Add a signed delta to an unsigned coordinate, wrapping modulo `bound`
/// (a power of two).
const fn wrap_add(value: u32, delta: i32, bound: u32) -> u32 {
    let mask = bound - 1;
    ((value as i64 + delta as i64) as u32) & mask
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn small_map() -> Map {
        Map::new(32, 32, MapUpdateConfig::default()).unwrap()
    }

    #[test]
    fn rejects_non_power_of_two_dims() {
        assert!(Map::new(30, 32, MapUpdateConfig::default()).is_err());
    }

    #[test]
    fn neighbor_reverse_roundtrips() {
        let map = small_map();
        let pos = map.from_col_row(5, 5);
        for dir in freeserf_types::direction::ROAD_DIRECTIONS {
            let n = map.neighbor(pos, dir);
            let back = map.neighbor(n, dir.reverse());
            assert_eq!(back, pos);
        }
    }

    #[test]
    fn neighbor_wraps_at_seam() {
        let map = small_map();
        let pos = map.from_col_row(0, 0);
        let left = map.neighbor(pos, Direction::Left);
        let (col, _) = map.to_col_row(left);
        assert_eq!(col, 31);
    }

    #[test]
    fn add_path_sets_reverse_bit() {
        let mut map = small_map();
        let pos = map.from_col_row(10, 10);
        map.add_path(pos, Direction::Right).unwrap();
        assert!(map.has_path(pos, Direction::Right).unwrap());
        let neighbor = map.neighbor(pos, Direction::Right);
        assert!(
            map.has_path(neighbor, Direction::Left)
            .unwrap()
        );
    }

    #[test]
    fn remove_path_clears_both_bits() {
        let mut map = small_map();
        let pos = map.from_col_row(10, 10);
        map.add_path(pos, Direction::Down).unwrap();
        map.remove_path(pos, Direction::Down).unwrap();
        assert!(!map.has_path(pos, Direction::Down).unwrap());
        let neighbor = map.neighbor(pos, Direction::Down);
        assert!(!map.has_path(neighbor, Direction::Up).unwrap());
    }

    #[test]
    fn out_of_bounds_errors() {
        let map = small_map();
        assert!(map.tile(32 * 32).is_err());
    }

    #[test]
    fn remove_ground_deposit_clears_at_zero() {
        let mut map = small_map();
        let pos = map.from_col_row(1, 1);
        map.tile_mut(pos).unwrap().resource =
        TileResource::Deposit(GroundDeposit::Coal, 2);
        map.remove_ground_deposit(pos, 1).unwrap();
        assert_eq!(
            map.ground_deposit(pos).unwrap(),
            Some((GroundDeposit::Coal, 1))
        );
        map.remove_ground_deposit(pos, 1).unwrap();
        assert_eq!(map.ground_deposit(pos).unwrap(), None);
    }

    #[test]
    fn remove_ground_deposit_rejects_overdraw() {
        let mut map = small_map();
        let pos = map.from_col_row(1, 1);
        map.tile_mut(pos).unwrap().resource =
        TileResource::Deposit(GroundDeposit::Gold, 1);
        assert!(map.remove_ground_deposit(pos, 2).is_err());
    }

    #[test]
    fn update_ages_sapling_to_full_tree_after_enough_ticks() {
        let mut map = small_map();
        let mut rng = Rng::new((1, 2, 3));
        let pos = map.from_col_row(0, 0);
        map.tile_mut(pos).unwrap().object = ObjectKind::NewTree;
        // One update period advances the wavefront onto this tile (it's
        // visited first since the cursor starts at 0).
        for _ in 0..MapUpdateConfig::default().map_update_period {
            map.update(&mut rng);
        }
        assert_eq!(
            map.object(pos).unwrap().0,
            ObjectKind::Tree(0)
        );
    }

    #[test]
    fn height_delta_ok_detects_large_jump() {
        let mut map = small_map();
        let pos = map.from_col_row(5, 5);
        map.set_height(pos, 0).unwrap();
        let right = map.neighbor(pos, Direction::Right);
        map.set_height(right, 31).unwrap();
        assert!(!map.height_delta_ok(pos).unwrap_or(true));
    }

    #[test]
    fn spiral_positions_has_standard_length() {
        let map = small_map();
        let pos = map.from_col_row(16, 16);
        assert_eq!(map.spiral_positions(pos).len(), 295);
    }
}
