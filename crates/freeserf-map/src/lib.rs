//! Hex-tile map grid, neighbor arithmetic, and terrain growth.
//!
//! The map is the one component in the simulation kernel that depends on
//! nothing else but `freeserf-types`.
//! Everything else — the road graph, the entity arenas' tile bookkeeping,
//! the serf FSM's free-walking collision checks — calls back into this
//! crate for neighbor arithmetic and tile mutation.

pub mod error;
pub mod map;
pub mod spiral;
pub mod tile;

pub use error::MapError;
pub use map::{Map, MapUpdateConfig, Pos};
pub use tile::{Tile, TileResource};
