//! Shared identifiers, enums, and constants for the freeserf simulation
//! kernel.
//!
//! This crate has no behavior of its own; it exists so that
//! `freeserf-map`, `freeserf-entities`, `freeserf-roads`,
//! `freeserf-economy`, and `freeserf-sim` can all agree on handle types,
//! resource/serf/building enumerations, and the small numeric constants
//! shared across the kernel without depending on each other.

pub mod constants;
pub mod direction;
pub mod enums;
pub mod ids;
pub mod notification;
pub mod rng;

pub use constants::*;
pub use direction::Direction;
pub use enums::{
    BuildingType, FlowMode, GroundDeposit, NotificationKind, ObjectKind, Resource, SerfType,
    SignKind, ThreatLevel, FOODS, KNIGHT_RANKS, MILITARY_BUILDINGS, TOOLS,
};
pub use ids::{BuildingId, FlagId, FlagOrBuilding, Handle, InventoryId, SerfId};
pub use notification::Notification;
pub use rng::Rng;

/// A player number, 0..4. The map's owner bits and every per-entity
/// `player` field are this type.
pub type PlayerNum = u8;

/// Maximum number of players supported by a single game.
pub const MAX_PLAYERS: usize = 4;
