//! Flag, Building, Inventory, and Serf arenas for the freeserf simulation
//! kernel.
//!
//! This crate owns the entity *data model* and the bookkeeping rules each
//! entity must respect on its own (stock never underflows, a flag never
//! exceeds eight resource slots, a freed arena slot is reused). The
//! behavior that moves entities between states tick to tick — the serf
//! FSM's transition logic, a building's production program, the transport
//! scheduler's dispatch decisions — lives one layer up in `freeserf-sim`
//! and `freeserf-economy`, which have the map and road-graph access those
//! decisions need.

pub mod arena;
pub mod building;
pub mod error;
pub mod flag;
pub mod inventory;
pub mod serf;

pub use arena::Arena;
pub use building::{construction_requirements, Building, BuildingPayload, Garrison, Stock};
pub use error::{ArenaKind, EntityError};
pub use flag::{Flag, LengthField, OtherEndDir, ResourceSlot, MAX_SLOTS};
pub use inventory::{Inventory, OutQueueEntry, MAX_OUT_QUEUE, RESOURCE_KINDS, SERF_KINDS};
pub use serf::{ConstructionPhase, FreeWalkingGoal, ProductionPhase, Serf, SerfState, WalkCargo};

use freeserf_types::ids;

/// Arena of flags, addressed by [`freeserf_types::FlagId`].
pub type FlagArena = Arena<ids::Flag, Flag>;
/// Arena of buildings, addressed by [`freeserf_types::BuildingId`].
pub type BuildingArena = Arena<ids::Building, Building>;
/// Arena of inventories, addressed by [`freeserf_types::InventoryId`].
pub type InventoryArena = Arena<ids::Inventory, Inventory>;
/// Arena of serfs, addressed by [`freeserf_types::SerfId`].
pub type SerfArena = Arena<ids::Serf, Serf>;

/// The four entity arenas, sized once at construction from the map's tile
/// count.
///
/// Ratios below are a deliberate sizing policy (not specified verbatim in
/// the source, which simply over-allocates fixed-size C arrays): one flag
/// per four tiles, one building per eight, one serf per two, and a small
/// fixed allowance of inventories per player layered on top by the caller
/// (each castle/stock allocates one). See DESIGN.md for the sizing
/// rationale.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EntityStore {
    /// The flag arena.
    pub flags: FlagArena,
    /// The building arena.
    pub buildings: BuildingArena,
    /// The inventory arena.
    pub inventories: InventoryArena,
    /// The serf arena.
    pub serfs: SerfArena,
}

impl EntityStore {
    /// Build an `EntityStore` sized for a map of `tile_count` tiles,
    /// reserving room for `max_inventories` castles/stocks.
    #[must_use]
    pub fn new(tile_count: u32, max_inventories: u32) -> Self {
        let flag_capacity = (tile_count / 4).max(16);
        let building_capacity = (tile_count / 8).max(8);
        let serf_capacity = (tile_count / 2).max(32);
        Self {
            flags: FlagArena::new(flag_capacity, ArenaKind::Flag),
            buildings: BuildingArena::new(building_capacity, ArenaKind::Building),
            inventories: InventoryArena::new(max_inventories.max(1), ArenaKind::Inventory),
            serfs: SerfArena::new(serf_capacity, ArenaKind::Serf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_store_sizes_scale_with_map() {
        let store = EntityStore::new(32 * 32, 4);
        assert!(store.flags.capacity() >= 16);
        assert!(store.serfs.capacity() >= 32);
        assert_eq!(store.inventories.capacity(), 4);
    }
}
