//! Errors for entity arena allocation and accessor operations.

use freeserf_types::{BuildingId, FlagId, InventoryId, SerfId};
use serde::{Deserialize, Serialize};

/// Which arena was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ArenaKind {
    /// The flag arena.
    #[error("flag")]
    Flag,
    /// The building arena.
    #[error("building")]
    Building,
    /// The inventory arena.
    #[error("inventory")]
    Inventory,
    /// The serf arena.
    #[error("serf")]
    Serf,
    /// A player's notification queue.
    #[error("notification")]
    Notification,
}

/// Errors raised by the entity arenas and the structs they store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    /// An arena has no free slots left.
    #[error("{0} arena is exhausted")]
    Exhausted(ArenaKind),

    /// A handle referenced an index that was never allocated, or was
    /// already freed.
    #[error("flag handle {0} does not refer to a live flag")]
    DanglingFlag(FlagId),

    /// See [`Self::DanglingFlag`].
    #[error("building handle {0} does not refer to a live building")]
    DanglingBuilding(BuildingId),

    /// See [`Self::DanglingFlag`].
    #[error("inventory handle {0} does not refer to a live inventory")]
    DanglingInventory(InventoryId),

    /// See [`Self::DanglingFlag`].
    #[error("serf handle {0} does not refer to a live serf")]
    DanglingSerf(SerfId),

    /// A flag's 8 resource slots were all occupied.
    #[error("flag has no free resource slot")]
    FlagSlotsFull,

    /// Stock arithmetic would underflow.
    #[error("stock arithmetic underflow: cannot remove {amount} from {available}")]
    StockUnderflow {
        /// Amount requested for removal.
        amount: u8,
        /// Amount actually present.
        available: u8,
    },
}
