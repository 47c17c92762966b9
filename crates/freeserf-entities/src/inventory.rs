//! Inventory: the storage backing a castle or stock.

use freeserf_types::{BuildingId, FlagId, FlowMode, PlayerNum, Resource, SerfType};
use serde::{Deserialize, Serialize};

use crate::error::EntityError;

/// Number of distinct [`Resource`] kinds tracked per inventory.
pub const RESOURCE_KINDS: usize = 26;
/// Number of distinct [`SerfType`] kinds tracked per inventory.
pub const SERF_KINDS: usize = 27;
/// Maximum pending `(resource, destination_flag)` entries in an
/// inventory's out-queue.
pub const MAX_OUT_QUEUE: usize = 2;

/// A pending delivery from an inventory to a flag, queued by
/// `MOVE_RESOURCE_OUT` until a transporter is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutQueueEntry {
    /// The resource to deliver.
    pub resource: Resource,
    /// The destination flag.
    pub destination: FlagId,
}

/// The storage backing a castle or stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    /// Owning player.
    pub player: PlayerNum,
    /// The flag this inventory's building connects to.
    pub flag: FlagId,
    /// The building (castle or stock) that owns this inventory.
    pub building: BuildingId,
    /// Per-resource counts, indexed by `Resource as usize`.
    pub resources: [u16; RESOURCE_KINDS],
    /// Per-serf-type counts, indexed by `SerfType as usize`.
    pub serfs: [u16; SERF_KINDS],
    /// Pending outbound deliveries (resource, destination flag).
    pub out_queue: Vec<OutQueueEntry>,
    /// This inventory's priority for serf spawning, relative to other
    /// inventories of the same player.
    pub spawn_priority: u16,
    /// Resource flow mode: accept, stop, or dispatch resources.
    pub res_dir: FlowMode,
    /// Serf flow mode: accept, stop, or dispatch serfs.
    pub serf_dir: FlowMode,
}

impl Inventory {
    /// Construct a freshly-built, empty inventory.
    #[must_use]
    pub const fn new(player: PlayerNum, flag: FlagId, building: BuildingId) -> Self {
        Self {
            player,
            flag,
            building,
            resources: [0; RESOURCE_KINDS],
            serfs: [0; SERF_KINDS],
            out_queue: Vec::new(),
            spawn_priority: 0,
            res_dir: FlowMode::In,
            serf_dir: FlowMode::In,
        }
    }

    /// Current count of a resource.
    #[must_use]
    pub fn resource_count(&self, resource: Resource) -> u16 {
        self.resources
        .get(resource as usize)
        .copied()
        .unwrap_or_default()
    }

    /// Add `amount` of a resource (received delivery or production).
    pub fn add_resource(&mut self, resource: Resource, amount: u16) {
        if let Some(slot) = self.resources.get_mut(resource as usize) {
            *slot = slot.saturating_add(amount);
        }
    }

    /// Remove `amount` of a resource.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::StockUnderflow`] if `amount` exceeds the
    /// count present.
    pub fn remove_resource(&mut self, resource: Resource, amount: u16) -> Result<(), EntityError> {
        let Some(slot) = self.resources.get_mut(resource as usize) else {
            return Ok(());
        };
        let Some(remaining) = slot.checked_sub(amount) else {
            return Err(EntityError::StockUnderflow {
                    amount: amount.min(255) as u8,
                    available: (*slot).min(255) as u8,
            });
        };
        *slot = remaining;
        Ok(())
    }

    /// Current count of a serf type.
    #[must_use]
    pub fn serf_count(&self, kind: SerfType) -> u16 {
        self.serfs.get(kind as usize).copied().unwrap_or_default()
    }

    /// Add a serf of `kind` to the inventory (spawned or merged back in).
    pub fn add_serf(&mut self, kind: SerfType) {
        if let Some(slot) = self.serfs.get_mut(kind as usize) {
            *slot = slot.saturating_add(1);
        }
    }

    /// Remove one serf of `kind` (dispatched to the road network).
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::StockUnderflow`] if none are present.
    pub fn remove_serf(&mut self, kind: SerfType) -> Result<(), EntityError> {
        let Some(slot) = self.serfs.get_mut(kind as usize) else {
            return Ok(());
        };
        let Some(remaining) = slot.checked_sub(1) else {
            return Err(EntityError::StockUnderflow {
                    amount: 1,
                    available: 0,
            });
        };
        *slot = remaining;
        Ok(())
    }

    /// Whether this inventory currently accepts incoming resources.
    #[must_use]
    pub const fn accepts_resources(&self) -> bool {
        matches!(self.res_dir, FlowMode::In)
    }

    /// Whether this inventory currently dispatches serfs outward.
    #[must_use]
    pub const fn dispatches_serfs(&self) -> bool {
        matches!(self.serf_dir, FlowMode::Out)
    }

    /// Queue an outbound delivery. The original engine allows at most
    /// two queued entries at a time.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::FlagSlotsFull`] if the queue is already at
    /// `MAX_OUT_QUEUE`.
    pub fn queue_out(
        &mut self,
        resource: Resource,
        destination: FlagId,
    ) -> Result<(), EntityError> {
        if self.out_queue.len() >= MAX_OUT_QUEUE {
            return Err(EntityError::FlagSlotsFull);
        }
        self.out_queue.push(OutQueueEntry {
                resource,
                destination,
        });
        Ok(())
    }

    /// Pop the next queued outbound delivery, if any.
    pub fn pop_out_queue(&mut self) -> Option<OutQueueEntry> {
        if self.out_queue.is_empty() {
            None
        } else {
            Some(self.out_queue.remove(0))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn inv() -> Inventory {
        Inventory::new(0, FlagId::from_index(1), BuildingId::from_index(1))
    }

    #[test]
    fn add_and_remove_resource() {
        let mut inventory = inv();
        inventory.add_resource(Resource::Plank, 10);
        assert_eq!(inventory.resource_count(Resource::Plank), 10);
        inventory.remove_resource(Resource::Plank, 4).unwrap();
        assert_eq!(inventory.resource_count(Resource::Plank), 6);
    }

    #[test]
    fn remove_resource_rejects_overdraw() {
        let mut inventory = inv();
        inventory.add_resource(Resource::Plank, 1);
        assert!(inventory.remove_resource(Resource::Plank, 2).is_err());
    }

    #[test]
    fn out_queue_caps_at_two() {
        let mut inventory = inv();
        inventory
        .queue_out(Resource::Plank, FlagId::from_index(2))
        .unwrap();
        inventory
        .queue_out(Resource::Stone, FlagId::from_index(2))
        .unwrap();
        assert!(
            inventory
            .queue_out(Resource::Lumber, FlagId::from_index(2))
            .is_err()
        );
    }

    #[test]
    fn default_flow_modes_are_in() {
        let inventory = inv();
        assert!(inventory.accepts_resources());
        assert!(!inventory.dispatches_serfs());
    }
}
