//! The flag: a road-network junction, and the unit the transport
//! scheduler dispatches resources between.

use freeserf_types::{Direction, FlagOrBuilding, PlayerNum, Resource};
use serde::{Deserialize, Serialize};

use crate::error::EntityError;

/// Maximum resources a single flag can hold waiting for transport.
pub const MAX_SLOTS: usize = 8;

/// A per-direction road-segment length record: category (0..8, high
/// nibble) and live transporter count (0..15, low nibble), plus a
/// "transporter requested" flag that the original engine packs into the
/// category nibble's high bit. Kept here as named sub-fields; persistence
/// repacks them into the original byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LengthField {
    /// Road length category 0..8 (`road_length_category`).
    pub category: u8,
    /// Number of transporters currently assigned to this segment.
    pub transporter_count: u8,
    /// Whether a transporter has already been requested for this segment
    /// and is en route from an inventory.
    pub transporter_requested: bool,
}

impl LengthField {
    /// Pack into the original engine's byte layout: bit 7 = requested,
    /// bits 6..4 = category, bits 3..0 = transporter count.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        let requested = if self.transporter_requested { 0x80 } else { 0 };
        requested | ((self.category & 0x7) << 4) | (self.transporter_count & 0xF)
    }

    /// Unpack from the original engine's byte layout.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self {
            category: (byte >> 4) & 0x7,
            transporter_count: byte & 0xF,
            transporter_requested: byte & 0x80 != 0,
        }
    }
}

/// The "other end direction" field: which direction, from the far
/// endpoint's perspective, this edge arrives by (low nibble), plus the
/// slot index currently prioritized for the next pickup out this
/// direction (high nibble) — written by
/// `TransportScheduler::prioritize_pickup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OtherEndDir {
    /// Direction by which the neighbor flag considers this edge to
    /// arrive.
    pub dir: Option<Direction>,
    /// Index (0..8) of the resource slot next scheduled for pickup out
    /// this direction.
    pub pickup_slot: Option<u8>,
}

/// One of a flag's eight resource slots, waiting to be picked up by a
/// transporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceSlot {
    /// The waiting resource, or `None` if the slot is empty.
    pub resource: Option<Resource>,
    /// The destination flag, if known.
    pub destination: Option<freeserf_types::FlagId>,
    /// The direction a transporter has been scheduled to carry this slot,
    /// once `TransportScheduler` has made a decision.
    pub scheduled_dir: Option<Direction>,
}

impl ResourceSlot {
    /// Whether this slot holds a resource.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.resource.is_none()
    }
}

/// A road-network junction. May optionally attach a building on its
/// `UP_LEFT` neighbor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flag {
    /// This flag's map position.
    pub pos: freeserf_map::Pos,
    /// The owning player.
    pub owner: PlayerNum,
    /// 6-bit mask of directions with a road attached.
    pub path_con: u8,
    /// Per-direction bit: the neighbor across this edge is a building
    /// rather than a flag.
    pub endpoint: u8,
    /// Whether this flag has at least one resource slot occupied and
    /// awaiting scheduling (cleared once the scheduler processes it).
    pub resources_waiting: bool,
    /// Per-direction bit: at least one transporter is assigned to this
    /// edge.
    pub transporter: u8,
    /// Per-direction bit: this edge is a water segment (serviced by a
    /// sailor rather than a land transporter). Set by `build_road` when
    /// the path crosses only deep-water tiles.
    pub water: u8,
    /// Per-direction road-segment length/category/transporter-count.
    pub length: [LengthField; 6],
    /// The eight resource slots.
    pub slots: [ResourceSlot; MAX_SLOTS],
    /// Per-direction neighbor: another flag, or (via `UP_LEFT` only) the
    /// attached building.
    pub neighbors: [Option<FlagOrBuilding>; 6],
    /// Per-direction "other end" bookkeeping.
    pub other_end_dir: [OtherEndDir; 6],
    /// First building-request bitfield (mirrors the attached building's
    /// primary stock request state for fast scheduler access).
    pub bld_flags: u8,
    /// Priority associated with `bld_flags`.
    pub stock1_prio: u8,
    /// Second building-request bitfield.
    pub bld2_flags: u8,
    /// Priority associated with `bld2_flags`.
    pub stock2_prio: u8,
    /// Scratch: the `FlagSearch` generation this flag was last visited
    /// in.
    pub search_num: u32,
    /// Scratch: the direction by which the closest search source
    /// discovered this flag.
    pub search_dir: Option<Direction>,
}

impl Flag {
    /// Construct a freshly-built flag at `pos` with no roads attached.
    #[must_use]
    pub fn new(pos: freeserf_map::Pos, owner: PlayerNum) -> Self {
        Self {
            pos,
            owner,
            path_con: 0,
            endpoint: 0,
            resources_waiting: false,
            transporter: 0,
            water: 0,
            length: [LengthField::default(); 6],
            slots: [ResourceSlot::default(); MAX_SLOTS],
            neighbors: [None; 6],
            other_end_dir: [OtherEndDir::default(); 6],
            bld_flags: 0,
            stock1_prio: 0,
            bld2_flags: 0,
            stock2_prio: 0,
            search_num: 0,
            search_dir: None,
        }
    }

    /// Whether a road is attached in direction `dir`.
    #[must_use]
    pub const fn has_path(&self, dir: Direction) -> bool {
        self.path_con & dir.bit() != 0
    }

    /// Attach a road in direction `dir`.
    pub fn set_path(&mut self, dir: Direction) {
        self.path_con |= dir.bit();
    }

    /// Detach the road in direction `dir`, clearing every piece of
    /// per-direction bookkeeping for that edge.
    pub fn clear_path(&mut self, dir: Direction) {
        self.path_con &= !dir.bit();
        self.endpoint &= !dir.bit();
        self.transporter &= !dir.bit();
        self.water &= !dir.bit();
        let idx = dir as usize;
        if let Some(slot) = self.length.get_mut(idx) {
            *slot = LengthField::default();
        }
        if let Some(slot) = self.neighbors.get_mut(idx) {
            *slot = None;
        }
        if let Some(slot) = self.other_end_dir.get_mut(idx) {
            *slot = OtherEndDir::default();
        }
    }

    /// Whether the neighbor across `dir` is a building.
    #[must_use]
    pub const fn is_endpoint(&self, dir: Direction) -> bool {
        self.endpoint & dir.bit() != 0
    }

    /// Mark the neighbor across `dir` as a building endpoint.
    pub fn set_endpoint(&mut self, dir: Direction, is_building: bool) {
        if is_building {
            self.endpoint |= dir.bit();
        } else {
            self.endpoint &= !dir.bit();
        }
    }

    /// Whether at least one transporter is assigned to `dir`.
    #[must_use]
    pub const fn has_transporter(&self, dir: Direction) -> bool {
        self.transporter & dir.bit() != 0
    }

    /// Set/clear the "has transporter" bit for `dir`.
    pub fn set_has_transporter(&mut self, dir: Direction, present: bool) {
        if present {
            self.transporter |= dir.bit();
        } else {
            self.transporter &= !dir.bit();
        }
    }

    /// Whether the edge in direction `dir` is a water segment.
    #[must_use]
    pub const fn is_water(&self, dir: Direction) -> bool {
        self.water & dir.bit() != 0
    }

    /// Mark the edge in direction `dir` as a water (`true`) or land
    /// (`false`) segment.
    pub fn set_water(&mut self, dir: Direction, water: bool) {
        if water {
            self.water |= dir.bit();
        } else {
            self.water &= !dir.bit();
        }
    }

    /// Find the first empty resource slot and fill it.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::FlagSlotsFull`] if all eight slots are
    /// occupied.
    pub fn add_resource(
        &mut self,
        resource: Resource,
        destination: Option<freeserf_types::FlagId>,
    ) -> Result<usize, EntityError> {
        let slot_index = self
        .slots
        .iter()
        .position(ResourceSlot::is_empty)
        .ok_or(EntityError::FlagSlotsFull)?;
        if let Some(slot) = self.slots.get_mut(slot_index) {
            *slot = ResourceSlot {
                resource: Some(resource),
                destination,
                scheduled_dir: None,
            };
        }
        self.resources_waiting = true;
        Ok(slot_index)
    }

    /// Clear a resource slot after it has been picked up.
    pub fn clear_slot(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = ResourceSlot::default();
        }
    }

    /// Count of slots currently scheduled for dispatch out of `dir`.
    #[must_use]
    pub fn slots_scheduled_out(&self, dir: Direction) -> usize {
        self.slots
        .iter()
        .filter(|s| s.scheduled_dir == Some(dir))
        .count()
    }

    /// Whether every slot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(ResourceSlot::is_empty)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn length_field_packs_and_unpacks() {
        let field = LengthField {
            category: 5,
            transporter_count: 3,
            transporter_requested: true,
        };
        let byte = field.to_byte();
        assert_eq!(LengthField::from_byte(byte), field);
    }

    #[test]
    fn add_resource_fills_first_empty_slot() {
        let mut flag = Flag::new(0, 0);
        let idx = flag.add_resource(Resource::Plank, None).unwrap();
        assert_eq!(idx, 0);
        assert!(flag.resources_waiting);
        assert!(!flag.slots[0].is_empty());
    }

    #[test]
    fn add_resource_fails_when_full() {
        let mut flag = Flag::new(0, 0);
        for _ in 0..MAX_SLOTS {
            flag.add_resource(Resource::Plank, None).unwrap();
        }
        assert!(flag.add_resource(Resource::Plank, None).is_err());
    }

    #[test]
    fn clear_path_resets_per_direction_state() {
        let mut flag = Flag::new(0, 0);
        flag.set_path(Direction::Right);
        flag.set_endpoint(Direction::Right, true);
        flag.set_has_transporter(Direction::Right, true);
        flag.clear_path(Direction::Right);
        assert!(!flag.has_path(Direction::Right));
        assert!(!flag.is_endpoint(Direction::Right));
        assert!(!flag.has_transporter(Direction::Right));
    }
}
