//! The building: production program, worker requests, stock accounting,
//! construction progress, and burning/demolition.
//!
//! The FSM-driven *behavior* that ticks a building forward — consuming
//! input stock, running a production cycle, raising a knight request —
//! lives one layer up, in `freeserf-sim`, because it needs the road graph
//! and flag search to dispatch serfs. This module owns the data model and
//! the accounting rules that behavior must respect: stock never
//! underflows, progress only advances through the documented
//! breakpoints, and a demolished building always ends up in the same
//! terminal shape regardless of who tore it down.

use freeserf_types::{BuildingType, FlagId, InventoryId, PlayerNum, SerfId};
use serde::{Deserialize, Serialize};

use crate::error::EntityError;

/// A packed stock counter: amount present (high nibble) and amount
/// incoming/reserved (low nibble), matching the original engine's
/// single-byte stock fields. Kept here as named sub-fields; persistence
/// repacks into one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stock {
    /// Amount physically present in the building.
    pub present: u8,
    /// Amount reserved/in-transit but not yet delivered.
    pub incoming: u8,
    /// Maximum the building will ever request (present + incoming
    /// capped).
    pub maximum: u8,
}

impl Stock {
    /// A stock counter with the given maximum and nothing present yet.
    #[must_use]
    pub const fn with_maximum(maximum: u8) -> Self {
        Self {
            present: 0,
            incoming: 0,
            maximum,
        }
    }

    /// Pack into the original engine's single byte: high nibble present,
    /// low nibble incoming. Values above 15 saturate (the original
    /// format itself tops out at a 4-bit count per field).
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        let present = if self.present > 15 { 15 } else { self.present };
        let incoming = if self.incoming > 15 { 15 } else { self.incoming };
        (present << 4) | incoming
    }

    /// Unpack from the original byte layout.
    #[must_use]
    pub const fn from_byte(byte: u8, maximum: u8) -> Self {
        Self {
            present: byte >> 4,
            incoming: byte & 0xF,
            maximum,
        }
    }

    /// Total stock accounted for (present + incoming), capped at 8 for
    /// the request-priority formula.
    #[must_use]
    pub const fn total_for_priority(self) -> u8 {
        let total = self.present.saturating_add(self.incoming);
        if total > 8 { 8 } else { total }
    }

    /// Reserve `amount` as incoming (a transporter has been dispatched
    /// but has not yet arrived).
    pub fn reserve_incoming(&mut self, amount: u8) {
        self.incoming = self.incoming.saturating_add(amount);
    }

    /// Cancel a previously reserved incoming delivery
    /// `PartialFailure`: the offending slot is canceled, not silently
    /// dropped).
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::StockUnderflow`] if `amount` exceeds the
    /// incoming count.
    pub fn cancel_incoming(&mut self, amount: u8) -> Result<(), EntityError> {
        let Some(remaining) = self.incoming.checked_sub(amount) else {
            return Err(EntityError::StockUnderflow {
                    amount,
                    available: self.incoming,
            });
        };
        self.incoming = remaining;
        Ok(())
    }

    /// A delivery arrives: move `amount` from incoming to present.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::StockUnderflow`] if `amount` exceeds the
    /// incoming count.
    pub fn deliver(&mut self, amount: u8) -> Result<(), EntityError> {
        self.cancel_incoming(amount)?;
        self.present = self.present.saturating_add(amount);
        Ok(())
    }

    /// Consume `amount` from present stock (production input).
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::StockUnderflow`] if `amount` exceeds the
    /// present count.
    pub fn consume(&mut self, amount: u8) -> Result<(), EntityError> {
        let Some(remaining) = self.present.checked_sub(amount) else {
            return Err(EntityError::StockUnderflow {
                    amount,
                    available: self.present,
            });
        };
        self.present = remaining;
        Ok(())
    }

    /// Request priority for this stock: `priority >> (8 + total_stock)`,
    /// even-only (the low bit is reserved so a "fetched" halving never
    /// loses the parity marker).
    #[must_use]
    pub const fn request_priority(self, base_priority: u16) -> u8 {
        let shift = 8u32.saturating_add(self.total_for_priority() as u32);
        let raw = if shift >= 16 {
            0
        } else {
            (base_priority >> shift) as u8
        };
        raw & !1
    }
}

/// What a building's payload union currently holds:
/// construction state while unfinished, an owned inventory for
/// castle/stock, or a plain flag link otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BuildingPayload {
    /// Under construction: planks/stone still owed, and the leveling
    /// phase (`level`, progress toward a flat site).
    Unfinished {
        /// Planks still required before construction can finish.
        planks_needed: u8,
        /// Stone still required before construction can finish.
        stone_needed: u8,
        /// Site-leveling progress, 0 when the site is already flat.
        level: u8,
    },
    /// A castle or stock: owns an inventory.
    Inventory(InventoryId),
    /// Any other finished building: terminates at a plain flag link.
    Flag(FlagId),
}

/// Garrison bookkeeping for a military building (hut/tower/fortress/
/// castle).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Garrison {
    /// Knights currently stationed here, in arrival order (index 0 is
    /// the "head of knight list").
    pub knights: Vec<SerfId>,
    /// Whether a `need_knight` request is currently outstanding.
    pub need_knight: bool,
    /// Gold stock backing this building's knight-occupation economy.
    pub gold: Stock,
    /// Chebyshev distance (clamped 0..3) to the nearest enemy-owned
    /// tile; drives the occupation-level threshold.
    pub threat_level: u8,
}

/// A building on the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    /// This building's map position.
    pub pos: freeserf_map::Pos,
    /// Building type.
    pub kind: BuildingType,
    /// Owning player.
    pub owner: PlayerNum,
    /// The flag this building connects to (at `move_down_right(pos)`).
    pub flag: FlagId,
    /// First stock slot (input resource 1, or the sole stock for simple
    /// buildings).
    pub stock1: Stock,
    /// Second stock slot (input resource 2, used by two-input
    /// production buildings).
    pub stock2: Stock,
    /// Construction/production progress, 0..65535.
    pub progress: u16,
    /// Ticks remaining before a burning building's tile is freed, `None`
    /// while not burning.
    pub burning: Option<u16>,
    /// Whether a worker currently occupies the building.
    pub serf_present: bool,
    /// Whether this building is still under construction.
    pub unfinished: bool,
    /// The occupying worker (non-military buildings), or `None`.
    pub serf: Option<SerfId>,
    /// The type-dependent payload.
    pub payload: BuildingPayload,
    /// Garrison state, present only for military buildings.
    pub garrison: Option<Garrison>,
    /// Whether a `serf_requested` bit is set (a worker/builder has been
    /// asked for but dispatch has not yet succeeded; governs the
    /// retry policy).
    pub serf_requested: bool,
    /// Whether the one-time completion bookkeeping (inventory
    /// installation, player building-count tally, "new stock built"
    /// notification) has already run for this building. `advance_construction`
    /// flips `unfinished` in the same tick a transporter delivers the last
    /// unit of material, one phase before `freeserf-sim`'s building-update
    /// pass next runs, so this flag — not the payload shape — is what
    /// lets that pass recognize a completion it hasn't handled yet.
    pub completion_recorded: bool,
}

/// Construction requirements for a building type: planks, stone, and
/// leveling cost. Grounded in the original engine's per-type
/// `construction_*` tables; levels derived from building size class.
#[must_use]
pub const fn construction_requirements(kind: BuildingType) -> (u8, u8) {
    match kind {
        BuildingType::Castle => (0, 0),
        BuildingType::Stock => (4, 3),
        BuildingType::Hut => (2, 0),
        BuildingType::Tower => (3, 1),
        BuildingType::Fortress => (6, 4),
        BuildingType::Lumberjack | BuildingType::Fisher => (2, 0),
        BuildingType::Sawmill => (3, 2),
        BuildingType::Stonecutter | BuildingType::Forester => (2, 0),
        BuildingType::StoneMine
        | BuildingType::CoalMine
        | BuildingType::IronMine
        | BuildingType::GoldMine => (4, 1),
        BuildingType::SteelSmelter | BuildingType::GoldSmelter => (4, 3),
        BuildingType::Farm => (4, 1),
        BuildingType::Mill => (3, 1),
        BuildingType::Bakery => (2, 1),
        BuildingType::Butcher => (2, 0),
        BuildingType::PigFarm => (4, 1),
        BuildingType::BoatBuilder => (3, 1),
        BuildingType::ToolMaker => (4, 2),
        BuildingType::WeaponSmith => (4, 2),
    }
}

impl Building {
    /// Begin construction of `kind` at `pos`, linked to `flag`.
    #[must_use]
    pub fn new_unfinished(
        pos: freeserf_map::Pos,
        kind: BuildingType,
        owner: PlayerNum,
        flag: FlagId,
    ) -> Self {
        let (planks_needed, stone_needed) = construction_requirements(kind);
        Self {
            pos,
            kind,
            owner,
            flag,
            stock1: Stock::default(),
            stock2: Stock::default(),
            progress: 0,
            burning: None,
            serf_present: false,
            unfinished: true,
            serf: None,
            payload: BuildingPayload::Unfinished {
                planks_needed,
                stone_needed,
                level: 0,
            },
            garrison: if kind.is_military() {
                Some(Garrison::default())
            } else {
                None
            },
            serf_requested: false,
            completion_recorded: false,
        }
    }

    /// Whether the construction site has finished leveling (only
    /// meaningful while unfinished).
    #[must_use]
    pub const fn is_leveled(&self) -> bool {
        matches!(
            self.payload,
            BuildingPayload::Unfinished { level: 0,.. }
        )
    }

    /// Consume delivered planks/stone toward finishing construction.
    /// Once both reach zero, flips `unfinished` to `false` and installs
    /// the payload appropriate to this building's type (an inventory for
    /// castle/stock, a flag link otherwise).
    pub fn advance_construction(&mut self, planks_delivered: u8, stone_delivered: u8) {
        let BuildingPayload::Unfinished {
            planks_needed,
            stone_needed,
            level,
        } = &mut self.payload
        else {
            return;
        };
        *planks_needed = planks_needed.saturating_sub(planks_delivered);
        *stone_needed = stone_needed.saturating_sub(stone_delivered);
        if *planks_needed == 0 && *stone_needed == 0 && *level == 0 {
            self.unfinished = false;
            self.progress = 0;
            // Castle/stock types get their inventory installed by the
            // caller via `install_inventory` right after this call, once
            // it has allocated one from the inventory arena; every other
            // type terminates at its flag link as-is.
            self.payload = BuildingPayload::Flag(self.flag);
        }
    }

    /// Install the owned inventory once the caller has allocated it
    /// (castle/stock only).
    pub fn install_inventory(&mut self, inventory: InventoryId) {
        if self.kind.has_inventory() {
            self.payload = BuildingPayload::Inventory(inventory);
        }
    }

    /// Begin demolition: sets the burning countdown, clears serf
    /// occupancy, and returns the knights that must be released as
    /// escaping (capped at 12) versus killed outright.
    pub fn demolish(&mut self, burn_ticks: u16) -> (Vec<SerfId>, Vec<SerfId>) {
        self.burning = Some(burn_ticks);
        self.serf_present = false;
        let mut escaping = Vec::new();
        let mut killed = Vec::new();
        if let Some(garrison) = &mut self.garrison {
            const MAX_ESCAPING: usize = 12;
            for (i, knight) in garrison.knights.drain(..).enumerate() {
                if i < MAX_ESCAPING {
                    escaping.push(knight);
                } else {
                    killed.push(knight);
                }
            }
        } else if let Some(serf) = self.serf.take() {
            escaping.push(serf);
        }
        (escaping, killed)
    }

    /// Advance the burning countdown by one tick. Returns `true` once it
    /// reaches zero and the tile should be freed.
    pub fn tick_burning(&mut self) -> bool {
        match &mut self.burning {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
            None => false,
        }
    }

    /// Required garrison size for a given threat level, per
    /// `knight_occupation`; the caller supplies the
    /// player's configured `[min, max]` table already indexed by type and
    /// threat level.
    #[must_use]
    pub fn garrison_target(&self, min_max: (u8, u8)) -> (u8, u8) {
        debug_assert!(self.kind.is_military());
        min_max
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stock_byte_roundtrips() {
        let stock = Stock {
            present: 5,
            incoming: 2,
            maximum: 8,
        };
        let byte = stock.to_byte();
        let restored = Stock::from_byte(byte, 8);
        assert_eq!(restored.present, 5);
        assert_eq!(restored.incoming, 2);
    }

    #[test]
    fn stock_deliver_moves_incoming_to_present() {
        let mut stock = Stock::with_maximum(8);
        stock.reserve_incoming(3);
        stock.deliver(3).unwrap();
        assert_eq!(stock.present, 3);
        assert_eq!(stock.incoming, 0);
    }

    #[test]
    fn stock_consume_rejects_overdraw() {
        let mut stock = Stock::with_maximum(8);
        stock.present = 1;
        assert!(stock.consume(2).is_err());
    }

    #[test]
    fn request_priority_is_even() {
        let stock = Stock::with_maximum(8);
        for base in 0u16..=255 {
            assert_eq!(stock.request_priority(base) % 2, 0);
        }
    }

    #[test]
    fn advance_construction_finishes_at_zero() {
        let mut building =
        Building::new_unfinished(0, BuildingType::Sawmill, 0, FlagId::from_index(1));
        assert!(building.unfinished);
        building.advance_construction(3, 2);
        assert!(!building.unfinished);
        assert!(matches!(building.payload, BuildingPayload::Flag(_)));
    }

    #[test]
    fn demolish_releases_garrison_capped_at_twelve() {
        let mut building =
        Building::new_unfinished(0, BuildingType::Fortress, 0, FlagId::from_index(1));
        building.unfinished = false;
        let garrison = building.garrison.get_or_insert_with(Garrison::default);
        for i in 1..=15u32 {
            garrison.knights.push(SerfId::from_index(i));
        }
        let (escaping, killed) = building.demolish(100);
        assert_eq!(escaping.len(), 12);
        assert_eq!(killed.len(), 3);
        assert_eq!(building.burning, Some(100));
    }
}
