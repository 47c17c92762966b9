//! Type-safe arena handles.
//!
//! Every entity arena (Flag, Building, Inventory, Serf) is addressed by a
//! stable `u32` index rather than a pointer. A dedicated `Handle<T>` newtype
//! per entity kind prevents a `Handle<Flag>` from ever being used where a
//! `Handle<Building>` is expected, the way the original C code's untyped
//! `int` indices could not.
//!
//! Index `0` is reserved as the null handle for every kind, matching the
//! source's convention that index 0 is never allocated.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Marker type for [`Handle<Flag>`].
#[derive(Debug)]
pub struct Flag;
/// Marker type for [`Handle<Building>`].
#[derive(Debug)]
pub struct Building;
/// Marker type for [`Handle<Inventory>`].
#[derive(Debug)]
pub struct Inventory;
/// Marker type for [`Handle<Serf>`].
#[derive(Debug)]
pub struct Serf;

/// A stable, generation-agnostic index into one of the entity arenas.
///
/// `Handle::NULL` (index 0) denotes "no entity" and is never returned by
/// `alloc`.
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// The null handle, index 0. No arena ever allocates this index.
    pub const NULL: Self = Self {
        index: 0,
        _marker: PhantomData,
    };

    /// Construct a handle from a raw arena index.
    #[must_use]
    pub const fn from_index(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// The raw arena index backing this handle.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Whether this is the null handle.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == 0
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}
impl<T> Eq for Handle<T> {}
impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}
impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}
impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::NULL
    }
}
impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}
impl<T> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)
    }
}

impl<T> Serialize for Handle<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
    S: serde::Serializer,
    {
        serializer.serialize_u32(self.index)
    }
}

impl<'de, T> Deserialize<'de> for Handle<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
    D: serde::Deserializer<'de>,
    {
        let index = u32::deserialize(deserializer)?;
        Ok(Self::from_index(index))
    }
}

/// Handle into the flag arena.
pub type FlagId = Handle<Flag>;
/// Handle into the building arena.
pub type BuildingId = Handle<Building>;
/// Handle into the inventory arena.
pub type InventoryId = Handle<Inventory>;
/// Handle into the serf arena.
pub type SerfId = Handle<Serf>;

/// A handle to either a flag or a building, used for the flag `UP_LEFT`
/// neighbor slot which may terminate at either kind of entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagOrBuilding {
    /// The neighbor across this edge is another flag.
    Flag(FlagId),
    /// The neighbor across this edge is a building (always via `UP_LEFT`).
    Building(BuildingId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_has_zero_index() {
        assert_eq!(FlagId::NULL.index(), 0);
        assert!(FlagId::NULL.is_null());
    }

    #[test]
    fn handles_of_different_kinds_do_not_compare() {
        let flag = FlagId::from_index(3);
        let building = BuildingId::from_index(3);
        assert_eq!(flag.index(), building.index());
        // They are different Rust types, so this would not compile:
        // assert_eq!(flag, building);
    }

    #[test]
    fn handle_roundtrips_through_json() {
        let handle = SerfId::from_index(42);
        let json = serde_json::to_string(&handle).unwrap_or_default();
        let restored: SerfId = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(handle, restored);
    }
}
