//! Generic fixed-capacity arena with stable handles and a shrinking
//! high-water mark.
//!
//! Index `0` is never allocated — it is reserved as every entity kind's
//! null handle. Iteration always runs over
//! `[1, max_ever_index)`, so a caller sweeping "every live entity" never
//! has to skip more than the handful of holes left by `free`.

use std::marker::PhantomData;

use freeserf_types::Handle;

use crate::error::{ArenaKind, EntityError};

/// On-the-wire shape of an [`Arena`], independent of the phantom marker
/// type `K` (which carries no data and has no `Serialize`/`Deserialize`
/// impl of its own — the same reason [`Handle<T>`](freeserf_types::Handle)
/// implements `Serialize`/`Deserialize` by hand instead of deriving).
#[derive(serde::Serialize, serde::Deserialize)]
struct ArenaRepr<T> {
    slots: Vec<Option<T>>,
    max_ever_index: u32,
    kind: ArenaKind,
}

/// Borrowed counterpart of [`ArenaRepr`] used only for serializing,
/// since `Serialize` needs no ownership of `slots`.
#[derive(serde::Serialize)]
struct ArenaReprRef<'a, T> {
    slots: &'a Vec<Option<T>>,
    max_ever_index: u32,
    kind: ArenaKind,
}

/// A fixed-capacity arena of `T`, addressed by `Handle<K>`.
#[derive(Debug, Clone)]
pub struct Arena<K, T> {
    slots: Vec<Option<T>>,
    /// One past the highest index ever allocated. Shrinks back down when
    /// the top of the range is freed, so a full sweep over
    /// `1..max_ever_index` is as tight as possible without a separate
    /// compaction pass.
    max_ever_index: u32,
    kind: ArenaKind,
    _marker: PhantomData<fn() -> K>,
}

impl<K, T> Arena<K, T> {
    /// Create an arena with room for `capacity` entities plus the
    /// reserved null slot at index 0.
    #[must_use]
    pub fn new(capacity: u32, kind: ArenaKind) -> Self {
        let mut slots = Vec::with_capacity(capacity as usize + 1);
        slots.resize_with(capacity as usize + 1, || None);
        Self {
            slots,
            max_ever_index: 1,
            kind,
            _marker: PhantomData,
        }
    }

    /// Total capacity, excluding the reserved null slot.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }

    /// Number of currently-allocated entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether the arena holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocate a new entity, returning its handle and a mutable
    /// reference to the stored value.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::Exhausted`] if every slot in `[1, capacity]`
    /// is occupied.
    pub fn alloc(&mut self, value: T) -> Result<(Handle<K>, &mut T), EntityError> {
        let index = (1..self.slots.len()).find(|&i| {
                self.slots
                .get(i)
                .is_some_and(std::option::Option::is_none)
        });
        let Some(index) = index else {
            return Err(EntityError::Exhausted(self.kind));
        };
        let slot = self
        .slots
        .get_mut(index)
        .ok_or(EntityError::Exhausted(self.kind))?;
        *slot = Some(value);
        if index as u32 + 1 > self.max_ever_index {
            self.max_ever_index = index as u32 + 1;
        }
        let handle = Handle::from_index(index as u32);
        let Some(value_ref) = slot.as_mut() else {
            return Err(EntityError::Exhausted(self.kind));
        };
        Ok((handle, value_ref))
    }

    /// Free an allocated entity, returning its last value.
    pub fn free(&mut self, handle: Handle<K>) -> Option<T> {
        let index = handle.index() as usize;
        let value = self.slots.get_mut(index).and_then(Option::take);
        if value.is_some() {
            self.shrink_high_water_mark();
        }
        value
    }

    fn shrink_high_water_mark(&mut self) {
        while self.max_ever_index > 1 {
            let top = self.max_ever_index as usize - 1;
            if self.slots.get(top).is_some_and(Option::is_some) {
                break;
            }
            self.max_ever_index -= 1;
        }
    }

    /// Immutable access to an allocated entity.
    #[must_use]
    pub fn get(&self, handle: Handle<K>) -> Option<&T> {
        self.slots.get(handle.index() as usize)?.as_ref()
    }

    /// Mutable access to an allocated entity.
    pub fn get_mut(&mut self, handle: Handle<K>) -> Option<&mut T> {
        self.slots.get_mut(handle.index() as usize)?.as_mut()
    }

    /// Whether `handle` currently refers to a live entity.
    #[must_use]
    pub fn is_allocated(&self, handle: Handle<K>) -> bool {
        self.get(handle).is_some()
    }

    /// Iterate over every live `(Handle<K>, &T)` in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &T)> {
        self.slots
        .iter()
        .take(self.max_ever_index as usize)
        .enumerate()
        .skip(1)
        .filter_map(|(i, slot)| slot.as_ref().map(|v| (Handle::from_index(i as u32), v)))
    }

    /// Iterate mutably over every live `(Handle<K>, &mut T)` in ascending
    /// index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<K>, &mut T)> {
        let limit = self.max_ever_index as usize;
        self.slots
        .iter_mut()
        .take(limit)
        .enumerate()
        .skip(1)
        .filter_map(|(i, slot)| slot.as_mut().map(|v| (Handle::from_index(i as u32), v)))
    }
}

impl<K, T: serde::Serialize> serde::Serialize for Arena<K, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ArenaReprRef {
            slots: &self.slots,
            max_ever_index: self.max_ever_index,
            kind: self.kind,
        }
        .serialize(serializer)
    }
}

impl<'de, K, T: serde::Deserialize<'de>> serde::Deserialize<'de> for Arena<K, T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr = ArenaRepr::<T>::deserialize(deserializer)?;
        Ok(Self {
            slots: repr.slots,
            max_ever_index: repr.max_ever_index,
            kind: repr.kind,
            _marker: PhantomData,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Marker;

    #[test]
    fn alloc_and_free_roundtrip() {
        let mut arena: Arena<Marker, u32> = Arena::new(4, ArenaKind::Flag);
        let (h1, _) = arena.alloc(10).unwrap();
        let (h2, _) = arena.alloc(20).unwrap();
        assert_eq!(arena.get(h1).copied(), Some(10));
        assert_eq!(arena.get(h2).copied(), Some(20));
        assert_eq!(arena.free(h1), Some(10));
        assert_eq!(arena.get(h1), None);
    }

    #[test]
    fn exhausted_when_full() {
        let mut arena: Arena<Marker, u32> = Arena::new(2, ArenaKind::Serf);
        arena.alloc(1).unwrap();
        arena.alloc(2).unwrap();
        assert!(arena.alloc(3).is_err());
    }

    #[test]
    fn freed_slot_is_reused() {
        let mut arena: Arena<Marker, u32> = Arena::new(1, ArenaKind::Building);
        let (h, _) = arena.alloc(1).unwrap();
        arena.free(h);
        let (h2, _) = arena.alloc(2).unwrap();
        assert_eq!(h2.index(), h.index());
    }

    #[test]
    fn high_water_mark_shrinks_from_the_top() {
        let mut arena: Arena<Marker, u32> = Arena::new(4, ArenaKind::Inventory);
        let (h1, _) = arena.alloc(1).unwrap();
        let (h2, _) = arena.alloc(2).unwrap();
        let (h3, _) = arena.alloc(3).unwrap();
        assert_eq!(arena.iter().count(), 3);
        arena.free(h3);
        arena.free(h2);
        assert_eq!(arena.iter().count(), 1);
        assert_eq!(arena.iter().next().map(|(h, _)| h), Some(h1));
    }

    #[test]
    fn index_zero_is_never_allocated() {
        let mut arena: Arena<Marker, u32> = Arena::new(2, ArenaKind::Flag);
        let (h, _) = arena.alloc(1).unwrap();
        assert_ne!(h.index(), 0);
    }

    #[test]
    fn null_handle_is_never_live() {
        let arena: Arena<Marker, u32> = Arena::new(2, ArenaKind::Flag);
        assert!(!arena.is_allocated(Handle::NULL));
    }

    #[test]
    fn roundtrips_through_json_preserving_holes() {
        let mut arena: Arena<Marker, u32> = Arena::new(4, ArenaKind::Serf);
        let (h1, _) = arena.alloc(10).unwrap();
        let (_h2, _) = arena.alloc(20).unwrap();
        arena.free(h1);
        let json = serde_json::to_string(&arena).unwrap();
        let restored: Arena<Marker, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.iter().count(), arena.iter().count());
        assert_eq!(restored.capacity(), arena.capacity());
        assert!(!restored.is_allocated(h1));
    }
}
