//! # Slot Table
//!
//! Growable vector of slots plus a free list of indices. Every slot carries a
//! generation counter that is bumped on removal, so `(index, generation)`
//! pairs issued before a removal no longer resolve afterwards.

use crate::error::{MemoryError, MemoryResult};
use crate::key::AllocId;

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational slot storage.
#[derive(Clone, Debug)]
pub(crate) struct SlotTable<T> {
    slots: Vec<Slot<T>>,
    /// Free list - indices of vacant slots, reused LIFO.
    free_indices: Vec<u32>,
    live: usize,
    limit: usize,
}

// Slot count never exceeds `u32::MAX` (checked on insert), so index casts are exact.
#[allow(clippy::cast_possible_truncation)]
impl<T> SlotTable<T> {
    /// Creates an empty table that refuses to grow past `limit` slots.
    pub(crate) fn with_limit(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_indices: Vec::new(),
            live: 0,
            limit,
        }
    }

    /// Number of occupied slots.
    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.live
    }

    /// Stores `value`, reusing a vacant slot when one exists.
    pub(crate) fn insert(&mut self, value: T) -> MemoryResult<AllocId> {
        let index = if let Some(index) = self.free_indices.pop() {
            index
        } else {
            if self.slots.len() >= self.limit {
                return Err(MemoryError::TooManyObjects { limit: self.limit });
            }
            self.slots.push(Slot {
                generation: 0,
                value: None,
            });
            u32::try_from(self.slots.len() - 1)
                .map_err(|_| MemoryError::TooManyObjects { limit: self.limit })?
        };

        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.value.is_none());
        slot.value = Some(value);
        self.live += 1;

        Ok(AllocId::new(index, slot.generation))
    }

    /// Validates `id` against the slot it names.
    fn check(&self, id: AllocId) -> MemoryResult<usize> {
        if id.is_null() {
            return Err(MemoryError::NullParameter("allocation id"));
        }
        let index = id.index() as usize;
        let slot = self.slots.get(index).ok_or(MemoryError::IndexOutOfRange {
            index,
            len: self.slots.len(),
        })?;
        if slot.generation != id.generation() || slot.value.is_none() {
            return Err(MemoryError::StaleKey {
                index: id.index(),
                stale: id.generation(),
                current: slot.generation,
            });
        }
        Ok(index)
    }

    /// Looks up a live slot.
    pub(crate) fn get(&self, id: AllocId) -> MemoryResult<&T> {
        let index = self.check(id)?;
        self.slots[index]
            .value
            .as_ref()
            .ok_or_else(|| MemoryError::Unknown(String::from("checked slot is vacant")))
    }

    /// Looks up a live slot mutably.
    pub(crate) fn get_mut(&mut self, id: AllocId) -> MemoryResult<&mut T> {
        let index = self.check(id)?;
        self.slots[index]
            .value
            .as_mut()
            .ok_or_else(|| MemoryError::Unknown(String::from("checked slot is vacant")))
    }

    /// Empties a slot and invalidates every outstanding id for it.
    pub(crate) fn remove(&mut self, id: AllocId) -> MemoryResult<T> {
        let index = self.check(id)?;
        let slot = &mut self.slots[index];
        let value = slot
            .value
            .take()
            .ok_or_else(|| MemoryError::Unknown(String::from("checked slot is vacant")))?;
        slot.generation = slot.generation.wrapping_add(1);
        // `u32::MAX` generation at index `u32::MAX` would spell NULL.
        if slot.generation == u32::MAX {
            slot.generation = 0;
        }
        self.free_indices.push(id.index());
        self.live -= 1;
        Ok(value)
    }

    /// Iterates over live slots.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (AllocId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (AllocId::new(index as u32, slot.generation), value)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut table: SlotTable<u32> = SlotTable::with_limit(4);
        let id = table.insert(42).unwrap();
        assert_eq!(*table.get(id).unwrap(), 42);
        assert_eq!(table.len(), 1);

        assert_eq!(table.remove(id).unwrap(), 42);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_reuse_bumps_generation() {
        let mut table: SlotTable<u32> = SlotTable::with_limit(1);
        let first = table.insert(1).unwrap();
        table.remove(first).unwrap();

        let second = table.insert(2).unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(matches!(table.get(first), Err(MemoryError::StaleKey { .. })));
        assert_eq!(*table.get(second).unwrap(), 2);
    }

    #[test]
    fn test_limit_reached() {
        let mut table: SlotTable<u8> = SlotTable::with_limit(2);
        table.insert(1).unwrap();
        table.insert(2).unwrap();
        assert_eq!(
            table.insert(3),
            Err(MemoryError::TooManyObjects { limit: 2 })
        );
    }
}
