//! # Pages
//!
//! A page is a named, contiguous sub-region of a context's heap. Allocations
//! live inside exactly one page and are addressed through the page's slot
//! table, never by offset, so the page is free to move them around:
//!
//! ```text
//! heap:  |....| page 0 ........................... | page 1 ...... |
//!               [a][  b  ][free][c]  --compact-->  [a][  b  ][c][free]
//!                 ^ slot table keeps (index, generation) -> offset
//! ```
//!
//! Moves happen on `realloc` (when the allocation cannot grow in place) and on
//! explicit compaction. Keys stay valid through both.

use crate::constants::ALLOC_ALIGN;
use crate::error::{MemoryError, MemoryResult};
use crate::free_list::FreeList;
use crate::key::{AllocId, PageId};
use crate::slots::SlotTable;

/// Lifecycle state of a page.
///
/// The state gates what callers may do with the page's allocations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PageStatus {
    /// The key never named a page of this context.
    Unknown,
    /// The page has been released back to its context.
    Freed,
    /// Normal state: allocate, map, view, free.
    Unlocked,
    /// Nothing may be mapped, viewed or changed.
    Locked,
    /// Read-only: views are allowed, mutable mappings and changes are not.
    Protected,
}

impl PageStatus {
    /// Whether allocations may be created, resized, freed or mapped mutably.
    #[inline]
    #[must_use]
    pub const fn allows_mutation(self) -> bool {
        matches!(self, Self::Unlocked)
    }

    /// Whether allocations may be viewed read-only.
    #[inline]
    #[must_use]
    pub const fn allows_view(self) -> bool {
        matches!(self, Self::Unlocked | Self::Protected)
    }
}

/// Where one allocation currently sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct AllocEntry {
    /// Absolute heap offset of the first byte.
    pub offset: usize,
    /// Bytes reserved (rounded up to [`ALLOC_ALIGN`]).
    pub reserved: usize,
    /// Bytes the caller asked for; what a mapping exposes.
    pub size: usize,
}

/// How a `realloc` was satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Relocation {
    /// The allocation kept its offset.
    InPlace,
    /// The allocation was copied to another block of the page.
    Moved,
    /// The page was compacted to make room; other allocations may have moved.
    Compacted,
}

/// Usage numbers for one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageStats {
    /// Page identity.
    pub id: PageId,
    /// Current status.
    pub status: PageStatus,
    /// Absolute heap offset of the page.
    pub base: usize,
    /// Page size in bytes.
    pub size: usize,
    /// Bytes reserved by live allocations.
    pub used: usize,
    /// Largest contiguous free block.
    pub largest_free: usize,
    /// Number of disjoint free blocks.
    pub fragments: usize,
    /// Number of live allocations.
    pub allocations: usize,
}

/// Rounds `size` up to the allocation granularity, `None` on overflow.
#[inline]
pub(crate) const fn round_up(size: usize) -> Option<usize> {
    match size.checked_add(ALLOC_ALIGN - 1) {
        Some(padded) => Some(padded & !(ALLOC_ALIGN - 1)),
        None => None,
    }
}

/// One page of a context.
#[derive(Clone, Debug)]
pub(crate) struct Page {
    id: PageId,
    status: PageStatus,
    base: usize,
    size: usize,
    label: Option<String>,
    free: FreeList,
    allocs: SlotTable<AllocEntry>,
}

impl Page {
    /// Creates an empty, unlocked page over `[base, base + size)`.
    pub(crate) fn new(id: PageId, base: usize, size: usize, slot_limit: usize) -> Self {
        Self {
            id,
            status: PageStatus::Unlocked,
            base,
            size,
            label: None,
            free: FreeList::new(base, size),
            allocs: SlotTable::with_limit(slot_limit),
        }
    }

    #[inline]
    pub(crate) const fn id(&self) -> PageId {
        self.id
    }

    #[inline]
    pub(crate) const fn status(&self) -> PageStatus {
        self.status
    }

    #[inline]
    pub(crate) fn set_status(&mut self, status: PageStatus) {
        self.status = status;
    }

    #[inline]
    pub(crate) const fn base(&self) -> usize {
        self.base
    }

    #[inline]
    pub(crate) const fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub(crate) fn set_label(&mut self, label: &str) {
        self.label = Some(label.to_owned());
    }

    /// Fails unless the status allows `operation`.
    pub(crate) fn require(&self, allowed: bool, operation: &'static str) -> MemoryResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(MemoryError::PageUnavailable {
                page: self.id,
                status: self.status,
                operation,
            })
        }
    }

    pub(crate) fn stats(&self) -> PageStats {
        PageStats {
            id: self.id,
            status: self.status,
            base: self.base,
            size: self.size,
            used: self.size - self.free.total(),
            largest_free: self.free.largest(),
            fragments: self.free.fragment_count(),
            allocations: self.allocs.len(),
        }
    }

    pub(crate) fn entry(&self, id: AllocId) -> MemoryResult<AllocEntry> {
        self.allocs.get(id).copied()
    }

    /// Iterates over live allocations.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (AllocId, AllocEntry)> + '_ {
        self.allocs.iter().map(|(id, entry)| (id, *entry))
    }

    /// Reserves `size` bytes and zeroes them.
    pub(crate) fn allocate(
        &mut self,
        heap: &mut [u8],
        size: usize,
    ) -> MemoryResult<(AllocId, AllocEntry)> {
        let reserved = round_up(size).ok_or_else(|| MemoryError::FailedAllocation {
            requested: size,
            available: self.free.largest(),
        })?;
        let Some(offset) = self.free.reserve(reserved) else {
            return Err(MemoryError::FailedAllocation {
                requested: reserved,
                available: self.free.largest(),
            });
        };

        let entry = AllocEntry {
            offset,
            reserved,
            size,
        };
        let id = match self.allocs.insert(entry) {
            Ok(id) => id,
            Err(err) => {
                self.free.release(offset, reserved);
                return Err(err);
            }
        };

        heap[offset..offset + reserved].fill(0);
        Ok((id, entry))
    }

    /// Releases an allocation.
    pub(crate) fn free(&mut self, id: AllocId) -> MemoryResult<AllocEntry> {
        let entry = self.allocs.remove(id)?;
        self.free.release(entry.offset, entry.reserved);
        Ok(entry)
    }

    /// Resizes an allocation, preserving `min(old, new)` bytes of content.
    ///
    /// Tries, in order: shrink or grow in place, move to another free block,
    /// compact the page with this allocation placed last and grow in place.
    pub(crate) fn realloc(
        &mut self,
        heap: &mut [u8],
        id: AllocId,
        new_size: usize,
    ) -> MemoryResult<(AllocEntry, Relocation)> {
        let old = self.entry(id)?;
        let reserved = round_up(new_size).ok_or_else(|| MemoryError::FailedAllocation {
            requested: new_size,
            available: self.free.largest(),
        })?;

        if reserved <= old.reserved {
            self.free.release(old.offset + reserved, old.reserved - reserved);
            if new_size > old.size {
                heap[old.offset + old.size..old.offset + new_size].fill(0);
            }
            let entry = AllocEntry {
                offset: old.offset,
                reserved,
                size: new_size,
            };
            *self.allocs.get_mut(id)? = entry;
            return Ok((entry, Relocation::InPlace));
        }

        if self.free.try_extend(old.offset, old.reserved, reserved) {
            let entry = AllocEntry {
                offset: old.offset,
                reserved,
                size: new_size,
            };
            heap[old.offset + old.size..old.offset + reserved].fill(0);
            *self.allocs.get_mut(id)? = entry;
            return Ok((entry, Relocation::InPlace));
        }

        if let Some(offset) = self.free.reserve(reserved) {
            heap.copy_within(old.offset..old.offset + old.size, offset);
            heap[offset + old.size..offset + reserved].fill(0);
            self.free.release(old.offset, old.reserved);
            let entry = AllocEntry {
                offset,
                reserved,
                size: new_size,
            };
            *self.allocs.get_mut(id)? = entry;
            return Ok((entry, Relocation::Moved));
        }

        if self.free.total() < reserved - old.reserved {
            return Err(MemoryError::FailedAllocation {
                requested: reserved,
                available: self.free.largest(),
            });
        }

        self.compact(heap, Some(id));
        let moved = self.entry(id)?;
        if !self.free.try_extend(moved.offset, moved.reserved, reserved) {
            return Err(MemoryError::Unknown(String::from(
                "compaction did not leave the free block after the last allocation",
            )));
        }
        heap[moved.offset + moved.size..moved.offset + reserved].fill(0);
        let entry = AllocEntry {
            offset: moved.offset,
            reserved,
            size: new_size,
        };
        *self.allocs.get_mut(id)? = entry;
        Ok((entry, Relocation::Compacted))
    }

    /// Slides every live allocation towards the page base so all free space
    /// forms one block at the end. `last`, if given, is placed after all
    /// others. Returns how many allocations changed offset.
    pub(crate) fn compact(&mut self, heap: &mut [u8], last: Option<AllocId>) -> usize {
        let mut order: Vec<(AllocId, AllocEntry)> = self
            .entries()
            .filter(|(id, _)| Some(*id) != last)
            .collect();
        order.sort_by_key(|(_, entry)| entry.offset);

        // `last` may sit below allocations that slide over it, so its bytes
        // are parked before packing.
        let parked = last
            .and_then(|id| self.entry(id).ok())
            .map(|entry| (entry, heap[entry.offset..entry.offset + entry.reserved].to_vec()));

        let mut cursor = self.base;
        let mut moved = 0;
        for (id, entry) in order {
            if entry.offset != cursor {
                heap.copy_within(entry.offset..entry.offset + entry.reserved, cursor);
                moved += 1;
            }
            if let Ok(slot) = self.allocs.get_mut(id) {
                slot.offset = cursor;
            }
            cursor += entry.reserved;
        }

        if let (Some(id), Some((entry, bytes))) = (last, parked) {
            if entry.offset != cursor {
                heap[cursor..cursor + entry.reserved].copy_from_slice(&bytes);
                moved += 1;
            }
            if let Ok(slot) = self.allocs.get_mut(id) {
                slot.offset = cursor;
            }
            cursor += entry.reserved;
        }

        self.free.reset(cursor, self.base + self.size - cursor);
        moved
    }
}
