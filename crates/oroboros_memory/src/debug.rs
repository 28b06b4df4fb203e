//! # Debug Contexts
//!
//! A debug context splits its heap into three ordered regions:
//!
//! ```text
//! 0            label.end      safe_ptr.end                      capacity
//! [ label region ][ safe-pointer region ][ user region ...............]
//!   page labels     page directory         pages + raw blobs
//! ```
//!
//! The ordering is checked once, in [`DebugLayout::new`]. After that the
//! regions never change.
//!
//! Debug contexts also keep a bounded ring of [`MemoryEvent`]s that a
//! visualizer drains with `event_pop`. When the ring is full the oldest event
//! is dropped.

use std::collections::VecDeque;
use std::ops::Range;
use std::time::Duration;

use bytemuck::{Pod, Zeroable};

use crate::constants::{ALLOC_ALIGN, LABEL_SLOT_BYTES};
use crate::error::{MemoryError, MemoryResult};
use crate::key::{AllocId, PageId};
use crate::page::PageStatus;

/// Region split of a context heap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebugLayout {
    label: Range<usize>,
    safe_ptr: Range<usize>,
    user: Range<usize>,
}

impl DebugLayout {
    /// Validates an explicit region split.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidLayout`] if the regions overlap, are not ordered
    /// label → safe-ptr → user, leave the user region empty, or are not
    /// aligned to the allocation granularity.
    pub fn new(
        label: Range<usize>,
        safe_ptr: Range<usize>,
        user: Range<usize>,
    ) -> MemoryResult<Self> {
        if label.start > label.end || safe_ptr.start > safe_ptr.end || user.start > user.end {
            return Err(MemoryError::InvalidLayout("region end before start"));
        }
        if label.end > safe_ptr.start {
            return Err(MemoryError::InvalidLayout("label region overlaps safe-pointer region"));
        }
        if safe_ptr.end > user.start {
            return Err(MemoryError::InvalidLayout("safe-pointer region overlaps user region"));
        }
        if user.is_empty() {
            return Err(MemoryError::InvalidLayout("user region is empty"));
        }
        if user.start % ALLOC_ALIGN != 0 || safe_ptr.start % ALLOC_ALIGN != 0 {
            return Err(MemoryError::InvalidLayout("region start is not aligned"));
        }
        Ok(Self {
            label,
            safe_ptr,
            user,
        })
    }

    /// Splits `capacity` bytes into packed label, safe-pointer and user regions.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidLayout`] if nothing is left for the user region.
    pub fn split(capacity: usize, label_bytes: usize, safe_ptr_bytes: usize) -> MemoryResult<Self> {
        let no_room = MemoryError::InvalidLayout("regions leave no room for user data");
        let label_end = crate::page::round_up(label_bytes).ok_or_else(|| no_room.clone())?;
        let safe_end = crate::page::round_up(safe_ptr_bytes)
            .and_then(|bytes| label_end.checked_add(bytes))
            .ok_or_else(|| no_room.clone())?;
        if safe_end >= capacity {
            return Err(no_room);
        }
        Self::new(0..label_bytes, label_end..safe_end, safe_end..capacity)
    }

    /// Layout of a plain context: the whole heap is user region.
    #[must_use]
    pub const fn user_only(capacity: usize) -> Self {
        Self {
            label: 0..0,
            safe_ptr: 0..0,
            user: 0..capacity,
        }
    }

    /// Label region.
    #[must_use]
    pub fn label(&self) -> Range<usize> {
        self.label.clone()
    }

    /// Safe-pointer region.
    #[must_use]
    pub fn safe_ptr(&self) -> Range<usize> {
        self.safe_ptr.clone()
    }

    /// User region.
    #[must_use]
    pub fn user(&self) -> Range<usize> {
        self.user.clone()
    }

    /// Heap range holding the label of page `index`, if the region has room.
    pub(crate) fn label_slot(&self, index: u8) -> Option<Range<usize>> {
        let start = self.label.start + usize::from(index) * LABEL_SLOT_BYTES;
        let end = start + LABEL_SLOT_BYTES;
        (end <= self.label.end).then_some(start..end)
    }

    /// Heap range holding the directory record of page `index`, if any.
    pub(crate) fn record_slot(&self, index: u8) -> Option<Range<usize>> {
        let size = std::mem::size_of::<PageRecord>();
        let start = self.safe_ptr.start + usize::from(index) * size;
        let end = start + size;
        (end <= self.safe_ptr.end).then_some(start..end)
    }
}

/// Page directory entry kept in the safe-pointer region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PageRecord {
    /// Heap offset of the page.
    pub base: u64,
    /// Page size in bytes.
    pub size: u32,
    /// Page identity.
    pub id: PageId,
    /// Page status code (see [`PageRecord::status`]).
    pub status_code: u16,
}

impl PageRecord {
    pub(crate) fn describe(id: PageId, base: usize, size: usize, status: PageStatus) -> Self {
        Self {
            base: base as u64,
            size: u32::try_from(size).unwrap_or(u32::MAX),
            id,
            status_code: match status {
                PageStatus::Unknown => 0,
                PageStatus::Freed => 1,
                PageStatus::Unlocked => 2,
                PageStatus::Locked => 3,
                PageStatus::Protected => 4,
            },
        }
    }

    /// Decodes the stored status.
    #[must_use]
    pub const fn status(&self) -> PageStatus {
        match self.status_code {
            1 => PageStatus::Freed,
            2 => PageStatus::Unlocked,
            3 => PageStatus::Locked,
            4 => PageStatus::Protected,
            _ => PageStatus::Unknown,
        }
    }
}

/// What a [`MemoryEvent`] records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A page (block of the user region) was carved.
    Block,
    /// An allocation was made or resized.
    Alloc,
    /// An allocation or page was released.
    Free,
}

/// One entry of a debug context's event ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryEvent {
    /// Event type.
    pub kind: EventKind,
    /// Frame time of the context when the event happened.
    pub elapsed: Duration,
    /// Page (user section) involved.
    pub user_section_id: PageId,
    /// Allocation involved (`AllocId::NULL` for page events).
    pub allocation_id: AllocId,
    /// Bytes involved.
    pub size: usize,
    /// Offset from the start of the user region.
    pub byte_offset: usize,
}

/// Bounded FIFO of events.
#[derive(Clone, Debug)]
pub(crate) struct EventRing {
    events: VecDeque<MemoryEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventRing {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub(crate) fn push(&mut self, event: MemoryEvent) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub(crate) fn pop(&mut self) -> Option<MemoryEvent> {
        self.events.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) const fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Per-context debug bookkeeping.
#[derive(Clone, Debug)]
pub(crate) struct DebugState {
    pub events: EventRing,
    pub elapsed: Duration,
}

impl DebugState {
    pub(crate) fn new(event_capacity: usize) -> Self {
        Self {
            events: EventRing::new(event_capacity),
            elapsed: Duration::ZERO,
        }
    }
}
