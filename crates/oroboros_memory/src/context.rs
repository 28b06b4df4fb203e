//! # Contexts
//!
//! A context owns one contiguous heap and everything carved out of it:
//!
//! - a page table of up to [`MAX_PAGES`] pages
//! - a free-block list over the user region, shared by pages and raw blobs
//! - for debug contexts, the label / safe-pointer regions and the event ring
//!
//! Every subsystem (config, game, physics, graphics) gets its own context and
//! is its only owner. Nothing here is thread-safe; contexts are driven from
//! the frame loop.
//!
//! ## Key resolution
//!
//! ```text
//! AllocKey { context, page, alloc }
//!     │         │       └── page slot table ──> AllocEntry { offset, size }
//!     │         └────────── page table[index] (generation checked)
//!     └──────────────────── must equal Context::id()
//! ```

use std::time::Duration;

use bytemuck::Pod;

use crate::constants::{MAX_ALLOCATIONS_PER_PAGE, MAX_PAGES, MAX_RAW_BLOBS};
use crate::debug::{DebugLayout, DebugState, EventKind, MemoryEvent, PageRecord};
use crate::error::{MemoryError, MemoryResult};
use crate::free_list::FreeList;
use crate::key::{AllocId, AllocKey, ContextId, PageId, PageKey};
use crate::mapping::{read_pod, write_pod, Mapping};
use crate::page::{round_up, AllocEntry, Page, PageStats, PageStatus, Relocation};
use crate::raw::RawBlob;
use crate::slots::SlotTable;

/// One row of the page table.
///
/// Freeing a row at generation 255 retires it, so a page key never
/// resolves again once its page is gone.
#[derive(Clone, Debug, Default)]
struct PageEntry {
    generation: u8,
    retired: bool,
    page: Option<Page>,
}

impl PageEntry {
    fn resolve(&self, id: PageId) -> MemoryResult<&Page> {
        match &self.page {
            Some(page) if self.generation == id.generation() => Ok(page),
            _ => Err(MemoryError::StaleKey {
                index: u32::from(id.index()),
                stale: u32::from(id.generation()),
                current: u32::from(self.generation),
            }),
        }
    }

    fn resolve_mut(&mut self, id: PageId) -> MemoryResult<&mut Page> {
        match &mut self.page {
            Some(page) if self.generation == id.generation() => Ok(page),
            _ => Err(MemoryError::StaleKey {
                index: u32::from(id.index()),
                stale: u32::from(id.generation()),
                current: u32::from(self.generation),
            }),
        }
    }
}

fn page_ref(pages: &[PageEntry], id: PageId) -> MemoryResult<&Page> {
    if id.is_null() {
        return Err(MemoryError::NullParameter("page id"));
    }
    let index = usize::from(id.index());
    pages
        .get(index)
        .ok_or(MemoryError::IndexOutOfRange {
            index,
            len: pages.len(),
        })?
        .resolve(id)
}

fn page_mut(pages: &mut [PageEntry], id: PageId) -> MemoryResult<&mut Page> {
    if id.is_null() {
        return Err(MemoryError::NullParameter("page id"));
    }
    let index = usize::from(id.index());
    let len = pages.len();
    pages
        .get_mut(index)
        .ok_or(MemoryError::IndexOutOfRange { index, len })?
        .resolve_mut(id)
}

/// An owned byte arena with its pages, raw blobs and bookkeeping.
///
/// # Example
///
/// ```rust,ignore
/// let mut ctx = Context::new(ContextId::new(0), 4096)?;
/// let page = ctx.alloc_page(1024)?;
/// let key = ctx.allocate(page, 16)?;
///
/// ctx.map(key)?.write(0, &100u32)?;
/// assert_eq!(ctx.read_pod::<u32>(key, 0)?, 100);
/// ```
#[derive(Debug)]
pub struct Context {
    id: ContextId,
    name: Option<String>,
    heap: Box<[u8]>,
    layout: DebugLayout,
    /// Free blocks of the user region (pages and raw blobs).
    pub(crate) free: FreeList,
    pages: Vec<PageEntry>,
    pub(crate) raws: SlotTable<RawBlob>,
    debug: Option<DebugState>,
}

impl Context {
    /// Creates a plain context over a fresh, zeroed heap of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::NullParameter`] if `id` is the null sentinel
    /// - [`MemoryError::ZeroParameter`] if `capacity` is zero
    /// - [`MemoryError::FailedAllocation`] if the heap cannot be reserved
    pub fn new(id: ContextId, capacity: usize) -> MemoryResult<Self> {
        if capacity == 0 {
            return Err(MemoryError::ZeroParameter("context capacity"));
        }
        Self::build(id, capacity, DebugLayout::user_only(capacity), None)
    }

    /// Creates a debug context whose heap is split according to `layout`.
    ///
    /// # Errors
    ///
    /// As [`Context::new`], plus [`MemoryError::InvalidLayout`] if the layout
    /// does not fit in `capacity`.
    pub fn with_debug(
        id: ContextId,
        capacity: usize,
        layout: DebugLayout,
        event_capacity: usize,
    ) -> MemoryResult<Self> {
        if capacity == 0 {
            return Err(MemoryError::ZeroParameter("context capacity"));
        }
        if layout.user().end > capacity {
            return Err(MemoryError::InvalidLayout("user region exceeds capacity"));
        }
        Self::build(id, capacity, layout, Some(DebugState::new(event_capacity)))
    }

    fn build(
        id: ContextId,
        capacity: usize,
        layout: DebugLayout,
        debug: Option<DebugState>,
    ) -> MemoryResult<Self> {
        if id.is_null() {
            return Err(MemoryError::NullParameter("context id"));
        }

        let mut heap = Vec::new();
        heap.try_reserve_exact(capacity)
            .map_err(|_| MemoryError::FailedAllocation {
                requested: capacity,
                available: 0,
            })?;
        heap.resize(capacity, 0u8);

        let user = layout.user();
        // Only whole granules of the user region are handed out.
        let usable = (user.end - user.start) & !(crate::constants::ALLOC_ALIGN - 1);

        let is_debug = debug.is_some();
        tracing::debug!(
            "Context {} created: {} bytes (user region {}..{}, debug: {})",
            id.raw(),
            capacity,
            user.start,
            user.end,
            is_debug
        );

        Ok(Self {
            id,
            name: None,
            heap: heap.into_boxed_slice(),
            free: FreeList::new(user.start, usable),
            layout,
            pages: Vec::new(),
            raws: SlotTable::with_limit(MAX_RAW_BLOBS),
            debug,
        })
    }

    // =========================================================================
    // Identity & capacity
    // =========================================================================

    /// Returns this context's ID.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    /// Returns the subsystem name, if one was assigned.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Assigns a subsystem name.
    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_owned());
    }

    /// Total heap size in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.heap.len()
    }

    /// Region split of the heap.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &DebugLayout {
        &self.layout
    }

    /// Whether this is a debug context.
    #[inline]
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.debug.is_some()
    }

    /// Unreserved bytes of the user region.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.free.total()
    }

    /// Largest contiguous unreserved block of the user region.
    #[must_use]
    pub fn largest_free_block(&self) -> usize {
        self.free.largest()
    }

    /// Number of live pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.iter().filter(|entry| entry.page.is_some()).count()
    }

    /// Keys of all live pages, in page-table order.
    #[must_use]
    pub fn page_keys(&self) -> Vec<PageKey> {
        self.pages
            .iter()
            .filter_map(|entry| entry.page.as_ref())
            .map(|page| PageKey::new(self.id, page.id()))
            .collect()
    }

    pub(crate) fn check_context(&self, context: ContextId) -> MemoryResult<()> {
        if context.is_null() {
            return Err(MemoryError::NullParameter("context id"));
        }
        if context != self.id {
            return Err(MemoryError::ForeignKey {
                expected: self.id,
                found: context,
            });
        }
        Ok(())
    }

    pub(crate) fn heap(&self) -> &[u8] {
        &self.heap
    }

    pub(crate) fn heap_mut(&mut self) -> &mut [u8] {
        &mut self.heap
    }

    // =========================================================================
    // Pages
    // =========================================================================

    /// Carves a page of `size` bytes out of the user region.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::ZeroParameter`] if `size` is zero
    /// - [`MemoryError::TooManyObjects`] if the page table is full
    /// - [`MemoryError::FailedAllocation`] if no free block is large enough
    pub fn alloc_page(&mut self, size: usize) -> MemoryResult<PageKey> {
        if size == 0 {
            return Err(MemoryError::ZeroParameter("page size"));
        }

        let reusable = |entry: &PageEntry| entry.page.is_none() && !entry.retired;
        let index = match self.pages.iter().position(reusable) {
            Some(index) => index,
            None if self.pages.len() < MAX_PAGES => {
                self.pages.push(PageEntry::default());
                self.pages.len() - 1
            }
            None => return Err(MemoryError::TooManyObjects { limit: MAX_PAGES }),
        };

        let placed = round_up(size)
            .and_then(|reserved| self.free.reserve(reserved).map(|base| (base, reserved)));
        let Some((base, reserved)) = placed else {
            tracing::warn!(
                "Context {}: no room for a {} byte page (largest free block {})",
                self.id.raw(),
                size,
                self.free.largest()
            );
            return Err(MemoryError::FailedAllocation {
                requested: round_up(size).unwrap_or(size),
                available: self.free.largest(),
            });
        };

        // Page indices stop at MAX_PAGES - 1 = 254; 255 is reserved.
        let index = u8::try_from(index).map_err(|_| MemoryError::TooManyObjects { limit: MAX_PAGES })?;
        let entry = &mut self.pages[usize::from(index)];
        let id = PageId::new(index, entry.generation);
        entry.page = Some(Page::new(id, base, reserved, MAX_ALLOCATIONS_PER_PAGE));
        self.heap[base..base + reserved].fill(0);

        tracing::debug!(
            "Context {}: page {} carved at {} ({} bytes)",
            self.id.raw(),
            index,
            base,
            reserved
        );

        self.sync_record(index);
        self.record(EventKind::Block, id, AllocId::NULL, reserved, base);
        Ok(PageKey::new(self.id, id))
    }

    /// Carves a page and records `name` as its label.
    ///
    /// Debug contexts store the label in their label region (truncated to
    /// [`LABEL_SLOT_BYTES`](crate::constants::LABEL_SLOT_BYTES) bytes).
    ///
    /// # Errors
    ///
    /// As [`Context::alloc_page`].
    pub fn alloc_named_page(&mut self, name: &str, size: usize) -> MemoryResult<PageKey> {
        let key = self.alloc_page(size)?;
        page_mut(&mut self.pages, key.page)?.set_label(name);

        if let Some(slot) = self.layout.label_slot(key.page.index()) {
            let bytes = name.as_bytes();
            let len = bytes.len().min(slot.len());
            let target = &mut self.heap[slot];
            target.fill(0);
            target[..len].copy_from_slice(&bytes[..len]);
        }
        Ok(key)
    }

    /// Releases a page and every allocation in it.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::NullParameter`], [`MemoryError::ForeignKey`],
    ///   [`MemoryError::StaleKey`] for bad keys
    /// - [`MemoryError::PageUnavailable`] if the page is locked or protected
    pub fn free_page(&mut self, key: PageKey) -> MemoryResult<()> {
        self.check_context(key.context)?;
        let page = page_mut(&mut self.pages, key.page)?;
        page.require(page.status().allows_mutation(), "free page")?;
        let (base, size) = (page.base(), page.size());

        let entry = &mut self.pages[usize::from(key.page.index())];
        entry.page = None;
        match entry.generation.checked_add(1) {
            Some(next) => entry.generation = next,
            None => entry.retired = true,
        }
        self.free.release(base, size);

        if let Some(slot) = self.layout.label_slot(key.page.index()) {
            self.heap[slot].fill(0);
        }

        tracing::debug!("Context {}: page {} freed", self.id.raw(), key.page.index());
        self.sync_record(key.page.index());
        self.record(EventKind::Free, key.page, AllocId::NULL, size, base);
        Ok(())
    }

    /// Status of the page named by `key`.
    ///
    /// Never fails: keys that never named a page report
    /// [`PageStatus::Unknown`], keys of released pages report
    /// [`PageStatus::Freed`].
    #[must_use]
    pub fn page_status(&self, key: PageKey) -> PageStatus {
        if key.is_null() || key.context != self.id {
            return PageStatus::Unknown;
        }
        match self.pages.get(usize::from(key.page.index())) {
            None => PageStatus::Unknown,
            Some(entry) => match entry.resolve(key.page) {
                Ok(page) => page.status(),
                Err(_) => PageStatus::Freed,
            },
        }
    }

    fn set_page_status(&mut self, key: PageKey, status: PageStatus) -> MemoryResult<()> {
        self.check_context(key.context)?;
        page_mut(&mut self.pages, key.page)?.set_status(status);
        self.sync_record(key.page.index());
        Ok(())
    }

    /// Locks a page: nothing in it may be mapped, viewed or changed.
    ///
    /// # Errors
    ///
    /// Key errors as for [`Context::free_page`].
    pub fn lock_page(&mut self, key: PageKey) -> MemoryResult<()> {
        self.set_page_status(key, PageStatus::Locked)
    }

    /// Returns a locked or protected page to normal use.
    ///
    /// # Errors
    ///
    /// Key errors as for [`Context::free_page`].
    pub fn unlock_page(&mut self, key: PageKey) -> MemoryResult<()> {
        self.set_page_status(key, PageStatus::Unlocked)
    }

    /// Makes a page read-only: views succeed, mappings and changes fail.
    ///
    /// # Errors
    ///
    /// Key errors as for [`Context::free_page`].
    pub fn protect_page(&mut self, key: PageKey) -> MemoryResult<()> {
        self.set_page_status(key, PageStatus::Protected)
    }

    /// Usage numbers of one page.
    ///
    /// # Errors
    ///
    /// Key errors as for [`Context::free_page`].
    pub fn page_stats(&self, key: PageKey) -> MemoryResult<PageStats> {
        self.check_context(key.context)?;
        Ok(page_ref(&self.pages, key.page)?.stats())
    }

    /// Label of a page, if it was created with [`Context::alloc_named_page`].
    ///
    /// # Errors
    ///
    /// Key errors as for [`Context::free_page`].
    pub fn page_label(&self, key: PageKey) -> MemoryResult<Option<String>> {
        self.check_context(key.context)?;
        let page = page_ref(&self.pages, key.page)?;

        if let Some(slot) = self.layout.label_slot(key.page.index()) {
            let bytes = &self.heap[slot];
            let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
            if len > 0 {
                return Ok(Some(String::from_utf8_lossy(&bytes[..len]).into_owned()));
            }
        }
        Ok(page.label().map(str::to_owned))
    }

    /// Defragments a page: all live allocations are packed towards its base.
    ///
    /// Returns how many allocations moved. Keys stay valid.
    ///
    /// # Errors
    ///
    /// Key errors as for [`Context::free_page`], and
    /// [`MemoryError::PageUnavailable`] unless the page is unlocked.
    pub fn compact_page(&mut self, key: PageKey) -> MemoryResult<usize> {
        self.check_context(key.context)?;
        let page = page_mut(&mut self.pages, key.page)?;
        page.require(page.status().allows_mutation(), "compact")?;
        let moved = page.compact(&mut self.heap, None);
        tracing::info!(
            "Context {}: page {} compacted, {} allocations moved",
            self.id.raw(),
            key.page.index(),
            moved
        );
        Ok(moved)
    }

    /// The page directory.
    ///
    /// Debug contexts read it back from their safe-pointer region; plain
    /// contexts describe their live page table.
    #[must_use]
    pub fn page_directory(&self) -> Vec<PageRecord> {
        if self.debug.is_some() {
            (0..self.pages.len())
                .filter_map(|index| u8::try_from(index).ok())
                .filter_map(|index| self.layout.record_slot(index))
                .filter_map(|slot| read_pod::<PageRecord>(&self.heap[slot], 0).ok())
                .filter(|record| record.status() != PageStatus::Unknown)
                .collect()
        } else {
            self.pages
                .iter()
                .filter_map(|entry| entry.page.as_ref())
                .map(|page| PageRecord::describe(page.id(), page.base(), page.size(), page.status()))
                .collect()
        }
    }

    /// Mirrors page-table row `index` into the safe-pointer region.
    fn sync_record(&mut self, index: u8) {
        if self.debug.is_none() {
            return;
        }
        let Some(slot) = self.layout.record_slot(index) else {
            return;
        };
        let entry = &self.pages[usize::from(index)];
        let last_generation = if entry.retired {
            entry.generation
        } else {
            entry.generation.wrapping_sub(1)
        };
        let record = match &entry.page {
            Some(page) => PageRecord::describe(page.id(), page.base(), page.size(), page.status()),
            None => PageRecord::describe(
                PageId::new(index, last_generation),
                0,
                0,
                PageStatus::Freed,
            ),
        };
        // The slot is exactly `size_of::<PageRecord>()` long.
        let written = write_pod(&mut self.heap[slot], 0, &record);
        debug_assert!(written.is_ok(), "page record slot too small");
    }

    // =========================================================================
    // Allocations
    // =========================================================================

    fn resolve(&self, key: AllocKey) -> MemoryResult<(&Page, AllocEntry)> {
        if key.is_null() {
            return Err(MemoryError::NullParameter("allocation key"));
        }
        self.check_context(key.context)?;
        let page = page_ref(&self.pages, key.page)?;
        let entry = page.entry(key.alloc)?;
        Ok((page, entry))
    }

    /// Reserves `size` zeroed bytes inside a page.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::NullParameter`] / [`MemoryError::ForeignKey`] /
    ///   [`MemoryError::StaleKey`] for a bad page key
    /// - [`MemoryError::ZeroParameter`] if `size` is zero
    /// - [`MemoryError::PageUnavailable`] unless the page is unlocked
    /// - [`MemoryError::FailedAllocation`] if the page has no room
    pub fn allocate(&mut self, page: PageKey, size: usize) -> MemoryResult<AllocKey> {
        if page.is_null() {
            return Err(MemoryError::NullParameter("page key"));
        }
        self.check_context(page.context)?;
        if size == 0 {
            return Err(MemoryError::ZeroParameter("allocation size"));
        }

        let target = page_mut(&mut self.pages, page.page)?;
        target.require(target.status().allows_mutation(), "allocate")?;
        let (alloc, entry) = match target.allocate(&mut self.heap, size) {
            Ok(placed) => placed,
            Err(err) => {
                tracing::warn!(
                    "Context {}: allocation of {} bytes failed: {}",
                    self.id.raw(),
                    size,
                    err
                );
                return Err(err);
            }
        };

        tracing::trace!(
            "Context {}: allocated {} bytes at {} (page {}, slot {})",
            self.id.raw(),
            size,
            entry.offset,
            page.page.index(),
            alloc.index()
        );
        self.record(EventKind::Alloc, page.page, alloc, size, entry.offset);
        Ok(AllocKey::new(self.id, page.page, alloc))
    }

    /// Releases an allocation. The key (and every copy of it) becomes stale.
    ///
    /// # Errors
    ///
    /// Key errors, and [`MemoryError::PageUnavailable`] unless the page is
    /// unlocked.
    pub fn free(&mut self, key: AllocKey) -> MemoryResult<()> {
        if key.is_null() {
            return Err(MemoryError::NullParameter("allocation key"));
        }
        self.check_context(key.context)?;
        let page = page_mut(&mut self.pages, key.page)?;
        page.require(page.status().allows_mutation(), "free")?;
        let entry = page.free(key.alloc)?;

        tracing::trace!("Context {}: freed {} bytes at {}", self.id.raw(), entry.size, entry.offset);
        self.record(EventKind::Free, key.page, key.alloc, entry.size, entry.offset);
        Ok(())
    }

    /// Resizes an allocation, preserving its content up to the smaller size.
    ///
    /// The allocation may move, and a full page compaction may move other
    /// allocations of the same page. Always store the returned key.
    ///
    /// # Errors
    ///
    /// Key errors, [`MemoryError::ZeroParameter`] for a zero size,
    /// [`MemoryError::PageUnavailable`] unless the page is unlocked and
    /// [`MemoryError::FailedAllocation`] if the page cannot fit the new size
    /// even after compaction (the original allocation is left untouched).
    pub fn realloc(&mut self, key: AllocKey, new_size: usize) -> MemoryResult<AllocKey> {
        if key.is_null() {
            return Err(MemoryError::NullParameter("allocation key"));
        }
        self.check_context(key.context)?;
        if new_size == 0 {
            return Err(MemoryError::ZeroParameter("allocation size"));
        }

        let page = page_mut(&mut self.pages, key.page)?;
        page.require(page.status().allows_mutation(), "realloc")?;
        let (entry, relocation) = page.realloc(&mut self.heap, key.alloc, new_size)?;

        if relocation == Relocation::Compacted {
            tracing::info!(
                "Context {}: page {} compacted to grow slot {} to {} bytes",
                self.id.raw(),
                key.page.index(),
                key.alloc.index(),
                new_size
            );
        }
        self.record(EventKind::Alloc, key.page, key.alloc, new_size, entry.offset);
        Ok(key)
    }

    /// Logical size of an allocation.
    ///
    /// # Errors
    ///
    /// Key errors.
    pub fn size_of(&self, key: AllocKey) -> MemoryResult<usize> {
        self.resolve(key).map(|(_, entry)| entry.size)
    }

    /// Whether `key` currently names a live allocation of this context.
    #[must_use]
    pub fn is_live(&self, key: AllocKey) -> bool {
        self.resolve(key).is_ok()
    }

    /// Maps an allocation for exclusive read/write access.
    ///
    /// # Errors
    ///
    /// Key errors, and [`MemoryError::PageUnavailable`] unless the page is
    /// unlocked.
    pub fn map(&mut self, key: AllocKey) -> MemoryResult<Mapping<'_>> {
        let (page, entry) = self.resolve(key)?;
        page.require(page.status().allows_mutation(), "map")?;
        Ok(Mapping::new(key, &mut self.heap[entry.offset..entry.offset + entry.size]))
    }

    /// Maps two different allocations at once.
    ///
    /// # Errors
    ///
    /// [`MemoryError::AliasedMapping`] if `a == b`; otherwise as [`Context::map`].
    pub fn map_pair(
        &mut self,
        a: AllocKey,
        b: AllocKey,
    ) -> MemoryResult<(Mapping<'_>, Mapping<'_>)> {
        if a == b && !a.is_null() {
            return Err(MemoryError::AliasedMapping);
        }
        let (page_a, entry_a) = self.resolve(a)?;
        page_a.require(page_a.status().allows_mutation(), "map")?;
        let (page_b, entry_b) = self.resolve(b)?;
        page_b.require(page_b.status().allows_mutation(), "map")?;

        // Live allocations never overlap, so the heap splits between them.
        if entry_a.offset < entry_b.offset {
            let (low, high) = self.heap.split_at_mut(entry_b.offset);
            Ok((
                Mapping::new(a, &mut low[entry_a.offset..entry_a.offset + entry_a.size]),
                Mapping::new(b, &mut high[..entry_b.size]),
            ))
        } else {
            let (low, high) = self.heap.split_at_mut(entry_a.offset);
            Ok((
                Mapping::new(a, &mut high[..entry_a.size]),
                Mapping::new(b, &mut low[entry_b.offset..entry_b.offset + entry_b.size]),
            ))
        }
    }

    /// Read-only view of an allocation. Any number of views may coexist.
    ///
    /// # Errors
    ///
    /// Key errors, and [`MemoryError::PageUnavailable`] for locked or freed
    /// pages.
    pub fn view(&self, key: AllocKey) -> MemoryResult<&[u8]> {
        let (page, entry) = self.resolve(key)?;
        page.require(page.status().allows_view(), "view")?;
        Ok(&self.heap[entry.offset..entry.offset + entry.size])
    }

    /// Reads a `Pod` value stored at `offset` inside an allocation.
    ///
    /// # Errors
    ///
    /// As [`Context::view`], plus [`MemoryError::IndexOutOfRange`].
    pub fn read_pod<T: Pod>(&self, key: AllocKey, offset: usize) -> MemoryResult<T> {
        read_pod(self.view(key)?, offset)
    }

    /// Writes a `Pod` value at `offset` inside an allocation.
    ///
    /// # Errors
    ///
    /// As [`Context::map`], plus [`MemoryError::IndexOutOfRange`].
    pub fn write_pod<T: Pod>(&mut self, key: AllocKey, offset: usize, value: &T) -> MemoryResult<()> {
        self.map(key)?.write(offset, value)
    }

    /// Heap offset of an allocation, relative to the user region.
    ///
    /// Only meaningful until the next realloc or compaction of its page.
    ///
    /// # Errors
    ///
    /// Key errors.
    pub fn offset_of(&self, key: AllocKey) -> MemoryResult<usize> {
        let (_, entry) = self.resolve(key)?;
        Ok(entry.offset - self.layout.user().start)
    }

    // =========================================================================
    // Debug events
    // =========================================================================

    pub(crate) fn record(
        &mut self,
        kind: EventKind,
        page: PageId,
        alloc: AllocId,
        size: usize,
        heap_offset: usize,
    ) {
        let user_start = self.layout.user().start;
        if let Some(debug) = &mut self.debug {
            debug.events.push(MemoryEvent {
                kind,
                elapsed: debug.elapsed,
                user_section_id: page,
                allocation_id: alloc,
                size,
                byte_offset: heap_offset.saturating_sub(user_start),
            });
        }
    }

    /// Pops the oldest recorded event. Always `None` for plain contexts.
    pub fn event_pop(&mut self) -> Option<MemoryEvent> {
        self.debug.as_mut()?.events.pop()
    }

    /// Number of events waiting to be popped.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.debug.as_ref().map_or(0, |debug| debug.events.len())
    }

    /// Number of events dropped because the ring was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.debug.as_ref().map_or(0, |debug| debug.events.dropped())
    }

    /// Advances the frame time stamped on future events.
    pub fn advance_time(&mut self, delta: Duration) {
        if let Some(debug) = &mut self.debug {
            debug.elapsed += delta;
        }
    }

    /// Sets the frame time stamped on future events.
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        if let Some(debug) = &mut self.debug {
            debug.elapsed = elapsed;
        }
    }

    /// Current frame time of a debug context (zero for plain contexts).
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.debug.as_ref().map_or(Duration::ZERO, |debug| debug.elapsed)
    }
}
