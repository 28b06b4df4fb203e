//! # Handles
//!
//! Nothing outside a [`Context`](crate::Context) ever holds an address into its
//! arena. Callers hold keys instead:
//!
//! - [`ContextId`]: which arena
//! - [`PageId`]: which page of that arena (8-bit index + 8-bit generation)
//! - [`AllocId`]: which slot of that page (32-bit index + 32-bit generation)
//!
//! The generation halves are bumped every time a slot is released, so a key
//! kept past `free` is reported as stale instead of silently aliasing whatever
//! reuses the slot.
//!
//! All key types are `Pod` so containers can store them inside mapped records.

use bytemuck::{Pod, Zeroable};

/// Identifier of a context (one arena).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct ContextId(u16);

impl ContextId {
    /// Null/invalid context ID.
    pub const NULL: Self = Self(u16::MAX);

    /// Creates a context ID from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Checks if this ID is the null sentinel.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u16::MAX
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Identifier of a page inside a context.
///
/// - Lower 8 bits: index into the context's page table
/// - Upper 8 bits: generation of that page-table entry
///
/// Index `0xFF` is never handed out; it is reserved for sentinels.
/// Generations never wrap: a row freed at generation 255 is not reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct PageId(u16);

impl PageId {
    /// Null/invalid page ID.
    pub const NULL: Self = Self(u16::MAX);

    /// Marker page ID carried by raw-blob keys (raw blobs live outside pages).
    pub const RAW: Self = Self(0xFEFF);

    /// Index value reserved for sentinels.
    pub const RESERVED_INDEX: u8 = u8::MAX;

    /// Creates a page ID from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u8, generation: u8) -> Self {
        Self(((generation as u16) << 8) | index as u16)
    }

    /// Returns the page-table index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Returns the generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Checks if this ID is the null sentinel.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u16::MAX
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Identifier of an allocation slot inside a page (or the raw-blob table).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct AllocId {
    index: u32,
    generation: u32,
}

impl AllocId {
    /// Null/invalid allocation ID.
    pub const NULL: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Creates an allocation ID from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the slot generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Checks if this ID is the null sentinel.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == u32::MAX && self.generation == u32::MAX
    }
}

impl Default for AllocId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Handle to a page: `(context, page)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct PageKey {
    /// Owning context.
    pub context: ContextId,
    /// Page inside that context.
    pub page: PageId,
}

impl PageKey {
    /// Null page key.
    pub const NULL: Self = Self {
        context: ContextId::NULL,
        page: PageId::NULL,
    };

    /// Creates a page key.
    #[inline]
    #[must_use]
    pub const fn new(context: ContextId, page: PageId) -> Self {
        Self { context, page }
    }

    /// Checks if either half is null.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.context.is_null() || self.page.is_null()
    }
}

impl Default for PageKey {
    fn default() -> Self {
        Self::NULL
    }
}

/// Handle to one logical allocation: `(context, page, allocation)`.
///
/// Two keys name the same allocation iff all three fields are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct AllocKey {
    /// Owning context.
    pub context: ContextId,
    /// Page holding the allocation.
    pub page: PageId,
    /// Slot inside the page.
    pub alloc: AllocId,
}

impl AllocKey {
    /// The "no allocation" key. Every field holds its NULL sentinel.
    pub const NULL: Self = Self {
        context: ContextId::NULL,
        page: PageId::NULL,
        alloc: AllocId::NULL,
    };

    /// Creates an allocation key.
    #[inline]
    #[must_use]
    pub const fn new(context: ContextId, page: PageId, alloc: AllocId) -> Self {
        Self {
            context,
            page,
            alloc,
        }
    }

    /// Returns the page this allocation lives in.
    #[inline]
    #[must_use]
    pub const fn page_key(self) -> PageKey {
        PageKey::new(self.context, self.page)
    }

    /// Checks if any field is null.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.context.is_null() || self.page.is_null() || self.alloc.is_null()
    }
}

impl Default for AllocKey {
    fn default() -> Self {
        Self::NULL
    }
}

/// Handle to a raw blob.
///
/// Shares the [`AllocKey`] layout; the page field is always [`PageId::RAW`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct RawKey(AllocKey);

impl RawKey {
    /// The "no blob" key.
    pub const NULL: Self = Self(AllocKey::NULL);

    /// Creates a raw key for a slot of the context's raw table.
    #[inline]
    #[must_use]
    pub const fn new(context: ContextId, alloc: AllocId) -> Self {
        Self(AllocKey::new(context, PageId::RAW, alloc))
    }

    /// Returns the owning context.
    #[inline]
    #[must_use]
    pub const fn context(self) -> ContextId {
        self.0.context
    }

    /// Returns the slot identifier.
    #[inline]
    #[must_use]
    pub const fn alloc(self) -> AllocId {
        self.0.alloc
    }

    /// Checks if this is the null key.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0.context.is_null() || self.0.alloc.is_null()
    }

    #[inline]
    pub(crate) const fn as_alloc_key(self) -> AllocKey {
        self.0
    }
}

impl Default for RawKey {
    fn default() -> Self {
        Self::NULL
    }
}
