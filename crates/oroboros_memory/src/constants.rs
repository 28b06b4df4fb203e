//! # Memory Constants
//!
//! Limits and defaults shared by every context.
//!
//! The per-subsystem capacities are only defaults; production sizes come from
//! the memory config file.

// =============================================================================
// ALLOCATION GRANULARITY
// =============================================================================

/// Every reservation (page, allocation, raw blob) is rounded up to this.
pub const ALLOC_ALIGN: usize = 8;

/// Maximum pages per context. Page index `0xFF` is reserved for sentinels.
pub const MAX_PAGES: usize = 255;

/// Maximum live allocations per page.
pub const MAX_ALLOCATIONS_PER_PAGE: usize = 1 << 20;

/// Maximum live raw blobs per context.
pub const MAX_RAW_BLOBS: usize = 1 << 20;

/// Maximum contexts per memory system. Context ID `0xFFFF` is the null sentinel.
pub const MAX_CONTEXTS: usize = u16::MAX as usize;

/// Raw blobs grow their capacity by this factor when they outgrow it.
pub const RAW_GROWTH_FACTOR: usize = 5;

// =============================================================================
// DEBUG CONTEXTS
// =============================================================================

/// Default number of events a debug context retains before dropping the oldest.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default size of a debug context's label region.
pub const DEFAULT_LABEL_BYTES: usize = 1024;

/// Default size of a debug context's safe-pointer region.
pub const DEFAULT_SAFE_PTR_BYTES: usize = 2048;

/// Bytes stored per page label (longer labels are truncated).
pub const LABEL_SLOT_BYTES: usize = 32;

// =============================================================================
// SUBSYSTEM DEFAULTS
// =============================================================================

/// Default arena size for the configuration subsystem.
pub const CONFIG_CONTEXT_BYTES: usize = 64 * 1024;

/// Default arena size for game state.
pub const GAME_CONTEXT_BYTES: usize = 1024 * 1024;

/// Default arena size for the physics subsystem.
pub const PHYSICS_CONTEXT_BYTES: usize = 256 * 1024;

/// Default arena size for the graphics subsystem.
pub const GRAPHICS_CONTEXT_BYTES: usize = 2 * 1024 * 1024;
