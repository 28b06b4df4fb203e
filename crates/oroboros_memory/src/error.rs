//! # Memory Error Types
//!
//! All errors that can occur while carving contexts, pages and allocations.
//!
//! Every fallible operation returns one of these as a value. Nothing in this
//! crate panics on bad input from a caller; panics are reserved for broken
//! internal invariants.

use thiserror::Error;

use crate::key::{ContextId, PageId};
use crate::page::PageStatus;

/// Errors that can occur in the memory system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// A required handle was the NULL sentinel.
    #[error("null parameter: {0}")]
    NullParameter(&'static str),

    /// A size or count parameter was zero.
    #[error("zero parameter: {0}")]
    ZeroParameter(&'static str),

    /// The arena (or page) has no contiguous room for the request.
    #[error("failed allocation: requested {requested} bytes, largest free block is {available}")]
    FailedAllocation {
        /// Bytes requested (after rounding, unless rounding overflows).
        requested: usize,
        /// Largest contiguous free block at the time of the request.
        available: usize,
    },

    /// An index or byte range fell outside its container.
    #[error("index out of range: {index} (length {len})")]
    IndexOutOfRange {
        /// The offending index or range end.
        index: usize,
        /// The valid length.
        len: usize,
    },

    /// Seeded identity mode was used before a seed was supplied.
    #[error("identity generator used before it was seeded")]
    RandomNotSeeded,

    /// A size parameter was non-zero but below the required minimum.
    #[error("size too small: need at least {required}, got {actual}")]
    SizeTooSmall {
        /// Minimum accepted size.
        required: usize,
        /// Size that was passed.
        actual: usize,
    },

    /// The operation is not supported in this configuration.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A fixed-size table (pages, contexts, slots) is full.
    #[error("too many objects: limit is {limit}")]
    TooManyObjects {
        /// The table limit.
        limit: usize,
    },

    /// The key's slot has been freed (and possibly reused) since it was issued.
    #[error("stale key: slot {index} is at generation {current}, key has {stale}")]
    StaleKey {
        /// Slot index.
        index: u32,
        /// Generation carried by the key.
        stale: u32,
        /// Generation currently stored in the slot.
        current: u32,
    },

    /// The key belongs to a different context than the one it was used with.
    #[error("foreign key: context {expected:?} cannot resolve a key from {found:?}")]
    ForeignKey {
        /// The context that received the key.
        expected: ContextId,
        /// The context named by the key.
        found: ContextId,
    },

    /// The page status forbids the requested operation.
    #[error("page {page:?} is {status:?}, cannot {operation}")]
    PageUnavailable {
        /// Page that refused the request.
        page: PageId,
        /// Its current status.
        status: PageStatus,
        /// What was attempted.
        operation: &'static str,
    },

    /// A debug context's regions overlap, are out of order or exceed the heap.
    #[error("invalid debug layout: {0}")]
    InvalidLayout(&'static str),

    /// Two mappings of the same allocation were requested at once.
    #[error("allocation is already mapped by this call")]
    AliasedMapping,

    /// Catch-all for conditions with no dedicated variant.
    #[error("unknown memory error: {0}")]
    Unknown(String),
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
