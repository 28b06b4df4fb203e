//! # Container Error Types
//!
//! All errors that can occur in the dictionary, list and buffer containers.

use oroboros_memory::{AllocKey, MemoryError};
use thiserror::Error;

/// Errors that can occur in the containers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// The underlying memory operation failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// A unique list already holds a node whose range overlaps the new one.
    #[error("range {offset}+{size} overlaps active node {existing:?}")]
    RangeOverlap {
        /// Start of the rejected range.
        offset: usize,
        /// Length of the rejected range.
        size: usize,
        /// The active node it collides with.
        existing: AllocKey,
    },

    /// A buffer write does not fit in the free space.
    #[error("insufficient space: need {requested} bytes, {available} free")]
    InsufficientSpace {
        /// Bytes the caller tried to write.
        requested: usize,
        /// Bytes currently free.
        available: usize,
    },

    /// The node is not an active member of the list it was used with.
    #[error("node {0:?} is not an active member of this list")]
    NodeNotInList(AllocKey),

    /// A stored record failed its consistency check.
    #[error("corrupt record: {0}")]
    CorruptRecord(&'static str),
}

/// Result type for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;
