//! # Mapping Guards
//!
//! `map` pins a key to its bytes for as long as the returned [`Mapping`]
//! lives. The guard mutably borrows its context, so:
//!
//! - no allocation can move (realloc, compaction, free) while it is mapped
//! - no second mapping can be taken from the same context until it is released
//! - release happens on every exit path, including `?` returns
//!
//! ```rust,ignore
//! let mut health = ctx.map(key)?;
//! health.write(0, &100u32)?;
//! health.unmap(); // or let it drop
//! ```
//!
//! Read-only access goes through `view`, which only borrows the context
//! shared, so any number of views may coexist.

use std::ops::{Deref, DerefMut};

use bytemuck::Pod;

use crate::error::{MemoryError, MemoryResult};
use crate::key::AllocKey;

/// Reads a `T` stored at `offset` in `bytes` (no alignment requirement).
///
/// # Errors
///
/// [`MemoryError::IndexOutOfRange`] if `T` does not fit at `offset`.
pub fn read_pod<T: Pod>(bytes: &[u8], offset: usize) -> MemoryResult<T> {
    let size = std::mem::size_of::<T>();
    let slice = offset
        .checked_add(size)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(MemoryError::IndexOutOfRange {
            index: offset.saturating_add(size),
            len: bytes.len(),
        })?;
    Ok(bytemuck::pod_read_unaligned(slice))
}

/// Writes `value` at `offset` in `bytes` (no alignment requirement).
///
/// # Errors
///
/// [`MemoryError::IndexOutOfRange`] if `T` does not fit at `offset`.
pub fn write_pod<T: Pod>(bytes: &mut [u8], offset: usize, value: &T) -> MemoryResult<()> {
    let size = std::mem::size_of::<T>();
    let len = bytes.len();
    let slice = offset
        .checked_add(size)
        .and_then(|end| bytes.get_mut(offset..end))
        .ok_or(MemoryError::IndexOutOfRange {
            index: offset.saturating_add(size),
            len,
        })?;
    slice.copy_from_slice(bytemuck::bytes_of(value));
    Ok(())
}

/// Exclusive, scoped access to one allocation's bytes.
///
/// Dereferences to exactly the allocation's logical size.
#[derive(Debug)]
pub struct Mapping<'a> {
    key: AllocKey,
    bytes: &'a mut [u8],
}

impl<'a> Mapping<'a> {
    pub(crate) fn new(key: AllocKey, bytes: &'a mut [u8]) -> Self {
        Self { key, bytes }
    }

    /// The key this mapping resolves.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> AllocKey {
        self.key
    }

    /// Reads a `Pod` value at `offset`.
    ///
    /// # Errors
    ///
    /// [`MemoryError::IndexOutOfRange`] if the value does not fit.
    #[inline]
    pub fn read<T: Pod>(&self, offset: usize) -> MemoryResult<T> {
        read_pod(&*self.bytes, offset)
    }

    /// Writes a `Pod` value at `offset`.
    ///
    /// # Errors
    ///
    /// [`MemoryError::IndexOutOfRange`] if the value does not fit.
    #[inline]
    pub fn write<T: Pod>(&mut self, offset: usize, value: &T) -> MemoryResult<()> {
        write_pod(&mut *self.bytes, offset, value)
    }

    /// Releases the mapping. Equivalent to dropping it.
    #[inline]
    pub fn unmap(self) {}
}

impl Deref for Mapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &*self.bytes
    }
}

impl DerefMut for Mapping<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut *self.bytes
    }
}
