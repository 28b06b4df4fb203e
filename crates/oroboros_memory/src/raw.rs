//! # Raw Blobs
//!
//! Variable-length byte buffers that live directly in a context's user region,
//! outside any page. Containers use them for key bytes and other data whose
//! size is only known at runtime.
//!
//! Growing past the reserved capacity reserves [`RAW_GROWTH_FACTOR`] times the
//! old capacity (or exactly what is needed, if the larger block does not fit),
//! so repeated appends stay amortized.

use crate::constants::RAW_GROWTH_FACTOR;
use crate::context::Context;
use crate::debug::EventKind;
use crate::error::{MemoryError, MemoryResult};
use crate::key::{PageId, RawKey};
use crate::mapping::Mapping;
use crate::page::round_up;

/// Where one raw blob sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RawBlob {
    /// Absolute heap offset.
    pub offset: usize,
    /// Bytes reserved.
    pub capacity: usize,
    /// Bytes exposed to callers.
    pub len: usize,
}

impl Context {
    fn raw_blob(&self, key: RawKey) -> MemoryResult<RawBlob> {
        if key.is_null() {
            return Err(MemoryError::NullParameter("raw key"));
        }
        self.check_context(key.context())?;
        self.raws.get(key.alloc()).copied()
    }

    /// Reserves a zeroed blob of `size` bytes in the user region.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::ZeroParameter`] if `size` is zero
    /// - [`MemoryError::FailedAllocation`] if no free block is large enough
    /// - [`MemoryError::TooManyObjects`] if the raw table is full
    pub fn raw_alloc(&mut self, size: usize) -> MemoryResult<RawKey> {
        if size == 0 {
            return Err(MemoryError::ZeroParameter("raw size"));
        }
        let too_big = |ctx: &Self| MemoryError::FailedAllocation {
            requested: size,
            available: ctx.free.largest(),
        };
        let capacity = round_up(size).ok_or_else(|| too_big(self))?;
        let offset = self.free.reserve(capacity).ok_or_else(|| too_big(self))?;

        let blob = RawBlob {
            offset,
            capacity,
            len: size,
        };
        let id = match self.raws.insert(blob) {
            Ok(id) => id,
            Err(err) => {
                self.free.release(offset, capacity);
                return Err(err);
            }
        };

        self.heap_mut()[offset..offset + capacity].fill(0);
        self.record(EventKind::Alloc, PageId::RAW, id, size, offset);
        Ok(RawKey::new(self.id(), id))
    }

    /// Resizes a blob, preserving `min(old, new)` bytes. New bytes read as zero.
    ///
    /// The key never changes; the bytes may move.
    ///
    /// # Errors
    ///
    /// Key errors, [`MemoryError::ZeroParameter`] for a zero size and
    /// [`MemoryError::FailedAllocation`] if the blob cannot grow (it is left
    /// untouched).
    pub fn raw_realloc(&mut self, key: RawKey, size: usize) -> MemoryResult<RawKey> {
        if size == 0 {
            return Err(MemoryError::ZeroParameter("raw size"));
        }
        let blob = self.raw_blob(key)?;

        if size <= blob.capacity {
            if size > blob.len {
                self.heap_mut()[blob.offset + blob.len..blob.offset + size].fill(0);
            }
            self.raws.get_mut(key.alloc())?.len = size;
            return Ok(key);
        }

        let Some(exact) = round_up(size) else {
            return Err(MemoryError::FailedAllocation {
                requested: size,
                available: self.free.largest(),
            });
        };
        // Saturated growth that no longer rounds falls back to the exact need.
        let grown = round_up(size.max(blob.capacity.saturating_mul(RAW_GROWTH_FACTOR)))
            .unwrap_or(exact);
        let candidates = [grown, exact];

        let in_place = candidates
            .iter()
            .copied()
            .find(|capacity| self.free.try_extend(blob.offset, blob.capacity, *capacity));
        let placed = match in_place {
            Some(capacity) => Some((blob.offset, capacity)),
            None => candidates.iter().copied().find_map(|capacity| {
                self.free.reserve(capacity).map(|offset| (offset, capacity))
            }),
        };

        let Some((offset, capacity)) = placed else {
            tracing::warn!(
                "Context {}: raw blob cannot grow to {} bytes (largest free block {})",
                self.id().raw(),
                exact,
                self.free.largest()
            );
            return Err(MemoryError::FailedAllocation {
                requested: exact,
                available: self.free.largest(),
            });
        };

        let heap = self.heap_mut();
        if offset != blob.offset {
            heap.copy_within(blob.offset..blob.offset + blob.len, offset);
        }
        heap[offset + blob.len..offset + capacity].fill(0);
        if offset != blob.offset {
            self.free.release(blob.offset, blob.capacity);
        }

        *self.raws.get_mut(key.alloc())? = RawBlob {
            offset,
            capacity,
            len: size,
        };
        tracing::trace!(
            "Context {}: raw blob {} grown to {} bytes (capacity {})",
            self.id().raw(),
            key.alloc().index(),
            size,
            capacity
        );
        self.record(EventKind::Alloc, PageId::RAW, key.alloc(), size, offset);
        Ok(key)
    }

    /// Releases a blob. The key becomes stale.
    ///
    /// # Errors
    ///
    /// Key errors.
    pub fn raw_free(&mut self, key: RawKey) -> MemoryResult<()> {
        self.raw_blob(key)?;
        let blob = self.raws.remove(key.alloc())?;
        self.free.release(blob.offset, blob.capacity);
        self.record(EventKind::Free, PageId::RAW, key.alloc(), blob.len, blob.offset);
        Ok(())
    }

    /// Maps a blob for exclusive read/write access.
    ///
    /// # Errors
    ///
    /// Key errors.
    pub fn map_raw(&mut self, key: RawKey) -> MemoryResult<Mapping<'_>> {
        let blob = self.raw_blob(key)?;
        Ok(Mapping::new(
            key.as_alloc_key(),
            &mut self.heap_mut()[blob.offset..blob.offset + blob.len],
        ))
    }

    /// Read-only view of a blob.
    ///
    /// # Errors
    ///
    /// Key errors.
    pub fn view_raw(&self, key: RawKey) -> MemoryResult<&[u8]> {
        let blob = self.raw_blob(key)?;
        Ok(&self.heap()[blob.offset..blob.offset + blob.len])
    }

    /// Logical length of a blob.
    ///
    /// # Errors
    ///
    /// Key errors.
    pub fn raw_len(&self, key: RawKey) -> MemoryResult<usize> {
        self.raw_blob(key).map(|blob| blob.len)
    }

    /// Bytes reserved for a blob.
    ///
    /// # Errors
    ///
    /// Key errors.
    pub fn raw_capacity(&self, key: RawKey) -> MemoryResult<usize> {
        self.raw_blob(key).map(|blob| blob.capacity)
    }

    /// Number of live raw blobs.
    #[must_use]
    pub fn raw_count(&self) -> usize {
        self.raws.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::key::ContextId;
    use crate::{Context, MemoryError};

    fn context(capacity: usize) -> Context {
        Context::new(ContextId::new(4), capacity).unwrap()
    }

    #[test]
    fn test_raw_alloc_is_zeroed() {
        let mut ctx = context(1024);
        let key = ctx.raw_alloc(5).unwrap();
        assert_eq!(ctx.view_raw(key).unwrap(), &[0; 5]);
        assert_eq!(ctx.raw_len(key).unwrap(), 5);
        assert_eq!(ctx.raw_capacity(key).unwrap(), 8);
    }

    #[test]
    fn test_raw_grows_by_factor() {
        let mut ctx = context(1024);
        let key = ctx.raw_alloc(8).unwrap();
        ctx.map_raw(key).unwrap().copy_from_slice(b"oroboros");

        let key = ctx.raw_realloc(key, 9).unwrap();
        assert_eq!(ctx.raw_capacity(key).unwrap(), 40);
        assert_eq!(&ctx.view_raw(key).unwrap()[..8], b"oroboros");
        assert_eq!(ctx.view_raw(key).unwrap()[8], 0);
    }

    #[test]
    fn test_raw_growth_falls_back_to_exact() {
        let mut ctx = context(64);
        let key = ctx.raw_alloc(16).unwrap();
        // 5x would need 80 bytes; only 64 exist.
        let key = ctx.raw_realloc(key, 24).unwrap();
        assert_eq!(ctx.raw_capacity(key).unwrap(), 24);
    }

    #[test]
    fn test_raw_moves_when_blocked() {
        let mut ctx = context(256);
        let a = ctx.raw_alloc(8).unwrap();
        let _b = ctx.raw_alloc(8).unwrap();
        ctx.map_raw(a).unwrap().copy_from_slice(b"12345678");

        let a = ctx.raw_realloc(a, 16).unwrap();
        assert_eq!(&ctx.view_raw(a).unwrap()[..8], b"12345678");
        assert_eq!(ctx.raw_count(), 2);
    }

    #[test]
    fn test_raw_shrink_then_grow_reads_zero() {
        let mut ctx = context(256);
        let key = ctx.raw_alloc(8).unwrap();
        ctx.map_raw(key).unwrap().fill(0xFF);
        ctx.raw_realloc(key, 2).unwrap();
        ctx.raw_realloc(key, 8).unwrap();
        assert_eq!(ctx.view_raw(key).unwrap(), &[0xFF, 0xFF, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_raw_free_and_stale_key() {
        let mut ctx = context(256);
        let key = ctx.raw_alloc(32).unwrap();
        ctx.raw_free(key).unwrap();
        assert_eq!(ctx.free_bytes(), 256);
        assert!(matches!(ctx.view_raw(key), Err(MemoryError::StaleKey { .. })));
        assert!(ctx.raw_free(key).is_err());
    }

    #[test]
    fn test_raw_failure_leaves_blob_untouched() {
        let mut ctx = context(64);
        let key = ctx.raw_alloc(32).unwrap();
        ctx.map_raw(key).unwrap().fill(3);
        assert!(matches!(
            ctx.raw_realloc(key, 128),
            Err(MemoryError::FailedAllocation { .. })
        ));
        assert_eq!(ctx.view_raw(key).unwrap(), &[3; 32]);
    }

    #[test]
    fn test_raw_huge_size_fails() {
        let mut ctx = context(256);
        assert!(matches!(
            ctx.raw_alloc(usize::MAX - 3),
            Err(MemoryError::FailedAllocation { .. })
        ));

        let key = ctx.raw_alloc(16).unwrap();
        ctx.map_raw(key).unwrap().fill(4);
        for size in [usize::MAX, usize::MAX - 3] {
            assert!(matches!(
                ctx.raw_realloc(key, size),
                Err(MemoryError::FailedAllocation { .. })
            ));
        }
        assert_eq!(ctx.view_raw(key).unwrap(), &[4; 16]);
    }
}
