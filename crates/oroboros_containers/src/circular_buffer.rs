//! # Circular Buffer
//!
//! Fixed-capacity byte ring over one storage allocation.
//!
//! One byte is always kept empty so that `read == write` means empty and
//! never full. A buffer created with capacity `N` therefore holds `N - 1`
//! bytes:
//!
//! ```text
//! used = (write - read) mod N
//! free = N - 1 - used
//! ```
//!
//! Writes are all-or-nothing. Reads return as many bytes as are available.

use bytemuck::{Pod, Zeroable};
use oroboros_memory::{AllocKey, Context, MemoryError, PageKey};

use crate::error::{ContainerError, ContainerResult};

/// Smallest capacity that can hold one byte.
pub const MIN_CAPACITY: usize = 2;

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct BufferHeader {
    capacity: u64,
    read: u64,
    write: u64,
    storage: AllocKey,
    _padding: u32,
}

/// Decoded header state.
#[derive(Clone, Copy, Debug)]
struct Cursor {
    capacity: usize,
    read: usize,
    write: usize,
    storage: AllocKey,
}

impl Cursor {
    #[inline]
    const fn used(&self) -> usize {
        (self.write + self.capacity - self.read) % self.capacity
    }

    #[inline]
    const fn free(&self) -> usize {
        self.capacity - 1 - self.used()
    }
}

/// Handle to a circular buffer stored in a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CircularBuffer {
    header: AllocKey,
}

impl CircularBuffer {
    /// Creates an empty buffer whose header and storage live in `page`.
    ///
    /// # Errors
    ///
    /// - `NullParameter` for a null page
    /// - `SizeTooSmall` when `capacity < 2`
    /// - allocation errors from the page (nothing is left allocated)
    pub fn create(ctx: &mut Context, page: PageKey, capacity: usize) -> ContainerResult<Self> {
        if page.is_null() {
            return Err(MemoryError::NullParameter("page key").into());
        }
        if capacity < MIN_CAPACITY {
            return Err(MemoryError::SizeTooSmall {
                required: MIN_CAPACITY,
                actual: capacity,
            }
            .into());
        }

        let header = ctx.allocate(page, std::mem::size_of::<BufferHeader>())?;
        let storage = match ctx.allocate(page, capacity) {
            Ok(storage) => storage,
            Err(err) => {
                ctx.free(header)?;
                return Err(err.into());
            }
        };

        let buffer = Self { header };
        buffer.store(
            ctx,
            &Cursor {
                capacity,
                read: 0,
                write: 0,
                storage,
            },
        )?;
        tracing::debug!("Circular buffer created: {} bytes", capacity);
        Ok(buffer)
    }

    /// Re-attaches to a buffer created earlier.
    #[inline]
    #[must_use]
    pub const fn from_header(header: AllocKey) -> Self {
        Self { header }
    }

    /// Key of the header allocation.
    #[inline]
    #[must_use]
    pub const fn header(&self) -> AllocKey {
        self.header
    }

    fn load(&self, ctx: &Context) -> ContainerResult<Cursor> {
        if self.header.is_null() {
            return Err(MemoryError::NullParameter("buffer").into());
        }
        let raw: BufferHeader = ctx.read_pod(self.header, 0)?;
        let field = |value: u64, name| {
            usize::try_from(value).map_err(|_| ContainerError::CorruptRecord(name))
        };
        let cursor = Cursor {
            capacity: field(raw.capacity, "buffer capacity")?,
            read: field(raw.read, "buffer read cursor")?,
            write: field(raw.write, "buffer write cursor")?,
            storage: raw.storage,
        };
        if cursor.capacity < MIN_CAPACITY
            || cursor.read >= cursor.capacity
            || cursor.write >= cursor.capacity
        {
            return Err(ContainerError::CorruptRecord("buffer cursor out of range"));
        }
        Ok(cursor)
    }

    fn store(&self, ctx: &mut Context, cursor: &Cursor) -> ContainerResult<()> {
        ctx.write_pod(
            self.header,
            0,
            &BufferHeader {
                capacity: cursor.capacity as u64,
                read: cursor.read as u64,
                write: cursor.write as u64,
                storage: cursor.storage,
                _padding: 0,
            },
        )?;
        Ok(())
    }

    /// Copies up to `out.len()` bytes from the read cursor without consuming.
    fn copy_out(ctx: &Context, cursor: &Cursor, out: &mut [u8]) -> ContainerResult<usize> {
        let count = out.len().min(cursor.used());
        if count == 0 {
            return Ok(0);
        }
        let storage = ctx.view(cursor.storage)?;
        let first = count.min(cursor.capacity - cursor.read);
        out[..first].copy_from_slice(&storage[cursor.read..cursor.read + first]);
        out[first..count].copy_from_slice(&storage[..count - first]);
        Ok(count)
    }

    /// Appends all of `bytes`.
    ///
    /// # Errors
    ///
    /// [`ContainerError::InsufficientSpace`] when `bytes` does not fit; the
    /// buffer is left untouched.
    pub fn write(&self, ctx: &mut Context, bytes: &[u8]) -> ContainerResult<()> {
        let mut cursor = self.load(ctx)?;
        if bytes.len() > cursor.free() {
            return Err(ContainerError::InsufficientSpace {
                requested: bytes.len(),
                available: cursor.free(),
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        {
            let mut storage = ctx.map(cursor.storage)?;
            let first = bytes.len().min(cursor.capacity - cursor.write);
            storage[cursor.write..cursor.write + first].copy_from_slice(&bytes[..first]);
            storage[..bytes.len() - first].copy_from_slice(&bytes[first..]);
        }
        cursor.write = (cursor.write + bytes.len()) % cursor.capacity;
        self.store(ctx, &cursor)
    }

    /// Moves up to `out.len()` bytes into `out`; returns how many.
    ///
    /// # Errors
    ///
    /// Fails only if the records cannot be accessed.
    pub fn read(&self, ctx: &mut Context, out: &mut [u8]) -> ContainerResult<usize> {
        let mut cursor = self.load(ctx)?;
        let count = Self::copy_out(ctx, &cursor, out)?;
        if count > 0 {
            cursor.read = (cursor.read + count) % cursor.capacity;
            self.store(ctx, &cursor)?;
        }
        Ok(count)
    }

    /// Like [`CircularBuffer::read`] but leaves the bytes in place.
    ///
    /// # Errors
    ///
    /// Fails only if the records cannot be accessed.
    pub fn peek(&self, ctx: &Context, out: &mut [u8]) -> ContainerResult<usize> {
        let cursor = self.load(ctx)?;
        Self::copy_out(ctx, &cursor, out)
    }

    /// Discards up to `count` bytes; returns how many.
    ///
    /// # Errors
    ///
    /// Fails only if the records cannot be accessed.
    pub fn skip(&self, ctx: &mut Context, count: usize) -> ContainerResult<usize> {
        let mut cursor = self.load(ctx)?;
        let count = count.min(cursor.used());
        if count > 0 {
            cursor.read = (cursor.read + count) % cursor.capacity;
            self.store(ctx, &cursor)?;
        }
        Ok(count)
    }

    /// Drops all buffered bytes.
    ///
    /// # Errors
    ///
    /// Fails only if the records cannot be accessed.
    pub fn clear(&self, ctx: &mut Context) -> ContainerResult<()> {
        let mut cursor = self.load(ctx)?;
        cursor.read = 0;
        cursor.write = 0;
        self.store(ctx, &cursor)
    }

    /// Releases the storage and the header.
    ///
    /// # Errors
    ///
    /// Memory errors from the page.
    pub fn destroy(self, ctx: &mut Context) -> ContainerResult<()> {
        let cursor = self.load(ctx)?;
        ctx.free(cursor.storage)?;
        ctx.free(self.header)?;
        Ok(())
    }

    /// Storage size the buffer was created with (one more than it can hold).
    ///
    /// # Errors
    ///
    /// Fails only if the header cannot be read.
    pub fn capacity(&self, ctx: &Context) -> ContainerResult<usize> {
        Ok(self.load(ctx)?.capacity)
    }

    /// Bytes waiting to be read.
    ///
    /// # Errors
    ///
    /// Fails only if the header cannot be read.
    pub fn bytes_used(&self, ctx: &Context) -> ContainerResult<usize> {
        Ok(self.load(ctx)?.used())
    }

    /// Bytes that can still be written.
    ///
    /// # Errors
    ///
    /// Fails only if the header cannot be read.
    pub fn bytes_free(&self, ctx: &Context) -> ContainerResult<usize> {
        Ok(self.load(ctx)?.free())
    }

    /// Whether nothing is buffered.
    ///
    /// # Errors
    ///
    /// Fails only if the header cannot be read.
    pub fn is_empty(&self, ctx: &Context) -> ContainerResult<bool> {
        Ok(self.load(ctx)?.used() == 0)
    }

    /// Whether no byte can be written.
    ///
    /// # Errors
    ///
    /// Fails only if the header cannot be read.
    pub fn is_full(&self, ctx: &Context) -> ContainerResult<bool> {
        Ok(self.load(ctx)?.free() == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oroboros_memory::ContextId;

    fn setup(capacity: usize) -> (Context, PageKey, CircularBuffer) {
        let mut ctx = Context::new(ContextId::new(0), 4096).unwrap();
        let page = ctx.alloc_page(1024).unwrap();
        let buffer = CircularBuffer::create(&mut ctx, page, capacity).unwrap();
        (ctx, page, buffer)
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(std::mem::size_of::<BufferHeader>(), 40);
    }

    #[test]
    fn test_capacity_reserves_one_byte() {
        let (mut ctx, _, buffer) = setup(8);
        assert!(buffer.is_empty(&ctx).unwrap());
        assert_eq!(buffer.bytes_free(&ctx).unwrap(), 7);

        buffer.write(&mut ctx, &[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert!(buffer.is_full(&ctx).unwrap());
        assert_eq!(
            buffer.write(&mut ctx, &[8]),
            Err(ContainerError::InsufficientSpace {
                requested: 1,
                available: 0,
            })
        );
    }

    #[test]
    fn test_write_is_all_or_nothing() {
        let (mut ctx, _, buffer) = setup(8);
        buffer.write(&mut ctx, &[1, 2, 3, 4, 5]).unwrap();
        assert!(buffer.write(&mut ctx, &[6, 7, 8]).is_err());
        assert_eq!(buffer.bytes_used(&ctx).unwrap(), 5);
    }

    #[test]
    fn test_wraparound() {
        let (mut ctx, _, buffer) = setup(8);
        buffer.write(&mut ctx, &[1, 2, 3, 4, 5, 6]).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(buffer.read(&mut ctx, &mut out).unwrap(), 4);
        assert_eq!(out, [1, 2, 3, 4]);

        buffer.write(&mut ctx, &[7, 8, 9, 10, 11]).unwrap();
        assert!(buffer.is_full(&ctx).unwrap());

        let mut out = [0u8; 16];
        assert_eq!(buffer.peek(&ctx, &mut out).unwrap(), 7);
        assert_eq!(buffer.read(&mut ctx, &mut out).unwrap(), 7);
        assert_eq!(&out[..7], &[5, 6, 7, 8, 9, 10, 11]);
        assert!(buffer.is_empty(&ctx).unwrap());
    }

    #[test]
    fn test_short_read_and_skip() {
        let (mut ctx, _, buffer) = setup(16);
        buffer.write(&mut ctx, b"abc").unwrap();
        assert_eq!(buffer.skip(&mut ctx, 1).unwrap(), 1);
        let mut out = [0u8; 8];
        assert_eq!(buffer.read(&mut ctx, &mut out).unwrap(), 2);
        assert_eq!(&out[..2], b"bc");
        assert_eq!(buffer.read(&mut ctx, &mut out).unwrap(), 0);
        assert_eq!(buffer.skip(&mut ctx, 5).unwrap(), 0);
    }

    #[test]
    fn test_capacity_below_minimum() {
        let mut ctx = Context::new(ContextId::new(0), 4096).unwrap();
        let page = ctx.alloc_page(1024).unwrap();
        assert_eq!(
            CircularBuffer::create(&mut ctx, page, 1),
            Err(ContainerError::Memory(MemoryError::SizeTooSmall {
                required: 2,
                actual: 1,
            }))
        );
        assert_eq!(ctx.page_stats(page).unwrap().allocations, 0);
    }

    #[test]
    fn test_create_unwinds_when_storage_does_not_fit() {
        let mut ctx = Context::new(ContextId::new(0), 4096).unwrap();
        let page = ctx.alloc_page(256).unwrap();
        assert!(CircularBuffer::create(&mut ctx, page, 4096).is_err());
        assert_eq!(ctx.page_stats(page).unwrap().allocations, 0);
    }

    #[test]
    fn test_clear_and_destroy() {
        let (mut ctx, page, buffer) = setup(8);
        buffer.write(&mut ctx, &[1, 2, 3]).unwrap();
        buffer.clear(&mut ctx).unwrap();
        assert!(buffer.is_empty(&ctx).unwrap());
        buffer.destroy(&mut ctx).unwrap();
        assert_eq!(ctx.page_stats(page).unwrap().allocations, 0);
    }

    #[test]
    fn test_storage_survives_compaction() {
        let mut ctx = Context::new(ContextId::new(0), 4096).unwrap();
        let page = ctx.alloc_page(1024).unwrap();
        let filler = ctx.allocate(page, 128).unwrap();
        let buffer = CircularBuffer::create(&mut ctx, page, 32).unwrap();
        buffer.write(&mut ctx, b"relocate me").unwrap();

        ctx.free(filler).unwrap();
        ctx.compact_page(page).unwrap();

        let mut out = [0u8; 11];
        assert_eq!(buffer.read(&mut ctx, &mut out).unwrap(), 11);
        assert_eq!(&out, b"relocate me");
    }
}
