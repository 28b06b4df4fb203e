//! # Hash Dictionary
//!
//! Maps key bytes to byte offsets inside a separate "database" allocation.
//! The dictionary never stores values itself, only where to find them:
//!
//! ```text
//! header ──> bucket table [AllocId; N]
//!              │
//!              └─> Pair { hash, value_offset, name: RawKey, next } ─> Pair ─> NULL
//!                                 │
//! database allocation  [ ........ ▼ value ........ ]
//! ```
//!
//! All records live in the page passed to [`Dictionary::create`], so chain
//! links store only the slot id; key bytes live in raw blobs. Values are read through a fresh resolution of the
//! database key on every call, so the caller may realloc the database (and
//! rebind it with [`Dictionary::set_database`]) at any time.

use bytemuck::{Pod, Zeroable};
use oroboros_memory::{AllocId, AllocKey, Context, MemoryError, PageKey, RawKey};

use crate::error::{ContainerError, ContainerResult};
use crate::hash::{polynomial_hash, HashFn};

const ID_SIZE: usize = std::mem::size_of::<AllocId>();

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct DictionaryHeader {
    page: PageKey,
    bucket_count: u32,
    len: u32,
    table: AllocKey,
    database: AllocKey,
}

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct PairRecord {
    hash: u64,
    value_offset: u64,
    name: RawKey,
    next: AllocId,
    _padding: u32,
}

/// Where a lookup ended.
struct Slot {
    /// Pair before the match (NULL if the match heads its bucket).
    prev: AllocKey,
    /// The matching pair, or NULL if the key is absent.
    pair: AllocKey,
    /// Last pair of the bucket chain (NULL if the bucket is empty).
    tail: AllocKey,
}

/// Handle to a dictionary stored in a context.
///
/// The handle is `Copy`; all state lives in the context.
#[derive(Clone, Copy, Debug)]
pub struct Dictionary {
    header: AllocKey,
    hasher: HashFn,
}

impl Dictionary {
    /// Creates a dictionary with `bucket_count` buckets in `page`.
    ///
    /// `hasher` defaults to [`polynomial_hash`]. `database` is the allocation
    /// that value offsets point into.
    ///
    /// # Errors
    ///
    /// - `NullParameter` for a null page or database key
    /// - `ZeroParameter` for zero buckets
    /// - any allocation error from the page (nothing is left allocated)
    pub fn create(
        ctx: &mut Context,
        page: PageKey,
        hasher: Option<HashFn>,
        bucket_count: usize,
        database: AllocKey,
    ) -> ContainerResult<Self> {
        if page.is_null() {
            return Err(MemoryError::NullParameter("page key").into());
        }
        if database.is_null() {
            return Err(MemoryError::NullParameter("database key").into());
        }
        if bucket_count == 0 {
            return Err(MemoryError::ZeroParameter("bucket count").into());
        }
        let buckets = u32::try_from(bucket_count)
            .map_err(|_| MemoryError::TooManyObjects { limit: u32::MAX as usize })?;
        ctx.size_of(database)?;

        let header = ctx.allocate(page, std::mem::size_of::<DictionaryHeader>())?;
        let table = match ctx.allocate(page, bucket_count * ID_SIZE) {
            Ok(table) => table,
            Err(err) => {
                ctx.free(header)?;
                return Err(err.into());
            }
        };

        {
            let mut mapping = ctx.map(table)?;
            for bucket in 0..bucket_count {
                mapping.write(bucket * ID_SIZE, &AllocId::NULL)?;
            }
        }
        ctx.write_pod(
            header,
            0,
            &DictionaryHeader {
                page,
                bucket_count: buckets,
                len: 0,
                table,
                database,
            },
        )?;

        tracing::debug!("Dictionary created: {} buckets", bucket_count);
        Ok(Self {
            header,
            hasher: hasher.unwrap_or(polynomial_hash),
        })
    }

    /// Re-attaches to a dictionary created earlier.
    ///
    /// `hasher` must be the function the dictionary was created with.
    #[must_use]
    pub fn from_header(header: AllocKey, hasher: Option<HashFn>) -> Self {
        Self {
            header,
            hasher: hasher.unwrap_or(polynomial_hash),
        }
    }

    /// Key of the dictionary's header allocation.
    #[inline]
    #[must_use]
    pub const fn header(&self) -> AllocKey {
        self.header
    }

    fn load(&self, ctx: &Context) -> ContainerResult<DictionaryHeader> {
        if self.header.is_null() {
            return Err(MemoryError::NullParameter("dictionary").into());
        }
        let header: DictionaryHeader = ctx.read_pod(self.header, 0)?;
        if header.bucket_count == 0 {
            return Err(ContainerError::CorruptRecord("dictionary has no buckets"));
        }
        Ok(header)
    }

    fn store(&self, ctx: &mut Context, header: &DictionaryHeader) -> ContainerResult<()> {
        ctx.write_pod(self.header, 0, header)?;
        Ok(())
    }

    // bucket_count fits in u32, so the remainder fits in usize.
    #[allow(clippy::cast_possible_truncation)]
    fn bucket(header: &DictionaryHeader, hash: u64) -> usize {
        (hash % u64::from(header.bucket_count)) as usize
    }

    /// Full key of a pair in the dictionary's page.
    fn chain_key(header: &DictionaryHeader, id: AllocId) -> AllocKey {
        if id.is_null() {
            return AllocKey::NULL;
        }
        AllocKey::new(header.page.context, header.page.page, id)
    }

    fn head(ctx: &Context, header: &DictionaryHeader, bucket: usize) -> ContainerResult<AllocKey> {
        let id: AllocId = ctx.read_pod(header.table, bucket * ID_SIZE)?;
        Ok(Self::chain_key(header, id))
    }

    fn check_key(key: &[u8]) -> ContainerResult<()> {
        if key.is_empty() {
            return Err(MemoryError::ZeroParameter("key bytes").into());
        }
        Ok(())
    }

    /// Walks the bucket chain of `key`.
    fn find(
        &self,
        ctx: &Context,
        header: &DictionaryHeader,
        key: &[u8],
        hash: u64,
    ) -> ContainerResult<Slot> {
        let mut prev = AllocKey::NULL;
        let mut current = Self::head(ctx, header, Self::bucket(header, hash))?;

        while !current.is_null() {
            let pair: PairRecord = ctx.read_pod(current, 0)?;
            if pair.hash == hash && ctx.view_raw(pair.name)? == key {
                return Ok(Slot {
                    prev,
                    pair: current,
                    tail: AllocKey::NULL,
                });
            }
            prev = current;
            current = Self::chain_key(header, pair.next);
        }

        Ok(Slot {
            prev: AllocKey::NULL,
            pair: AllocKey::NULL,
            tail: prev,
        })
    }

    /// Bucket index `key` maps to.
    ///
    /// # Errors
    ///
    /// Fails if the dictionary header cannot be read.
    pub fn bucket_of(&self, ctx: &Context, key: &[u8]) -> ContainerResult<usize> {
        let header = self.load(ctx)?;
        Ok(Self::bucket(&header, (self.hasher)(key)))
    }

    /// Maps `key` to `value_offset`, overwriting any previous offset.
    ///
    /// # Errors
    ///
    /// - `ZeroParameter` for empty key bytes
    /// - any allocation error (a half-built pair is released again)
    pub fn set(&self, ctx: &mut Context, key: &[u8], value_offset: usize) -> ContainerResult<()> {
        Self::check_key(key)?;
        let mut header = self.load(ctx)?;
        let hash = (self.hasher)(key);
        let slot = self.find(ctx, &header, key, hash)?;

        if !slot.pair.is_null() {
            let mut pair: PairRecord = ctx.read_pod(slot.pair, 0)?;
            pair.value_offset = value_offset as u64;
            ctx.write_pod(slot.pair, 0, &pair)?;
            return Ok(());
        }

        let pair_key = ctx.allocate(header.page, std::mem::size_of::<PairRecord>())?;
        let name = match ctx.raw_alloc(key.len()) {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!("Dictionary: no room for a {} byte key", key.len());
                ctx.free(pair_key)?;
                return Err(err.into());
            }
        };
        ctx.map_raw(name)?.copy_from_slice(key);
        ctx.write_pod(
            pair_key,
            0,
            &PairRecord {
                hash,
                value_offset: value_offset as u64,
                name,
                next: AllocId::NULL,
                _padding: 0,
            },
        )?;

        if slot.tail.is_null() {
            let bucket = Self::bucket(&header, hash);
            ctx.write_pod(header.table, bucket * ID_SIZE, &pair_key.alloc)?;
        } else {
            let mut tail: PairRecord = ctx.read_pod(slot.tail, 0)?;
            tail.next = pair_key.alloc;
            ctx.write_pod(slot.tail, 0, &tail)?;
        }

        header.len += 1;
        self.store(ctx, &header)
    }

    /// Database offset stored for `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// `ZeroParameter` for empty key bytes; memory errors from the records.
    pub fn get(&self, ctx: &Context, key: &[u8]) -> ContainerResult<Option<usize>> {
        Self::check_key(key)?;
        let header = self.load(ctx)?;
        let slot = self.find(ctx, &header, key, (self.hasher)(key))?;
        if slot.pair.is_null() {
            return Ok(None);
        }
        let pair: PairRecord = ctx.read_pod(slot.pair, 0)?;
        usize::try_from(pair.value_offset)
            .map(Some)
            .map_err(|_| ContainerError::CorruptRecord("value offset exceeds address space"))
    }

    /// Reads the `T` stored in the database at `key`'s offset.
    ///
    /// # Errors
    ///
    /// As [`Dictionary::get`], plus `IndexOutOfRange` if the value does not
    /// fit inside the database.
    pub fn get_value<T: Pod>(&self, ctx: &Context, key: &[u8]) -> ContainerResult<Option<T>> {
        let Some(offset) = self.get(ctx, key)? else {
            return Ok(None);
        };
        let database = self.database(ctx)?;
        Ok(Some(ctx.read_pod(database, offset)?))
    }

    /// `len` database bytes starting at `key`'s offset.
    ///
    /// # Errors
    ///
    /// As [`Dictionary::get_value`].
    pub fn get_bytes<'c>(
        &self,
        ctx: &'c Context,
        key: &[u8],
        len: usize,
    ) -> ContainerResult<Option<&'c [u8]>> {
        let Some(offset) = self.get(ctx, key)? else {
            return Ok(None);
        };
        let bytes = ctx.view(self.database(ctx)?)?;
        offset
            .checked_add(len)
            .and_then(|end| bytes.get(offset..end))
            .map(Some)
            .ok_or_else(|| {
                MemoryError::IndexOutOfRange {
                    index: offset.saturating_add(len),
                    len: bytes.len(),
                }
                .into()
            })
    }

    /// Whether `key` is present.
    ///
    /// # Errors
    ///
    /// As [`Dictionary::get`].
    pub fn contains(&self, ctx: &Context, key: &[u8]) -> ContainerResult<bool> {
        Ok(self.get(ctx, key)?.is_some())
    }

    /// Removes `key`, returning its offset if it was present.
    ///
    /// # Errors
    ///
    /// As [`Dictionary::get`].
    pub fn remove(&self, ctx: &mut Context, key: &[u8]) -> ContainerResult<Option<usize>> {
        Self::check_key(key)?;
        let mut header = self.load(ctx)?;
        let hash = (self.hasher)(key);
        let slot = self.find(ctx, &header, key, hash)?;
        if slot.pair.is_null() {
            return Ok(None);
        }

        let pair: PairRecord = ctx.read_pod(slot.pair, 0)?;
        if slot.prev.is_null() {
            let bucket = Self::bucket(&header, hash);
            ctx.write_pod(header.table, bucket * ID_SIZE, &pair.next)?;
        } else {
            let mut prev: PairRecord = ctx.read_pod(slot.prev, 0)?;
            prev.next = pair.next;
            ctx.write_pod(slot.prev, 0, &prev)?;
        }
        ctx.raw_free(pair.name)?;
        ctx.free(slot.pair)?;

        header.len -= 1;
        self.store(ctx, &header)?;
        usize::try_from(pair.value_offset)
            .map(Some)
            .map_err(|_| ContainerError::CorruptRecord("value offset exceeds address space"))
    }

    /// Removes every pair. The buckets and the database binding remain.
    ///
    /// # Errors
    ///
    /// Memory errors from the records.
    pub fn clear(&self, ctx: &mut Context) -> ContainerResult<()> {
        let mut header = self.load(ctx)?;
        for bucket in 0..header.bucket_count as usize {
            let mut current = Self::head(ctx, &header, bucket)?;
            while !current.is_null() {
                let pair: PairRecord = ctx.read_pod(current, 0)?;
                ctx.raw_free(pair.name)?;
                ctx.free(current)?;
                current = Self::chain_key(&header, pair.next);
            }
            ctx.write_pod(header.table, bucket * ID_SIZE, &AllocId::NULL)?;
        }
        header.len = 0;
        self.store(ctx, &header)
    }

    /// Number of stored keys.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn len(&self, ctx: &Context) -> ContainerResult<usize> {
        Ok(self.load(ctx)?.len as usize)
    }

    /// Whether no key is stored.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn is_empty(&self, ctx: &Context) -> ContainerResult<bool> {
        Ok(self.len(ctx)? == 0)
    }

    /// Number of buckets.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn bucket_count(&self, ctx: &Context) -> ContainerResult<usize> {
        Ok(self.load(ctx)?.bucket_count as usize)
    }

    /// Key of the database allocation values are read from.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn database(&self, ctx: &Context) -> ContainerResult<AllocKey> {
        Ok(self.load(ctx)?.database)
    }

    /// Points the dictionary at a different database allocation.
    ///
    /// # Errors
    ///
    /// `NullParameter` for a null key; memory errors otherwise.
    pub fn set_database(&self, ctx: &mut Context, database: AllocKey) -> ContainerResult<()> {
        if database.is_null() {
            return Err(MemoryError::NullParameter("database key").into());
        }
        ctx.size_of(database)?;
        let mut header = self.load(ctx)?;
        header.database = database;
        self.store(ctx, &header)
    }

    /// Releases every pair, the bucket table and the header. The database
    /// allocation is not touched.
    ///
    /// # Errors
    ///
    /// Memory errors from the records.
    pub fn destroy(self, ctx: &mut Context) -> ContainerResult<()> {
        self.clear(ctx)?;
        let header = self.load(ctx)?;
        ctx.free(header.table)?;
        ctx.free(self.header)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::fnv1a_hash;
    use oroboros_memory::ContextId;

    fn setup() -> (Context, PageKey, AllocKey) {
        let mut ctx = Context::new(ContextId::new(0), 8192).unwrap();
        let page = ctx.alloc_page(4096).unwrap();
        let database = ctx.allocate(page, 256).unwrap();
        (ctx, page, database)
    }

    #[test]
    fn test_record_layouts() {
        assert_eq!(std::mem::size_of::<DictionaryHeader>(), 36);
        assert_eq!(std::mem::size_of::<PairRecord>(), 40);
    }

    #[test]
    fn test_set_get_overwrite() {
        let (mut ctx, page, database) = setup();
        let dict = Dictionary::create(&mut ctx, page, None, 13, database).unwrap();

        dict.set(&mut ctx, b"speed", 8).unwrap();
        assert_eq!(dict.get(&ctx, b"speed").unwrap(), Some(8));
        dict.set(&mut ctx, b"speed", 16).unwrap();
        assert_eq!(dict.get(&ctx, b"speed").unwrap(), Some(16));
        assert_eq!(dict.len(&ctx).unwrap(), 1);
        assert_eq!(dict.get(&ctx, b"spee").unwrap(), None);
    }

    #[test]
    fn test_argument_checks() {
        let (mut ctx, page, database) = setup();
        assert!(matches!(
            Dictionary::create(&mut ctx, page, None, 0, database),
            Err(ContainerError::Memory(MemoryError::ZeroParameter(_)))
        ));
        assert!(matches!(
            Dictionary::create(&mut ctx, page, None, 8, AllocKey::NULL),
            Err(ContainerError::Memory(MemoryError::NullParameter(_)))
        ));
        assert!(matches!(
            Dictionary::create(&mut ctx, PageKey::NULL, None, 8, database),
            Err(ContainerError::Memory(MemoryError::NullParameter(_)))
        ));

        let dict = Dictionary::create(&mut ctx, page, None, 8, database).unwrap();
        assert!(matches!(
            dict.set(&mut ctx, b"", 0),
            Err(ContainerError::Memory(MemoryError::ZeroParameter(_)))
        ));
        let null = Dictionary::from_header(AllocKey::NULL, None);
        assert!(matches!(
            null.get(&ctx, b"x"),
            Err(ContainerError::Memory(MemoryError::NullParameter(_)))
        ));
    }

    #[test]
    fn test_colliding_keys_stay_distinct() {
        let (mut ctx, page, database) = setup();
        let dict = Dictionary::create(&mut ctx, page, None, 101, database).unwrap();

        dict.set(&mut ctx, b"Aa", 4).unwrap();
        dict.set(&mut ctx, b"BB", 12).unwrap();
        assert_eq!(dict.bucket_of(&ctx, b"Aa").unwrap(), dict.bucket_of(&ctx, b"BB").unwrap());
        assert_eq!(dict.get(&ctx, b"Aa").unwrap(), Some(4));
        assert_eq!(dict.get(&ctx, b"BB").unwrap(), Some(12));

        // Removing the chain head keeps the second pair reachable.
        assert_eq!(dict.remove(&mut ctx, b"Aa").unwrap(), Some(4));
        assert_eq!(dict.get(&ctx, b"Aa").unwrap(), None);
        assert_eq!(dict.get(&ctx, b"BB").unwrap(), Some(12));
    }

    #[test]
    fn test_single_bucket_chain_removal_from_middle() {
        let (mut ctx, page, database) = setup();
        let dict = Dictionary::create(&mut ctx, page, Some(fnv1a_hash), 1, database).unwrap();
        for (offset, key) in [b"a", b"b", b"c"].iter().enumerate() {
            dict.set(&mut ctx, *key, offset).unwrap();
        }
        assert_eq!(dict.remove(&mut ctx, b"b").unwrap(), Some(1));
        assert_eq!(dict.get(&ctx, b"a").unwrap(), Some(0));
        assert_eq!(dict.get(&ctx, b"c").unwrap(), Some(2));
        assert_eq!(dict.remove(&mut ctx, b"b").unwrap(), None);
        assert_eq!(dict.len(&ctx).unwrap(), 2);
    }

    #[test]
    fn test_values_follow_database_realloc() {
        let (mut ctx, page, database) = setup();
        let dict = Dictionary::create(&mut ctx, page, None, 7, database).unwrap();
        ctx.write_pod(database, 40, &777u32).unwrap();
        dict.set(&mut ctx, b"score", 40).unwrap();

        // The header sits right after the database, so growing it moves it.
        let database = ctx.realloc(database, 1024).unwrap();
        dict.set_database(&mut ctx, database).unwrap();

        assert_eq!(dict.get_value::<u32>(&ctx, b"score").unwrap(), Some(777));
        assert_eq!(dict.get_bytes(&ctx, b"score", 4).unwrap(), Some(&777u32.to_ne_bytes()[..]));
    }

    #[test]
    fn test_value_outside_database() {
        let (mut ctx, page, database) = setup();
        let dict = Dictionary::create(&mut ctx, page, None, 7, database).unwrap();
        dict.set(&mut ctx, b"far", 1000).unwrap();
        dict.set(&mut ctx, b"huge", usize::MAX).unwrap();
        assert!(matches!(
            dict.get_value::<u32>(&ctx, b"far"),
            Err(ContainerError::Memory(MemoryError::IndexOutOfRange { .. }))
        ));
        assert!(matches!(
            dict.get_value::<u32>(&ctx, b"huge"),
            Err(ContainerError::Memory(MemoryError::IndexOutOfRange { .. }))
        ));
        assert!(matches!(
            dict.get_bytes(&ctx, b"far", usize::MAX),
            Err(ContainerError::Memory(MemoryError::IndexOutOfRange { .. }))
        ));
        assert!(matches!(
            dict.get_bytes(&ctx, b"huge", 4),
            Err(ContainerError::Memory(MemoryError::IndexOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_clear_and_destroy_release_everything() {
        let (mut ctx, page, database) = setup();
        let before = ctx.page_stats(page).unwrap().allocations;
        let raw_before = ctx.raw_count();

        let dict = Dictionary::create(&mut ctx, page, None, 5, database).unwrap();
        for i in 0..20u32 {
            dict.set(&mut ctx, format!("key{i}").as_bytes(), i as usize).unwrap();
        }
        dict.clear(&mut ctx).unwrap();
        assert!(dict.is_empty(&ctx).unwrap());
        assert_eq!(ctx.raw_count(), raw_before);

        dict.set(&mut ctx, b"again", 1).unwrap();
        dict.destroy(&mut ctx).unwrap();
        assert_eq!(ctx.page_stats(page).unwrap().allocations, before);
        assert_eq!(ctx.raw_count(), raw_before);
        assert!(ctx.is_live(database));
    }

    #[test]
    fn test_create_unwinds_on_failure() {
        let mut ctx = Context::new(ContextId::new(0), 4096).unwrap();
        let page = ctx.alloc_page(128).unwrap();
        let database = ctx.allocate(page, 32).unwrap();

        // Header fits, a 100-bucket table does not.
        assert!(Dictionary::create(&mut ctx, page, None, 100, database).is_err());
        assert_eq!(ctx.page_stats(page).unwrap().allocations, 1);
    }
}
