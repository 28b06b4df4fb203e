//! # Unique List
//!
//! A [`List`] whose active nodes never describe overlapping byte ranges.
//! Every insertion walks the active chain, so inserts are O(n).

use oroboros_memory::{AllocKey, Context, MemoryError, PageKey};

use crate::error::{ContainerError, ContainerResult};
use crate::list::{List, NodeData};

/// Handle to a unique list stored in a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniqueList {
    list: List,
}

impl UniqueList {
    /// Creates an empty unique list in `page`.
    ///
    /// # Errors
    ///
    /// Same as [`List::create`].
    pub fn create(ctx: &mut Context, page: PageKey) -> ContainerResult<Self> {
        Ok(Self {
            list: List::create(ctx, page)?,
        })
    }

    /// Re-attaches to a unique list created earlier.
    #[inline]
    #[must_use]
    pub const fn from_header(header: AllocKey) -> Self {
        Self {
            list: List::from_header(header),
        }
    }

    /// Key of the header allocation.
    #[inline]
    #[must_use]
    pub const fn header(&self) -> AllocKey {
        self.list.header()
    }

    /// Read-only walks through the plain list API.
    ///
    /// Inserting through the returned handle bypasses the overlap check.
    #[inline]
    #[must_use]
    pub const fn as_list(&self) -> List {
        self.list
    }

    /// Rejects empty ranges and ranges overlapping any active node but `ignore`.
    fn check(&self, ctx: &Context, data: NodeData, ignore: AllocKey) -> ContainerResult<()> {
        if data.size == 0 {
            return Err(MemoryError::ZeroParameter("range size").into());
        }
        data.ensure_addressable()?;
        for node in self.list.nodes(ctx)? {
            if node != ignore && self.list.node_data(ctx, node)?.overlaps(&data) {
                return Err(ContainerError::RangeOverlap {
                    offset: data.offset,
                    size: data.size,
                    existing: node,
                });
            }
        }
        Ok(())
    }

    /// Adds a node at the tail.
    ///
    /// # Errors
    ///
    /// `ZeroParameter` for an empty range, [`ContainerError::RangeOverlap`]
    /// if an active node shares a byte with it.
    pub fn append(&self, ctx: &mut Context, offset: usize, size: usize) -> ContainerResult<AllocKey> {
        self.check(ctx, NodeData::new(offset, size), AllocKey::NULL)?;
        self.list.append(ctx, offset, size)
    }

    /// Adds a node at the head.
    ///
    /// # Errors
    ///
    /// Same as [`UniqueList::append`].
    pub fn insert_front(
        &self,
        ctx: &mut Context,
        offset: usize,
        size: usize,
    ) -> ContainerResult<AllocKey> {
        self.check(ctx, NodeData::new(offset, size), AllocKey::NULL)?;
        self.list.insert_front(ctx, offset, size)
    }

    /// Adds a node right before `node`.
    ///
    /// # Errors
    ///
    /// Same as [`UniqueList::append`], plus `NodeNotInList`.
    pub fn insert_before(
        &self,
        ctx: &mut Context,
        node: AllocKey,
        offset: usize,
        size: usize,
    ) -> ContainerResult<AllocKey> {
        self.check(ctx, NodeData::new(offset, size), AllocKey::NULL)?;
        self.list.insert_before(ctx, node, offset, size)
    }

    /// Adds a node right after `node`.
    ///
    /// # Errors
    ///
    /// Same as [`UniqueList::append`], plus `NodeNotInList`.
    pub fn append_after(
        &self,
        ctx: &mut Context,
        node: AllocKey,
        offset: usize,
        size: usize,
    ) -> ContainerResult<AllocKey> {
        self.check(ctx, NodeData::new(offset, size), AllocKey::NULL)?;
        self.list.append_after(ctx, node, offset, size)
    }

    /// Moves an active node of `from` to the tail of `to`, if its range is
    /// still unique there.
    ///
    /// # Errors
    ///
    /// [`ContainerError::RangeOverlap`] or `NodeNotInList`.
    pub fn move_node(ctx: &mut Context, from: List, to: Self, node: AllocKey) -> ContainerResult<()> {
        let data = from.node_data(ctx, node)?;
        to.check(ctx, data, node)?;
        List::move_node(ctx, from, to.list, node)
    }

    /// Moves an active node to the free chain.
    ///
    /// # Errors
    ///
    /// `NodeNotInList` if `node` is not active here.
    pub fn free_node(&self, ctx: &mut Context, node: AllocKey) -> ContainerResult<()> {
        self.list.free_node(ctx, node)
    }

    /// Active node whose range contains `offset`.
    ///
    /// # Errors
    ///
    /// Fails if a record cannot be read.
    pub fn find(&self, ctx: &Context, offset: usize) -> ContainerResult<Option<AllocKey>> {
        for node in self.list.nodes(ctx)? {
            let data = self.list.node_data(ctx, node)?;
            if (data.offset..data.end()).contains(&offset) {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    /// Node after `node`.
    ///
    /// # Errors
    ///
    /// `NodeNotInList` if `node` is not active here.
    pub fn next(&self, ctx: &Context, node: AllocKey) -> ContainerResult<Option<AllocKey>> {
        self.list.next(ctx, node)
    }

    /// Node before `node`.
    ///
    /// # Errors
    ///
    /// `NodeNotInList` if `node` is not active here.
    pub fn prev(&self, ctx: &Context, node: AllocKey) -> ContainerResult<Option<AllocKey>> {
        self.list.prev(ctx, node)
    }

    /// First active node.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn head(&self, ctx: &Context) -> ContainerResult<Option<AllocKey>> {
        self.list.head(ctx)
    }

    /// Last active node.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn tail(&self, ctx: &Context) -> ContainerResult<Option<AllocKey>> {
        self.list.tail(ctx)
    }

    /// Number of active nodes.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn active_count(&self, ctx: &Context) -> ContainerResult<usize> {
        self.list.active_count(ctx)
    }

    /// Number of nodes waiting for reuse.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn free_count(&self, ctx: &Context) -> ContainerResult<usize> {
        self.list.free_count(ctx)
    }

    /// Byte range an active node describes.
    ///
    /// # Errors
    ///
    /// `NodeNotInList` if `node` is not active here.
    pub fn node_data(&self, ctx: &Context, node: AllocKey) -> ContainerResult<NodeData> {
        self.list.node_data(ctx, node)
    }

    /// Whether `node` is an active member.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn contains(&self, ctx: &Context, node: AllocKey) -> ContainerResult<bool> {
        self.list.contains(ctx, node)
    }

    /// Active nodes from head to tail.
    ///
    /// # Errors
    ///
    /// Fails on a corrupt chain.
    pub fn nodes(&self, ctx: &Context) -> ContainerResult<Vec<AllocKey>> {
        self.list.nodes(ctx)
    }

    /// Moves every active node to the free chain.
    ///
    /// # Errors
    ///
    /// Memory errors from the records.
    pub fn clear(&self, ctx: &mut Context) -> ContainerResult<()> {
        self.list.clear(ctx)
    }

    /// Releases every node and the header.
    ///
    /// # Errors
    ///
    /// Memory errors from the records.
    pub fn destroy(self, ctx: &mut Context) -> ContainerResult<()> {
        self.list.destroy(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oroboros_memory::ContextId;

    fn setup() -> (Context, PageKey) {
        let mut ctx = Context::new(ContextId::new(0), 8192).unwrap();
        let page = ctx.alloc_page(4096).unwrap();
        (ctx, page)
    }

    #[test]
    fn test_overlap_rejected() {
        let (mut ctx, page) = setup();
        let list = UniqueList::create(&mut ctx, page).unwrap();
        let first = list.append(&mut ctx, 100, 50).unwrap();

        assert_eq!(
            list.append(&mut ctx, 149, 10),
            Err(ContainerError::RangeOverlap {
                offset: 149,
                size: 10,
                existing: first,
            })
        );
        assert!(list.insert_front(&mut ctx, 90, 11).is_err());
        assert!(list.append_after(&mut ctx, first, 120, 1).is_err());
        assert_eq!(list.active_count(&ctx).unwrap(), 1);
    }

    #[test]
    fn test_adjacent_ranges_accepted() {
        let (mut ctx, page) = setup();
        let list = UniqueList::create(&mut ctx, page).unwrap();
        let middle = list.append(&mut ctx, 100, 50).unwrap();
        list.append(&mut ctx, 150, 10).unwrap();
        list.insert_before(&mut ctx, middle, 90, 10).unwrap();
        assert_eq!(list.active_count(&ctx).unwrap(), 3);
        assert_eq!(list.find(&ctx, 149).unwrap(), Some(middle));
        assert_eq!(list.find(&ctx, 160).unwrap(), None);
    }

    #[test]
    fn test_zero_size_rejected() {
        let (mut ctx, page) = setup();
        let list = UniqueList::create(&mut ctx, page).unwrap();
        assert_eq!(
            list.append(&mut ctx, 10, 0),
            Err(ContainerError::Memory(MemoryError::ZeroParameter("range size")))
        );
    }

    #[test]
    fn test_range_past_usize_max_rejected() {
        let (mut ctx, page) = setup();
        let list = UniqueList::create(&mut ctx, page).unwrap();
        list.append(&mut ctx, 0, 8).unwrap();

        assert!(matches!(
            list.append(&mut ctx, usize::MAX, 2),
            Err(ContainerError::Memory(MemoryError::IndexOutOfRange { .. }))
        ));
        let top = list.append(&mut ctx, usize::MAX - 2, 2).unwrap();
        assert!(matches!(
            list.append(&mut ctx, usize::MAX - 1, 1),
            Err(ContainerError::RangeOverlap { existing, .. }) if existing == top
        ));
        assert_eq!(list.find(&ctx, usize::MAX - 1).unwrap(), Some(top));
        assert_eq!(list.active_count(&ctx).unwrap(), 2);
    }

    #[test]
    fn test_freed_range_can_be_reused() {
        let (mut ctx, page) = setup();
        let list = UniqueList::create(&mut ctx, page).unwrap();
        let node = list.append(&mut ctx, 0, 64).unwrap();
        list.free_node(&mut ctx, node).unwrap();
        assert_eq!(list.append(&mut ctx, 32, 64).unwrap(), node);
    }

    #[test]
    fn test_move_checks_target() {
        let (mut ctx, page) = setup();
        let plain = List::create(&mut ctx, page).unwrap();
        let unique = UniqueList::create(&mut ctx, page).unwrap();
        unique.append(&mut ctx, 0, 32).unwrap();

        let clash = plain.append(&mut ctx, 16, 8).unwrap();
        let fine = plain.append(&mut ctx, 32, 8).unwrap();

        assert!(matches!(
            UniqueList::move_node(&mut ctx, plain, unique, clash),
            Err(ContainerError::RangeOverlap { .. })
        ));
        UniqueList::move_node(&mut ctx, plain, unique, fine).unwrap();
        assert!(unique.contains(&ctx, fine).unwrap());
        assert_eq!(plain.nodes(&ctx).unwrap(), [clash]);
    }

    #[test]
    fn test_move_within_unique_list_ignores_itself() {
        let (mut ctx, page) = setup();
        let list = UniqueList::create(&mut ctx, page).unwrap();
        let a = list.append(&mut ctx, 0, 8).unwrap();
        let b = list.append(&mut ctx, 8, 8).unwrap();
        UniqueList::move_node(&mut ctx, list.as_list(), list, a).unwrap();
        assert_eq!(list.nodes(&ctx).unwrap(), [b, a]);
    }
}
