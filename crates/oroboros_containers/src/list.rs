//! # Intrusive List
//!
//! Doubly-linked list whose nodes are allocations of one page. Links are
//! allocation keys, never addresses, so the page may be compacted freely.
//!
//! ```text
//! header: active_head ──> [node] <──> [node] <──> [node] <── active_tail
//!         free_head   ──> [node] <──> [node]             <── free_tail
//! ```
//!
//! Nodes are never returned to the page while the list lives. Freed nodes go
//! to the tail of the free chain and are reused from its head before the page
//! is asked for a new allocation.
//!
//! A node only describes a byte range (`offset`, `size`) of memory the caller
//! owns; moving a node between lists relinks keys and copies nothing.

use bytemuck::{Pod, Zeroable};
use oroboros_memory::{AllocKey, Context, MemoryError, PageKey};

use crate::error::{ContainerError, ContainerResult};

const ACTIVE: u32 = 1;
const FREE: u32 = 2;

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct ListHeader {
    page: PageKey,
    active_count: u32,
    free_count: u32,
    active_head: AllocKey,
    active_tail: AllocKey,
    free_head: AllocKey,
    free_tail: AllocKey,
}

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct NodeRecord {
    data_offset: u64,
    data_size: u64,
    prev: AllocKey,
    next: AllocKey,
    owner: AllocKey,
    state: u32,
}

#[derive(Clone, Copy, Debug)]
enum Chain {
    Active,
    Free,
}

impl ListHeader {
    fn head(&self, chain: Chain) -> AllocKey {
        match chain {
            Chain::Active => self.active_head,
            Chain::Free => self.free_head,
        }
    }

    fn ends_mut(&mut self, chain: Chain) -> (&mut AllocKey, &mut AllocKey, &mut u32) {
        match chain {
            Chain::Active => (
                &mut self.active_head,
                &mut self.active_tail,
                &mut self.active_count,
            ),
            Chain::Free => (&mut self.free_head, &mut self.free_tail, &mut self.free_count),
        }
    }
}

/// Byte range a node describes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodeData {
    /// Start of the range.
    pub offset: usize,
    /// Length of the range.
    pub size: usize,
}

impl NodeData {
    /// Creates a range.
    #[inline]
    #[must_use]
    pub const fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    /// One past the last byte, saturating at `usize::MAX`.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset.saturating_add(self.size)
    }

    /// Fails unless the whole range is addressable.
    pub(crate) fn ensure_addressable(&self) -> ContainerResult<()> {
        if self.offset.checked_add(self.size).is_none() {
            return Err(MemoryError::IndexOutOfRange {
                index: self.offset,
                len: usize::MAX - self.size,
            }
            .into());
        }
        Ok(())
    }

    /// Whether the two ranges share at least one byte.
    #[inline]
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Where a new node is linked.
#[derive(Clone, Copy, Debug)]
enum Anchor {
    Front,
    Back,
    Before(AllocKey),
    After(AllocKey),
}

/// Handle to a list stored in a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct List {
    header: AllocKey,
}

impl List {
    /// Creates an empty list whose header and nodes live in `page`.
    ///
    /// # Errors
    ///
    /// `NullParameter` for a null page; allocation errors from the page.
    pub fn create(ctx: &mut Context, page: PageKey) -> ContainerResult<Self> {
        if page.is_null() {
            return Err(MemoryError::NullParameter("page key").into());
        }
        let header = ctx.allocate(page, std::mem::size_of::<ListHeader>())?;
        ctx.write_pod(
            header,
            0,
            &ListHeader {
                page,
                active_count: 0,
                free_count: 0,
                active_head: AllocKey::NULL,
                active_tail: AllocKey::NULL,
                free_head: AllocKey::NULL,
                free_tail: AllocKey::NULL,
            },
        )?;
        Ok(Self { header })
    }

    /// Re-attaches to a list created earlier.
    #[inline]
    #[must_use]
    pub const fn from_header(header: AllocKey) -> Self {
        Self { header }
    }

    /// Key of the list's header allocation.
    #[inline]
    #[must_use]
    pub const fn header(&self) -> AllocKey {
        self.header
    }

    // =========================================================================
    // Records
    // =========================================================================

    fn load(&self, ctx: &Context) -> ContainerResult<ListHeader> {
        if self.header.is_null() {
            return Err(MemoryError::NullParameter("list").into());
        }
        Ok(ctx.read_pod(self.header, 0)?)
    }

    fn store(&self, ctx: &mut Context, header: &ListHeader) -> ContainerResult<()> {
        ctx.write_pod(self.header, 0, header)?;
        Ok(())
    }

    fn load_node(ctx: &Context, node: AllocKey) -> ContainerResult<NodeRecord> {
        let record: NodeRecord = ctx.read_pod(node, 0)?;
        if record.state != ACTIVE && record.state != FREE {
            return Err(ContainerError::CorruptRecord("node state"));
        }
        Ok(record)
    }

    fn store_node(ctx: &mut Context, node: AllocKey, record: &NodeRecord) -> ContainerResult<()> {
        ctx.write_pod(node, 0, record)?;
        Ok(())
    }

    /// Loads `node`, failing unless it is an active member of this list.
    fn active_node(&self, ctx: &Context, node: AllocKey) -> ContainerResult<NodeRecord> {
        if node.is_null() {
            return Err(MemoryError::NullParameter("node key").into());
        }
        if !ctx.is_live(node) {
            return Err(ContainerError::NodeNotInList(node));
        }
        let record = Self::load_node(ctx, node)?;
        if record.owner != self.header || record.state != ACTIVE {
            return Err(ContainerError::NodeNotInList(node));
        }
        Ok(record)
    }

    fn data_of(record: &NodeRecord) -> ContainerResult<NodeData> {
        let offset = usize::try_from(record.data_offset)
            .map_err(|_| ContainerError::CorruptRecord("node offset"))?;
        let size = usize::try_from(record.data_size)
            .map_err(|_| ContainerError::CorruptRecord("node size"))?;
        Ok(NodeData::new(offset, size))
    }

    // =========================================================================
    // Chain surgery
    // =========================================================================

    /// Links `node` into `chain` right after `after` (NULL = at the front).
    fn link(
        ctx: &mut Context,
        header: &mut ListHeader,
        chain: Chain,
        node: AllocKey,
        after: AllocKey,
    ) -> ContainerResult<()> {
        let next = if after.is_null() {
            header.head(chain)
        } else {
            Self::load_node(ctx, after)?.next
        };

        let mut record = Self::load_node(ctx, node)?;
        record.prev = after;
        record.next = next;
        Self::store_node(ctx, node, &record)?;

        let (head, tail, count) = header.ends_mut(chain);
        if after.is_null() {
            *head = node;
        } else {
            let mut prev = Self::load_node(ctx, after)?;
            prev.next = node;
            Self::store_node(ctx, after, &prev)?;
        }
        if next.is_null() {
            *tail = node;
        } else {
            let mut following = Self::load_node(ctx, next)?;
            following.prev = node;
            Self::store_node(ctx, next, &following)?;
        }
        *count += 1;
        Ok(())
    }

    /// Unlinks `node` from `chain`, leaving its own links NULL.
    fn unlink(
        ctx: &mut Context,
        header: &mut ListHeader,
        chain: Chain,
        node: AllocKey,
    ) -> ContainerResult<()> {
        let mut record = Self::load_node(ctx, node)?;
        let (head, tail, count) = header.ends_mut(chain);

        if record.prev.is_null() {
            *head = record.next;
        } else {
            let mut prev = Self::load_node(ctx, record.prev)?;
            prev.next = record.next;
            Self::store_node(ctx, record.prev, &prev)?;
        }
        if record.next.is_null() {
            *tail = record.prev;
        } else {
            let mut following = Self::load_node(ctx, record.next)?;
            following.prev = record.prev;
            Self::store_node(ctx, record.next, &following)?;
        }
        *count = count
            .checked_sub(1)
            .ok_or(ContainerError::CorruptRecord("chain count underflow"))?;

        record.prev = AllocKey::NULL;
        record.next = AllocKey::NULL;
        Self::store_node(ctx, node, &record)
    }

    /// Takes a node from the free chain, or a fresh allocation from the page.
    fn acquire(
        &self,
        ctx: &mut Context,
        header: &mut ListHeader,
        data: NodeData,
    ) -> ContainerResult<AllocKey> {
        let node = if header.free_head.is_null() {
            ctx.allocate(header.page, std::mem::size_of::<NodeRecord>())?
        } else {
            let node = header.free_head;
            Self::unlink(ctx, header, Chain::Free, node)?;
            node
        };

        Self::store_node(
            ctx,
            node,
            &NodeRecord {
                data_offset: data.offset as u64,
                data_size: data.size as u64,
                prev: AllocKey::NULL,
                next: AllocKey::NULL,
                owner: self.header,
                state: ACTIVE,
            },
        )?;
        Ok(node)
    }

    fn insert(&self, ctx: &mut Context, anchor: Anchor, data: NodeData) -> ContainerResult<AllocKey> {
        data.ensure_addressable()?;
        let mut header = self.load(ctx)?;
        let after = match anchor {
            Anchor::Front => AllocKey::NULL,
            Anchor::Back => header.active_tail,
            Anchor::Before(node) => self.active_node(ctx, node)?.prev,
            Anchor::After(node) => {
                self.active_node(ctx, node)?;
                node
            }
        };

        let node = self.acquire(ctx, &mut header, data)?;
        Self::link(ctx, &mut header, Chain::Active, node, after)?;
        self.store(ctx, &header)?;
        Ok(node)
    }

    // =========================================================================
    // Public API
    // =========================================================================

    /// Adds a node for `[offset, offset + size)` at the tail.
    ///
    /// # Errors
    ///
    /// Memory errors from the page.
    pub fn append(&self, ctx: &mut Context, offset: usize, size: usize) -> ContainerResult<AllocKey> {
        self.insert(ctx, Anchor::Back, NodeData::new(offset, size))
    }

    /// Adds a node at the head.
    ///
    /// # Errors
    ///
    /// Memory errors from the page.
    pub fn insert_front(
        &self,
        ctx: &mut Context,
        offset: usize,
        size: usize,
    ) -> ContainerResult<AllocKey> {
        self.insert(ctx, Anchor::Front, NodeData::new(offset, size))
    }

    /// Adds a node right before `node`.
    ///
    /// # Errors
    ///
    /// [`ContainerError::NodeNotInList`] if `node` is not active here.
    pub fn insert_before(
        &self,
        ctx: &mut Context,
        node: AllocKey,
        offset: usize,
        size: usize,
    ) -> ContainerResult<AllocKey> {
        self.insert(ctx, Anchor::Before(node), NodeData::new(offset, size))
    }

    /// Adds a node right after `node`.
    ///
    /// # Errors
    ///
    /// [`ContainerError::NodeNotInList`] if `node` is not active here.
    pub fn append_after(
        &self,
        ctx: &mut Context,
        node: AllocKey,
        offset: usize,
        size: usize,
    ) -> ContainerResult<AllocKey> {
        self.insert(ctx, Anchor::After(node), NodeData::new(offset, size))
    }

    /// Moves an active node to the tail of the free chain.
    ///
    /// # Errors
    ///
    /// [`ContainerError::NodeNotInList`] if `node` is not active here.
    pub fn free_node(&self, ctx: &mut Context, node: AllocKey) -> ContainerResult<()> {
        let mut header = self.load(ctx)?;
        self.active_node(ctx, node)?;

        Self::unlink(ctx, &mut header, Chain::Active, node)?;
        let mut record = Self::load_node(ctx, node)?;
        record.state = FREE;
        Self::store_node(ctx, node, &record)?;
        let tail = header.free_tail;
        Self::link(ctx, &mut header, Chain::Free, node, tail)?;
        self.store(ctx, &header)
    }

    /// Moves an active node of `from` to the tail of `to`.
    ///
    /// Only keys and counts change; the node keeps its data range.
    ///
    /// # Errors
    ///
    /// [`ContainerError::NodeNotInList`] if `node` is not active in `from`.
    pub fn move_node(ctx: &mut Context, from: Self, to: Self, node: AllocKey) -> ContainerResult<()> {
        from.active_node(ctx, node)?;

        if from == to {
            let mut header = from.load(ctx)?;
            Self::unlink(ctx, &mut header, Chain::Active, node)?;
            let tail = header.active_tail;
            Self::link(ctx, &mut header, Chain::Active, node, tail)?;
            return from.store(ctx, &header);
        }

        let mut source = from.load(ctx)?;
        let mut target = to.load(ctx)?;

        Self::unlink(ctx, &mut source, Chain::Active, node)?;
        let mut record = Self::load_node(ctx, node)?;
        record.owner = to.header;
        Self::store_node(ctx, node, &record)?;
        let tail = target.active_tail;
        Self::link(ctx, &mut target, Chain::Active, node, tail)?;

        from.store(ctx, &source)?;
        to.store(ctx, &target)
    }

    /// Node after `node`, if any.
    ///
    /// # Errors
    ///
    /// [`ContainerError::NodeNotInList`] if `node` is not active here.
    pub fn next(&self, ctx: &Context, node: AllocKey) -> ContainerResult<Option<AllocKey>> {
        let record = self.active_node(ctx, node)?;
        Ok((!record.next.is_null()).then_some(record.next))
    }

    /// Node before `node`, if any.
    ///
    /// # Errors
    ///
    /// [`ContainerError::NodeNotInList`] if `node` is not active here.
    pub fn prev(&self, ctx: &Context, node: AllocKey) -> ContainerResult<Option<AllocKey>> {
        let record = self.active_node(ctx, node)?;
        Ok((!record.prev.is_null()).then_some(record.prev))
    }

    /// First active node.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn head(&self, ctx: &Context) -> ContainerResult<Option<AllocKey>> {
        let header = self.load(ctx)?;
        Ok((!header.active_head.is_null()).then_some(header.active_head))
    }

    /// Last active node.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn tail(&self, ctx: &Context) -> ContainerResult<Option<AllocKey>> {
        let header = self.load(ctx)?;
        Ok((!header.active_tail.is_null()).then_some(header.active_tail))
    }

    /// Number of active nodes.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn active_count(&self, ctx: &Context) -> ContainerResult<usize> {
        Ok(self.load(ctx)?.active_count as usize)
    }

    /// Number of nodes waiting for reuse.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn free_count(&self, ctx: &Context) -> ContainerResult<usize> {
        Ok(self.load(ctx)?.free_count as usize)
    }

    /// Byte range an active node describes.
    ///
    /// # Errors
    ///
    /// [`ContainerError::NodeNotInList`] if `node` is not active here.
    pub fn node_data(&self, ctx: &Context, node: AllocKey) -> ContainerResult<NodeData> {
        Self::data_of(&self.active_node(ctx, node)?)
    }

    /// Whether `node` is an active member of this list.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read.
    pub fn contains(&self, ctx: &Context, node: AllocKey) -> ContainerResult<bool> {
        self.load(ctx)?;
        match self.active_node(ctx, node) {
            Ok(_) => Ok(true),
            Err(ContainerError::NodeNotInList(_) | ContainerError::Memory(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Active nodes from head to tail.
    ///
    /// # Errors
    ///
    /// [`ContainerError::CorruptRecord`] if the chain is longer than its count.
    pub fn nodes(&self, ctx: &Context) -> ContainerResult<Vec<AllocKey>> {
        let header = self.load(ctx)?;
        let expected = header.active_count as usize;
        let mut nodes = Vec::with_capacity(expected);
        let mut current = header.active_head;

        while !current.is_null() {
            if nodes.len() == expected {
                return Err(ContainerError::CorruptRecord("active chain longer than its count"));
            }
            nodes.push(current);
            current = Self::load_node(ctx, current)?.next;
        }
        Ok(nodes)
    }

    /// Moves every active node to the free chain.
    ///
    /// # Errors
    ///
    /// Memory errors from the records.
    pub fn clear(&self, ctx: &mut Context) -> ContainerResult<()> {
        let mut header = self.load(ctx)?;
        while !header.active_head.is_null() {
            let node = header.active_head;
            Self::unlink(ctx, &mut header, Chain::Active, node)?;
            let mut record = Self::load_node(ctx, node)?;
            record.state = FREE;
            Self::store_node(ctx, node, &record)?;
            let tail = header.free_tail;
            Self::link(ctx, &mut header, Chain::Free, node, tail)?;
        }
        self.store(ctx, &header)
    }

    /// Releases every node (active and free) and the header.
    ///
    /// # Errors
    ///
    /// Memory errors from the records.
    pub fn destroy(self, ctx: &mut Context) -> ContainerResult<()> {
        let header = self.load(ctx)?;
        for head in [header.head(Chain::Active), header.head(Chain::Free)] {
            let mut current = head;
            while !current.is_null() {
                let next = Self::load_node(ctx, current)?.next;
                ctx.free(current)?;
                current = next;
            }
        }
        ctx.free(self.header)?;
        Ok(())
    }

    #[cfg(test)]
    fn free_nodes(&self, ctx: &Context) -> Vec<AllocKey> {
        let header = self.load(ctx).unwrap();
        let mut nodes = Vec::new();
        let mut current = header.free_head;
        while !current.is_null() {
            nodes.push(current);
            current = Self::load_node(ctx, current).unwrap().next;
        }
        assert_eq!(nodes.last().copied().unwrap_or(AllocKey::NULL), header.free_tail);
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oroboros_memory::ContextId;

    fn setup() -> (Context, PageKey) {
        let mut ctx = Context::new(ContextId::new(0), 16384).unwrap();
        let page = ctx.alloc_page(8192).unwrap();
        (ctx, page)
    }

    fn offsets(list: &List, ctx: &Context) -> Vec<usize> {
        list.nodes(ctx)
            .unwrap()
            .into_iter()
            .map(|node| list.node_data(ctx, node).unwrap().offset)
            .collect()
    }

    #[test]
    fn test_record_layouts() {
        assert_eq!(std::mem::size_of::<ListHeader>(), 60);
        assert_eq!(std::mem::size_of::<NodeRecord>(), 56);
    }

    #[test]
    fn test_insert_positions() {
        let (mut ctx, page) = setup();
        let list = List::create(&mut ctx, page).unwrap();

        let b = list.append(&mut ctx, 20, 10).unwrap();
        list.insert_front(&mut ctx, 0, 10).unwrap();
        let d = list.append(&mut ctx, 40, 10).unwrap();
        list.insert_before(&mut ctx, d, 30, 10).unwrap();
        list.append_after(&mut ctx, b, 25, 5).unwrap();
        list.append_after(&mut ctx, d, 50, 10).unwrap();

        assert_eq!(offsets(&list, &ctx), [0, 20, 25, 30, 40, 50]);
        assert_eq!(list.active_count(&ctx).unwrap(), 6);
    }

    #[test]
    fn test_range_past_usize_max_rejected() {
        let (mut ctx, page) = setup();
        let list = List::create(&mut ctx, page).unwrap();
        list.append(&mut ctx, 0, 8).unwrap();

        assert!(matches!(
            list.append(&mut ctx, usize::MAX, 2),
            Err(ContainerError::Memory(MemoryError::IndexOutOfRange { .. }))
        ));
        assert!(list.insert_front(&mut ctx, usize::MAX - 1, 2).is_err());
        assert!(list.append(&mut ctx, usize::MAX - 1, 1).is_ok());
        assert_eq!(list.active_count(&ctx).unwrap(), 2);
    }

    #[test]
    fn test_saturating_end_keeps_overlap_sound() {
        let top = NodeData::new(usize::MAX - 4, 4);
        assert_eq!(top.end(), usize::MAX);
        assert!(top.overlaps(&NodeData::new(usize::MAX - 1, 1)));
        assert!(!top.overlaps(&NodeData::new(0, 8)));
        assert_eq!(NodeData::new(usize::MAX, 2).end(), usize::MAX);
    }

    #[test]
    fn test_next_prev_walk() {
        let (mut ctx, page) = setup();
        let list = List::create(&mut ctx, page).unwrap();
        let a = list.append(&mut ctx, 0, 1).unwrap();
        let b = list.append(&mut ctx, 1, 1).unwrap();

        assert_eq!(list.head(&ctx).unwrap(), Some(a));
        assert_eq!(list.tail(&ctx).unwrap(), Some(b));
        assert_eq!(list.next(&ctx, a).unwrap(), Some(b));
        assert_eq!(list.next(&ctx, b).unwrap(), None);
        assert_eq!(list.prev(&ctx, b).unwrap(), Some(a));
        assert_eq!(list.prev(&ctx, a).unwrap(), None);
    }

    #[test]
    fn test_freed_nodes_are_reused_first() {
        let (mut ctx, page) = setup();
        let list = List::create(&mut ctx, page).unwrap();
        let a = list.append(&mut ctx, 0, 8).unwrap();
        let b = list.append(&mut ctx, 8, 8).unwrap();
        list.append(&mut ctx, 16, 8).unwrap();

        list.free_node(&mut ctx, a).unwrap();
        list.free_node(&mut ctx, b).unwrap();
        assert_eq!(list.active_count(&ctx).unwrap(), 1);
        assert_eq!(list.free_count(&ctx).unwrap(), 2);
        assert_eq!(list.free_nodes(&ctx), [a, b]);

        let allocations = ctx.page_stats(page).unwrap().allocations;
        let reused = list.append(&mut ctx, 24, 8).unwrap();
        assert_eq!(reused, a);
        assert_eq!(ctx.page_stats(page).unwrap().allocations, allocations);
        assert_eq!(list.free_count(&ctx).unwrap(), 1);
        assert_eq!(list.node_data(&ctx, reused).unwrap(), NodeData::new(24, 8));
    }

    #[test]
    fn test_free_node_twice_fails() {
        let (mut ctx, page) = setup();
        let list = List::create(&mut ctx, page).unwrap();
        let a = list.append(&mut ctx, 0, 8).unwrap();
        list.free_node(&mut ctx, a).unwrap();
        assert_eq!(list.free_node(&mut ctx, a), Err(ContainerError::NodeNotInList(a)));
        assert!(!list.contains(&ctx, a).unwrap());
    }

    #[test]
    fn test_move_is_idempotent_round_trip() {
        let (mut ctx, page) = setup();
        let first = List::create(&mut ctx, page).unwrap();
        let second = List::create(&mut ctx, page).unwrap();
        for i in 0..4 {
            first.append(&mut ctx, i * 10, 10).unwrap();
        }
        second.append(&mut ctx, 100, 10).unwrap();
        let tail = first.tail(&ctx).unwrap().unwrap();
        let before_first = first.nodes(&ctx).unwrap();
        let before_second = second.nodes(&ctx).unwrap();

        List::move_node(&mut ctx, first, second, tail).unwrap();
        assert_eq!(first.active_count(&ctx).unwrap(), 3);
        assert_eq!(second.active_count(&ctx).unwrap(), 2);
        assert!(second.contains(&ctx, tail).unwrap());
        assert!(!first.contains(&ctx, tail).unwrap());
        assert_eq!(second.node_data(&ctx, tail).unwrap(), NodeData::new(30, 10));

        List::move_node(&mut ctx, second, first, tail).unwrap();
        assert_eq!(first.nodes(&ctx).unwrap(), before_first);
        assert_eq!(second.nodes(&ctx).unwrap(), before_second);
    }

    #[test]
    fn test_move_requires_membership() {
        let (mut ctx, page) = setup();
        let first = List::create(&mut ctx, page).unwrap();
        let second = List::create(&mut ctx, page).unwrap();
        let node = second.append(&mut ctx, 0, 4).unwrap();
        assert_eq!(
            List::move_node(&mut ctx, first, second, node),
            Err(ContainerError::NodeNotInList(node))
        );
    }

    #[test]
    fn test_move_within_same_list_goes_to_tail() {
        let (mut ctx, page) = setup();
        let list = List::create(&mut ctx, page).unwrap();
        let a = list.append(&mut ctx, 0, 1).unwrap();
        list.append(&mut ctx, 1, 1).unwrap();
        List::move_node(&mut ctx, list, list, a).unwrap();
        assert_eq!(offsets(&list, &ctx), [1, 0]);
    }

    #[test]
    fn test_clear_then_destroy() {
        let (mut ctx, page) = setup();
        let list = List::create(&mut ctx, page).unwrap();
        for i in 0..5 {
            list.append(&mut ctx, i, 1).unwrap();
        }
        list.clear(&mut ctx).unwrap();
        assert_eq!(list.active_count(&ctx).unwrap(), 0);
        assert_eq!(list.free_count(&ctx).unwrap(), 5);
        assert!(list.head(&ctx).unwrap().is_none());

        list.destroy(&mut ctx).unwrap();
        assert_eq!(ctx.page_stats(page).unwrap().allocations, 0);
    }

    #[test]
    fn test_null_arguments() {
        let (mut ctx, page) = setup();
        assert!(matches!(
            List::create(&mut ctx, PageKey::NULL),
            Err(ContainerError::Memory(MemoryError::NullParameter(_)))
        ));
        let list = List::create(&mut ctx, page).unwrap();
        assert!(matches!(
            list.insert_before(&mut ctx, AllocKey::NULL, 0, 1),
            Err(ContainerError::Memory(MemoryError::NullParameter(_)))
        ));
    }
}
