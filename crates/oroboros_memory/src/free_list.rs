//! # Free-Block List
//!
//! First-fit bookkeeping of unused byte ranges. Blocks are kept sorted by
//! offset and neighbours are merged on release, so the list never holds two
//! adjacent blocks.
//!
//! The list only tracks numbers; it never touches the bytes it describes.

/// A contiguous byte range `[offset, offset + len)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Block {
    /// Start of the range.
    pub offset: usize,
    /// Length of the range in bytes.
    pub len: usize,
}

impl Block {
    #[inline]
    pub(crate) const fn end(self) -> usize {
        self.offset + self.len
    }
}

/// Sorted list of free blocks inside one region.
#[derive(Clone, Debug, Default)]
pub(crate) struct FreeList {
    blocks: Vec<Block>,
}

impl FreeList {
    /// Creates a list covering `[offset, offset + len)` entirely.
    pub(crate) fn new(offset: usize, len: usize) -> Self {
        let mut list = Self::default();
        list.reset(offset, len);
        list
    }

    /// Forgets every reservation: the whole region becomes one free block.
    pub(crate) fn reset(&mut self, offset: usize, len: usize) {
        self.blocks.clear();
        if len > 0 {
            self.blocks.push(Block { offset, len });
        }
    }

    /// Reserves `len` bytes from the first block large enough.
    ///
    /// Returns the start offset, or `None` if no block fits.
    pub(crate) fn reserve(&mut self, len: usize) -> Option<usize> {
        let position = self.blocks.iter().position(|block| block.len >= len)?;
        let block = &mut self.blocks[position];
        let offset = block.offset;

        if block.len == len {
            self.blocks.remove(position);
        } else {
            block.offset += len;
            block.len -= len;
        }

        Some(offset)
    }

    /// Returns `[offset, offset + len)` to the list, merging with neighbours.
    pub(crate) fn release(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }

        let position = self.blocks.partition_point(|block| block.offset < offset);
        debug_assert!(
            position == 0 || self.blocks[position - 1].end() <= offset,
            "released range overlaps a free block"
        );
        debug_assert!(
            position == self.blocks.len() || offset + len <= self.blocks[position].offset,
            "released range overlaps a free block"
        );

        let merges_prev = position > 0 && self.blocks[position - 1].end() == offset;
        let merges_next =
            position < self.blocks.len() && self.blocks[position].offset == offset + len;

        match (merges_prev, merges_next) {
            (true, true) => {
                let next_len = self.blocks[position].len;
                self.blocks[position - 1].len += len + next_len;
                self.blocks.remove(position);
            }
            (true, false) => self.blocks[position - 1].len += len,
            (false, true) => {
                let next = &mut self.blocks[position];
                next.offset = offset;
                next.len += len;
            }
            (false, false) => self.blocks.insert(position, Block { offset, len }),
        }
    }

    /// Grows the reservation `[offset, offset + old_len)` in place to
    /// `new_len` by consuming the free block right after it.
    ///
    /// Returns `false` (and changes nothing) if that block is missing or short.
    pub(crate) fn try_extend(&mut self, offset: usize, old_len: usize, new_len: usize) -> bool {
        debug_assert!(new_len > old_len);
        let end = offset + old_len;
        let extra = new_len - old_len;

        let Some(position) = self.blocks.iter().position(|block| block.offset == end) else {
            return false;
        };

        let block = &mut self.blocks[position];
        if block.len < extra {
            return false;
        }

        if block.len == extra {
            self.blocks.remove(position);
        } else {
            block.offset += extra;
            block.len -= extra;
        }
        true
    }

    /// Length of the largest free block.
    pub(crate) fn largest(&self) -> usize {
        self.blocks.iter().map(|block| block.len).max().unwrap_or(0)
    }

    /// Sum of all free bytes.
    pub(crate) fn total(&self) -> usize {
        self.blocks.iter().map(|block| block.len).sum()
    }

    /// Number of disjoint free blocks.
    pub(crate) fn fragment_count(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fit_reserve() {
        let mut list = FreeList::new(0, 64);
        assert_eq!(list.reserve(16), Some(0));
        assert_eq!(list.reserve(16), Some(16));
        assert_eq!(list.total(), 32);
        assert_eq!(list.reserve(40), None);
    }

    #[test]
    fn test_release_coalesces_both_sides() {
        let mut list = FreeList::new(0, 48);
        let a = list.reserve(16).unwrap();
        let b = list.reserve(16).unwrap();
        let c = list.reserve(16).unwrap();
        assert_eq!(list.fragment_count(), 0);

        list.release(a, 16);
        list.release(c, 16);
        assert_eq!(list.fragment_count(), 2);

        list.release(b, 16);
        assert_eq!(list.fragment_count(), 1);
        assert_eq!(list.largest(), 48);
    }

    #[test]
    fn test_try_extend_consumes_following_block() {
        let mut list = FreeList::new(0, 64);
        let a = list.reserve(16).unwrap();
        assert!(list.try_extend(a, 16, 40));
        assert_eq!(list.total(), 24);

        let b = list.reserve(8).unwrap();
        assert_eq!(b, 40);
        // `b` now sits right after `a`.
        assert!(!list.try_extend(a, 40, 48));
    }

    #[test]
    fn test_reset_with_zero_length_is_empty() {
        let list = FreeList::new(128, 0);
        assert_eq!(list.total(), 0);
        assert_eq!(list.largest(), 0);
    }
}
