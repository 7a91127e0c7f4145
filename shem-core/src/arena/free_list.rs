//! Best-fit free list over the byte range of one arena.
//!
//! Bookkeeping lives outside the mapped region, so the arena's bytes are
//! entirely available to callers and a block can be released by address
//! alone.
//!
//! # Algorithm
//!
//! - **Allocation**: picks the smallest free block that can hold the
//!   request (ties go to the lowest offset) and splits off the remainder.
//! - **Deallocation**: looks the block up in the live table, returns it to
//!   the free set and merges it with free neighbours on both sides.
//!
//! Both operations are O(log n) in the number of free blocks.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Granularity and alignment of every block handed out.
pub const BLOCK_ALIGN: usize = 16;

/// Best-fit allocator over offsets `[0, capacity)`.
#[derive(Debug, Default)]
pub struct FreeList {
    /// Free blocks ordered by `(size, offset)` for best-fit lookup.
    by_size: BTreeSet<(usize, usize)>,
    /// Free blocks ordered by offset for coalescing.
    by_offset: BTreeMap<usize, usize>,
    /// Live blocks: offset -> rounded size.
    live: HashMap<usize, usize>,
    /// Sum of live block sizes.
    live_bytes: usize,
}

impl FreeList {
    /// Create a free list covering `[0, capacity)`.
    ///
    /// Capacity is rounded down to [`BLOCK_ALIGN`].
    pub fn new(capacity: usize) -> Self {
        let mut list = Self::default();
        let usable = capacity / BLOCK_ALIGN * BLOCK_ALIGN;
        if usable > 0 {
            list.insert_free(0, usable);
        }
        list
    }

    /// Round a request up to the block granularity.
    ///
    /// Returns `None` for zero-size requests and on overflow.
    pub fn block_size(size: usize) -> Option<usize> {
        if size == 0 {
            return None;
        }
        size.checked_next_multiple_of(BLOCK_ALIGN)
    }

    /// Allocate `size` bytes, returning the block offset.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        let size = Self::block_size(size)?;
        let (block_size, offset) = self.by_size.range((size, 0)..).next().copied()?;

        self.remove_free(offset, block_size);
        if block_size > size {
            self.insert_free(offset + size, block_size - size);
        }

        self.live.insert(offset, size);
        self.live_bytes += size;
        Some(offset)
    }

    /// Release the block starting at `offset`.
    ///
    /// Returns the released size, or `None` if no live block starts there.
    pub fn deallocate(&mut self, offset: usize) -> Option<usize> {
        let size = self.live.remove(&offset)?;
        self.live_bytes -= size;

        let mut start = offset;
        let mut len = size;

        if let Some((prev_offset, prev_size)) = self
            .by_offset
            .range(..offset)
            .next_back()
            .map(|(&o, &s)| (o, s))
        {
            if prev_offset + prev_size == offset {
                self.remove_free(prev_offset, prev_size);
                start = prev_offset;
                len += prev_size;
            }
        }

        if let Some(next_size) = self.by_offset.get(&(offset + size)).copied() {
            self.remove_free(offset + size, next_size);
            len += next_size;
        }

        self.insert_free(start, len);
        Some(size)
    }

    /// Check whether a live block starts at `offset`.
    pub fn is_live(&self, offset: usize) -> bool {
        self.live.contains_key(&offset)
    }

    /// True when nothing is allocated.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Bytes held by live blocks.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    /// Number of live blocks.
    pub fn live_blocks(&self) -> usize {
        self.live.len()
    }

    /// Size of the largest free block.
    pub fn largest_free(&self) -> usize {
        self.by_size.last().map_or(0, |&(size, _)| size)
    }

    /// Number of free blocks (a fragmentation indicator).
    pub fn free_blocks(&self) -> usize {
        self.by_offset.len()
    }

    fn insert_free(&mut self, offset: usize, size: usize) {
        self.by_size.insert((size, offset));
        self.by_offset.insert(offset, size);
    }

    fn remove_free(&mut self, offset: usize, size: usize) {
        self.by_size.remove(&(size, offset));
        self.by_offset.remove(&offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_allocation() {
        let mut list = FreeList::new(1024);
        let offset = list.allocate(64).unwrap();
        assert_eq!(offset, 0);
        assert!(list.is_live(offset));
        assert_eq!(list.live_bytes(), 64);

        assert_eq!(list.deallocate(offset), Some(64));
        assert!(list.is_empty());
        assert_eq!(list.largest_free(), 1024);
    }

    #[test]
    fn test_sizes_are_rounded() {
        let mut list = FreeList::new(1024);
        let a = list.allocate(1).unwrap();
        let b = list.allocate(17).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 16);
        assert_eq!(list.live_bytes(), 48);
        assert_eq!(FreeList::block_size(0), None);
        assert_eq!(FreeList::block_size(usize::MAX), None);
    }

    #[test]
    fn test_capacity_rounded_down() {
        let list = FreeList::new(1000);
        assert_eq!(list.largest_free(), 992);

        let mut tiny = FreeList::new(8);
        assert_eq!(tiny.largest_free(), 0);
        assert!(tiny.allocate(1).is_none());
    }

    #[test]
    fn test_best_fit_prefers_smallest_hole() {
        let mut list = FreeList::new(512);
        let a = list.allocate(128).unwrap();
        let _b = list.allocate(16).unwrap();
        let c = list.allocate(32).unwrap();
        let _d = list.allocate(16).unwrap();

        // Holes: 128 at `a`, 32 at `c`, and the tail.
        list.deallocate(a).unwrap();
        list.deallocate(c).unwrap();

        let e = list.allocate(32).unwrap();
        assert_eq!(e, c);
        let f = list.allocate(100).unwrap();
        assert_eq!(f, a);
    }

    #[test]
    fn test_fragmentation_and_coalescing() {
        let mut list = FreeList::new(256);
        let ptr1 = list.allocate(64).unwrap();
        let ptr2 = list.allocate(64).unwrap();
        let ptr3 = list.allocate(64).unwrap();
        let ptr4 = list.allocate(64).unwrap();
        assert!(list.allocate(64).is_none());

        list.deallocate(ptr2).unwrap();
        list.deallocate(ptr1).unwrap();
        assert_eq!(list.free_blocks(), 1);

        let large = list.allocate(128).unwrap();
        assert_eq!(large, ptr1);

        list.deallocate(large).unwrap();
        list.deallocate(ptr3).unwrap();
        list.deallocate(ptr4).unwrap();
        assert!(list.is_empty());
        assert_eq!(list.free_blocks(), 1);
        assert_eq!(list.largest_free(), 256);
    }

    #[test]
    fn test_fragmentation_and_allocation_failure() {
        let mut list = FreeList::new(256);
        let ptr1 = list.allocate(64).unwrap();
        let ptr2 = list.allocate(64).unwrap();
        let ptr3 = list.allocate(64).unwrap();
        let ptr4 = list.allocate(64).unwrap();

        list.deallocate(ptr2).unwrap();
        list.deallocate(ptr4).unwrap();

        assert!(list.allocate(128).is_none());

        list.deallocate(ptr1).unwrap();
        list.deallocate(ptr3).unwrap();
        assert!(list.allocate(256).is_some());
    }

    #[test]
    fn test_unknown_offset_is_rejected() {
        let mut list = FreeList::new(256);
        let ptr = list.allocate(64).unwrap();
        assert_eq!(list.deallocate(ptr + 16), None);
        assert_eq!(list.deallocate(ptr), Some(64));
        assert_eq!(list.deallocate(ptr), None);
    }

    #[test]
    fn test_reallocation_after_full_deallocation() {
        let mut list = FreeList::new(1024);
        let mut offsets = Vec::new();
        while let Some(offset) = list.allocate(64) {
            offsets.push(offset);
        }
        assert_eq!(offsets.len(), 16);

        for offset in offsets {
            list.deallocate(offset).unwrap();
        }
        assert!(list.is_empty());
        assert_eq!(list.allocate(1024), Some(0));
    }
}
