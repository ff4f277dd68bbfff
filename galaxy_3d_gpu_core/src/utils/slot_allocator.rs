/// Allocates and recycles unique `u32` indices within a fixed capacity.
///
/// Backs the persistent range of a descriptor table. Fresh indices are
/// handed out in ascending order; freed indices are recycled LIFO before any
/// fresh index is used, so the live set is always a subset of
/// `[0, capacity)` without duplicates.
///
/// # Example
///
/// ```ignore
/// let mut alloc = SlotAllocator::new(4);
/// let a = alloc.alloc();  // Some(0)
/// let b = alloc.alloc();  // Some(1)
/// alloc.free(0);          // 0 is now available
/// let c = alloc.alloc();  // Some(0) (recycled)
/// ```
#[derive(Debug)]
pub struct SlotAllocator {
    free_list: Vec<u32>,
    next_id: u32,
    len: u32,
    capacity: u32,
}

impl SlotAllocator {
    /// Create an empty allocator over `[0, capacity)`
    pub fn new(capacity: u32) -> Self {
        Self {
            free_list: Vec::new(),
            next_id: 0,
            len: 0,
            capacity,
        }
    }

    /// Allocate the next available index, or `None` when every index is live
    pub fn alloc(&mut self) -> Option<u32> {
        let id = match self.free_list.pop() {
            Some(id) => id,
            None if self.next_id < self.capacity => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
            None => return None,
        };
        self.len += 1;
        Some(id)
    }

    /// Return an index to the pool for reuse
    ///
    /// # Panics
    ///
    /// Panics if `id` was never allocated.
    pub fn free(&mut self, id: u32) {
        assert!(id < self.next_id, "freeing an unallocated slot: {}", id);
        debug_assert!(!self.free_list.contains(&id), "double free of slot {}", id);
        self.len -= 1;
        self.free_list.push(id);
    }

    /// Highest index ever allocated + 1
    pub fn high_water_mark(&self) -> u32 {
        self.next_id
    }

    /// Number of currently allocated indices
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether no index is currently allocated
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of indices
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Whether every index is live
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }
}

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
