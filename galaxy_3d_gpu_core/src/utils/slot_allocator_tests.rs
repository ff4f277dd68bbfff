use super::*;

// ============================================================================
// Basic allocation tests
// ============================================================================

#[test]
fn test_sequential_alloc() {
    let mut alloc = SlotAllocator::new(8);
    assert_eq!(alloc.alloc(), Some(0));
    assert_eq!(alloc.alloc(), Some(1));
    assert_eq!(alloc.alloc(), Some(2));
}

#[test]
fn test_new_is_empty() {
    let alloc = SlotAllocator::new(8);
    assert!(alloc.is_empty());
    assert_eq!(alloc.len(), 0);
    assert_eq!(alloc.high_water_mark(), 0);
    assert_eq!(alloc.capacity(), 8);
}

#[test]
fn test_exhaustion_returns_none() {
    let mut alloc = SlotAllocator::new(4);
    let ids: Vec<u32> = (0..4).map(|_| alloc.alloc().unwrap()).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert!(alloc.is_full());
    assert_eq!(alloc.alloc(), None);
    // A failed allocation must not change the bookkeeping
    assert_eq!(alloc.len(), 4);
}

#[test]
fn test_zero_capacity() {
    let mut alloc = SlotAllocator::new(0);
    assert!(alloc.is_full());
    assert_eq!(alloc.alloc(), None);
}

// ============================================================================
// Free and recycle tests
// ============================================================================

#[test]
fn test_free_and_recycle_after_exhaustion() {
    let mut alloc = SlotAllocator::new(4);
    for _ in 0..4 {
        alloc.alloc();
    }
    alloc.free(2);
    assert_eq!(alloc.alloc(), Some(2));
    assert_eq!(alloc.alloc(), None);
}

#[test]
fn test_free_multiple_recycle_lifo() {
    // Free list is a stack (LIFO): last freed = first recycled
    let mut alloc = SlotAllocator::new(8);
    let a = alloc.alloc().unwrap(); // 0
    let _b = alloc.alloc().unwrap(); // 1
    let c = alloc.alloc().unwrap(); // 2
    alloc.free(a); // free list: [0]
    alloc.free(c); // free list: [0, 2]

    assert_eq!(alloc.alloc(), Some(2));
    assert_eq!(alloc.alloc(), Some(0));
    // Free list exhausted, next is fresh
    assert_eq!(alloc.alloc(), Some(3));
}

#[test]
#[should_panic(expected = "freeing an unallocated slot")]
fn test_free_unallocated_panics() {
    let mut alloc = SlotAllocator::new(8);
    alloc.alloc();
    alloc.free(5);
}

// ============================================================================
// len() and high_water_mark() tests
// ============================================================================

#[test]
fn test_len_tracks_active_slots() {
    let mut alloc = SlotAllocator::new(8);
    alloc.alloc();
    alloc.alloc();
    assert_eq!(alloc.len(), 2);

    alloc.free(0);
    assert_eq!(alloc.len(), 1);

    alloc.free(1);
    assert!(alloc.is_empty());
}

#[test]
fn test_high_water_mark_never_decreases() {
    let mut alloc = SlotAllocator::new(8);
    alloc.alloc(); // 0
    alloc.alloc(); // 1
    alloc.free(0);
    alloc.free(1);
    assert_eq!(alloc.high_water_mark(), 2);

    alloc.alloc(); // 1 (recycled)
    alloc.alloc(); // 0 (recycled)
    assert_eq!(alloc.high_water_mark(), 2);

    alloc.alloc(); // 2 (fresh)
    assert_eq!(alloc.high_water_mark(), 3);
}

// ============================================================================
// Stress / pattern tests
// ============================================================================

#[test]
fn test_live_indices_stay_unique_and_in_range() {
    let capacity = 64;
    let mut alloc = SlotAllocator::new(capacity);
    let mut live = std::collections::HashSet::new();

    // Deterministic interleaving of allocations and frees
    let mut seed: u32 = 0x9E37_79B9;
    for _ in 0..2000 {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        if seed % 3 != 0 {
            if let Some(id) = alloc.alloc() {
                assert!(id < capacity);
                assert!(live.insert(id), "duplicate slot id: {}", id);
            } else {
                assert_eq!(live.len() as u32, capacity);
            }
        } else if let Some(&id) = live.iter().next() {
            live.remove(&id);
            alloc.free(id);
        }
        assert_eq!(alloc.len() as usize, live.len());
    }
}
