/// Fixed-capacity descriptor table
///
/// Index space layout:
///
/// ```text
/// [0 .. P)                        persistent slots (free list)
/// [P + k*T .. P + (k+1)*T)        temporary partition k (bump counter)
/// ```
///
/// Frame F allocates temporaries from partition `F % partitions`. With N
/// frames in flight there are N + 1 partitions, so the frame being updated
/// never shares a range with a frame still recording or executing.
///
/// Persistent allocation takes a short exclusive lock; temporary allocation
/// is a single atomic fetch-add; handle lookups are plain arithmetic.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::descriptor::{
    CpuDescriptorHandle, DescriptorKind, DescriptorSlot, GpuDescriptorHandle, TemporaryBlock,
};
use crate::error::{Error, Result};
use crate::graphics_device::{DescriptorHeapInfo, GraphicsDevice};
use crate::utils::SlotAllocator;

/// Usage snapshot of a descriptor table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescriptorTableStats {
    /// Live persistent slots
    pub persistent_in_use: u32,
    /// Highest persistent index ever handed out + 1
    pub persistent_high_water_mark: u32,
    /// Temporary descriptors held by frames not yet ended, all partitions
    pub temporary_in_use: u32,
}

/// Descriptor table for one descriptor kind
pub struct DescriptorTable {
    kind: DescriptorKind,
    heap: DescriptorHeapInfo,
    persistent_capacity: u32,
    temporary_capacity: u32,
    persistent: Mutex<SlotAllocator>,
    temporary_cursors: Vec<AtomicU32>,
}

impl DescriptorTable {
    /// Create a table and its native heap
    ///
    /// `temporary_capacity` is the per-frame budget; the heap holds
    /// `temporary_partitions` copies of it. Tables that are not
    /// shader-visible never have a temporary range.
    ///
    /// # Errors
    ///
    /// Propagates heap creation failure (fatal at boot).
    pub fn new(
        device: &dyn GraphicsDevice,
        kind: DescriptorKind,
        persistent_capacity: u32,
        temporary_capacity: u32,
        temporary_partitions: u32,
    ) -> Result<Self> {
        let shader_visible = kind.is_shader_visible();
        let (temporary_capacity, temporary_partitions) = if shader_visible {
            (temporary_capacity, temporary_partitions.max(1))
        } else {
            (0, 1)
        };
        let capacity = temporary_capacity
            .checked_mul(temporary_partitions)
            .and_then(|temporary| temporary.checked_add(persistent_capacity))
            .ok_or_else(|| {
                Error::InitializationFailed(format!(
                    "{:?} table capacity overflows: {} persistent + {} x {} temporary",
                    kind, persistent_capacity, temporary_partitions, temporary_capacity
                ))
            })?;
        let heap = device.create_descriptor_heap(kind, capacity, shader_visible)?;

        crate::gpu_debug!(
            "galaxy3d::DescriptorTable",
            "{:?} table: {} persistent + {} x {} temporary descriptors",
            kind,
            persistent_capacity,
            temporary_partitions,
            temporary_capacity
        );

        Ok(Self {
            kind,
            heap,
            persistent_capacity,
            temporary_capacity,
            persistent: Mutex::new(SlotAllocator::new(persistent_capacity)),
            temporary_cursors: (0..temporary_partitions).map(|_| AtomicU32::new(0)).collect(),
        })
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn persistent_capacity(&self) -> u32 {
        self.persistent_capacity
    }

    /// Per-frame temporary capacity
    pub fn temporary_capacity(&self) -> u32 {
        self.temporary_capacity
    }

    pub fn temporary_partitions(&self) -> u32 {
        self.temporary_cursors.len() as u32
    }

    /// Total number of descriptors in the native heap
    pub fn capacity(&self) -> u32 {
        self.persistent_capacity + self.temporary_capacity * self.temporary_partitions()
    }

    // ===== PERSISTENT SLOTS =====

    /// Allocate a persistent slot
    ///
    /// # Panics
    ///
    /// Panics when the persistent capacity is exhausted. Capacities are
    /// boot-time budgets; running out is a programming error.
    pub fn allocate_persistent(&self) -> DescriptorSlot {
        let index = self.persistent.lock().alloc();
        let index = match index {
            Some(index) => index,
            None => {
                crate::gpu_error!(
                    "galaxy3d::DescriptorTable",
                    "{:?} table exhausted ({} persistent slots)",
                    self.kind,
                    self.persistent_capacity
                );
                panic!(
                    "{:?} descriptor table exhausted: capacity {}",
                    self.kind, self.persistent_capacity
                );
            }
        };

        DescriptorSlot {
            index,
            cpu: self.cpu_handle(index),
            gpu: self.gpu_handle(index),
        }
    }

    /// Free a persistent slot and reset it to the invalid sentinel
    ///
    /// Only call this once no GPU work can reference the slot; mid-session
    /// frees go through the deferred-release queue instead.
    ///
    /// # Panics
    ///
    /// Panics if the slot is invalid or does not belong to the persistent range.
    pub fn free_persistent(&self, slot: &mut DescriptorSlot) {
        assert!(slot.is_valid(), "freeing an invalid {:?} descriptor slot", self.kind);
        self.free_persistent_index(slot.index);
        slot.invalidate();
    }

    /// Free a persistent index directly (deferred-release path)
    pub(crate) fn free_persistent_index(&self, index: u32) {
        assert!(
            index < self.persistent_capacity,
            "{:?} persistent index {} out of range (capacity {})",
            self.kind,
            index,
            self.persistent_capacity
        );
        self.persistent.lock().free(index);
    }

    // ===== TEMPORARY RANGE =====

    fn partition(&self, frame: u64) -> usize {
        (frame % self.temporary_cursors.len() as u64) as usize
    }

    /// Allocate `count` contiguous temporary descriptors for `frame`
    ///
    /// The block stays valid until `end_frame(frame)`; it is never freed
    /// individually.
    ///
    /// # Panics
    ///
    /// Panics when the frame's cumulative temporary allocations would exceed
    /// the temporary capacity.
    pub fn allocate_temporary(&self, frame: u64, count: u32) -> TemporaryBlock {
        let partition = self.partition(frame);
        let start = self.temporary_cursors[partition].fetch_add(count, Ordering::AcqRel);
        let fits = start
            .checked_add(count)
            .is_some_and(|end| end <= self.temporary_capacity);
        assert!(
            fits,
            "{:?} temporary descriptors exhausted for frame {}: {} requested at offset {} (capacity {})",
            self.kind,
            frame,
            count,
            start,
            self.temporary_capacity
        );

        let first_index =
            self.persistent_capacity + partition as u32 * self.temporary_capacity + start;
        TemporaryBlock {
            first_index,
            count,
            cpu_start: self.cpu_handle(first_index),
            gpu_start: self.gpu_handle(first_index),
            increment: self.heap.increment,
        }
    }

    /// Release the temporary range of `frame`
    ///
    /// Only once the GPU has finished executing the frame; the partition is
    /// handed to frame `frame + partitions` afterwards.
    pub fn end_frame(&self, frame: u64) {
        self.temporary_cursors[self.partition(frame)].store(0, Ordering::Release);
    }

    /// Release every temporary range (GPU idle)
    pub fn reset_temporary(&self) {
        for cursor in &self.temporary_cursors {
            cursor.store(0, Ordering::Release);
        }
    }

    // ===== HANDLE LOOKUPS =====

    /// CPU handle of `index`
    pub fn cpu_handle(&self, index: u32) -> CpuDescriptorHandle {
        assert!(
            index < self.capacity(),
            "{:?} descriptor index {} out of range",
            self.kind,
            index
        );
        self.heap.cpu_base.offset(index, self.heap.increment)
    }

    /// GPU handle of `index`, `None` for tables that are not shader-visible
    pub fn gpu_handle(&self, index: u32) -> Option<GpuDescriptorHandle> {
        assert!(
            index < self.capacity(),
            "{:?} descriptor index {} out of range",
            self.kind,
            index
        );
        self.heap
            .gpu_base
            .map(|base| base.offset(index, self.heap.increment))
    }

    pub fn stats(&self) -> DescriptorTableStats {
        let persistent = self.persistent.lock();
        DescriptorTableStats {
            persistent_in_use: persistent.len(),
            persistent_high_water_mark: persistent.high_water_mark(),
            temporary_in_use: self
                .temporary_cursors
                .iter()
                .map(|cursor| cursor.load(Ordering::Acquire).min(self.temporary_capacity))
                .sum(),
        }
    }
}

#[cfg(test)]
#[path = "descriptor_table_tests.rs"]
mod tests;
