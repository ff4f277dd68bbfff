/// Deferred release queue
///
/// Every item counts the cleanup ticks it has survived. A tick first checks
/// the count and only then increments it, so an item pushed during frame F
/// is destroyed by the N-th tick *after* F's own cleanup:
///
/// ```text
/// N = 2, push during frame 10
/// tick(10): survived 0 -> 1
/// tick(11): survived 1 -> 2
/// tick(12): survived 2 >= 2 -> destroyed
/// ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::descriptor::{DescriptorKind, DescriptorTables};
use crate::graphics_device::Texture;

/// Something whose destruction must wait for the GPU
pub enum DeferredItem {
    /// Native resource; destroyed when this last reference is dropped
    Resource(Arc<dyn Texture>),
    /// Persistent descriptor slot; returned to its table's free list
    Descriptor { kind: DescriptorKind, index: u32 },
}

impl fmt::Debug for DeferredItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredItem::Resource(texture) => write!(f, "Resource({})", texture.name()),
            DeferredItem::Descriptor { kind, index } => {
                write!(f, "Descriptor({:?}, {})", kind, index)
            }
        }
    }
}

impl DeferredItem {
    fn destroy(self, descriptors: &DescriptorTables) {
        match self {
            DeferredItem::Resource(texture) => drop(texture),
            DeferredItem::Descriptor { kind, index } => {
                descriptors.table(kind).free_persistent_index(index)
            }
        }
    }
}

struct PendingRelease {
    item: DeferredItem,
    survived_frames: u32,
}

/// Queue of items waiting for the GPU to retire the frames that may use them
pub struct DeferredReleaseQueue {
    frames_in_flight: u32,
    pending: Mutex<Vec<PendingRelease>>,
    destroyed: AtomicU64,
}

impl DeferredReleaseQueue {
    /// Queue destroying items after `frames_in_flight` cleanup ticks
    pub fn new(frames_in_flight: u32) -> Self {
        Self {
            frames_in_flight,
            pending: Mutex::new(Vec::new()),
            destroyed: AtomicU64::new(0),
        }
    }

    /// Hand over an item whose last owner just released it
    ///
    /// Callable from any thread.
    pub fn push(&self, item: DeferredItem) {
        crate::gpu_trace!("galaxy3d::DeferredReleaseQueue", "Deferred {:?}", item);
        self.pending.lock().push(PendingRelease {
            item,
            survived_frames: 0,
        });
    }

    /// Age every pending item by one frame and destroy the ripe ones
    ///
    /// Called once per produced frame from `Cleanup`. Returns the number of
    /// items destroyed.
    pub fn tick(&self, descriptors: &DescriptorTables) -> usize {
        let ripe: Vec<DeferredItem> = {
            let mut pending = self.pending.lock();
            let mut ripe = Vec::new();
            let mut kept = Vec::with_capacity(pending.len());
            for mut entry in pending.drain(..) {
                if entry.survived_frames >= self.frames_in_flight {
                    ripe.push(entry.item);
                } else {
                    entry.survived_frames += 1;
                    kept.push(entry);
                }
            }
            *pending = kept;
            ripe
        };

        self.destroy_all(ripe, descriptors)
    }

    /// Destroy everything regardless of age
    ///
    /// Only valid once the GPU is idle (after `wait_for_gpu` at shutdown).
    pub fn drain(&self, descriptors: &DescriptorTables) -> usize {
        let all: Vec<DeferredItem> = self
            .pending
            .lock()
            .drain(..)
            .map(|entry| entry.item)
            .collect();
        self.destroy_all(all, descriptors)
    }

    /// Number of items waiting
    /// Drop every pending item without destroying it
    ///
    /// For a GPU that could not be drained: resources are leaked and
    /// descriptor slots stay allocated.
    pub fn abandon(&self) -> usize {
        let all: Vec<PendingRelease> = self.pending.lock().drain(..).collect();
        let count = all.len();
        for entry in all {
            crate::gpu_debug!("galaxy3d::DeferredReleaseQueue", "Leaking {:?}", entry.item);
            if let DeferredItem::Resource(texture) = entry.item {
                std::mem::forget(texture);
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Total number of items destroyed so far
    pub fn destroyed_count(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }

    // Runs outside the queue lock
    fn destroy_all(&self, items: Vec<DeferredItem>, descriptors: &DescriptorTables) -> usize {
        let count = items.len();
        for item in items {
            crate::gpu_debug!("galaxy3d::DeferredReleaseQueue", "Destroying {:?}", item);
            item.destroy(descriptors);
        }
        self.destroyed.fetch_add(count as u64, Ordering::Relaxed);
        count
    }
}

#[cfg(test)]
#[path = "deferred_release_tests.rs"]
mod tests;
