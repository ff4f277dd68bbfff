/// Frame pipeline - N frame slots in flight on one GPU timeline
///
/// Each frame slot owns one command allocator per recording stream and the
/// fence value signaled when its last frame was submitted. The command lists
/// themselves are shared by all slots and re-pointed at the current slot's
/// allocators at the start of every frame.
///
/// ```text
/// frame K   : record into slot K % N  -> signal(v_K)
/// frame K+N : wait(v_K) -> reset slot allocators -> record
/// ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::graphics_device::{CommandAllocator, CommandList, Fence, GraphicsDevice};

/// One in-flight frame
pub struct FrameSlot {
    allocators: Vec<Box<dyn CommandAllocator>>,
    fence_value: u64,
}

impl FrameSlot {
    /// Fence value signaled the last time this slot was submitted
    pub fn fence_value(&self) -> u64 {
        self.fence_value
    }
}

struct FrameState {
    slots: Vec<FrameSlot>,
    frame_index: usize,
    next_fence_value: u64,
}

/// Owner of the frame slots and the completion fence
pub struct FramePipeline {
    device: Arc<dyn GraphicsDevice>,
    fence: Arc<dyn Fence>,
    state: Mutex<FrameState>,
    frame_index: AtomicUsize,
    command_lists: Vec<Mutex<Box<dyn CommandList>>>,
}

impl FramePipeline {
    /// Create `frames_in_flight` slots with `command_streams` allocators each
    ///
    /// # Errors
    ///
    /// Propagates fence, allocator or command list creation failure (fatal at boot).
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        frames_in_flight: u32,
        command_streams: u32,
    ) -> Result<Self> {
        if frames_in_flight == 0 || command_streams == 0 {
            return Err(Error::InitializationFailed(format!(
                "frame pipeline needs at least one slot and one stream (got {} / {})",
                frames_in_flight, command_streams
            )));
        }

        let fence = device.create_fence(0)?;

        let mut slots = Vec::with_capacity(frames_in_flight as usize);
        for _ in 0..frames_in_flight {
            let allocators = (0..command_streams)
                .map(|_| device.create_command_allocator())
                .collect::<Result<Vec<_>>>()?;
            slots.push(FrameSlot {
                allocators,
                fence_value: 0,
            });
        }

        // Lists are created recording; close them so begin_frame can reset them
        let mut command_lists = Vec::with_capacity(command_streams as usize);
        for allocator in &slots[0].allocators {
            let mut list = device.create_command_list(&**allocator)?;
            list.close()?;
            command_lists.push(Mutex::new(list));
        }

        crate::gpu_debug!(
            "galaxy3d::FramePipeline",
            "{} frame slots, {} command streams",
            frames_in_flight,
            command_streams
        );

        Ok(Self {
            device,
            fence,
            state: Mutex::new(FrameState {
                slots,
                frame_index: 0,
                next_fence_value: 1,
            }),
            frame_index: AtomicUsize::new(0),
            command_lists,
        })
    }

    /// Index of the current frame slot, in `[0, frames_in_flight)`
    pub fn frame_index(&self) -> usize {
        self.frame_index.load(Ordering::Acquire)
    }

    /// Number of frame slots (N)
    pub fn frames_in_flight(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Number of recording streams
    pub fn command_streams(&self) -> usize {
        self.command_lists.len()
    }

    /// Last value the GPU has reached
    pub fn completed_value(&self) -> Result<u64> {
        self.fence.completed_value()
    }

    /// Fence value recorded for slot `index`
    pub fn slot_fence_value(&self, index: usize) -> u64 {
        self.state.lock().slots[index].fence_value
    }

    /// Prepare the current slot for recording
    ///
    /// Resets the slot's allocators and points every command list at them.
    /// Only valid after `move_to_next_frame` (or a full `wait_for_gpu`) has
    /// guaranteed the GPU is done with the slot.
    pub fn begin_frame(&self) -> Result<()> {
        let mut state = self.state.lock();
        let index = state.frame_index;
        let slot = &mut state.slots[index];

        for allocator in slot.allocators.iter_mut() {
            allocator.reset()?;
        }
        for (list, allocator) in self.command_lists.iter().zip(slot.allocators.iter()) {
            let mut list = list.lock();
            if !list.is_closed() {
                // A stream left open by the previous frame was never executed
                crate::gpu_warn!(
                    "galaxy3d::FramePipeline",
                    "Command list left recording; closing it unexecuted"
                );
                list.close()?;
            }
            list.reset(&**allocator)?;
        }
        Ok(())
    }

    /// Recording target for `stream`
    ///
    /// # Panics
    ///
    /// Panics if `stream` is not a valid stream index.
    pub fn command_list(&self, stream: usize) -> MutexGuard<'_, Box<dyn CommandList>> {
        assert!(
            stream < self.command_lists.len(),
            "command stream {} out of range ({} streams)",
            stream,
            self.command_lists.len()
        );
        self.command_lists[stream].lock()
    }

    /// Close the list of `stream` and submit it to the graphics queue
    pub fn execute_command_list(&self, stream: usize) -> Result<()> {
        let mut list = self.command_list(stream);
        if !list.is_closed() {
            list.close()?;
        }
        self.device
            .execute_command_lists(&[&**list])
            .map_err(|e| self.report(e))
    }

    /// Signal the current slot, advance to the next slot, and block until the
    /// GPU has finished the work previously recorded into that slot
    pub fn move_to_next_frame(&self) -> Result<()> {
        let mut state = self.state.lock();

        let value = state.next_fence_value;
        self.device
            .signal(self.fence.as_ref(), value)
            .map_err(|e| self.report(e))?;
        let current = state.frame_index;
        state.slots[current].fence_value = value;
        state.next_fence_value += 1;

        let next = (current + 1) % state.slots.len();
        state.frame_index = next;
        self.frame_index.store(next, Ordering::Release);

        let wait_for = state.slots[next].fence_value;
        let completed = self.fence.completed_value().map_err(|e| self.report(e))?;
        if completed < wait_for {
            crate::gpu_trace!(
                "galaxy3d::FramePipeline",
                "Waiting for slot {} (fence {} < {})",
                next,
                completed,
                wait_for
            );
            self.fence.wait(wait_for).map_err(|e| self.report(e))?;
        }
        Ok(())
    }

    /// Signal and block until the GPU has drained every submitted frame
    ///
    /// Used at teardown and before resizing; never on the per-frame path.
    pub fn wait_for_gpu(&self) -> Result<()> {
        let mut state = self.state.lock();

        let value = state.next_fence_value;
        self.device
            .signal(self.fence.as_ref(), value)
            .map_err(|e| self.report(e))?;
        let current = state.frame_index;
        state.slots[current].fence_value = value;
        state.next_fence_value += 1;

        self.fence.wait(value).map_err(|e| self.report(e))
    }

    /// Promote the error when the device reports removal, and log device
    /// loss as fatal
    fn report(&self, error: Error) -> Error {
        let error = self.device.classify_error(error);
        if error.is_device_lost() {
            crate::gpu_error!(
                "galaxy3d::FramePipeline",
                "GPU device removed, session cannot continue: {}",
                error
            );
        }
        error
    }
}

#[cfg(test)]
#[path = "frame_pipeline_tests.rs"]
mod tests;
