/// Mock graphics device for unit tests (no GPU required)
///
/// Simulates a single graphics queue with an in-memory timeline. In the
/// default mode every signal completes immediately; in manual mode signals
/// stay pending until the test calls `complete_up_to` / `complete_all`, which
/// lets tests observe the CPU blocking on frame slots.
///
/// The mock also checks the central frame-pipeline invariant: a command
/// allocator reset while the GPU may still execute work recorded from it is
/// counted in `unsafe_allocator_resets`.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex};

use crate::config::SurfaceDesc;
use crate::descriptor::{CpuDescriptorHandle, DescriptorKind, GpuDescriptorHandle};
use crate::error::{Error, Result};
use crate::graphics_device::{
    ClearValue, CommandAllocator, CommandList, DescriptorHeapInfo, Fence, GraphicsDevice,
    RenderTargetDesc, Swapchain, Texture, ViewKind,
};

// ============================================================================
// Shared state
// ============================================================================

/// Counters observable by tests
#[derive(Debug, Default)]
pub struct MockCounters {
    pub heaps_created: AtomicU64,
    pub textures_created: AtomicU64,
    pub textures_destroyed: AtomicU64,
    pub views_written: AtomicU64,
    pub command_lists_executed: AtomicU64,
    pub signals: AtomicU64,
    pub presents: AtomicU64,
    pub present_failures: AtomicU64,
    pub allocator_resets: AtomicU64,
    pub unsafe_allocator_resets: AtomicU64,
}

/// Work submitted from an allocator, retired once its signal completes
struct Submission {
    allocator_id: u64,
    signal: Option<(u64, u64)>,
}

pub struct MockShared {
    pub counters: MockCounters,
    auto_complete: AtomicBool,
    device_lost: Mutex<Option<String>>,
    removal_pending_report: Mutex<Option<String>>,
    submissions: Mutex<Vec<Submission>>,
    fences: Mutex<Vec<Arc<MockFence>>>,
    next_id: AtomicU64,
    fail_texture_creation: AtomicBool,
    fail_fence_creation: AtomicBool,
    failing_presents: AtomicU32,
    failing_signals: AtomicU32,
}

impl MockShared {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn lost_reason(&self) -> Option<String> {
        self.device_lost.lock().clone()
    }

    fn check_lost(&self) -> Result<()> {
        match self.lost_reason() {
            Some(reason) => Err(Error::DeviceLost(reason)),
            None => Ok(()),
        }
    }

    fn fence_completed(&self, fence_id: u64) -> u64 {
        self.fences
            .lock()
            .iter()
            .find(|f| f.id == fence_id)
            .map(|f| *f.completed.lock())
            .unwrap_or(0)
    }
}

// ============================================================================
// Mock Fence
// ============================================================================

pub struct MockFence {
    id: u64,
    completed: Mutex<u64>,
    signaled: AtomicU64,
    cond: Condvar,
    shared: Weak<MockShared>,
}

impl MockFence {
    /// Advance the completed value, never past the highest signaled value
    fn complete_up_to(&self, value: u64) {
        let mut completed = self.completed.lock();
        let target = value.min(self.signaled.load(Ordering::SeqCst));
        if target > *completed {
            *completed = target;
        }
        self.cond.notify_all();
    }

    fn wake(&self) {
        let _guard = self.completed.lock();
        self.cond.notify_all();
    }

    pub fn signaled_value(&self) -> u64 {
        self.signaled.load(Ordering::SeqCst)
    }

    fn lost_reason(&self) -> Option<String> {
        self.shared.upgrade().and_then(|shared| shared.lost_reason())
    }
}

impl Fence for MockFence {
    fn completed_value(&self) -> Result<u64> {
        if let Some(reason) = self.lost_reason() {
            return Err(Error::DeviceLost(reason));
        }
        Ok(*self.completed.lock())
    }

    fn wait(&self, value: u64) -> Result<()> {
        let mut completed = self.completed.lock();
        loop {
            if let Some(reason) = self.lost_reason() {
                return Err(Error::DeviceLost(reason));
            }
            if *completed >= value {
                return Ok(());
            }
            self.cond.wait(&mut completed);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

pub struct MockTexture {
    desc: RenderTargetDesc,
    name: String,
    shared: Arc<MockShared>,
}

impl Texture for MockTexture {
    fn desc(&self) -> &RenderTargetDesc {
        &self.desc
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MockTexture {
    fn drop(&mut self) {
        self.shared
            .counters
            .textures_destroyed
            .fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Mock CommandAllocator / CommandList
// ============================================================================

pub struct MockCommandAllocator {
    pub id: u64,
    shared: Arc<MockShared>,
}

impl CommandAllocator for MockCommandAllocator {
    fn reset(&mut self) -> Result<()> {
        let shared = &self.shared;
        shared.counters.allocator_resets.fetch_add(1, Ordering::SeqCst);

        let mut submissions = shared.submissions.lock();
        let mut in_flight = false;
        submissions.retain(|s| {
            if s.allocator_id != self.id {
                return true;
            }
            match s.signal {
                Some((fence_id, value)) if shared.fence_completed(fence_id) >= value => false,
                _ => {
                    in_flight = true;
                    false
                }
            }
        });
        if in_flight {
            shared
                .counters
                .unsafe_allocator_resets
                .fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockCommandList {
    pub allocator_id: u64,
    pub closed: bool,
    pub resets: u32,
}

impl CommandList for MockCommandList {
    fn reset(&mut self, allocator: &dyn CommandAllocator) -> Result<()> {
        let allocator = allocator
            .as_any()
            .downcast_ref::<MockCommandAllocator>()
            .ok_or_else(|| Error::InvalidResource("foreign command allocator".to_string()))?;
        if !self.closed {
            return Err(Error::InvalidState("command list reset while recording".to_string()));
        }
        self.allocator_id = allocator.id;
        self.closed = false;
        self.resets += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidState("command list already closed".to_string()));
        }
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    width: u32,
    height: u32,
    fullscreen: bool,
    buffer_count: u32,
    next_image: u32,
    shared: Arc<MockShared>,
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self) -> Result<u32> {
        self.shared.check_lost()?;
        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.buffer_count;
        Ok(image)
    }

    fn present(&mut self, image_index: u32) -> Result<()> {
        self.shared.check_lost()?;
        if image_index >= self.buffer_count {
            return Err(Error::InvalidResource(format!("image {} out of range", image_index)));
        }
        let failing = self.shared.failing_presents.load(Ordering::SeqCst);
        if failing > 0 {
            self.shared.failing_presents.store(failing - 1, Ordering::SeqCst);
            self.shared.counters.present_failures.fetch_add(1, Ordering::SeqCst);
            return Err(Error::BackendError("present failed".to_string()));
        }
        self.shared.counters.presents.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        self.next_image = 0;
        Ok(())
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<()> {
        self.fullscreen = fullscreen;
        Ok(())
    }

    fn buffer_count(&self) -> u32 {
        self.buffer_count
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

/// Mock device tracking created resources and a simulated GPU timeline
pub struct MockGraphicsDevice {
    shared: Arc<MockShared>,
}

impl MockGraphicsDevice {
    /// Device whose GPU completes every signal immediately
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MockShared {
                counters: MockCounters::default(),
                auto_complete: AtomicBool::new(true),
                device_lost: Mutex::new(None),
                removal_pending_report: Mutex::new(None),
                submissions: Mutex::new(Vec::new()),
                fences: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                fail_texture_creation: AtomicBool::new(false),
                fail_fence_creation: AtomicBool::new(false),
                failing_presents: AtomicU32::new(0),
                failing_signals: AtomicU32::new(0),
            }),
        }
    }

    /// Device whose GPU only progresses when the test completes signals
    pub fn manual() -> Self {
        let device = Self::new();
        device.set_auto_complete(false);
        device
    }

    pub fn set_auto_complete(&self, auto_complete: bool) {
        self.shared.auto_complete.store(auto_complete, Ordering::SeqCst);
    }

    /// Let every fence reach `value` (bounded by what was signaled)
    pub fn complete_up_to(&self, value: u64) {
        let fences: Vec<Arc<MockFence>> = self.shared.fences.lock().clone();
        for fence in fences {
            fence.complete_up_to(value);
        }
    }

    /// Let every fence reach its highest signaled value
    pub fn complete_all(&self) {
        self.complete_up_to(u64::MAX);
    }

    /// Simulate device removal; every pending and future wait fails
    pub fn lose_device(&self, reason: &str) {
        *self.shared.device_lost.lock() = Some(reason.to_string());
        let fences: Vec<Arc<MockFence>> = self.shared.fences.lock().clone();
        for fence in fences {
            fence.wake();
        }
    }

    /// Record a removal reason without failing any call
    ///
    /// Models a driver that reports the removal through
    /// `device_removed_reason` while calls keep returning generic errors.
    pub fn remove_device_silently(&self, reason: &str) {
        *self.shared.removal_pending_report.lock() = Some(reason.to_string());
    }

    /// Make the next `count` signals fail with a generic backend error
    pub fn fail_next_signals(&self, count: u32) {
        self.shared.failing_signals.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` presents fail with a transient error
    pub fn fail_next_presents(&self, count: u32) {
        self.shared.failing_presents.store(count, Ordering::SeqCst);
    }

    pub fn set_fail_texture_creation(&self, fail: bool) {
        self.shared.fail_texture_creation.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_fence_creation(&self, fail: bool) {
        self.shared.fail_fence_creation.store(fail, Ordering::SeqCst);
    }

    pub fn counters(&self) -> &MockCounters {
        &self.shared.counters
    }

    pub fn textures_created(&self) -> u64 {
        self.shared.counters.textures_created.load(Ordering::SeqCst)
    }

    pub fn textures_destroyed(&self) -> u64 {
        self.shared.counters.textures_destroyed.load(Ordering::SeqCst)
    }

    pub fn live_textures(&self) -> u64 {
        self.textures_created() - self.textures_destroyed()
    }

    pub fn presents(&self) -> u64 {
        self.shared.counters.presents.load(Ordering::SeqCst)
    }

    pub fn unsafe_allocator_resets(&self) -> u64 {
        self.shared.counters.unsafe_allocator_resets.load(Ordering::SeqCst)
    }

    /// Highest value signaled on any fence
    pub fn last_signaled(&self) -> u64 {
        self.shared
            .fences
            .lock()
            .iter()
            .map(|f| f.signaled_value())
            .max()
            .unwrap_or(0)
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_descriptor_heap(
        &self,
        kind: DescriptorKind,
        _capacity: u32,
        shader_visible: bool,
    ) -> Result<DescriptorHeapInfo> {
        self.shared.check_lost()?;
        self.shared.counters.heaps_created.fetch_add(1, Ordering::SeqCst);
        let slot = match kind {
            DescriptorKind::ShaderResource => 1,
            DescriptorKind::Sampler => 2,
            DescriptorKind::RenderTarget => 3,
            DescriptorKind::DepthStencil => 4,
        };
        Ok(DescriptorHeapInfo {
            cpu_base: CpuDescriptorHandle(slot << 32),
            gpu_base: shader_visible.then(|| GpuDescriptorHandle((slot << 40) | 0x1000)),
            increment: 32,
        })
    }

    fn create_texture(
        &self,
        desc: &RenderTargetDesc,
        _clear_value: Option<ClearValue>,
    ) -> Result<Arc<dyn Texture>> {
        self.shared.check_lost()?;
        if self.shared.fail_texture_creation.load(Ordering::SeqCst) {
            return Err(Error::OutOfMemory);
        }
        let id = self.shared.next_id();
        self.shared.counters.textures_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockTexture {
            desc: *desc,
            name: format!("texture_{}_{}x{}", id, desc.width, desc.height),
            shared: self.shared.clone(),
        }))
    }

    fn create_view(
        &self,
        kind: ViewKind,
        handle: CpuDescriptorHandle,
        texture: &dyn Texture,
    ) -> Result<()> {
        self.shared.check_lost()?;
        if handle == CpuDescriptorHandle::INVALID {
            return Err(Error::InvalidResource("view written to invalid handle".to_string()));
        }
        let is_depth = texture.desc().format.is_depth();
        match kind {
            ViewKind::RenderTarget if is_depth => {
                return Err(Error::InvalidResource(format!(
                    "render target view of depth texture '{}'",
                    texture.name()
                )))
            }
            ViewKind::DepthStencil if !is_depth => {
                return Err(Error::InvalidResource(format!(
                    "depth-stencil view of color texture '{}'",
                    texture.name()
                )))
            }
            _ => {}
        }
        self.shared.counters.views_written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_command_allocator(&self) -> Result<Box<dyn CommandAllocator>> {
        self.shared.check_lost()?;
        Ok(Box::new(MockCommandAllocator {
            id: self.shared.next_id(),
            shared: self.shared.clone(),
        }))
    }

    fn create_command_list(&self, allocator: &dyn CommandAllocator) -> Result<Box<dyn CommandList>> {
        self.shared.check_lost()?;
        let allocator = allocator
            .as_any()
            .downcast_ref::<MockCommandAllocator>()
            .ok_or_else(|| Error::InvalidResource("foreign command allocator".to_string()))?;
        Ok(Box::new(MockCommandList {
            allocator_id: allocator.id,
            closed: false,
            resets: 0,
        }))
    }

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>> {
        self.shared.check_lost()?;
        if self.shared.fail_fence_creation.load(Ordering::SeqCst) {
            return Err(Error::BackendError("fence creation failed".to_string()));
        }
        let fence = Arc::new(MockFence {
            id: self.shared.next_id(),
            completed: Mutex::new(initial_value),
            signaled: AtomicU64::new(initial_value),
            cond: Condvar::new(),
            shared: Arc::downgrade(&self.shared),
        });
        self.shared.fences.lock().push(fence.clone());
        Ok(fence)
    }

    fn execute_command_lists(&self, lists: &[&dyn CommandList]) -> Result<()> {
        self.shared.check_lost()?;
        let mut submissions = self.shared.submissions.lock();
        for list in lists {
            let list = list
                .as_any()
                .downcast_ref::<MockCommandList>()
                .ok_or_else(|| Error::InvalidResource("foreign command list".to_string()))?;
            if !list.closed {
                return Err(Error::InvalidState("executing an open command list".to_string()));
            }
            submissions.push(Submission {
                allocator_id: list.allocator_id,
                signal: None,
            });
            self.shared
                .counters
                .command_lists_executed
                .fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn signal(&self, fence: &dyn Fence, value: u64) -> Result<()> {
        self.shared.check_lost()?;
        let fence = fence
            .as_any()
            .downcast_ref::<MockFence>()
            .ok_or_else(|| Error::InvalidResource("foreign fence".to_string()))?;
        let failing = self.shared.failing_signals.load(Ordering::SeqCst);
        if failing > 0 {
            self.shared.failing_signals.store(failing - 1, Ordering::SeqCst);
            return Err(Error::BackendError("signal failed".to_string()));
        }
        fence.signaled.fetch_max(value, Ordering::SeqCst);
        for submission in self.shared.submissions.lock().iter_mut() {
            if submission.signal.is_none() {
                submission.signal = Some((fence.id, value));
            }
        }
        self.shared.counters.signals.fetch_add(1, Ordering::SeqCst);
        if self.shared.auto_complete.load(Ordering::SeqCst) {
            fence.complete_up_to(value);
        }
        Ok(())
    }

    fn create_swapchain(&self, surface: &SurfaceDesc, buffer_count: u32) -> Result<Box<dyn Swapchain>> {
        self.shared.check_lost()?;
        if surface.width == 0 || surface.height == 0 {
            return Err(Error::InitializationFailed(format!(
                "surface '{}' has zero size",
                surface.title
            )));
        }
        Ok(Box::new(MockSwapchain {
            width: surface.width,
            height: surface.height,
            fullscreen: surface.fullscreen,
            buffer_count,
            next_image: 0,
            shared: self.shared.clone(),
        }))
    }

    fn device_removed_reason(&self) -> Option<String> {
        self.shared
            .lost_reason()
            .or_else(|| self.shared.removal_pending_report.lock().clone())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
