/// Device - composition root of the GPU core
///
/// Wires the descriptor tables, frame pipeline, deferred-release queue and
/// render-target pool into one `GpuContext`, and drives the frame loop:
///
/// ```text
/// Initialize -> { Ready -> Update -> Render -> Present -> Cleanup }* -> Release
/// ```
///
/// In parallel mode the render phase of frame K runs on a dedicated thread
/// while the update phase of frame K+1 runs on the caller's thread.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

use crate::config::{DeviceConfig, SurfaceDesc};
use crate::descriptor::{DescriptorKind, DescriptorSlot, DescriptorTables, TemporaryBlock};
use crate::error::{Error, Result};
use crate::frame::FramePipeline;
use crate::graphics_device::{
    ClearValue, CommandList, GraphicsDevice, RenderTargetDesc, Swapchain, Texture,
};
use crate::parallel::ParallelRenderCoordinator;
use crate::release::{DeferredItem, DeferredReleaseQueue};
use crate::render_target::{PooledRenderTarget, RenderTargetPool, RenderTargetPoolStats};

// ===== LIFECYCLE =====

/// Lifecycle state of a `Device`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Before `initialize` succeeded
    Uninitialized,
    /// All GPU objects created, no frame produced yet
    Initialized,
    /// Between frames; pending surface changes are applied here
    Ready,
    /// Application update running
    Update,
    /// Frame handed to the renderer
    Render,
    /// Presenting the rendered image
    Present,
    /// Ticking deferred releases and pool eviction
    Cleanup,
    /// A frame loop aborted on device loss or the GPU could not be drained
    /// afterwards; only `release` is accepted
    Failed,
    /// GPU drained and every resource destroyed
    Released,
}

/// Window events fed to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMessage {
    /// Client area resized
    Resized { width: u32, height: u32 },
    /// Fullscreen mode toggled
    FullscreenChanged(bool),
    /// The user asked to close the window
    CloseRequested,
}

/// Application callback receiving every posted window message
pub type MessageHandler = Box<dyn FnMut(&WindowMessage) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurfaceRequest {
    Resize { width: u32, height: u32 },
    Fullscreen(bool),
}

struct MessageInbox {
    handler: Mutex<Option<MessageHandler>>,
    pending: Mutex<Option<SurfaceRequest>>,
    close_requested: AtomicBool,
}

impl MessageInbox {
    fn post(&self, message: WindowMessage) {
        if let Some(handler) = self.handler.lock().as_mut() {
            handler(&message);
        }
        let request = match message {
            WindowMessage::Resized { width, height } => SurfaceRequest::Resize { width, height },
            WindowMessage::FullscreenChanged(fullscreen) => SurfaceRequest::Fullscreen(fullscreen),
            WindowMessage::CloseRequested => {
                self.close_requested.store(true, Ordering::Release);
                return;
            }
        };
        // Latest wins
        if let Some(previous) = self.pending.lock().replace(request) {
            crate::gpu_trace!(
                "galaxy3d::Device",
                "Surface request {:?} superseded by {:?}",
                previous,
                request
            );
        }
    }

    fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    fn take_pending(&self) -> Option<SurfaceRequest> {
        self.pending.lock().take()
    }

    fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }
}

// ===== GPU CONTEXT =====

/// Explicit context shared by every rendering pass
///
/// Reachable from the update thread and the render thread; every method
/// takes `&self`.
pub struct GpuContext {
    device: Arc<dyn GraphicsDevice>,
    config: DeviceConfig,
    descriptors: Arc<DescriptorTables>,
    frames: FramePipeline,
    release_queue: DeferredReleaseQueue,
    render_targets: RenderTargetPool,
    swapchain: Mutex<Box<dyn Swapchain>>,
    presentable: Mutex<Option<u32>>,
    frame_number: AtomicU64,
    messages: MessageInbox,
}

impl GpuContext {
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn descriptors(&self) -> &DescriptorTables {
        &self.descriptors
    }

    // ===== DESCRIPTORS =====

    pub fn allocate_persistent(&self, kind: DescriptorKind) -> DescriptorSlot {
        self.descriptors.allocate_persistent(kind)
    }

    /// Free a slot immediately
    ///
    /// Only when no submitted frame can reference it; use
    /// `retire_descriptor` otherwise.
    pub fn free_persistent(&self, kind: DescriptorKind, slot: &mut DescriptorSlot) {
        self.descriptors.free_persistent(kind, slot)
    }

    /// Free a slot once the frames in flight have retired
    pub fn retire_descriptor(&self, kind: DescriptorKind, slot: &mut DescriptorSlot) {
        assert!(slot.is_valid(), "retiring an invalid {:?} descriptor slot", kind);
        self.release_queue.push(DeferredItem::Descriptor {
            kind,
            index: slot.index(),
        });
        slot.invalidate();
    }

    // ===== RENDER TARGETS =====

    /// Acquire a pooled render target
    ///
    /// # Errors
    ///
    /// Returns the backend error if a new resource had to be created and
    /// creation failed; the caller may skip the pass.
    pub fn acquire_render_target(
        &self,
        desc: &RenderTargetDesc,
        clear_value: Option<ClearValue>,
    ) -> Result<PooledRenderTarget> {
        self.render_targets.acquire(desc, clear_value)
    }

    pub fn release_render_target(&self, target: PooledRenderTarget) {
        self.render_targets.release(target)
    }

    /// Take a render target out of the pool and destroy it once the frames
    /// in flight have retired
    pub fn retire_render_target(&self, target: PooledRenderTarget) {
        for item in self.render_targets.detach(target) {
            self.release_queue.push(item);
        }
    }

    /// Destroy a native resource once the frames in flight have retired
    pub fn retire_resource(&self, resource: Arc<dyn Texture>) {
        self.release_queue.push(DeferredItem::Resource(resource));
    }

    pub fn render_target_stats(&self) -> RenderTargetPoolStats {
        self.render_targets.stats()
    }

    /// Items waiting in the deferred-release queue
    pub fn pending_releases(&self) -> usize {
        self.release_queue.len()
    }

    // ===== FRAME =====

    /// Index of the current frame slot
    pub fn frame_index(&self) -> usize {
        self.frames.frame_index()
    }

    /// Recording target of `stream` for the current frame
    pub fn command_list(&self, stream: usize) -> MutexGuard<'_, Box<dyn CommandList>> {
        self.frames.command_list(stream)
    }

    /// Close and submit the list of `stream`
    pub fn execute_command_list(&self, stream: usize) -> Result<()> {
        self.frames.execute_command_list(stream)
    }

    /// Number of frames produced so far
    pub fn frame_number(&self) -> u64 {
        self.frame_number.load(Ordering::Acquire)
    }

    /// Current swapchain size
    pub fn surface_size(&self) -> (u32, u32) {
        let swapchain = self.swapchain.lock();
        (swapchain.width(), swapchain.height())
    }

    /// Block until the GPU has drained every submitted frame
    pub fn wait_for_gpu(&self) -> Result<()> {
        self.frames.wait_for_gpu()
    }

    /// Per-frame maintenance: age deferred releases and idle render targets
    pub fn cleanup(&self, elapsed: Duration) {
        let destroyed = self.release_queue.tick(&self.descriptors);
        let evicted = self.render_targets.tick(elapsed);
        if destroyed > 0 || evicted > 0 {
            crate::gpu_trace!(
                "galaxy3d::Device",
                "Cleanup: {} deferred items destroyed, {} render targets evicted",
                destroyed,
                evicted
            );
        }
    }

    /// Forward a window message (callable from either thread)
    ///
    /// The message handler runs under a lock and must not post messages itself.
    pub fn post_message(&self, message: WindowMessage) {
        self.messages.post(message)
    }

    /// Acquire the back buffer and prepare the current slot for recording
    fn begin_frame(&self) -> Result<()> {
        let image = self.swapchain.lock().acquire_next_image()?;
        *self.presentable.lock() = Some(image);
        self.frames.begin_frame()
    }

    /// Advance to the next slot and release the temporary descriptors of
    /// the frame the GPU just retired
    fn finish_frame(&self, frame: u64) -> Result<()> {
        self.frames.move_to_next_frame()?;
        // move_to_next_frame waited for frame + 1 - N
        let frames_in_flight = u64::from(self.config.frames_in_flight);
        if let Some(retired) = (frame + 1).checked_sub(frames_in_flight) {
            self.descriptors.end_frame(retired);
        }
        self.frame_number.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn frame_context(self: &Arc<Self>, frame: u64) -> FrameContext {
        FrameContext {
            context: self.clone(),
            frame,
        }
    }

    /// One frame's render submission
    fn render_frame<R>(self: &Arc<Self>, render: &mut R) -> Result<()>
    where
        R: FnMut(&FrameContext) -> Result<()>,
    {
        let frame = self.frame_context(self.frame_number());
        self.begin_frame()
            .and_then(|()| render(&frame))
            .and_then(|()| self.finish_frame(frame.frame))
            .map_err(|e| self.device.classify_error(e))
    }

    /// Present the image rendered by the last frame
    ///
    /// Device loss, reported by the call or by the device, is returned; any
    /// other failure is logged and swallowed.
    fn present(&self) -> Result<()> {
        let Some(image) = self.presentable.lock().take() else {
            return Ok(());
        };
        let presented = self.swapchain.lock().present(image);
        match presented.map_err(|e| self.device.classify_error(e)) {
            Ok(()) => Ok(()),
            Err(e) if e.is_device_lost() => {
                crate::gpu_error!(
                    "galaxy3d::Device",
                    "Present failed, device lost: {}",
                    e
                );
                Err(e)
            }
            Err(e) => {
                crate::gpu_warn!("galaxy3d::Device", "Present failed, skipping frame: {}", e);
                Ok(())
            }
        }
    }
}

// ===== FRAME CONTEXT =====

/// The `GpuContext` as seen by the update and render callbacks of one frame
///
/// Carries the number of the frame being produced. In parallel mode the
/// update of frame K+1 and the render of frame K run at the same time; each
/// allocates temporary descriptors from its own frame's range.
pub struct FrameContext {
    context: Arc<GpuContext>,
    frame: u64,
}

impl FrameContext {
    /// Number of the frame this context produces
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    /// Allocate `count` contiguous temporary descriptors for this frame
    ///
    /// Valid until the GPU has finished executing the frame.
    ///
    /// # Panics
    ///
    /// Panics when the frame's temporary budget is exhausted.
    pub fn allocate_temporary(&self, kind: DescriptorKind, count: u32) -> TemporaryBlock {
        self.context
            .descriptors
            .allocate_temporary(kind, self.frame, count)
    }
}

impl Deref for FrameContext {
    type Target = GpuContext;

    fn deref(&self) -> &GpuContext {
        &self.context
    }
}

// ===== DEVICE =====

/// Update and cleanup timing of the frame loop
struct FrameClock {
    last_update: Instant,
    last_cleanup: Instant,
}

impl FrameClock {
    fn start() -> Self {
        let now = Instant::now();
        Self {
            last_update: now,
            last_cleanup: now,
        }
    }

    /// Time since the previous update
    fn update(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update);
        self.last_update = now;
        elapsed
    }

    /// Time since the previous cleanup
    fn cleanup(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_cleanup);
        self.last_cleanup = now;
        elapsed
    }
}

/// Owner of the `GpuContext` and the frame loop
pub struct Device {
    context: Arc<GpuContext>,
    state: DeviceState,
}

impl Device {
    /// Log an initialization failure before returning it
    fn log_and_return_error(error: Error) -> Error {
        crate::gpu_error!("galaxy3d::Device", "Initialization failed: {}", error);
        error
    }

    /// Create every GPU object the frame pipeline needs
    ///
    /// # Errors
    ///
    /// Any creation failure aborts initialization; objects created so far are
    /// dropped before the error is returned.
    pub fn initialize(
        device: Arc<dyn GraphicsDevice>,
        surface: SurfaceDesc,
        config: DeviceConfig,
        handler: Option<MessageHandler>,
    ) -> Result<Self> {
        config.validate().map_err(Self::log_and_return_error)?;
        if surface.width == 0 || surface.height == 0 {
            return Err(Self::log_and_return_error(Error::InitializationFailed(format!(
                "surface '{}' has zero size ({}x{})",
                surface.title, surface.width, surface.height
            ))));
        }

        let descriptors = Arc::new(
            DescriptorTables::new(device.as_ref(), &config).map_err(Self::log_and_return_error)?,
        );
        let frames = FramePipeline::new(
            device.clone(),
            config.frames_in_flight,
            config.command_streams,
        )
        .map_err(Self::log_and_return_error)?;
        let swapchain = device
            .create_swapchain(&surface, config.frames_in_flight.max(2))
            .map_err(Self::log_and_return_error)?;

        let release_queue = DeferredReleaseQueue::new(config.frames_in_flight);
        let render_targets = RenderTargetPool::new(
            device.clone(),
            descriptors.clone(),
            config.frames_in_flight,
            config.render_target_idle_threshold,
        );

        crate::gpu_info!(
            "galaxy3d::Device",
            "'{}' initialized: {}x{}{}, {} frames in flight, {} render mode",
            config.app_name,
            surface.width,
            surface.height,
            if surface.fullscreen { " fullscreen" } else { "" },
            config.frames_in_flight,
            if config.parallel_render { "parallel" } else { "sequential" }
        );

        let context = Arc::new(GpuContext {
            device,
            config,
            descriptors,
            frames,
            release_queue,
            render_targets,
            swapchain: Mutex::new(swapchain),
            presentable: Mutex::new(None),
            frame_number: AtomicU64::new(0),
            messages: MessageInbox {
                handler: Mutex::new(handler),
                pending: Mutex::new(None),
                close_requested: AtomicBool::new(false),
            },
        });

        Ok(Self {
            context,
            state: DeviceState::Initialized,
        })
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    /// Number of frames produced so far
    pub fn frames_produced(&self) -> u64 {
        self.context.frame_number()
    }

    /// Forward a window message to the handler and queue its surface change
    pub fn post_message(&self, message: WindowMessage) {
        self.context.post_message(message)
    }

    /// Per-frame maintenance (see `GpuContext::cleanup`)
    pub fn cleanup(&mut self, elapsed: Duration) {
        self.state = DeviceState::Cleanup;
        self.context.cleanup(elapsed);
    }

    /// Drive the frame loop
    ///
    /// `update` runs on the calling thread once per frame with the time
    /// elapsed since the previous update; returning `false` ends the loop.
    /// `render` records and submits one frame; in parallel mode it runs on
    /// the render thread. The loop also ends on `WindowMessage::CloseRequested`.
    ///
    /// After a failed run the GPU is drained before the device accepts
    /// another one. Device loss, or a failed drain, moves the device to
    /// `DeviceState::Failed`.
    ///
    /// # Errors
    ///
    /// Returns the first render or present error classified as fatal
    /// (device loss) or any error returned by `render`.
    pub fn run<U, R>(&mut self, update: U, render: R) -> Result<()>
    where
        U: FnMut(&FrameContext, Duration) -> bool,
        R: FnMut(&FrameContext) -> Result<()> + Send + 'static,
    {
        match self.state {
            DeviceState::Initialized | DeviceState::Ready => {}
            state => {
                return Err(Error::InvalidState(format!(
                    "run called in state {:?}",
                    state
                )))
            }
        }

        let result = if self.context.config.parallel_render {
            self.run_parallel(update, render)
        } else {
            self.run_sequential(update, render)
        };

        match &result {
            Ok(()) => {
                self.state = DeviceState::Ready;
                crate::gpu_info!(
                    "galaxy3d::Device",
                    "Frame loop ended after {} frames",
                    self.frames_produced()
                );
            }
            Err(e) => {
                crate::gpu_error!("galaxy3d::Device", "Frame loop aborted: {}", e);
                self.state = self.recover(e);
            }
        }
        result
    }

    /// Settle the GPU after a failed run
    ///
    /// The aborted frame may have submitted work without signaling its slot.
    fn recover(&self, error: &Error) -> DeviceState {
        if error.is_device_lost() {
            return DeviceState::Failed;
        }
        match self.context.wait_for_gpu() {
            Ok(()) => {
                *self.context.presentable.lock() = None;
                self.context.descriptors.reset_temporary();
                DeviceState::Ready
            }
            Err(e) => {
                crate::gpu_error!(
                    "galaxy3d::Device",
                    "GPU drain after aborted frame loop failed: {}",
                    e
                );
                DeviceState::Failed
            }
        }
    }

    fn run_sequential<U, R>(&mut self, mut update: U, mut render: R) -> Result<()>
    where
        U: FnMut(&FrameContext, Duration) -> bool,
        R: FnMut(&FrameContext) -> Result<()>,
    {
        let mut clock = FrameClock::start();
        loop {
            self.state = DeviceState::Ready;
            self.apply_surface_change()?;
            if self.context.messages.close_requested() {
                return Ok(());
            }

            let elapsed = clock.update();
            let frame = self.context.frame_context(self.context.frame_number());

            self.state = DeviceState::Update;
            if !update(&frame, elapsed) {
                return Ok(());
            }

            self.state = DeviceState::Render;
            self.context.render_frame(&mut render)?;

            self.state = DeviceState::Present;
            self.context.present()?;

            self.cleanup(clock.cleanup());
        }
    }

    fn run_parallel<U, R>(&mut self, mut update: U, mut render: R) -> Result<()>
    where
        U: FnMut(&FrameContext, Duration) -> bool,
        R: FnMut(&FrameContext) -> Result<()> + Send + 'static,
    {
        let context = self.context.clone();
        let mut coordinator =
            ParallelRenderCoordinator::spawn(move || context.render_frame(&mut render))?;

        let mut clock = FrameClock::start();
        let mut in_flight = false;
        let result = self.parallel_loop(&coordinator, &mut update, &mut clock, &mut in_flight);

        // Present the frame still rendering when the loop ended
        let drained = if in_flight {
            self.complete_frame(&coordinator, &mut clock)
        } else {
            Ok(())
        };
        coordinator.shutdown();
        result.and(drained)
    }

    fn parallel_loop<U>(
        &mut self,
        coordinator: &ParallelRenderCoordinator,
        update: &mut U,
        clock: &mut FrameClock,
        in_flight: &mut bool,
    ) -> Result<()>
    where
        U: FnMut(&FrameContext, Duration) -> bool,
    {
        // No frame is in flight yet, so every frame before this one is done
        let mut next_frame = self.context.frame_number();
        loop {
            self.state = DeviceState::Ready;
            if self.context.messages.has_pending() {
                // The swapchain cannot change under a frame still rendering
                if std::mem::take(in_flight) {
                    self.complete_frame(coordinator, clock)?;
                }
                self.apply_surface_change()?;
            }
            if self.context.messages.close_requested() {
                return Ok(());
            }

            let elapsed = clock.update();
            let frame = self.context.frame_context(next_frame);

            // Runs while the previous frame renders
            self.state = DeviceState::Update;
            if !update(&frame, elapsed) {
                return Ok(());
            }

            if std::mem::take(in_flight) {
                self.complete_frame(coordinator, clock)?;
            }

            self.state = DeviceState::Render;
            coordinator.kick();
            *in_flight = true;
            next_frame += 1;
        }
    }

    /// Wait for the render thread, then present and clean up its frame
    fn complete_frame(
        &mut self,
        coordinator: &ParallelRenderCoordinator,
        clock: &mut FrameClock,
    ) -> Result<()> {
        coordinator.wait_idle()?;

        self.state = DeviceState::Present;
        self.context.present()?;

        self.cleanup(clock.cleanup());
        Ok(())
    }

    /// Apply the pending resize or fullscreen change, if any
    fn apply_surface_change(&mut self) -> Result<()> {
        let Some(request) = self.context.messages.take_pending() else {
            return Ok(());
        };

        if let SurfaceRequest::Resize { width: 0, .. } | SurfaceRequest::Resize { height: 0, .. } =
            request
        {
            crate::gpu_debug!("galaxy3d::Device", "Ignoring zero-size resize (minimized)");
            return Ok(());
        }

        self.context.wait_for_gpu()?;
        let trimmed = self.context.render_targets.trim_idle();

        let mut swapchain = self.context.swapchain.lock();
        match request {
            SurfaceRequest::Resize { width, height } => swapchain.resize(width, height)?,
            SurfaceRequest::Fullscreen(fullscreen) => swapchain.set_fullscreen(fullscreen)?,
        }

        crate::gpu_info!(
            "galaxy3d::Device",
            "Surface now {}x{}{} ({} idle render targets trimmed)",
            swapchain.width(),
            swapchain.height(),
            if swapchain.is_fullscreen() { " fullscreen" } else { "" },
            trimmed
        );
        Ok(())
    }

    /// Drain the GPU and destroy everything
    ///
    /// Device loss during the final drain is reported, but CPU-side cleanup
    /// still happens since no further GPU work can execute. Any other drain
    /// failure leaves the GPU possibly busy: pending resources are leaked
    /// instead of destroyed.
    pub fn release(&mut self) -> Result<()> {
        if self.state == DeviceState::Released {
            return Ok(());
        }

        let drained = self.context.wait_for_gpu();
        match &drained {
            Err(e) if !e.is_device_lost() => {
                let leaked = self.context.release_queue.abandon();
                let abandoned = self.context.render_targets.abandon();
                crate::gpu_error!(
                    "galaxy3d::Device",
                    "GPU drain failed during release, leaking {} deferred items and {} render targets: {}",
                    leaked,
                    abandoned,
                    e
                );
            }
            _ => {
                if let Err(e) = &drained {
                    crate::gpu_warn!("galaxy3d::Device", "GPU drain failed during release: {}", e);
                }
                let released = self.context.release_queue.drain(&self.context.descriptors);
                let cleared = self.context.render_targets.clear();
                crate::gpu_info!(
                    "galaxy3d::Device",
                    "Released after {} frames ({} deferred items, {} render targets destroyed)",
                    self.frames_produced(),
                    released,
                    cleared
                );
            }
        }
        self.state = DeviceState::Released;
        drained
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // Errors were already logged by release
        let _ = self.release();
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
