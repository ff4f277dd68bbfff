/// GraphicsDevice trait - factory and queue interface of the native GPU API

use std::sync::Arc;

use crate::config::SurfaceDesc;
use crate::descriptor::{CpuDescriptorHandle, DescriptorKind, GpuDescriptorHandle};
use crate::error::{Error, Result};
use crate::graphics_device::{
    ClearValue, CommandAllocator, CommandList, Fence, RenderTargetDesc, Swapchain, Texture,
};

/// Base addresses of a native descriptor heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHeapInfo {
    /// CPU handle of descriptor 0
    pub cpu_base: CpuDescriptorHandle,
    /// GPU handle of descriptor 0 (shader-visible heaps only)
    pub gpu_base: Option<GpuDescriptorHandle>,
    /// Distance in bytes between two consecutive descriptors
    pub increment: u32,
}

/// Kind of view written into a descriptor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Color attachment view
    RenderTarget,
    /// Depth/stencil attachment view
    DepthStencil,
    /// Sampled view
    ShaderResource,
}

impl ViewKind {
    /// Descriptor table the view is written into
    pub fn descriptor_kind(&self) -> DescriptorKind {
        match self {
            ViewKind::RenderTarget => DescriptorKind::RenderTarget,
            ViewKind::DepthStencil => DescriptorKind::DepthStencil,
            ViewKind::ShaderResource => DescriptorKind::ShaderResource,
        }
    }
}

/// Native GPU device
///
/// Implemented by backend-specific devices. All methods take `&self`; the
/// backend is responsible for its own internal synchronization, as the
/// native APIs it wraps are free-threaded for these calls.
pub trait GraphicsDevice: Send + Sync {
    /// Create a descriptor heap holding `capacity` descriptors of `kind`
    fn create_descriptor_heap(
        &self,
        kind: DescriptorKind,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<DescriptorHeapInfo>;

    /// Create a render-target-shaped resource
    fn create_texture(
        &self,
        desc: &RenderTargetDesc,
        clear_value: Option<ClearValue>,
    ) -> Result<Arc<dyn Texture>>;

    /// Write a view of `texture` into the descriptor at `handle`
    fn create_view(
        &self,
        kind: ViewKind,
        handle: CpuDescriptorHandle,
        texture: &dyn Texture,
    ) -> Result<()>;

    /// Create a command allocator
    fn create_command_allocator(&self) -> Result<Box<dyn CommandAllocator>>;

    /// Create a command list recording into `allocator`
    ///
    /// The list is returned in the recording state.
    fn create_command_list(&self, allocator: &dyn CommandAllocator) -> Result<Box<dyn CommandList>>;

    /// Create a fence whose completed value starts at `initial_value`
    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>>;

    /// Submit closed command lists to the graphics queue
    fn execute_command_lists(&self, lists: &[&dyn CommandList]) -> Result<()>;

    /// Queue a signal of `fence` to `value` after all previously submitted work
    fn signal(&self, fence: &dyn Fence, value: u64) -> Result<()>;

    /// Create the swapchain for the presentation surface
    fn create_swapchain(&self, surface: &SurfaceDesc, buffer_count: u32) -> Result<Box<dyn Swapchain>>;

    /// Reason the device was removed or reset, if it was
    fn device_removed_reason(&self) -> Option<String>;

    /// Reclassify `error` as `DeviceLost` when the device reports removal
    ///
    /// Backends often surface a removed device as a generic failure on the
    /// call that hit it; the removal reason is authoritative.
    fn classify_error(&self, error: Error) -> Error {
        if error.is_device_lost() {
            return error;
        }
        match self.device_removed_reason() {
            Some(reason) => Error::DeviceLost(format!("{} (reported after: {})", reason, error)),
            None => error,
        }
    }
}
