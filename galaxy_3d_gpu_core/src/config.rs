/// Device configuration and presentation surface description

use std::time::Duration;

use crate::descriptor::DescriptorKind;
use crate::error::{Error, Result};

/// Persistent descriptor capacity per descriptor kind
///
/// Capacities are boot-time budgets: running out of persistent slots is a
/// programming error and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBudget {
    /// Shader resource views (textures, buffers)
    pub shader_resource: u32,
    /// Samplers
    pub sampler: u32,
    /// Render target views
    pub render_target: u32,
    /// Depth-stencil views
    pub depth_stencil: u32,
}

impl DescriptorBudget {
    /// Capacity for the given descriptor kind
    pub fn capacity(&self, kind: DescriptorKind) -> u32 {
        match kind {
            DescriptorKind::ShaderResource => self.shader_resource,
            DescriptorKind::Sampler => self.sampler,
            DescriptorKind::RenderTarget => self.render_target,
            DescriptorKind::DepthStencil => self.depth_stencil,
        }
    }
}

impl Default for DescriptorBudget {
    fn default() -> Self {
        Self {
            shader_resource: 4096,
            sampler: 128,
            render_target: 256,
            depth_stencil: 64,
        }
    }
}

/// Device configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Number of frames that may be in flight on the GPU (N)
    pub frames_in_flight: u32,
    /// Persistent descriptor capacity per kind
    pub persistent_descriptors: DescriptorBudget,
    /// Temporary capacity per frame of each shader-visible table
    pub temporary_descriptors: u32,
    /// Number of independent command recording streams per frame slot
    pub command_streams: u32,
    /// How long a pooled render target may sit idle (after N idle frames)
    /// before it is destroyed
    pub render_target_idle_threshold: Duration,
    /// Render on a dedicated thread while the next frame updates
    pub parallel_render: bool,
    /// Enable validation/debug layers in the backend
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            persistent_descriptors: DescriptorBudget::default(),
            temporary_descriptors: 8192,
            command_streams: 2,
            render_target_idle_threshold: Duration::from_secs(5),
            parallel_render: true,
            enable_validation: cfg!(debug_assertions),
            app_name: "Galaxy3D Application".to_string(),
        }
    }
}

impl DeviceConfig {
    /// Check the configuration before any GPU object is created
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.command_streams == 0 {
            return Err(Error::InitializationFailed(
                "command_streams must be at least 1".to_string(),
            ));
        }
        for kind in DescriptorKind::ALL {
            if !kind.is_shader_visible() {
                continue;
            }
            // One temporary partition per frame in flight plus the frame being updated
            let persistent = self.persistent_descriptors.capacity(kind);
            let capacity = self
                .frames_in_flight
                .checked_add(1)
                .and_then(|partitions| partitions.checked_mul(self.temporary_descriptors))
                .and_then(|temporary| temporary.checked_add(persistent));
            if capacity.is_none() {
                return Err(Error::InitializationFailed(format!(
                    "{:?} table capacity overflows: {} persistent + {} x {} temporary",
                    kind,
                    persistent,
                    self.frames_in_flight.saturating_add(1),
                    self.temporary_descriptors
                )));
            }
        }
        Ok(())
    }
}

/// Presentation surface description passed to `Device::initialize`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Start in fullscreen mode
    pub fullscreen: bool,
    /// Window title
    pub title: String,
}

impl SurfaceDesc {
    pub fn new(width: u32, height: u32, fullscreen: bool, title: &str) -> Self {
        Self {
            width,
            height,
            fullscreen,
            title: title.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
