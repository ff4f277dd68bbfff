/*!
# Galaxy 3D GPU Core

Low-level GPU resource and frame-pipeline manager for the Galaxy 3D renderer.

The native GPU API is reached through the `GraphicsDevice` trait family; this
crate layers on top of it the pieces every rendering pass shares:

- **DescriptorTable**: fixed-capacity persistent slots plus temporary ranges
  partitioned by frame, one table per descriptor kind
- **FramePipeline**: N frame slots in flight, command allocators reused only
  after the GPU retired them
- **DeferredReleaseQueue**: destruction delayed until the GPU can no longer
  reference a resource
- **RenderTargetPool**: reusable render targets keyed by shape and clear value
- **ParallelRenderCoordinator**: update/render thread handoff
- **Device**: composition root and frame loop, exposing an explicit `GpuContext`
  to each frame's callbacks through a `FrameContext`
*/

// Internal modules
mod config;
mod device;
mod error;
mod utils;
pub mod descriptor;
pub mod frame;
pub mod graphics_device;
pub mod log;
pub mod parallel;
pub mod release;
pub mod render_target;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::{DescriptorBudget, DeviceConfig, SurfaceDesc};

    // Composition root
    pub use crate::device::{
        Device, DeviceState, FrameContext, GpuContext, MessageHandler, WindowMessage,
    };

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{set_logger, reset_logger, DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Native device seam
    pub mod device {
        pub use crate::graphics_device::*;
    }

    pub mod descriptor {
        pub use crate::descriptor::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }

    pub mod release {
        pub use crate::release::*;
    }

    pub mod render_target {
        pub use crate::render_target::*;
    }

    pub mod parallel {
        pub use crate::parallel::*;
    }
}
