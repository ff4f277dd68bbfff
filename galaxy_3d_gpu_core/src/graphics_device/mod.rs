/// Graphics device module - the native GPU API seam
///
/// Everything the frame-pipeline core needs from the driver goes through
/// these traits. Backends (Direct3D 12, Vulkan) implement them; unit tests
/// run against `MockGraphicsDevice`.

pub mod graphics_device;
pub mod texture;
pub mod command_list;
pub mod fence;
pub mod swapchain;

pub use graphics_device::*;
pub use texture::*;
pub use command_list::*;
pub use fence::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
