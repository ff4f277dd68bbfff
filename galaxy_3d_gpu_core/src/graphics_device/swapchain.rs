/// Swapchain trait - for window presentation

use crate::error::Result;

/// Swapchain presenting rendered images to a window
pub trait Swapchain: Send + Sync {
    /// Acquire the index of the back buffer to render into this frame
    fn acquire_next_image(&mut self) -> Result<u32>;

    /// Present the image at `image_index`
    ///
    /// # Errors
    ///
    /// `Error::DeviceLost` when the device was removed or reset; any other
    /// error is transient and the frame loop continues.
    fn present(&mut self, image_index: u32) -> Result<()>;

    /// Recreate the back buffers at a new size
    ///
    /// The GPU must be idle: the caller drains it with `wait_for_gpu` first.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Switch between windowed and fullscreen presentation
    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<()>;

    /// Number of back buffers
    fn buffer_count(&self) -> u32;

    /// Width of the back buffers in pixels
    fn width(&self) -> u32;

    /// Height of the back buffers in pixels
    fn height(&self) -> u32;

    /// Whether presentation is fullscreen
    fn is_fullscreen(&self) -> bool;
}
