/// Fence trait - monotonic GPU completion counter

use std::any::Any;

use crate::error::Result;

/// A monotonically increasing counter advanced by the GPU timeline
///
/// The queue signals a value with `GraphicsDevice::signal` once all work
/// submitted before the signal has executed. This is the only primitive used
/// to synchronize the CPU with the GPU.
pub trait Fence: Send + Sync {
    /// Last value the GPU has reached
    ///
    /// # Errors
    ///
    /// `Error::DeviceLost` if the device has been removed.
    fn completed_value(&self) -> Result<u64>;

    /// Block the calling thread until the GPU reaches `value`
    ///
    /// # Errors
    ///
    /// `Error::DeviceLost` if the device is removed while waiting.
    fn wait(&self, value: u64) -> Result<()>;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}
