//! Error types for the Galaxy3D GPU core
//!
//! This module defines the error type shared by the descriptor tables, the
//! frame pipeline, the render-target pool and the device composition root.
//!
//! Failures fall into four groups:
//! - fatal at boot: heap, queue or fence creation fails during `Device::initialize`
//! - recoverable by the caller: a pooled render target could not be created
//! - fatal at runtime: the GPU device was removed or reset (`DeviceLost`)
//! - programmer error: fixed descriptor budgets exhausted (these panic, they
//!   never reach this enum)

use thiserror::Error;

/// Result type for GPU core operations
pub type Result<T> = std::result::Result<T, Error>;

/// GPU core errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan, Direct3D 12, etc.)
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Out of GPU memory
    #[error("Out of GPU memory")]
    OutOfMemory,

    /// Invalid resource (texture, view, handle, etc.)
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Initialization failed (device, heaps, frame slots, swapchain)
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// The GPU device was removed or reset. Unrecoverable for the session.
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// Operation called in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Returns true for errors that end the session (device removed/reset)
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Error::DeviceLost(_))
    }
}

// ===== ERROR MACROS =====

/// Log an error and build an `Error::BackendError` from the formatted message
///
/// # Example
///
/// ```ignore
/// return Err(gpu_err!("galaxy3d::DescriptorTable", "heap {} missing", name));
/// ```
#[macro_export]
macro_rules! gpu_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::gpu_error!($source, "{}", message);
        $crate::galaxy3d::Error::BackendError(message)
    }};
}

/// Log an error and return early with `Error::BackendError`
///
/// # Example
///
/// ```ignore
/// if layer >= info.array_layers {
///     gpu_bail!("galaxy3d::mock", "layer {} out of range", layer);
/// }
/// ```
#[macro_export]
macro_rules! gpu_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::gpu_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
