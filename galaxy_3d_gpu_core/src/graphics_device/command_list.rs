/// Command allocator and command list traits

use std::any::Any;

use crate::error::Result;

/// Backing memory for recorded commands
///
/// One allocator per recording stream per frame slot. An allocator may only
/// be reset once the GPU has finished every command list recorded from it,
/// which the frame pipeline guarantees by waiting on the slot's completion
/// counter before the slot is reused.
pub trait CommandAllocator: Send + Sync {
    /// Reclaim the memory of every command recorded from this allocator
    fn reset(&mut self) -> Result<()>;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}

/// Command list recording GPU work
///
/// Command lists are not shared between threads while recording; each
/// logical recording stream owns its own list.
pub trait CommandList: Send + Sync {
    /// Start recording into memory owned by `allocator`
    fn reset(&mut self, allocator: &dyn CommandAllocator) -> Result<()>;

    /// Stop recording; the list can now be executed
    fn close(&mut self) -> Result<()>;

    /// Whether the list is closed (not recording)
    fn is_closed(&self) -> bool;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}
