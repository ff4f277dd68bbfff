//! Update / render thread handoff

mod coordinator;

pub use coordinator::{ParallelRenderCoordinator, RenderState};
