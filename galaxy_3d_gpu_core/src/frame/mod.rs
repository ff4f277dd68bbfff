//! Frames in flight
//!
//! `FramePipeline` owns the frame slots, the command recording streams and the
//! completion fence that keeps the CPU at most N frames ahead of the GPU.

mod frame_pipeline;

pub use frame_pipeline::{FramePipeline, FrameSlot};
