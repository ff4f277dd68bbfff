//! Deferred release
//!
//! Native resources and descriptor slots dropped mid-session may still be
//! referenced by frames in flight; they wait here until N frames have retired.

mod deferred_release;

pub use deferred_release::{DeferredItem, DeferredReleaseQueue};
