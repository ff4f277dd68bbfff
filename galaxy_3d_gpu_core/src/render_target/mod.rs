//! Render target pool

mod render_target_pool;

pub use render_target_pool::{
    PooledRenderTarget, RenderTargetId, RenderTargetPool, RenderTargetPoolStats,
};
