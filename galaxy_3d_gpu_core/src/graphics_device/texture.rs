/// Render-target-shaped texture trait, descriptor and clear value

use std::hash::{Hash, Hasher};

use bitflags::bitflags;

/// Texture pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    // Color formats
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16G16B16A16_SFLOAT,
    R11G11B10_UFLOAT,
    R32_SFLOAT,

    // Depth/stencil formats
    D16_UNORM,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    /// Returns true for depth and depth/stencil formats
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM | TextureFormat::D32_FLOAT | TextureFormat::D24_UNORM_S8_UINT
        )
    }
}

bitflags! {
    /// Resource layout flags that take part in pool matching
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderTargetFlags: u32 {
        /// Resource may be bound for unordered (storage) access
        const UNORDERED_ACCESS = 1 << 0;
        /// Resource is never sampled; no shader resource view is created
        const DENY_SHADER_RESOURCE = 1 << 1;
        /// Resource may be accessed from several queues at once
        const SIMULTANEOUS_ACCESS = 1 << 2;
    }
}

/// Shape of a render-target-like resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// MSAA sample count (1 = no multisampling)
    pub sample_count: u32,
    /// Number of mip levels
    pub mip_levels: u32,
    /// Number of array slices
    pub array_size: u32,
    /// Layout flags
    pub flags: RenderTargetFlags,
}

impl RenderTargetDesc {
    /// Single-sampled, single-mip 2D target
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            sample_count: 1,
            mip_levels: 1,
            array_size: 1,
            flags: RenderTargetFlags::empty(),
        }
    }

    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_flags(mut self, flags: RenderTargetFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Optimized clear value baked into a render target at creation
///
/// Floats are compared and hashed by bit pattern so the value can take part
/// in pool keys.
#[derive(Debug, Clone, Copy)]
pub enum ClearValue {
    /// RGBA clear color
    Color([f32; 4]),
    /// Depth and stencil clear values
    DepthStencil { depth: f32, stencil: u8 },
}

impl PartialEq for ClearValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ClearValue::Color(a), ClearValue::Color(b)) => {
                a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (
                ClearValue::DepthStencil { depth: d0, stencil: s0 },
                ClearValue::DepthStencil { depth: d1, stencil: s1 },
            ) => d0.to_bits() == d1.to_bits() && s0 == s1,
            _ => false,
        }
    }
}

impl Eq for ClearValue {}

impl Hash for ClearValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ClearValue::Color(rgba) => {
                0u8.hash(state);
                for c in rgba {
                    c.to_bits().hash(state);
                }
            }
            ClearValue::DepthStencil { depth, stencil } => {
                1u8.hash(state);
                depth.to_bits().hash(state);
                stencil.hash(state);
            }
        }
    }
}

/// Native render-target resource
///
/// Implemented by backend-specific texture types. The native resource is
/// destroyed when the last `Arc` holding it is dropped, so callers that may
/// still have GPU work referencing it hand it to the deferred-release queue
/// instead of dropping it.
pub trait Texture: Send + Sync {
    /// Shape the resource was created with
    fn desc(&self) -> &RenderTargetDesc;

    /// Debug name
    fn name(&self) -> &str;
}
