/// Descriptor kinds, handles, persistent slots and temporary blocks

/// Descriptor table kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// Shader resource / constant / unordered access views
    ShaderResource,
    /// Samplers
    Sampler,
    /// Render target views
    RenderTarget,
    /// Depth-stencil views
    DepthStencil,
}

impl DescriptorKind {
    /// Every kind, in table order
    pub const ALL: [DescriptorKind; 4] = [
        DescriptorKind::ShaderResource,
        DescriptorKind::Sampler,
        DescriptorKind::RenderTarget,
        DescriptorKind::DepthStencil,
    ];

    /// Whether tables of this kind are bound to shaders (and therefore have a
    /// GPU handle and a temporary range)
    pub fn is_shader_visible(&self) -> bool {
        matches!(self, DescriptorKind::ShaderResource | DescriptorKind::Sampler)
    }
}

/// CPU-side descriptor address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuDescriptorHandle(pub u64);

impl CpuDescriptorHandle {
    /// Sentinel for freed or never-allocated slots
    pub const INVALID: CpuDescriptorHandle = CpuDescriptorHandle(u64::MAX);

    /// Handle `index` descriptors past `self`
    pub fn offset(self, index: u32, increment: u32) -> Self {
        Self(self.0 + u64::from(index) * u64::from(increment))
    }
}

/// GPU-visible descriptor address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuDescriptorHandle(pub u64);

impl GpuDescriptorHandle {
    /// Handle `index` descriptors past `self`
    pub fn offset(self, index: u32, increment: u32) -> Self {
        Self(self.0 + u64::from(index) * u64::from(increment))
    }
}

/// A persistent descriptor slot owned by its `DescriptorTable`
///
/// The slot stays at the same index until it is freed. Freeing resets the
/// caller's slot to the invalid sentinel, so a freed slot cannot be freed
/// twice through the same value.
#[derive(Debug, PartialEq, Eq)]
pub struct DescriptorSlot {
    pub(crate) index: u32,
    pub(crate) cpu: CpuDescriptorHandle,
    pub(crate) gpu: Option<GpuDescriptorHandle>,
}

impl DescriptorSlot {
    /// Sentinel index of a freed slot
    pub const INVALID_INDEX: u32 = u32::MAX;

    /// A slot that refers to nothing
    pub fn invalid() -> Self {
        Self {
            index: Self::INVALID_INDEX,
            cpu: CpuDescriptorHandle::INVALID,
            gpu: None,
        }
    }

    /// Index inside the owning table
    pub fn index(&self) -> u32 {
        self.index
    }

    /// CPU handle of the slot
    pub fn cpu_handle(&self) -> CpuDescriptorHandle {
        self.cpu
    }

    /// GPU handle of the slot (shader-visible tables only)
    pub fn gpu_handle(&self) -> Option<GpuDescriptorHandle> {
        self.gpu
    }

    /// Whether the slot is live
    pub fn is_valid(&self) -> bool {
        self.index != Self::INVALID_INDEX
    }

    pub(crate) fn invalidate(&mut self) {
        *self = Self::invalid();
    }
}

impl Default for DescriptorSlot {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Contiguous range of temporary descriptors valid until the owning table
/// ends its frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporaryBlock {
    /// First index of the range (inside the table's index space)
    pub first_index: u32,
    /// Number of descriptors in the range
    pub count: u32,
    /// CPU handle of the first descriptor
    pub cpu_start: CpuDescriptorHandle,
    /// GPU handle of the first descriptor
    pub gpu_start: Option<GpuDescriptorHandle>,
    pub(crate) increment: u32,
}

impl TemporaryBlock {
    /// CPU handle of the `i`-th descriptor of the block
    pub fn cpu_handle(&self, i: u32) -> CpuDescriptorHandle {
        assert!(i < self.count, "temporary descriptor {} out of block of {}", i, self.count);
        self.cpu_start.offset(i, self.increment)
    }

    /// GPU handle of the `i`-th descriptor of the block
    pub fn gpu_handle(&self, i: u32) -> Option<GpuDescriptorHandle> {
        assert!(i < self.count, "temporary descriptor {} out of block of {}", i, self.count);
        self.gpu_start.map(|start| start.offset(i, self.increment))
    }

    /// One past the last index of the range
    pub fn end_index(&self) -> u32 {
        self.first_index + self.count
    }
}
