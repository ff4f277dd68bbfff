/// One descriptor table per descriptor kind

use crate::config::DeviceConfig;
use crate::descriptor::{DescriptorKind, DescriptorSlot, DescriptorTable, TemporaryBlock};
use crate::error::Result;
use crate::graphics_device::GraphicsDevice;

/// The set of descriptor tables owned by a `GpuContext`
pub struct DescriptorTables {
    shader_resource: DescriptorTable,
    sampler: DescriptorTable,
    render_target: DescriptorTable,
    depth_stencil: DescriptorTable,
}

impl DescriptorTables {
    /// Create every table with the capacities from `config`
    pub fn new(device: &dyn GraphicsDevice, config: &DeviceConfig) -> Result<Self> {
        let budget = &config.persistent_descriptors;
        let temporary = config.temporary_descriptors;
        // Frames in flight plus the frame being updated
        let partitions = config.frames_in_flight.saturating_add(1);
        let table = |kind: DescriptorKind| {
            DescriptorTable::new(device, kind, budget.capacity(kind), temporary, partitions)
        };
        Ok(Self {
            shader_resource: table(DescriptorKind::ShaderResource)?,
            sampler: table(DescriptorKind::Sampler)?,
            render_target: table(DescriptorKind::RenderTarget)?,
            depth_stencil: table(DescriptorKind::DepthStencil)?,
        })
    }

    /// Table for `kind`
    pub fn table(&self, kind: DescriptorKind) -> &DescriptorTable {
        match kind {
            DescriptorKind::ShaderResource => &self.shader_resource,
            DescriptorKind::Sampler => &self.sampler,
            DescriptorKind::RenderTarget => &self.render_target,
            DescriptorKind::DepthStencil => &self.depth_stencil,
        }
    }

    pub fn allocate_persistent(&self, kind: DescriptorKind) -> DescriptorSlot {
        self.table(kind).allocate_persistent()
    }

    pub fn free_persistent(&self, kind: DescriptorKind, slot: &mut DescriptorSlot) {
        self.table(kind).free_persistent(slot)
    }

    pub fn allocate_temporary(
        &self,
        kind: DescriptorKind,
        frame: u64,
        count: u32,
    ) -> TemporaryBlock {
        self.table(kind).allocate_temporary(frame, count)
    }

    /// Release the temporary ranges of `frame` in every table
    pub fn end_frame(&self, frame: u64) {
        for kind in DescriptorKind::ALL {
            self.table(kind).end_frame(frame);
        }
    }

    /// Release every temporary range of every table
    pub fn reset_temporary(&self) {
        for kind in DescriptorKind::ALL {
            self.table(kind).reset_temporary();
        }
    }
}
