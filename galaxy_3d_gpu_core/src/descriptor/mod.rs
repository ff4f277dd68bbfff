//! Descriptor tables
//!
//! Fixed-capacity slot allocators producing stable indices and handles for
//! GPU-visible resource views. Each descriptor kind gets its own table; the
//! shader-visible tables also carry a per-frame temporary range.

mod descriptor_handle;
mod descriptor_table;
mod descriptor_tables;

pub use descriptor_handle::{
    CpuDescriptorHandle, DescriptorKind, DescriptorSlot, GpuDescriptorHandle, TemporaryBlock,
};
pub use descriptor_table::{DescriptorTable, DescriptorTableStats};
pub use descriptor_tables::DescriptorTables;
