/// Render target pool
///
/// Keyed cache of render-target-shaped resources. Entries are stored in a
/// slotmap and indexed by a structural hash of their shape and clear value:
///
/// ```text
/// buckets: hash(desc, clear) -> [RenderTargetId, ...]
/// entries: RenderTargetId    -> PoolEntry { texture, views, in_use, idle counters }
/// ```
///
/// An idle entry first counts `frames_in_flight` cleanup ticks (after which
/// no submitted frame can reference it), then accumulates elapsed time, and
/// is evicted once that time exceeds the idle threshold.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHasher};
use slotmap::{new_key_type, SlotMap};

use crate::descriptor::{
    CpuDescriptorHandle, DescriptorKind, DescriptorSlot, DescriptorTables, GpuDescriptorHandle,
};
use crate::error::Result;
use crate::graphics_device::{
    ClearValue, GraphicsDevice, RenderTargetDesc, RenderTargetFlags, Texture, ViewKind,
};
use crate::release::DeferredItem;

new_key_type! {
    /// Stable identity of a pool entry
    pub struct RenderTargetId;
}

/// Pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderTargetPoolStats {
    /// Entries currently owned by the pool
    pub entries: usize,
    /// Entries handed out and not yet released
    pub in_use: usize,
    /// Resources created on a pool miss
    pub created: u64,
    /// Acquisitions served from an idle entry
    pub reused: u64,
    /// Entries destroyed by eviction, trimming or clearing
    pub evicted: u64,
}

/// Exclusive handle to an acquired render target
///
/// Returned to the pool with [`RenderTargetPool::release`]. The handle holds
/// a reference to the native resource, so dropping it without releasing only
/// leaks the pool entry, never the resource.
pub struct PooledRenderTarget {
    id: RenderTargetId,
    texture: Arc<dyn Texture>,
    view: CpuDescriptorHandle,
    shader_resource_index: Option<u32>,
    shader_resource_gpu: Option<GpuDescriptorHandle>,
}

impl PooledRenderTarget {
    pub fn id(&self) -> RenderTargetId {
        self.id
    }

    pub fn texture(&self) -> &Arc<dyn Texture> {
        &self.texture
    }

    pub fn desc(&self) -> &RenderTargetDesc {
        self.texture.desc()
    }

    /// Render target view, or depth-stencil view for depth formats
    pub fn view(&self) -> CpuDescriptorHandle {
        self.view
    }

    /// Index of the shader resource view in the shader-resource table
    ///
    /// `None` when the target was created with `DENY_SHADER_RESOURCE`.
    pub fn shader_resource_index(&self) -> Option<u32> {
        self.shader_resource_index
    }

    pub fn shader_resource_gpu_handle(&self) -> Option<GpuDescriptorHandle> {
        self.shader_resource_gpu
    }
}

impl fmt::Debug for PooledRenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledRenderTarget")
            .field("id", &self.id)
            .field("texture", &self.texture.name())
            .field("view", &self.view)
            .field("shader_resource_index", &self.shader_resource_index)
            .finish()
    }
}

struct PoolEntry {
    key: u64,
    desc: RenderTargetDesc,
    clear_value: Option<ClearValue>,
    texture: Arc<dyn Texture>,
    view_kind: DescriptorKind,
    view: DescriptorSlot,
    shader_resource: Option<DescriptorSlot>,
    in_use: bool,
    idle_frames: u32,
    idle_time: Duration,
}

impl PoolEntry {
    fn handle(&self, id: RenderTargetId) -> PooledRenderTarget {
        PooledRenderTarget {
            id,
            texture: self.texture.clone(),
            view: self.view.cpu_handle(),
            shader_resource_index: self.shader_resource.as_ref().map(|s| s.index()),
            shader_resource_gpu: self.shader_resource.as_ref().and_then(|s| s.gpu_handle()),
        }
    }

    fn matches(&self, desc: &RenderTargetDesc, clear_value: &Option<ClearValue>) -> bool {
        !self.in_use && self.desc == *desc && self.clear_value == *clear_value
    }

    /// Return the entry's descriptor slots and drop its resource
    ///
    /// Only valid once no submitted frame can reference the entry.
    fn destroy(mut self, descriptors: &DescriptorTables) {
        descriptors.free_persistent(self.view_kind, &mut self.view);
        if let Some(mut srv) = self.shader_resource.take() {
            descriptors.free_persistent(DescriptorKind::ShaderResource, &mut srv);
        }
    }

    /// Hand the entry's slots and resource to the deferred-release queue
    fn into_deferred(self) -> Vec<DeferredItem> {
        let mut items = vec![
            DeferredItem::Resource(self.texture),
            DeferredItem::Descriptor {
                kind: self.view_kind,
                index: self.view.index(),
            },
        ];
        if let Some(srv) = self.shader_resource {
            items.push(DeferredItem::Descriptor {
                kind: DescriptorKind::ShaderResource,
                index: srv.index(),
            });
        }
        items
    }
}

#[derive(Default)]
struct PoolInner {
    entries: SlotMap<RenderTargetId, PoolEntry>,
    buckets: FxHashMap<u64, Vec<RenderTargetId>>,
    created: u64,
    reused: u64,
    evicted: u64,
}

impl PoolInner {
    fn remove(&mut self, id: RenderTargetId) -> Option<PoolEntry> {
        let entry = self.entries.remove(id)?;
        if let Some(bucket) = self.buckets.get_mut(&entry.key) {
            bucket.retain(|&other| other != id);
            if bucket.is_empty() {
                self.buckets.remove(&entry.key);
            }
        }
        Some(entry)
    }

    fn remove_where(&mut self, mut pred: impl FnMut(&mut PoolEntry) -> bool) -> Vec<PoolEntry> {
        let ids: Vec<RenderTargetId> = self
            .entries
            .iter_mut()
            .filter_map(|(id, entry)| pred(entry).then_some(id))
            .collect();
        let removed: Vec<PoolEntry> = ids.into_iter().filter_map(|id| self.remove(id)).collect();
        self.evicted += removed.len() as u64;
        removed
    }
}

/// Structural key of a request
fn pool_key(desc: &RenderTargetDesc, clear_value: &Option<ClearValue>) -> u64 {
    let mut hasher = FxHasher::default();
    desc.hash(&mut hasher);
    clear_value.hash(&mut hasher);
    hasher.finish()
}

/// Pool of reusable render targets
pub struct RenderTargetPool {
    device: Arc<dyn GraphicsDevice>,
    descriptors: Arc<DescriptorTables>,
    frames_in_flight: u32,
    idle_threshold: Duration,
    inner: Mutex<PoolInner>,
}

impl RenderTargetPool {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        descriptors: Arc<DescriptorTables>,
        frames_in_flight: u32,
        idle_threshold: Duration,
    ) -> Self {
        Self {
            device,
            descriptors,
            frames_in_flight,
            idle_threshold,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// Acquire a render target of the given shape
    ///
    /// Reuses an idle entry with the same shape and clear value, or creates
    /// a new resource with its views on a miss. Two acquisitions without an
    /// intervening release never return the same resource.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the resource or one of its views
    /// cannot be created; the pool is left unchanged.
    pub fn acquire(
        &self,
        desc: &RenderTargetDesc,
        clear_value: Option<ClearValue>,
    ) -> Result<PooledRenderTarget> {
        let key = pool_key(desc, &clear_value);

        {
            let mut inner = self.inner.lock();
            let inner = &mut *inner;
            let hit = inner.buckets.get(&key).and_then(|bucket| {
                bucket
                    .iter()
                    .copied()
                    .find(|&id| inner.entries[id].matches(desc, &clear_value))
            });
            if let Some(id) = hit {
                let entry = &mut inner.entries[id];
                entry.in_use = true;
                entry.idle_frames = 0;
                entry.idle_time = Duration::ZERO;
                inner.reused += 1;
                crate::gpu_trace!(
                    "galaxy3d::RenderTargetPool",
                    "Reusing {} ({}x{} {:?})",
                    entry.texture.name(),
                    desc.width,
                    desc.height,
                    desc.format
                );
                return Ok(entry.handle(id));
            }
        }

        // Miss: create outside the lock so other passes are not blocked
        let entry = self.create_entry(key, desc, clear_value)?;

        crate::gpu_debug!(
            "galaxy3d::RenderTargetPool",
            "Created {} ({}x{} {:?}, {} samples)",
            entry.texture.name(),
            desc.width,
            desc.height,
            desc.format,
            desc.sample_count
        );

        let mut inner = self.inner.lock();
        let id = inner.entries.insert(entry);
        inner.buckets.entry(key).or_default().push(id);
        inner.created += 1;
        Ok(inner.entries[id].handle(id))
    }

    fn create_entry(
        &self,
        key: u64,
        desc: &RenderTargetDesc,
        clear_value: Option<ClearValue>,
    ) -> Result<PoolEntry> {
        let texture = self.device.create_texture(desc, clear_value)?;

        let (view_kind, view_type) = if desc.format.is_depth() {
            (DescriptorKind::DepthStencil, ViewKind::DepthStencil)
        } else {
            (DescriptorKind::RenderTarget, ViewKind::RenderTarget)
        };

        let mut view = self.descriptors.allocate_persistent(view_kind);
        if let Err(e) = self
            .device
            .create_view(view_type, view.cpu_handle(), texture.as_ref())
        {
            self.descriptors.free_persistent(view_kind, &mut view);
            return Err(e);
        }

        let shader_resource = if desc.flags.contains(RenderTargetFlags::DENY_SHADER_RESOURCE) {
            None
        } else {
            let mut srv = self
                .descriptors
                .allocate_persistent(DescriptorKind::ShaderResource);
            if let Err(e) = self.device.create_view(
                ViewKind::ShaderResource,
                srv.cpu_handle(),
                texture.as_ref(),
            ) {
                self.descriptors
                    .free_persistent(DescriptorKind::ShaderResource, &mut srv);
                self.descriptors.free_persistent(view_kind, &mut view);
                return Err(e);
            }
            Some(srv)
        };

        Ok(PoolEntry {
            key,
            desc: *desc,
            clear_value,
            texture,
            view_kind,
            view,
            shader_resource,
            in_use: true,
            idle_frames: 0,
            idle_time: Duration::ZERO,
        })
    }

    /// Return an acquired render target to the pool
    pub fn release(&self, target: PooledRenderTarget) {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(target.id) {
            Some(entry) if entry.in_use => {
                debug_assert!(Arc::ptr_eq(&entry.texture, &target.texture));
                entry.in_use = false;
                entry.idle_frames = 0;
                entry.idle_time = Duration::ZERO;
            }
            _ => crate::gpu_warn!(
                "galaxy3d::RenderTargetPool",
                "Release of unknown or idle render target {}",
                target.texture.name()
            ),
        }
    }

    /// Remove an acquired target from the pool for good
    ///
    /// The entry's resource and descriptor slots are returned as deferred
    /// items; the caller pushes them to the deferred-release queue.
    pub fn detach(&self, target: PooledRenderTarget) -> Vec<DeferredItem> {
        let entry = self.inner.lock().remove(target.id);
        drop(target);
        match entry {
            Some(entry) => entry.into_deferred(),
            None => {
                crate::gpu_warn!(
                    "galaxy3d::RenderTargetPool",
                    "Detach of a render target the pool no longer owns"
                );
                Vec::new()
            }
        }
    }

    /// Advance idle counters and evict expired entries
    ///
    /// Called once per produced frame from `Cleanup`. Returns the number of
    /// entries evicted.
    pub fn tick(&self, elapsed: Duration) -> usize {
        let frames_in_flight = self.frames_in_flight;
        let threshold = self.idle_threshold;
        let expired = self.inner.lock().remove_where(|entry| {
            if entry.in_use {
                return false;
            }
            if entry.idle_frames < frames_in_flight {
                entry.idle_frames += 1;
                return false;
            }
            entry.idle_time += elapsed;
            entry.idle_time > threshold
        });
        self.destroy(expired, "idle")
    }

    /// Evict every idle entry at once
    ///
    /// Only valid while the GPU is idle (after `wait_for_gpu`), e.g. when a
    /// resize made the old shapes obsolete.
    pub fn trim_idle(&self) -> usize {
        let idle = self.inner.lock().remove_where(|entry| !entry.in_use);
        self.destroy(idle, "trimmed")
    }

    /// Destroy every entry (shutdown, GPU idle)
    pub fn clear(&self) -> usize {
        let all = self.inner.lock().remove_where(|_| true);
        let in_use = all.iter().filter(|entry| entry.in_use).count();
        if in_use > 0 {
            crate::gpu_warn!(
                "galaxy3d::RenderTargetPool",
                "Clearing pool with {} render targets still acquired",
                in_use
            );
        }
        self.destroy(all, "cleared")
    }

    /// Empty the pool without destroying anything
    ///
    /// For a GPU that could not be drained: textures are leaked and their
    /// descriptor slots stay allocated.
    pub fn abandon(&self) -> usize {
        let all = self.inner.lock().remove_where(|_| true);
        let count = all.len();
        for entry in all {
            crate::gpu_debug!(
                "galaxy3d::RenderTargetPool",
                "Leaking {}",
                entry.texture.name()
            );
            std::mem::forget(entry);
        }
        count
    }

    fn destroy(&self, entries: Vec<PoolEntry>, reason: &str) -> usize {
        let count = entries.len();
        for entry in entries {
            crate::gpu_debug!(
                "galaxy3d::RenderTargetPool",
                "Evicting {} ({})",
                entry.texture.name(),
                reason
            );
            entry.destroy(&self.descriptors);
        }
        count
    }

    pub fn stats(&self) -> RenderTargetPoolStats {
        let inner = self.inner.lock();
        RenderTargetPoolStats {
            entries: inner.entries.len(),
            in_use: inner.entries.values().filter(|e| e.in_use).count(),
            created: inner.created,
            reused: inner.reused,
            evicted: inner.evicted,
        }
    }

    /// Number of entries owned by the pool
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

#[cfg(test)]
#[path = "render_target_pool_tests.rs"]
mod tests;
