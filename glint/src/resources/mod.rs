//! Per-context mirrors of holders.
//!
//! A resource owns the driver objects backing one holder on one context.
//! It observes its holder through a [`ResourceLink`]: holder mutations only
//! set bits in the link's dirty mask, and the binder pushes the changed
//! aspects to the driver the next time the resource is used.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use glint_types::{
    AttributeArray, BufferObject, CubeMapTexture, FramebufferObject, Holder, HolderId, ResourceObserver, Sampler,
    Shader, ShaderProgram, Texture,
};
use serde::{Deserialize, Serialize};

use crate::{
    binder::bindings::BindingShadow,
    gl::{GLuint, GraphicsManager},
    util::registry::{HolderRegistry, ResourceRegistry},
    ThreadKey,
};

mod buffer;
mod framebuffer;
mod program;
mod sampler;
mod shader;
mod texture;
mod vertex_array;

pub(crate) use buffer::BufferResource;
pub(crate) use framebuffer::FramebufferResource;
pub(crate) use program::ProgramResource;
pub(crate) use sampler::SamplerResource;
pub(crate) use shader::ShaderResource;
pub(crate) use texture::{TextureResource, TextureResourceHolder};
pub(crate) use vertex_array::VertexArrayResource;

/// Kinds of holders that have per-context resources.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    AttributeArray,
    BufferObject,
    CubeMapTexture,
    FramebufferObject,
    Sampler,
    Shader,
    ShaderProgram,
    Texture,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::AttributeArray,
        ResourceKind::BufferObject,
        ResourceKind::CubeMapTexture,
        ResourceKind::FramebufferObject,
        ResourceKind::Sampler,
        ResourceKind::Shader,
        ResourceKind::ShaderProgram,
        ResourceKind::Texture,
    ];
    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A resource whose holder has been destroyed, waiting for its driver
/// objects to be deleted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PendingRelease {
    pub kind: ResourceKind,
    pub holder: HolderId,
}

/// The observer a resource registers with its holder.
#[derive(Debug)]
pub(crate) struct ResourceLink {
    id: u64,
    kind: ResourceKind,
    holder: HolderId,
    dirty: AtomicU64,
    releases: flume::Sender<PendingRelease>,
}

impl ResourceLink {
    /// Creates a fully dirty link and registers it with `holder`.
    pub fn observe<H: Holder>(holder: &H, kind: ResourceKind, releases: flume::Sender<PendingRelease>) -> Arc<Self> {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let link = Arc::new(Self {
            id: NEXT.fetch_add(1, Ordering::Relaxed),
            kind,
            holder: holder.id(),
            dirty: AtomicU64::new(u64::MAX),
            releases,
        });
        let observer: Arc<dyn ResourceObserver> = link.clone();
        holder.add_observer(&observer);
        link
    }

    /// Process-unique identity of this link.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn holder(&self) -> HolderId {
        self.holder
    }

    /// Returns and clears the dirty mask.
    pub fn take_dirty(&self) -> u64 {
        self.dirty.swap(0, Ordering::AcqRel)
    }

    /// Puts back bits that could not be handled, so they are retried.
    pub fn restore_dirty(&self, bits: u64) {
        self.dirty.fetch_or(bits, Ordering::AcqRel);
    }

    pub fn mark_all_dirty(&self) {
        self.dirty.store(u64::MAX, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire) != 0
    }
}

impl ResourceObserver for ResourceLink {
    fn on_changed(&self, bit: u32) {
        self.dirty.fetch_or(1 << bit, Ordering::AcqRel);
    }

    fn on_destroyed(&self) {
        // The binder may already be gone, in which case there is nothing to
        // release.
        let _ = self.releases.send(PendingRelease {
            kind: self.kind,
            holder: self.holder,
        });
    }
}

pub(crate) fn is_set(bits: u64, bit: u32) -> bool {
    bits & (1 << bit) != 0
}

/// Behaviour shared by every resource.
pub(crate) trait Resource {
    fn link(&self) -> &Arc<ResourceLink>;

    /// Driver name of the main object, 0 before creation.
    fn gl_id(&self) -> GLuint;

    /// Bytes of GPU memory the resource accounts for.
    fn gpu_memory(&self) -> usize {
        0
    }

    /// Unbinds and deletes the driver objects.
    fn destroy(self, gm: &dyn GraphicsManager, bindings: &mut BindingShadow);
}

/// Keys a resource registry can be indexed with.
pub(crate) trait ResourceKey: Copy + Eq + std::hash::Hash {
    fn holder_id(&self) -> HolderId;
}

impl ResourceKey for HolderId {
    fn holder_id(&self) -> HolderId {
        *self
    }
}

impl ResourceKey for (HolderId, ThreadKey) {
    fn holder_id(&self) -> HolderId {
        self.0
    }
}

/// Every resource of one binder, one registry per kind.
#[derive(Debug, Default)]
pub(crate) struct ResourceTable {
    pub vertex_arrays: ResourceRegistry<(HolderId, ThreadKey), VertexArrayResource, AttributeArray>,
    pub buffers: HolderRegistry<BufferResource, BufferObject>,
    pub cube_maps: HolderRegistry<TextureResource, CubeMapTexture>,
    pub framebuffers: HolderRegistry<FramebufferResource, FramebufferObject>,
    pub samplers: HolderRegistry<SamplerResource, Sampler>,
    pub shaders: HolderRegistry<ShaderResource, Shader>,
    pub programs: HolderRegistry<ProgramResource, ShaderProgram>,
    pub textures: HolderRegistry<TextureResource, Texture>,
}

/// Runs `$body` with `$registry` bound to the registry of `$kind`.
macro_rules! with_registry {
    ($table:expr, $kind:expr, |$registry:ident| $body:expr) => {
        match $kind {
            ResourceKind::AttributeArray => {
                let $registry = &mut $table.vertex_arrays;
                $body
            }
            ResourceKind::BufferObject => {
                let $registry = &mut $table.buffers;
                $body
            }
            ResourceKind::CubeMapTexture => {
                let $registry = &mut $table.cube_maps;
                $body
            }
            ResourceKind::FramebufferObject => {
                let $registry = &mut $table.framebuffers;
                $body
            }
            ResourceKind::Sampler => {
                let $registry = &mut $table.samplers;
                $body
            }
            ResourceKind::Shader => {
                let $registry = &mut $table.shaders;
                $body
            }
            ResourceKind::ShaderProgram => {
                let $registry = &mut $table.programs;
                $body
            }
            ResourceKind::Texture => {
                let $registry = &mut $table.textures;
                $body
            }
        }
    };
}

impl ResourceTable {
    pub fn gpu_memory(&mut self, kind: ResourceKind) -> usize {
        with_registry!(self, kind, |registry| registry.values().map(Resource::gpu_memory).sum())
    }

    /// Marks the resources of `holder`, or every resource of `kind`, fully
    /// dirty.
    pub fn mark_dirty(&mut self, kind: ResourceKind, holder: Option<HolderId>) {
        with_registry!(self, kind, |registry| {
            for (key, resource) in registry.iter() {
                if holder.map_or(true, |holder| key.holder_id() == holder) {
                    resource.link().mark_all_dirty();
                }
            }
        })
    }

    /// Holders of `kind` that have at least one resource.
    pub fn holders(&mut self, kind: ResourceKind) -> Vec<HolderId> {
        with_registry!(self, kind, |registry| {
            let mut holders: Vec<HolderId> = registry.keys().map(ResourceKey::holder_id).collect();
            holders.sort_unstable();
            holders.dedup();
            holders
        })
    }

    /// Removes the resources of `holder` and deletes their driver objects.
    /// Returns how many resources were removed.
    pub fn destroy(
        &mut self,
        kind: ResourceKind,
        holder: HolderId,
        gm: &dyn GraphicsManager,
        bindings: &mut BindingShadow,
    ) -> usize {
        with_registry!(self, kind, |registry| {
            let removed = registry.remove_where(|key| key.holder_id() == holder);
            let count = removed.len();
            for resource in removed {
                resource.destroy(gm, bindings);
            }
            count
        })
    }

    /// Removes the resources of `holder` without any driver calls.
    pub fn abandon(&mut self, kind: ResourceKind, holder: HolderId) -> usize {
        with_registry!(self, kind, |registry| registry
            .remove_where(|key| key.holder_id() == holder)
            .len())
    }
}
