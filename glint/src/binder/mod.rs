//! Per-context shadow state and the reconciliation of resources against it.

use std::{ops::RangeInclusive, sync::Arc};

use glam::Vec4;
use glint_types::{
    BufferTarget, DataContainer, FramebufferObject, Holder, HolderId, Image, ImageFormat, Rect, StateTable, TextureTarget,
};

use crate::{
    error::ResourceError,
    format_sso,
    gl::{Constant, ContextId, Feature, GLuint, GraphicsManager},
    image_units::ImageUnitAllocator,
    resources::{PendingRelease, ResourceKind, ResourceTable},
    util::typedefs::{FastHashMap, FastHashSet, SsoString},
    RenderFlags, ThreadKey,
};

pub(crate) mod bindings;
pub(crate) mod state;
mod uniforms;
mod walk;

use bindings::BindingShadow;
use state::GlStateShadow;
pub(crate) use uniforms::{UniformDiffCache, UniformStacks};

/// Vertex array state when the driver has no vertex array objects.
#[derive(Debug)]
pub(crate) struct EmulatedArray {
    pub key: (HolderId, ThreadKey),
    /// Attribute locations enabled for it.
    pub enabled: Vec<u32>,
}

fn unit_range(unit_count: i32) -> RangeInclusive<u32> {
    match unit_count {
        n if n > 0 => 0..=(n as u32 - 1),
        #[allow(clippy::reversed_empty_ranges)]
        _ => 1..=0,
    }
}

/// Everything the renderer knows about one driver context.
///
/// A binder belongs to exactly one (renderer, context) pair and must only be
/// used while that context is current. It owns the resources mirroring the
/// holders drawn on the context, the shadow of the context's bindings and
/// pipeline state, and the queue destroyed holders post their releases to.
pub struct ResourceBinder {
    pub(crate) gm: Arc<dyn GraphicsManager>,
    context: ContextId,
    pub(crate) bindings: BindingShadow,
    pub(crate) state: GlStateShadow,
    pub(crate) image_units: ImageUnitAllocator,
    pub(crate) resources: ResourceTable,
    pub(crate) uniform_cache: UniformDiffCache,
    pub(crate) uniform_stacks: UniformStacks,
    /// Generic values of attribute locations without an enabled array.
    pub(crate) attribute_values: FastHashMap<u32, Vec4>,
    pub(crate) emulated_array: Option<EmulatedArray>,
    /// (attribute array, program) pairs whose inputs were cross-checked.
    pub(crate) validated_pairs: FastHashSet<(HolderId, HolderId)>,
    pub(crate) thread_key: ThreadKey,
    pub(crate) framebuffer: Option<Arc<FramebufferObject>>,
    releases_tx: flume::Sender<PendingRelease>,
    releases_rx: flume::Receiver<PendingRelease>,
    warned: FastHashSet<SsoString>,
    reported: FastHashSet<SsoString>,
    memory: [usize; ResourceKind::COUNT],
}

impl ResourceBinder {
    /// Creates the binder for the context current on the calling thread.
    pub(crate) fn new(gm: Arc<dyn GraphicsManager>) -> Self {
        let context = gm.current_context();
        let unit_count = gm.get_constant(Constant::MaxTextureImageUnits);
        let default_framebuffer = gm.get_framebuffer_binding();
        log::debug!(
            "Creating resource binder for context {:?} with {} image units",
            context,
            unit_count
        );

        let (releases_tx, releases_rx) = flume::unbounded();
        Self {
            gm,
            context,
            bindings: BindingShadow::new(unit_count.max(0) as u32, default_framebuffer),
            state: GlStateShadow::new(),
            image_units: ImageUnitAllocator::new(unit_range(unit_count)),
            resources: ResourceTable::default(),
            uniform_cache: UniformDiffCache::default(),
            uniform_stacks: UniformStacks::default(),
            attribute_values: FastHashMap::default(),
            emulated_array: None,
            validated_pairs: FastHashSet::default(),
            thread_key: ThreadKey::current(),
            framebuffer: None,
            releases_tx,
            releases_rx,
            warned: FastHashSet::default(),
            reported: FastHashSet::default(),
            memory: [0; ResourceKind::COUNT],
        }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Panics if the context current on the calling thread is not the one
    /// this binder was created for. Every operation that issues driver calls
    /// checks this first.
    pub fn verify_context(&self) {
        let current = self.gm.current_context();
        if current != self.context {
            panic!(
                "ResourceBinder created for context {:?} used while context {:?} is current",
                self.context, current
            );
        }
    }

    pub(crate) fn has_feature(&self, feature: Feature) -> bool {
        self.gm.is_feature_available(feature)
    }

    pub(crate) fn releases(&self) -> flume::Sender<PendingRelease> {
        self.releases_tx.clone()
    }

    /// Logs a warning the first time `key` is seen on this binder.
    pub(crate) fn warn_once(&mut self, key: SsoString, message: impl FnOnce() -> String) {
        if self.warned.insert(key) {
            log::warn!("{}", message());
        }
    }

    /// Logs a resource error the first time it occurs on this binder.
    pub(crate) fn report(&mut self, error: ResourceError) {
        let message = format_sso!("{}", error);
        if self.reported.contains(&message) {
            return;
        }
        log::log!(error.level(), "{}", message);
        self.reported.insert(message);
    }

    /// Deletes the resources of every holder destroyed since the last call.
    pub(crate) fn process_releases(&mut self) -> usize {
        profiling::scope!("ResourceBinder::process_releases");
        let pending: Vec<PendingRelease> = self.releases_rx.try_iter().collect();
        let mut released = 0;
        for release in pending {
            released += self.release(release.kind, release.holder);
        }
        if released > 0 {
            log::debug!("Released {} resources of destroyed holders", released);
            self.refresh_memory_usage();
        }
        released
    }

    /// Number of releases waiting in the queue.
    pub(crate) fn pending_release_count(&self) -> usize {
        self.releases_rx.len()
    }

    /// Deletes the resources of `holder` and forgets everything cached
    /// about them.
    pub(crate) fn release(&mut self, kind: ResourceKind, holder: HolderId) -> usize {
        self.forget_holder(kind, holder);
        let gm = Arc::clone(&self.gm);
        let count = self.resources.destroy(kind, holder, &*gm, &mut self.bindings);
        if count > 0 {
            log::trace!("Released {} {:?} resource(s) of holder {:?}", count, kind, holder);
        }
        count
    }

    /// Drops the resources of `holder` without driver calls.
    pub(crate) fn abandon(&mut self, kind: ResourceKind, holder: HolderId) -> usize {
        self.forget_holder(kind, holder);
        self.resources.abandon(kind, holder)
    }

    fn forget_holder(&mut self, kind: ResourceKind, holder: HolderId) {
        match kind {
            ResourceKind::Texture | ResourceKind::CubeMapTexture => self.image_units.forget_texture(holder),
            ResourceKind::Sampler => self.image_units.forget_sampler(holder),
            ResourceKind::ShaderProgram => {
                self.uniform_cache.invalidate_program(holder);
                self.validated_pairs.retain(|(_, program)| *program != holder);
            }
            ResourceKind::AttributeArray => {
                if matches!(&self.emulated_array, Some(array) if array.key.0 == holder) {
                    self.emulated_array = None;
                }
                self.validated_pairs.retain(|(array, _)| *array != holder);
            }
            ResourceKind::BufferObject | ResourceKind::FramebufferObject | ResourceKind::Shader => {}
        }
        if kind == ResourceKind::FramebufferObject && matches!(&self.framebuffer, Some(fbo) if fbo.id() == holder) {
            self.framebuffer = None;
        }
    }

    /// Releases every resource of `kind`.
    pub(crate) fn release_kind(&mut self, kind: ResourceKind, force_abandon: bool) {
        for holder in self.resources.holders(kind) {
            match force_abandon {
                true => self.abandon(kind, holder),
                false => self.release(kind, holder),
            };
        }
    }

    /// Releases every resource of the binder. Abandoning skips the driver
    /// calls, for contexts that are already gone.
    pub(crate) fn release_all(&mut self, force_abandon: bool) {
        profiling::scope!("ResourceBinder::release_all");
        // Dependents first, so nothing is deleted while still attached.
        const ORDER: [ResourceKind; 8] = [
            ResourceKind::FramebufferObject,
            ResourceKind::AttributeArray,
            ResourceKind::ShaderProgram,
            ResourceKind::Shader,
            ResourceKind::BufferObject,
            ResourceKind::Texture,
            ResourceKind::CubeMapTexture,
            ResourceKind::Sampler,
        ];
        for kind in ORDER {
            self.release_kind(kind, force_abandon);
        }
        self.image_units.clear();
        self.uniform_cache.clear();
        self.attribute_values.clear();
        self.emulated_array = None;
        self.validated_pairs.clear();
        if force_abandon {
            self.clear_cached_bindings();
        }
        self.refresh_memory_usage();
    }

    /// Marks the resources of `holder`, or of all holders of `kind`, as
    /// needing a full update.
    pub(crate) fn request_forced_update(&mut self, kind: ResourceKind, holder: Option<HolderId>) {
        self.resources.mark_dirty(kind, holder);
    }

    /// Forgets the binding and state shadow.
    pub(crate) fn clear_cached_bindings(&mut self) {
        self.bindings.invalidate();
        self.state.invalidate();
        self.attribute_values.clear();
        self.emulated_array = None;
    }

    pub(crate) fn refresh_memory_usage(&mut self) {
        for kind in ResourceKind::ALL {
            self.memory[kind.index()] = self.resources.gpu_memory(kind);
        }
    }

    pub(crate) fn gpu_memory_usage(&self, kind: ResourceKind) -> usize {
        self.memory[kind.index()]
    }

    pub(crate) fn total_gpu_memory_usage(&self) -> usize {
        self.memory.iter().sum()
    }

    pub(crate) fn set_image_unit_range(&mut self, range: RangeInclusive<u32>) {
        let dropped = self.image_units.set_range(range);
        if !dropped.is_empty() {
            log::debug!("Image unit range change dropped {} assignments", dropped.len());
        }
    }

    pub(crate) fn set_thread_key(&mut self, key: ThreadKey) {
        self.thread_key = key;
    }

    pub(crate) fn update_state_from_state_table(&mut self, table: &StateTable) {
        self.state.update_from(&*self.gm, table);
    }

    pub(crate) fn gl_state_table(&self) -> StateTable {
        self.state.table().clone()
    }

    /// Makes `framebuffer`, or the default framebuffer, the render target.
    pub(crate) fn set_framebuffer(&mut self, framebuffer: Option<Arc<FramebufferObject>>) {
        self.framebuffer = framebuffer;
        self.bind_current_framebuffer();
    }

    /// Binds the current render target, updating its resource first.
    /// Returns false if it cannot be rendered to.
    pub(crate) fn bind_current_framebuffer(&mut self) -> bool {
        let gm = Arc::clone(&self.gm);
        match self.framebuffer.clone() {
            Some(framebuffer) => match self.update_framebuffer(&framebuffer) {
                Ok(id) => {
                    self.bindings.bind_framebuffer(&*gm, id);
                    true
                }
                Err(error) => {
                    self.report(error);
                    false
                }
            },
            None => {
                let default = self.bindings.default_framebuffer();
                self.bindings.bind_framebuffer(&*gm, default);
                true
            }
        }
    }

    /// Reads `region` of the current render target into a new image.
    pub(crate) fn read_image(&mut self, region: Rect, format: ImageFormat) -> Arc<Image> {
        self.bind_current_framebuffer();
        let bytes = self.gm.read_pixels(region, format);
        Image::new(
            format,
            region.width.max(0) as u32,
            region.height.max(0) as u32,
            Some(DataContainer::new(bytes, false)),
        )
    }

    /// Unbinds what `flags` asks for after a frame.
    pub(crate) fn apply_post_draw_clears(&mut self, flags: RenderFlags) {
        let gm = Arc::clone(&self.gm);
        let gm = &*gm;
        if flags.contains(RenderFlags::CLEAR_VERTEX_ARRAY) && self.has_feature(Feature::VertexArrays) {
            self.bindings.bind_vertex_array(gm, 0);
        }
        if flags.contains(RenderFlags::CLEAR_ARRAY_BUFFER) {
            self.bindings.bind_buffer(gm, BufferTarget::Array, 0);
        }
        if flags.contains(RenderFlags::CLEAR_ELEMENT_ARRAY_BUFFER) {
            self.bindings.bind_buffer(gm, BufferTarget::ElementArray, 0);
        }
        if flags.contains(RenderFlags::CLEAR_SHADER_PROGRAM) {
            self.bindings.use_program(gm, 0);
        }
        if flags.contains(RenderFlags::CLEAR_FRAMEBUFFER) {
            let default = self.bindings.default_framebuffer();
            self.bindings.bind_framebuffer(gm, default);
        }
        if flags.intersects(RenderFlags::CLEAR_TEXTURES | RenderFlags::CLEAR_SAMPLERS) {
            let units: Vec<u32> = self.bindings.units_in_use().collect();
            for unit in units {
                if flags.contains(RenderFlags::CLEAR_TEXTURES) {
                    for target in [TextureTarget::Texture2D, TextureTarget::CubeMap] {
                        self.bindings.bind_texture(gm, unit, target, 0);
                    }
                }
                if flags.contains(RenderFlags::CLEAR_SAMPLERS) && self.has_feature(Feature::SamplerObjects) {
                    self.bindings.bind_sampler(gm, unit, 0);
                }
            }
            // Units no longer hold what the allocator thinks they do.
            if flags.contains(RenderFlags::CLEAR_TEXTURES) {
                self.image_units.clear();
            }
        }
        if flags.contains(RenderFlags::CLEAR_ACTIVE_TEXTURE) {
            self.bindings.activate_unit(gm, 0);
        }
    }

    /// Driver name of the resource mirroring `holder`, 0 if there is none.
    pub(crate) fn gl_id(&self, kind: ResourceKind, holder: HolderId) -> GLuint {
        use crate::resources::Resource;
        let resources = &self.resources;
        match kind {
            ResourceKind::AttributeArray => resources
                .vertex_arrays
                .get((holder, self.thread_key))
                .map_or(0, Resource::gl_id),
            ResourceKind::BufferObject => resources.buffers.get(holder).map_or(0, Resource::gl_id),
            ResourceKind::CubeMapTexture => resources.cube_maps.get(holder).map_or(0, Resource::gl_id),
            ResourceKind::FramebufferObject => resources.framebuffers.get(holder).map_or(0, Resource::gl_id),
            ResourceKind::Sampler => resources.samplers.get(holder).map_or(0, Resource::gl_id),
            ResourceKind::Shader => resources.shaders.get(holder).map_or(0, Resource::gl_id),
            ResourceKind::ShaderProgram => resources.programs.get(holder).map_or(0, Resource::gl_id),
            ResourceKind::Texture => resources.textures.get(holder).map_or(0, Resource::gl_id),
        }
    }
}

impl std::fmt::Debug for ResourceBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceBinder")
            .field("context", &self.context)
            .field("thread_key", &self.thread_key)
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_range_covers_reported_units() {
        assert_eq!(unit_range(16), 0..=15);
        assert_eq!(unit_range(1), 0..=0);
        assert!(unit_range(0).is_empty());
        assert!(unit_range(-1).is_empty());
    }
}
