use std::{
    ops::{Range, RangeInclusive},
    sync::Arc,
};

use glint_types::{BufferObject, FramebufferObject, Holder, Image, ImageFormat, MapMode, Node, Rect, StateTable, Uniform};

use crate::{
    binder::ResourceBinder,
    context_registry::{ContextRegistry, RendererId},
    gl::{ContextId, GLuint, GraphicsManager},
    manager::{InfoAnswer, ResourceHolder, ResourceManager},
    resources::ResourceKind,
    RenderFlags, RendererOptions, ThreadKey,
};

/// Runs info callbacks outside the binder lock, so they may use the
/// renderer themselves.
fn answer_all(answers: Vec<InfoAnswer>) -> usize {
    let count = answers.len();
    for answer in answers {
        answer();
    }
    count
}

/// Draws node trees through a [`GraphicsManager`], keeping one
/// [`ResourceBinder`] per context it is used on.
///
/// Every method acts on the binder of the context current on the calling
/// thread, creating it on first use.
pub struct Renderer {
    id: RendererId,
    gm: Arc<dyn GraphicsManager>,
    registry: Arc<ContextRegistry>,
    manager: ResourceManager,
    options: RendererOptions,
    initial_uniforms: Vec<Uniform>,
}

impl Renderer {
    pub fn new(gm: Arc<dyn GraphicsManager>, registry: Arc<ContextRegistry>, options: RendererOptions) -> Self {
        let id = RendererId::next();
        log::debug!("Creating renderer {:?} with {:?}", id, options);
        Self {
            id,
            gm,
            registry,
            manager: ResourceManager::new(),
            options,
            initial_uniforms: Vec::new(),
        }
    }

    pub fn id(&self) -> RendererId {
        self.id
    }

    pub fn graphics_manager(&self) -> &Arc<dyn GraphicsManager> {
        &self.gm
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    pub fn resource_manager(&self) -> &ResourceManager {
        &self.manager
    }

    pub fn flags(&self) -> RenderFlags {
        self.options.flags
    }

    pub fn set_flags(&mut self, flags: RenderFlags) {
        self.options.flags.insert(flags);
    }

    pub fn clear_flags(&mut self, flags: RenderFlags) {
        self.options.flags.remove(flags);
    }

    /// Runs `f` with the binder of the current context.
    pub fn with_binder<R>(&self, f: impl FnOnce(&mut ResourceBinder) -> R) -> R {
        let unit_range = self.options.image_unit_range();
        let binder = self.registry.get_or_create_binder(self.id, &self.gm, |binder| {
            if let Some(range) = unit_range {
                binder.set_image_unit_range(range);
            }
        });
        let mut binder = binder.lock();
        f(&mut binder)
    }

    /// Draws the tree under `root` with the current render target.
    pub fn draw_scene(&self, root: &Node) {
        profiling::scope!("Renderer::draw_scene");
        let flags = self.options.flags;
        let answers = self.with_binder(|binder| {
            binder.draw_scene(root, flags, &self.initial_uniforms);
            match flags.contains(RenderFlags::PROCESS_INFO_REQUESTS) {
                true => self.manager.gather_answers(binder),
                false => Vec::new(),
            }
        });
        answer_all(answers);
    }

    /// Brings the resource of `holder` up to date without drawing.
    pub fn create_or_update_resource<H: ResourceHolder>(&self, holder: &Arc<H>) {
        self.with_binder(|binder| {
            binder.verify_context();
            if let Err(error) = H::update(holder, binder) {
                binder.report(error);
            }
            binder.refresh_memory_usage();
        });
    }

    /// Brings every resource used by the tree under `root` up to date
    /// without drawing.
    pub fn create_or_update_resources(&self, root: &Node) {
        self.with_binder(|binder| binder.create_or_update_resources(root));
    }

    /// Makes the next update of `holder` resend everything.
    pub fn request_forced_update<H: ResourceHolder>(&self, holder: &H) {
        self.with_binder(|binder| binder.request_forced_update(H::KIND, Some(holder.id())));
    }

    /// Makes the next update of every resource resend everything.
    pub fn request_forced_updates(&self) {
        self.with_binder(|binder| {
            for kind in ResourceKind::ALL {
                binder.request_forced_update(kind, None);
            }
        });
    }

    /// Deletes the resources of `holder`. They are recreated if it is drawn
    /// again.
    pub fn clear_resources<H: ResourceHolder>(&self, holder: &H) {
        self.with_binder(|binder| {
            binder.verify_context();
            binder.release(H::KIND, holder.id());
            binder.refresh_memory_usage();
        });
    }

    pub fn clear_typed_resources(&self, kind: ResourceKind) {
        self.with_binder(|binder| {
            binder.verify_context();
            binder.release_kind(kind, false);
            binder.refresh_memory_usage();
        });
    }

    /// Deletes every resource of the current context. With `force_abandon`
    /// the driver objects are forgotten instead, for a context that is lost.
    pub fn clear_all_resources(&self, force_abandon: bool) {
        self.with_binder(|binder| {
            if !force_abandon {
                binder.verify_context();
            }
            binder.release_all(force_abandon);
        });
    }

    /// Driver name of the resource of `holder` on the current context, 0 if
    /// there is none.
    pub fn resource_gl_id<H: ResourceHolder>(&self, holder: &H) -> GLuint {
        self.with_binder(|binder| binder.gl_id(H::KIND, holder.id()))
    }

    /// Renders into `framebuffer`, or into the default framebuffer.
    pub fn bind_framebuffer(&self, framebuffer: Option<Arc<FramebufferObject>>) {
        self.with_binder(|binder| binder.set_framebuffer(framebuffer));
    }

    pub fn current_framebuffer(&self) -> Option<Arc<FramebufferObject>> {
        self.with_binder(|binder| binder.framebuffer.clone())
    }

    /// Reads `region` of the current render target.
    pub fn read_image(&self, region: Rect, format: ImageFormat) -> Arc<Image> {
        self.with_binder(|binder| binder.read_image(region, format))
    }

    /// Maps all of `buffer`. The bytes are in its mapped data until
    /// [`Self::unmap_buffer_object_data`].
    pub fn map_buffer_object_data(&self, buffer: &Arc<BufferObject>, mode: MapMode) {
        self.with_binder(|binder| binder.map_buffer(buffer, mode, None));
    }

    pub fn map_buffer_object_data_range(&self, buffer: &Arc<BufferObject>, mode: MapMode, range: Range<usize>) {
        self.with_binder(|binder| binder.map_buffer(buffer, mode, Some(range)));
    }

    pub fn unmap_buffer_object_data(&self, buffer: &Arc<BufferObject>) {
        self.with_binder(|binder| binder.unmap_buffer(buffer));
    }

    pub fn set_texture_image_unit_range(&mut self, range: RangeInclusive<u32>) {
        self.options.image_unit_range = Some((*range.start(), *range.end()));
        self.with_binder(|binder| binder.set_image_unit_range(range));
    }

    /// Sets the value used for a uniform when no node provides one,
    /// replacing a previous initial value for the same uniform.
    pub fn set_initial_uniform_value(&mut self, uniform: Uniform) {
        let slot = |candidate: &Uniform| {
            candidate.index() == uniform.index() && Arc::ptr_eq(candidate.registry(), uniform.registry())
        };
        match self.initial_uniforms.iter_mut().find(|candidate| slot(candidate)) {
            Some(existing) => *existing = uniform,
            None => self.initial_uniforms.push(uniform),
        }
    }

    /// Deletes the resources of holders destroyed since the last call.
    /// Returns how many resources were deleted.
    pub fn process_releases(&self) -> usize {
        self.with_binder(|binder| {
            binder.verify_context();
            binder.process_releases()
        })
    }

    pub fn pending_release_count(&self) -> usize {
        self.with_binder(|binder| binder.pending_release_count())
    }

    /// Answers the queued info requests. Returns how many there were.
    pub fn process_resource_info_requests(&self) -> usize {
        let answers = self.with_binder(|binder| self.manager.gather_answers(binder));
        answer_all(answers)
    }

    /// Sends the entries of `table` that differ from the shadow.
    pub fn update_state_from_state_table(&self, table: &StateTable) {
        self.with_binder(|binder| binder.update_state_from_state_table(table));
    }

    /// The state the renderer believes the context is in.
    pub fn gl_state_table(&self) -> StateTable {
        self.with_binder(|binder| binder.gl_state_table())
    }

    /// Forgets what is bound, after the application issued driver calls of
    /// its own.
    pub fn clear_cached_bindings(&self) {
        self.with_binder(|binder| binder.clear_cached_bindings());
    }

    pub fn gpu_memory_usage(&self, kind: ResourceKind) -> usize {
        self.with_binder(|binder| binder.gpu_memory_usage(kind))
    }

    pub fn total_gpu_memory_usage(&self) -> usize {
        self.with_binder(|binder| binder.total_gpu_memory_usage())
    }

    /// Overrides the thread identity used for concurrent programs and
    /// vertex arrays. `None` goes back to the calling thread's.
    pub fn set_thread_key(&self, key: Option<ThreadKey>) {
        self.with_binder(|binder| binder.set_thread_key(key.unwrap_or_else(ThreadKey::current)));
    }

    /// Destroys the binder for `context`. Its resources are deleted if the
    /// context is current and abandoned otherwise.
    pub fn destroy_binder(&self, context: ContextId) {
        if let Some(binder) = self.registry.destroy(self.id, context) {
            let current = self.gm.current_context() == context;
            binder.lock().release_all(!current);
        }
    }

    pub fn destroy_current_binder(&self) {
        self.destroy_binder(self.gm.current_context());
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let current = self.gm.current_context();
        for (context, binder) in self.registry.destroy_renderer(self.id) {
            binder.lock().release_all(context != current);
        }
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("initial_uniforms", &self.initial_uniforms.len())
            .finish_non_exhaustive()
    }
}
