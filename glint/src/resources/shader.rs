use std::sync::Arc;

use glint_types::{Holder, Shader, ShaderStage, LABEL_CHANGED, RESOURCE_CHANGED};

use crate::{
    binder::{bindings::BindingShadow, ResourceBinder},
    error::ResourceError,
    format_sso,
    gl::{Feature, GLuint, GraphicsManager, ObjectKind},
    resources::{is_set, Resource, ResourceKind, ResourceLink},
};

/// A compiled shader stage.
#[derive(Debug)]
pub(crate) struct ShaderResource {
    link: Arc<ResourceLink>,
    gl_id: GLuint,
    stage: ShaderStage,
    compiled: bool,
    /// Bumped after every successful compile so programs know to relink.
    generation: u64,
    info_log: String,
}

impl ShaderResource {
    fn new(link: Arc<ResourceLink>, stage: ShaderStage) -> Self {
        Self {
            link,
            gl_id: 0,
            stage,
            compiled: false,
            generation: 0,
            info_log: String::new(),
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn info_log(&self) -> &str {
        &self.info_log
    }
}

impl Resource for ShaderResource {
    fn link(&self) -> &Arc<ResourceLink> {
        &self.link
    }

    fn gl_id(&self) -> GLuint {
        self.gl_id
    }

    fn destroy(self, gm: &dyn GraphicsManager, _bindings: &mut BindingShadow) {
        if self.gl_id != 0 {
            gm.delete_shader(self.gl_id);
        }
    }
}

/// The feature a stage needs beyond the basic vertex and fragment stages.
pub(crate) fn required_feature(stage: ShaderStage) -> Option<Feature> {
    match stage {
        ShaderStage::Vertex | ShaderStage::Fragment => None,
        ShaderStage::Geometry => Some(Feature::GeometryShaders),
        ShaderStage::TessControl | ShaderStage::TessEvaluation => Some(Feature::TessellationShaders),
    }
}

impl ResourceBinder {
    /// Compiles `shader` as a `stage` shader if its source changed. Returns
    /// the shader object and its compile generation.
    pub(crate) fn update_shader(&mut self, shader: &Arc<Shader>, stage: ShaderStage) -> Result<(GLuint, u64), ResourceError> {
        let releases = self.releases();
        let labels = self.has_feature(Feature::DebugLabel);
        let gm = &*self.gm;
        let resource = self.resources.shaders.get_or_insert_with(shader.id(), shader, || {
            ShaderResource::new(ResourceLink::observe(&**shader, ResourceKind::Shader, releases), stage)
        });
        let label = || format_sso!("{}", shader.label());

        let bits = resource.link.take_dirty();
        if bits == 0 && resource.gl_id != 0 {
            return match resource.compiled {
                true => Ok((resource.gl_id, resource.generation)),
                false => Err(ResourceError::CompileFailed {
                    stage: resource.stage,
                    label: label(),
                    log: resource.info_log.clone(),
                }),
            };
        }

        if resource.gl_id == 0 {
            resource.gl_id = gm.create_shader(resource.stage);
            if resource.gl_id == 0 {
                resource.link.restore_dirty(bits);
                return Err(ResourceError::CreationFailed {
                    kind: ResourceKind::Shader,
                    label: label(),
                });
            }
            log::trace!("Created {:?} shader {} for {:?}", resource.stage, resource.gl_id, shader.id());
        }

        if labels && is_set(bits, LABEL_CHANGED) {
            gm.object_label(ObjectKind::Shader, resource.gl_id, &shader.label());
        }

        if is_set(bits, RESOURCE_CHANGED) || is_set(bits, Shader::SOURCE_CHANGED) {
            profiling::scope!("compile shader");
            gm.shader_source(resource.gl_id, &shader.source());
            gm.compile_shader(resource.gl_id);
            resource.compiled = gm.get_shader_compile_status(resource.gl_id);
            resource.info_log = match resource.compiled {
                true => String::new(),
                false => gm.get_shader_info_log(resource.gl_id),
            };
            shader.set_info_log(resource.info_log.clone());
            if resource.compiled {
                resource.generation += 1;
                log::debug!("Compiled {:?} shader \"{}\"", resource.stage, shader.label());
            }
        }

        // Failure keeps its bits cleared, the source has to change first.
        match resource.compiled {
            true => Ok((resource.gl_id, resource.generation)),
            false => Err(ResourceError::CompileFailed {
                stage: resource.stage,
                label: label(),
                log: resource.info_log.clone(),
            }),
        }
    }
}
