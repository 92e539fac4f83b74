use std::sync::Arc;

use arrayvec::ArrayVec;
use glint_types::{
    AttributeType, Holder, HolderId, ShaderInputRegistry, ShaderProgram, ShaderStage, UniformType, LABEL_CHANGED,
};

use crate::{
    binder::{bindings::BindingShadow, ResourceBinder},
    error::ResourceError,
    format_sso,
    gl::{ActiveInput, Feature, GLuint, GraphicsManager, ObjectKind, ValueType},
    resources::{is_set, shader::required_feature, Resource, ResourceKind, ResourceLink},
    util::typedefs::SsoString,
};

/// An active uniform of a linked program, matched to its registry spec.
#[derive(Debug, Clone)]
pub(crate) struct ProgramUniform {
    pub name: SsoString,
    pub registry: HolderId,
    pub spec_index: usize,
    pub value_type: UniformType,
    pub location: i32,
    /// Number of array elements the shader declares, 1 for plain values.
    pub size: i32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct AttachedShader {
    stage: ShaderStage,
    holder: HolderId,
    gl_id: GLuint,
    generation: u64,
}

/// A linked program object.
#[derive(Debug)]
pub(crate) struct ProgramResource {
    link: Arc<ResourceLink>,
    gl_id: GLuint,
    attached: ArrayVec<AttachedShader, 5>,
    linked: bool,
    info_log: String,
    /// Uniform and attribute spec counts of the registry at link time.
    registry_counts: (usize, usize),
    pub attributes: Vec<ActiveInput>,
    pub uniforms: Arc<[ProgramUniform]>,
}

impl ProgramResource {
    fn new(link: Arc<ResourceLink>) -> Self {
        Self {
            link,
            gl_id: 0,
            attached: ArrayVec::new(),
            linked: false,
            info_log: String::new(),
            registry_counts: (0, 0),
            attributes: Vec::new(),
            uniforms: Arc::from(Vec::new()),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn info_log(&self) -> &str {
        &self.info_log
    }

    /// Driver names of the attached shaders.
    pub fn shader_ids(&self) -> impl Iterator<Item = GLuint> + '_ {
        self.attached.iter().map(|shader| shader.gl_id)
    }
}

impl Resource for ProgramResource {
    fn link(&self) -> &Arc<ResourceLink> {
        &self.link
    }

    fn gl_id(&self) -> GLuint {
        self.gl_id
    }

    fn destroy(self, gm: &dyn GraphicsManager, bindings: &mut BindingShadow) {
        if self.gl_id != 0 {
            bindings.unbind_program(gm, self.gl_id);
            gm.delete_program(self.gl_id);
        }
    }
}

/// Strips the `[0]` drivers append to the names of array inputs.
pub(crate) fn input_base_name(name: &str) -> &str {
    name.strip_suffix("[0]").unwrap_or(name)
}

pub(crate) fn uniform_type(value_type: ValueType) -> UniformType {
    match value_type {
        ValueType::Float => UniformType::Float,
        ValueType::FloatVec2 => UniformType::FloatVector2,
        ValueType::FloatVec3 => UniformType::FloatVector3,
        ValueType::FloatVec4 => UniformType::FloatVector4,
        ValueType::Int => UniformType::Int,
        ValueType::IntVec2 => UniformType::IntVector2,
        ValueType::IntVec3 => UniformType::IntVector3,
        ValueType::IntVec4 => UniformType::IntVector4,
        ValueType::UnsignedInt => UniformType::UnsignedInt,
        ValueType::FloatMat2 => UniformType::Matrix2,
        ValueType::FloatMat3 => UniformType::Matrix3,
        ValueType::FloatMat4 => UniformType::Matrix4,
        ValueType::Sampler2D => UniformType::Texture,
        ValueType::SamplerCube => UniformType::CubeMapTexture,
    }
}

pub(crate) fn attribute_type(value_type: ValueType) -> Option<AttributeType> {
    match value_type {
        ValueType::Float => Some(AttributeType::Float),
        ValueType::FloatVec2 => Some(AttributeType::FloatVector2),
        ValueType::FloatVec3 => Some(AttributeType::FloatVector3),
        ValueType::FloatVec4 => Some(AttributeType::FloatVector4),
        ValueType::FloatMat2 => Some(AttributeType::Matrix2),
        ValueType::FloatMat3 => Some(AttributeType::Matrix3),
        ValueType::FloatMat4 => Some(AttributeType::Matrix4),
        _ => None,
    }
}

/// Checks the active attributes against the registry, warning about every
/// one without a matching spec.
fn check_attributes(program: &ShaderProgram, registry: &ShaderInputRegistry, attributes: &[ActiveInput]) {
    for attribute in attributes {
        let name = input_base_name(&attribute.name);
        if name.starts_with("gl_") {
            continue;
        }
        match registry.find_attribute(name) {
            None => log::warn!(
                "Shader program '{}' declares attribute '{}' which has no spec in its registry",
                program.label(),
                name
            ),
            Some((_, spec)) if attribute_type(attribute.value_type) != Some(spec.value_type) => log::warn!(
                "Shader program '{}' declares attribute '{}' as {:?} but its spec is {:?}",
                program.label(),
                name,
                attribute.value_type,
                spec.value_type
            ),
            Some(_) => {}
        }
    }
}

/// Matches the active uniforms to registry specs. Unmatched uniforms are
/// warned about and left out.
fn resolve_uniforms(
    gm: &dyn GraphicsManager,
    gl_id: GLuint,
    program: &ShaderProgram,
    registry: &ShaderInputRegistry,
) -> Vec<ProgramUniform> {
    let mut uniforms = Vec::new();
    for uniform in gm.get_active_uniforms(gl_id) {
        let name = input_base_name(&uniform.name);
        if name.starts_with("gl_") {
            continue;
        }
        let Some((spec_index, spec)) = registry.find_uniform(name) else {
            log::warn!(
                "Shader program '{}' declares uniform '{}' which has no spec in its registry",
                program.label(),
                name
            );
            continue;
        };
        if uniform_type(uniform.value_type) != spec.value_type {
            log::warn!(
                "Shader program '{}' declares uniform '{}' as {:?} but its spec is {:?}",
                program.label(),
                name,
                uniform.value_type,
                spec.value_type
            );
            continue;
        }
        uniforms.push(ProgramUniform {
            name: name.into(),
            registry: registry.id(),
            spec_index,
            value_type: spec.value_type,
            location: gm.get_uniform_location(gl_id, &uniform.name),
            size: uniform.size,
        });
    }
    uniforms
}

impl ResourceBinder {
    /// Compiles the stages of `program` and relinks it when any of them or
    /// its registry changed.
    pub(crate) fn update_program(&mut self, program: &Arc<ShaderProgram>) -> Result<GLuint, ResourceError> {
        profiling::scope!("ResourceBinder::update_program");
        let label = || format_sso!("{}", program.label());

        let mut shaders = ArrayVec::<AttachedShader, 5>::new();
        let mut compiled = true;
        for stage in ShaderStage::ALL {
            let Some(shader) = program.shader(stage) else {
                continue;
            };
            if shader.source().is_empty() {
                continue;
            }
            if let Some(feature) = required_feature(stage) {
                if !self.has_feature(feature) {
                    self.warn_once(format_sso!("unsupported-stage-{}-{:?}", program.id().get(), stage), || {
                        format!(
                            "Ignoring {:?} shader of program '{}', the driver lacks {:?}",
                            stage,
                            program.label(),
                            feature
                        )
                    });
                    continue;
                }
            }
            match self.update_shader(&shader, stage) {
                Ok((gl_id, generation)) => shaders.push(AttachedShader {
                    stage,
                    holder: shader.id(),
                    gl_id,
                    generation,
                }),
                Err(error) => {
                    self.report(error);
                    compiled = false;
                }
            }
        }
        let has_vertex = program
            .shader(ShaderStage::Vertex)
            .map_or(false, |shader| !shader.source().is_empty());

        let releases = self.releases();
        let labels = self.has_feature(Feature::DebugLabel);
        let gm = &*self.gm;
        let resource = self.resources.programs.get_or_insert_with(program.id(), program, || {
            ProgramResource::new(ResourceLink::observe(&**program, ResourceKind::ShaderProgram, releases))
        });

        let bits = resource.link.take_dirty();
        if !has_vertex {
            resource.link.restore_dirty(bits);
            return Err(ResourceError::MissingVertexShader(label()));
        }
        if !compiled {
            resource.link.restore_dirty(bits);
            resource.linked = false;
            return Err(ResourceError::UnusableProgram(label()));
        }

        let registry = program.registry();
        let registry_counts = (registry.uniform_count(), registry.attribute_count());
        let needs_link = bits & !(1 << LABEL_CHANGED) != 0
            || resource.gl_id == 0
            || resource.attached != shaders
            || resource.registry_counts != registry_counts;
        if !needs_link {
            if labels && is_set(bits, LABEL_CHANGED) {
                gm.object_label(ObjectKind::Program, resource.gl_id, &program.label());
            }
            return match resource.linked {
                true => Ok(resource.gl_id),
                false => Err(ResourceError::UnusableProgram(label())),
            };
        }

        if resource.gl_id == 0 {
            resource.gl_id = gm.create_program();
            if resource.gl_id == 0 {
                resource.link.restore_dirty(bits);
                return Err(ResourceError::CreationFailed {
                    kind: ResourceKind::ShaderProgram,
                    label: label(),
                });
            }
            log::trace!("Created program {} for {:?}", resource.gl_id, program.id());
        }
        if labels && is_set(bits, LABEL_CHANGED) {
            gm.object_label(ObjectKind::Program, resource.gl_id, &program.label());
        }

        for old in &resource.attached {
            if !shaders.iter().any(|new| new.gl_id == old.gl_id) {
                gm.detach_shader(resource.gl_id, old.gl_id);
            }
        }
        for new in &shaders {
            if !resource.attached.iter().any(|old| old.gl_id == new.gl_id) {
                gm.attach_shader(resource.gl_id, new.gl_id);
            }
        }
        resource.attached = shaders;
        resource.registry_counts = registry_counts;

        for index in 0..registry.attribute_count() {
            if let (Some(spec), Some(location)) = (registry.attribute_spec(index), registry.attribute_location(index)) {
                gm.bind_attrib_location(resource.gl_id, location, &spec.name);
            }
        }

        // Whatever happens below, values sent to the old program are stale.
        self.uniform_cache.invalidate_program(program.id());
        self.validated_pairs.retain(|(_, validated)| *validated != program.id());

        gm.link_program(resource.gl_id);
        resource.linked = gm.get_program_link_status(resource.gl_id);
        if !resource.linked {
            resource.info_log = gm.get_program_info_log(resource.gl_id);
            program.set_info_log(resource.info_log.clone());
            resource.attributes.clear();
            resource.uniforms = Arc::from(Vec::new());
            return Err(ResourceError::LinkFailed {
                label: label(),
                log: resource.info_log.clone(),
            });
        }
        resource.info_log.clear();
        program.set_info_log("");
        log::debug!("Linked shader program \"{}\"", program.label());

        resource.attributes = gm.get_active_attributes(resource.gl_id);
        check_attributes(program, registry, &resource.attributes);
        resource.uniforms = resolve_uniforms(gm, resource.gl_id, program, registry).into();

        Ok(resource.gl_id)
    }

    /// Brings `program` up to date and makes it current. Returns `None` if
    /// it cannot be used.
    pub(crate) fn bind_program(&mut self, program: &Arc<ShaderProgram>) -> Option<GLuint> {
        match self.update_program(program) {
            Ok(gl_id) => {
                let gm = Arc::clone(&self.gm);
                self.bindings.use_program(&*gm, gl_id);
                Some(gl_id)
            }
            Err(error) => {
                self.report(error);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_suffix_is_stripped() {
        assert_eq!(input_base_name("uLights[0]"), "uLights");
        assert_eq!(input_base_name("uColor"), "uColor");
    }

    #[test]
    fn sampler_types_map_to_textures() {
        assert_eq!(uniform_type(ValueType::Sampler2D), UniformType::Texture);
        assert_eq!(uniform_type(ValueType::SamplerCube), UniformType::CubeMapTexture);
        assert_eq!(attribute_type(ValueType::Sampler2D), None);
        assert_eq!(attribute_type(ValueType::FloatMat4), Some(AttributeType::Matrix4));
    }
}
