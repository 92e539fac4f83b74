use std::sync::Arc;

use glint_types::{
    AttributeArray, AttributeValue, BufferElementSpec, BufferTarget, ComponentType, Holder, ShaderProgram,
    LABEL_CHANGED, MAX_ATTRIBUTES, RESOURCE_CHANGED,
};

use crate::{
    binder::{bindings::BindingShadow, EmulatedArray, ResourceBinder},
    error::ResourceError,
    format_sso,
    gl::{Feature, GLuint, GraphicsManager, ObjectKind},
    resources::{is_set, program::input_base_name, Resource, ResourceKind, ResourceLink},
    util::typedefs::FastHashSet,
};

/// What was last pointed at for one attribute of the array.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
struct PointerState {
    buffer: GLuint,
    enabled: bool,
    divisor: u32,
}

/// A vertex array object for one attribute array on one thread. Without
/// driver support the resource only tracks what was pointed at, and
/// `gl_id` stays 0.
#[derive(Debug)]
pub(crate) struct VertexArrayResource {
    link: Arc<ResourceLink>,
    gl_id: GLuint,
    pointers: [PointerState; MAX_ATTRIBUTES],
    vertex_count: usize,
}

impl VertexArrayResource {
    fn new(link: Arc<ResourceLink>) -> Self {
        Self {
            link,
            gl_id: 0,
            pointers: [PointerState::default(); MAX_ATTRIBUTES],
            vertex_count: 0,
        }
    }

    /// Vertices a non-indexed draw can use, as of the last update.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }
}

impl Resource for VertexArrayResource {
    fn link(&self) -> &Arc<ResourceLink> {
        &self.link
    }

    fn gl_id(&self) -> GLuint {
        self.gl_id
    }

    fn destroy(self, gm: &dyn GraphicsManager, bindings: &mut BindingShadow) {
        if self.gl_id != 0 {
            bindings.unbind_vertex_array(gm, self.gl_id);
            gm.delete_vertex_array(self.gl_id);
        }
    }
}

/// Driver buffer and element layout of one attribute.
#[derive(Debug, Copy, Clone)]
struct Source {
    buffer: GLuint,
    spec: Option<BufferElementSpec>,
}

/// Attribute locations an element occupies, one per matrix column.
fn location_count(spec: &BufferElementSpec) -> u32 {
    spec.component_type.matrix_columns().unwrap_or(1) as u32
}

fn point_attribute(gm: &dyn GraphicsManager, location: u32, spec: &BufferElementSpec, normalized: bool, stride: usize) {
    match spec.component_type.matrix_columns() {
        Some(columns) => {
            for column in 0..columns {
                let location = location + column as u32;
                gm.enable_vertex_attrib_array(location);
                gm.vertex_attrib_pointer(
                    location,
                    columns,
                    ComponentType::Float,
                    normalized,
                    stride,
                    spec.byte_offset + column * spec.component_type.size(),
                );
            }
        }
        None => {
            gm.enable_vertex_attrib_array(location);
            gm.vertex_attrib_pointer(
                location,
                spec.component_count,
                spec.component_type,
                normalized,
                stride,
                spec.byte_offset,
            );
        }
    }
}

impl ResourceBinder {
    /// Updates the buffers of `array`, then binds its vertex array and
    /// points every changed attribute. Returns the number of vertices a
    /// non-indexed draw can use.
    pub(crate) fn update_attribute_array(&mut self, array: &Arc<AttributeArray>) -> Result<usize, ResourceError> {
        profiling::scope!("ResourceBinder::update_attribute_array");
        let attributes = array.attributes();

        let mut sources = Vec::with_capacity(attributes.len());
        for (attribute, _) in &attributes {
            let source = match attribute.buffer_element() {
                Some(element) => {
                    let spec = element.buffer.spec(element.spec_index).ok_or_else(|| {
                        ResourceError::InvalidConfiguration {
                            kind: ResourceKind::AttributeArray,
                            label: format_sso!("{}", array.label()),
                            reason: format_sso!(
                                "attribute '{}' uses missing element {} of buffer \"{}\"",
                                attribute.name(),
                                element.spec_index,
                                element.buffer.label()
                            ),
                        }
                    })?;
                    Source {
                        buffer: self.update_buffer(&element.buffer)?,
                        spec: Some(spec),
                    }
                }
                None => Source { buffer: 0, spec: None },
            };
            sources.push(source);
        }

        let hardware = self.has_feature(Feature::VertexArrays);
        let instancing = self.has_feature(Feature::InstancedDrawing);
        let labels = self.has_feature(Feature::DebugLabel);
        let releases = self.releases();
        let key = (array.id(), self.thread_key);
        let gm = &*self.gm;
        let bindings = &mut self.bindings;
        let attribute_values = &mut self.attribute_values;
        let resource = self.resources.vertex_arrays.get_or_insert_with(key, array, || {
            VertexArrayResource::new(ResourceLink::observe(&**array, ResourceKind::AttributeArray, releases))
        });

        let mut bits = resource.link.take_dirty();
        if hardware {
            if resource.gl_id == 0 {
                resource.gl_id = gm.gen_vertex_array();
                if resource.gl_id == 0 {
                    resource.link.restore_dirty(bits);
                    return Err(ResourceError::CreationFailed {
                        kind: ResourceKind::AttributeArray,
                        label: format_sso!("{}", array.label()),
                    });
                }
                log::trace!("Created vertex array {} for {:?}", resource.gl_id, key);
            }
            bindings.bind_vertex_array(gm, resource.gl_id);
            if labels && is_set(bits, LABEL_CHANGED) {
                gm.object_label(ObjectKind::VertexArray, resource.gl_id, &array.label());
            }
        } else if !matches!(&self.emulated_array, Some(emulated) if emulated.key == key) {
            // The context holds another array's pointers.
            bits = u64::MAX;
            resource.pointers = [PointerState::default(); MAX_ATTRIBUTES];
        }

        let mut enabled_locations = Vec::new();
        let mut vertex_count: Option<usize> = None;
        for (index, ((attribute, enabled), source)) in attributes.iter().zip(&sources).enumerate() {
            let Some(location) = attribute.registry().attribute_location(attribute.index()) else {
                continue;
            };
            let pointer = &mut resource.pointers[index];
            let changed = is_set(bits, RESOURCE_CHANGED)
                || is_set(bits, AttributeArray::attribute_changed_bit(index))
                || is_set(bits, AttributeArray::enabled_changed_bit(index))
                || pointer.buffer != source.buffer;

            match (attribute.value(), source.spec) {
                (AttributeValue::Buffer(element), Some(spec)) => {
                    let locations = location..location + location_count(&spec);
                    // Without instancing every attribute advances per vertex.
                    let divisor = if instancing { attribute.divisor() } else { 0 };
                    if *enabled {
                        enabled_locations.extend(locations.clone());
                        if divisor == 0 {
                            let count = element.buffer.count();
                            vertex_count = Some(vertex_count.map_or(count, |current| current.min(count)));
                        }
                    }
                    if !changed {
                        continue;
                    }
                    if *enabled {
                        bindings.bind_buffer(gm, BufferTarget::Array, source.buffer);
                        point_attribute(gm, location, &spec, attribute.is_normalized(), element.buffer.struct_size());
                        if divisor != 0 || pointer.divisor != 0 {
                            for location in locations.clone() {
                                gm.vertex_attrib_divisor(location, divisor);
                            }
                        }
                        for location in locations {
                            attribute_values.remove(&location);
                        }
                    } else if pointer.enabled {
                        for location in locations {
                            gm.disable_vertex_attrib_array(location);
                        }
                    }
                    *pointer = PointerState {
                        buffer: source.buffer,
                        enabled: *enabled,
                        divisor: if *enabled { divisor } else { pointer.divisor },
                    };
                }
                (value, _) => {
                    if changed && pointer.enabled {
                        gm.disable_vertex_attrib_array(location);
                    }
                    *pointer = PointerState::default();
                    let Some(components) = value.constant_components().filter(|_| *enabled) else {
                        continue;
                    };
                    if attribute_values.get(&location) != Some(&components) {
                        gm.vertex_attrib_4fv(location, components);
                        attribute_values.insert(location, components);
                    }
                }
            }
        }

        resource.vertex_count = vertex_count.unwrap_or(0);
        let vertex_count = resource.vertex_count;

        if !hardware {
            if let Some(previous) = self.emulated_array.take() {
                for location in previous.enabled {
                    if !enabled_locations.contains(&location) {
                        gm.disable_vertex_attrib_array(location);
                    }
                }
            }
            self.emulated_array = Some(EmulatedArray {
                key,
                enabled: enabled_locations,
            });
        }

        Ok(vertex_count)
    }

    /// Warns once per pair about attributes that only one of `array` and
    /// the linked `program` knows about.
    pub(crate) fn check_array_inputs(&mut self, array: &AttributeArray, program: &ShaderProgram) {
        if !self.validated_pairs.insert((array.id(), program.id())) {
            return;
        }
        let Some(resource) = self.resources.programs.get(program.id()) else {
            return;
        };

        let declared: FastHashSet<&str> = resource
            .attributes
            .iter()
            .map(|input| input_base_name(&input.name))
            .filter(|name| !name.starts_with("gl_"))
            .collect();
        let provided: Vec<String> = array
            .attributes()
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(attribute, _)| attribute.name())
            .collect();

        for name in &provided {
            if !declared.contains(name.as_str()) {
                log::warn!(
                    "Attribute array contains attribute '{}' but shader program '{}' does not declare or use it",
                    name,
                    program.label()
                );
            }
        }
        let mut missing: Vec<&str> = declared
            .into_iter()
            .filter(|name| !provided.iter().any(|provided| provided == name))
            .collect();
        missing.sort_unstable();
        for name in missing {
            log::warn!(
                "Shader program '{}' uses attribute '{}' but the attribute array does not provide it",
                program.label(),
                name
            );
        }
    }
}
