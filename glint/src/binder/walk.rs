use std::{ops::Range, sync::Arc};

use glint_types::{BufferTarget, Holder, Node, Shape, ShaderProgram, StateTable, Uniform, UniformValue};
use smallvec::SmallVec;

use crate::{binder::ResourceBinder, format_sso, gl::Feature, RenderFlags};

/// Traversal state of one [`ResourceBinder::draw_scene`] call.
#[derive(Debug)]
struct Walk {
    /// Merge of the state tables from the root to the current node.
    client: StateTable,
    program: Option<Arc<ShaderProgram>>,
    /// Whether an ancestor already cleared.
    cleared: bool,
}

/// A single draw call of a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DrawRange {
    range: Range<usize>,
    instances: u32,
}

fn draw_ranges(shape: &Shape, count: usize) -> SmallVec<[DrawRange; 4]> {
    if shape.vertex_ranges.is_empty() {
        if count == 0 {
            return SmallVec::new();
        }
        return smallvec::smallvec![DrawRange {
            range: 0..count,
            instances: shape.instance_count,
        }];
    }
    shape
        .vertex_ranges
        .iter()
        .filter(|range| range.enabled && !range.range.is_empty())
        .map(|range| DrawRange {
            range: range.range.clone(),
            instances: range.instance_count,
        })
        .collect()
}

impl ResourceBinder {
    /// Draws the tree under `root`.
    pub(crate) fn draw_scene(&mut self, root: &Node, flags: RenderFlags, initial_uniforms: &[Uniform]) {
        profiling::scope!("ResourceBinder::draw_scene");
        self.verify_context();

        if flags.contains(RenderFlags::PROCESS_RELEASES) {
            self.process_releases();
        }
        self.bind_current_framebuffer();

        self.uniform_stacks.reset(initial_uniforms);
        let mut walk = Walk {
            client: StateTable::new(),
            program: None,
            cleared: false,
        };
        self.draw_node(root, &mut walk);

        self.apply_post_draw_clears(flags);
        self.refresh_memory_usage();
    }

    fn draw_node(&mut self, node: &Node, walk: &mut Walk) {
        if !node.is_enabled() {
            return;
        }
        profiling::scope!("ResourceBinder::draw_node", node.label());
        let gm = Arc::clone(&self.gm);
        let gm = &*gm;

        let mut saved_client = None;
        let mut claimed_clear = false;
        if let Some(table) = node.state_table() {
            saved_client = Some(walk.client.clone());
            table.merge_onto(&mut walk.client);
            if table.are_settings_enforced() {
                self.state.update_from(gm, table);
            }
            // Only the outermost clearing node on a path clears.
            if !walk.cleared && !table.clear_mask().is_empty() {
                self.state.update_from(gm, &walk.client);
                self.state.clear(gm, table);
                walk.cleared = true;
                claimed_clear = true;
            }
        }

        let saved_program = walk.program.clone();
        if let Some(program) = node.shader_program() {
            walk.program = Some(Arc::clone(program));
        }

        let mark = self.uniform_stacks.mark();
        for uniform in node.uniforms() {
            self.uniform_stacks.push(uniform);
        }
        for block in node.uniform_blocks().iter().filter(|block| block.is_enabled()) {
            for uniform in block.uniforms() {
                self.uniform_stacks.push(uniform);
            }
        }

        if !node.shapes().is_empty() {
            self.state.update_from(gm, &walk.client);
            match walk.program.clone() {
                Some(program) => {
                    if self.bind_program(&program).is_some() {
                        self.send_program_uniforms(&program);
                        for shape in node.shapes() {
                            self.draw_shape(shape, &program);
                        }
                    }
                }
                None => self.warn_once(format_sso!("no-program-{}", node.label()), || {
                    format!("Node \"{}\" has shapes but no shader program, skipping them", node.label())
                }),
            }
        }

        for child in node.children() {
            self.draw_node(child, walk);
        }

        walk.program = saved_program;
        self.uniform_stacks.pop_to(mark);
        if let Some(saved) = saved_client {
            walk.client = saved;
        }
        if claimed_clear {
            walk.cleared = false;
        }
    }

    fn draw_shape(&mut self, shape: &Shape, program: &ShaderProgram) {
        let Some(array) = &shape.attribute_array else {
            return;
        };
        if array.attribute_count() == 0 || shape.index_buffer.as_ref().map_or(false, |buffer| buffer.count() == 0) {
            return;
        }
        profiling::scope!("ResourceBinder::draw_shape", shape.label.as_str());

        let vertex_count = match self.update_attribute_array(array) {
            Ok(count) => count,
            Err(error) => {
                self.report(error);
                return;
            }
        };
        self.check_array_inputs(array, program);

        let instancing = self.has_feature(Feature::InstancedDrawing);
        let gm = Arc::clone(&self.gm);
        let gm = &*gm;
        let mut warn_instancing = false;

        match &shape.index_buffer {
            Some(indices) => {
                let id = match self.update_buffer(indices) {
                    Ok(id) => id,
                    Err(error) => {
                        self.report(error);
                        return;
                    }
                };
                let Some(index_type) = indices.index_type() else {
                    self.warn_once(format_sso!("no-index-type-{}", indices.id().get()), || {
                        format!(
                            "Index buffer \"{}\" of shape \"{}\" has no element spec, skipping the shape",
                            indices.label(),
                            shape.label
                        )
                    });
                    return;
                };
                // The element buffer binding lives in the vertex array and is
                // not trusted across vertex array switches.
                self.bindings.bind_buffer(gm, BufferTarget::ElementArray, id);
                let stride = indices.struct_size();
                for draw in draw_ranges(shape, indices.count()) {
                    let offset = draw.range.start * stride;
                    let count = draw.range.len();
                    if draw.instances > 0 && instancing {
                        gm.draw_elements_instanced(shape.primitive_type, count, index_type, offset, draw.instances);
                    } else {
                        warn_instancing |= draw.instances > 0;
                        gm.draw_elements(shape.primitive_type, count, index_type, offset);
                    }
                }
            }
            None => {
                for draw in draw_ranges(shape, vertex_count) {
                    if draw.instances > 0 && instancing {
                        gm.draw_arrays_instanced(
                            shape.primitive_type,
                            draw.range.start,
                            draw.range.len(),
                            draw.instances,
                        );
                    } else {
                        warn_instancing |= draw.instances > 0;
                        gm.draw_arrays(shape.primitive_type, draw.range.start, draw.range.len());
                    }
                }
            }
        }

        if warn_instancing {
            self.warn_once(format_sso!("no-instancing-{}", shape.label), || {
                format!(
                    "Instanced drawing is not available, shape \"{}\" is drawn only once",
                    shape.label
                )
            });
        }
    }

    /// Brings every resource the tree under `root` uses up to date without
    /// drawing. Disabled subtrees are skipped.
    pub(crate) fn create_or_update_resources(&mut self, root: &Node) {
        profiling::scope!("ResourceBinder::create_or_update_resources");
        self.verify_context();
        self.update_node_resources(root);
        self.refresh_memory_usage();
    }

    fn update_node_resources(&mut self, node: &Node) {
        if !node.is_enabled() {
            return;
        }
        if let Some(program) = node.shader_program() {
            if let Err(error) = self.update_program(program) {
                self.report(error);
            }
        }

        let uniforms = node.uniforms().iter().chain(
            node.uniform_blocks()
                .iter()
                .filter(|block| block.is_enabled())
                .flat_map(|block| block.uniforms()),
        );
        for uniform in uniforms {
            match uniform.value() {
                UniformValue::Texture(texture) => {
                    self.bind_texture_unit(texture);
                }
                UniformValue::CubeMapTexture(texture) => {
                    self.bind_texture_unit(texture);
                }
                UniformValue::TextureArray(textures) => {
                    for texture in textures {
                        self.bind_texture_unit(texture);
                    }
                }
                UniformValue::CubeMapTextureArray(textures) => {
                    for texture in textures {
                        self.bind_texture_unit(texture);
                    }
                }
                _ => {}
            }
        }

        for shape in node.shapes() {
            if let Some(array) = &shape.attribute_array {
                if let Err(error) = self.update_attribute_array(array) {
                    self.report(error);
                }
            }
            if let Some(indices) = &shape.index_buffer {
                if let Err(error) = self.update_buffer(indices) {
                    self.report(error);
                }
            }
        }

        for child in node.children() {
            self.update_node_resources(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use glint_types::{AttributeArray, PrimitiveType, VertexRange};

    use super::*;

    #[test]
    fn whole_shape_is_one_range() {
        let shape = Shape::new(PrimitiveType::Triangles, AttributeArray::new()).with_instance_count(3);
        let ranges = draw_ranges(&shape, 12);
        assert_eq!(ranges.as_slice(), &[DrawRange {
            range: 0..12,
            instances: 3
        }]);
    }

    #[test]
    fn disabled_and_empty_ranges_are_skipped() {
        let mut disabled = VertexRange::new(3..6);
        disabled.enabled = false;
        let shape = Shape::new(PrimitiveType::Lines, AttributeArray::new())
            .with_vertex_range(VertexRange::new(0..3))
            .with_vertex_range(disabled)
            .with_vertex_range(VertexRange::new(6..6))
            .with_vertex_range(VertexRange::new(6..10).with_instance_count(2));
        let ranges = draw_ranges(&shape, 10);
        assert_eq!(ranges.as_slice(), &[
            DrawRange {
                range: 0..3,
                instances: 0
            },
            DrawRange {
                range: 6..10,
                instances: 2
            },
        ]);
    }
}
