use std::sync::Arc;

use crate::{InputError, Shape, ShaderProgram, StateTable, Uniform, UniformBlock, UniformValue};

/// A node of the scene graph handed to the renderer each frame.
///
/// Nodes are plain owned values; the GPU objects they reference are shared
/// holders.
#[derive(Debug, Clone)]
pub struct Node {
    label: String,
    enabled: bool,
    state_table: Option<StateTable>,
    shader_program: Option<Arc<ShaderProgram>>,
    uniforms: Vec<Uniform>,
    uniform_blocks: Vec<UniformBlock>,
    shapes: Vec<Shape>,
    children: Vec<Node>,
}

impl Node {
    pub fn new() -> Self {
        Self {
            label: String::new(),
            enabled: true,
            state_table: None,
            shader_program: None,
            uniforms: Vec::new(),
            uniform_blocks: Vec::new(),
            shapes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn state_table(&self) -> Option<&StateTable> {
        self.state_table.as_ref()
    }

    pub fn state_table_mut(&mut self) -> Option<&mut StateTable> {
        self.state_table.as_mut()
    }

    pub fn set_state_table(&mut self, state_table: Option<StateTable>) {
        self.state_table = state_table;
    }

    pub fn shader_program(&self) -> Option<&Arc<ShaderProgram>> {
        self.shader_program.as_ref()
    }

    pub fn set_shader_program(&mut self, program: Option<Arc<ShaderProgram>>) {
        self.shader_program = program;
    }

    /// Adds a uniform, returning its index. Uniforms whose registry does not
    /// match the node's program are still accepted; they take effect for any
    /// program that uses their registry.
    pub fn add_uniform(&mut self, uniform: Uniform) -> usize {
        self.uniforms.push(uniform);
        self.uniforms.len() - 1
    }

    pub fn set_uniform_value(&mut self, index: usize, value: UniformValue) -> Result<(), InputError> {
        match self.uniforms.get_mut(index) {
            Some(uniform) => uniform.set_value(value),
            None => Err(InputError::IndexOutOfRange(index)),
        }
    }

    /// Sets the value of the first uniform called `name`.
    pub fn set_uniform_by_name(&mut self, name: &str, value: UniformValue) -> Result<(), InputError> {
        match self.uniforms.iter_mut().find(|uniform| uniform.name() == name) {
            Some(uniform) => uniform.set_value(value),
            None => Err(InputError::UnknownInput {
                kind: "uniform",
                name: name.to_owned(),
            }),
        }
    }

    pub fn uniforms(&self) -> &[Uniform] {
        &self.uniforms
    }

    pub fn clear_uniforms(&mut self) {
        self.uniforms.clear();
    }

    pub fn add_uniform_block(&mut self, block: UniformBlock) -> usize {
        self.uniform_blocks.push(block);
        self.uniform_blocks.len() - 1
    }

    pub fn uniform_blocks(&self) -> &[UniformBlock] {
        &self.uniform_blocks
    }

    pub fn uniform_blocks_mut(&mut self) -> &mut [UniformBlock] {
        &mut self.uniform_blocks
    }

    pub fn add_shape(&mut self, shape: Shape) -> usize {
        self.shapes.push(shape);
        self.shapes.len() - 1
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut Vec<Shape> {
        &mut self.shapes
    }

    pub fn add_child(&mut self, child: Node) -> usize {
        self.children.push(child);
        self.children.len() - 1
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.children.get_mut(index)
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}
