use std::{ops::Deref, sync::Arc};

use glam::{Mat4, Vec4};
use glint::{
    types::{
        AttributeArray, AttributeSpec, AttributeType, AttributeValue, BufferObject, BufferObjectElement, BufferTarget,
        BufferUsage, ComponentType, DataContainer, Holder, Image, ImageFormat, Node, PrimitiveType, Shape,
        ShaderInputRegistry, ShaderProgram, Texture, Uniform, UniformSpec, UniformType, UniformValue,
    },
    ContextRegistry, Feature, Renderer, RendererOptions,
};

use crate::{FakeGraphicsManager, LogChecker};

pub const VERTEX_SOURCE: &str = "attribute vec3 aPosition;\nuniform mat4 uModel;\nvoid main() {}\n";
pub const FRAGMENT_SOURCE: &str = "uniform vec4 uColor;\nvoid main() {}\n";
pub const TEXTURED_FRAGMENT_SOURCE: &str = "uniform vec4 uColor;\nuniform sampler2D uTexture;\nvoid main() {}\n";

/// A registry with the inputs the test shaders use.
pub fn input_registry() -> Arc<ShaderInputRegistry> {
    let registry = ShaderInputRegistry::new();
    for (name, value_type) in [
        ("aPosition", AttributeType::FloatVector3),
        ("aColor", AttributeType::FloatVector4),
        ("aOffset", AttributeType::FloatVector2),
    ] {
        registry
            .add_attribute_spec(AttributeSpec::new(name, value_type))
            .expect("attribute names are unique");
    }
    for (name, value_type) in [
        ("uModel", UniformType::Matrix4),
        ("uColor", UniformType::FloatVector4),
        ("uTexture", UniformType::Texture),
        ("uScale", UniformType::Float),
    ] {
        registry
            .add_uniform_spec(UniformSpec::new(name, value_type))
            .expect("uniform names are unique");
    }
    registry
}

/// A buffer of tightly packed 3 component positions.
pub fn vertex_buffer(vertices: &[[f32; 3]]) -> Arc<BufferObject> {
    let buffer = BufferObject::new(BufferTarget::Array);
    buffer.add_spec(ComponentType::Float, 3, 0);
    buffer.set_data(
        DataContainer::from_slice(vertices, false),
        std::mem::size_of::<[f32; 3]>(),
        vertices.len(),
        BufferUsage::Static,
    );
    buffer
}

pub fn triangle_buffer() -> Arc<BufferObject> {
    vertex_buffer(&[[0.0, 0.5, 0.0], [-0.5, -0.5, 0.0], [0.5, -0.5, 0.0]])
}

pub fn index_buffer(indices: &[u16]) -> Arc<BufferObject> {
    let buffer = BufferObject::index_buffer(ComponentType::UnsignedShort);
    buffer.set_data(
        DataContainer::from_slice(indices, false),
        std::mem::size_of::<u16>(),
        indices.len(),
        BufferUsage::Static,
    );
    buffer
}

/// An attribute array feeding `aPosition` from element 0 of `buffer`.
pub fn position_array(registry: &Arc<ShaderInputRegistry>, buffer: &Arc<BufferObject>) -> Arc<AttributeArray> {
    let array = AttributeArray::new();
    let position = registry
        .create_attribute(
            "aPosition",
            AttributeValue::Buffer(BufferObjectElement {
                buffer: Arc::clone(buffer),
                spec_index: 0,
            }),
        )
        .expect("aPosition is registered");
    array.add_attribute(position).expect("array has room");
    array
}

pub fn program(registry: &Arc<ShaderInputRegistry>) -> Arc<ShaderProgram> {
    let program = ShaderProgram::from_sources(Arc::clone(registry), VERTEX_SOURCE, FRAGMENT_SOURCE);
    program.set_label("test program");
    program
}

pub fn textured_program(registry: &Arc<ShaderInputRegistry>) -> Arc<ShaderProgram> {
    let program = ShaderProgram::from_sources(Arc::clone(registry), VERTEX_SOURCE, TEXTURED_FRAGMENT_SOURCE);
    program.set_label("textured program");
    program
}

pub fn color_uniform(registry: &Arc<ShaderInputRegistry>, color: Vec4) -> Uniform {
    registry
        .create_uniform("uColor", UniformValue::FloatVector4(color))
        .expect("uColor is registered")
}

pub fn model_uniform(registry: &Arc<ShaderInputRegistry>, model: Mat4) -> Uniform {
    registry
        .create_uniform("uModel", UniformValue::Matrix4(model))
        .expect("uModel is registered")
}

/// A node drawing one triangle with every uniform of [`program`] set.
pub fn triangle_node(registry: &Arc<ShaderInputRegistry>) -> Node {
    let mut node = Node::new();
    node.set_label("triangle");
    node.set_shader_program(Some(program(registry)));
    node.add_uniform(model_uniform(registry, Mat4::IDENTITY));
    node.add_uniform(color_uniform(registry, Vec4::ONE));
    let array = position_array(registry, &triangle_buffer());
    node.add_shape(Shape::new(PrimitiveType::Triangles, array).with_label("triangle"));
    node
}

/// A texture with an RGBA8 level 0 image of the given size.
pub fn texture(width: u32, height: u32) -> Arc<Texture> {
    let size = width as usize * height as usize * ImageFormat::Rgba8.bytes_per_pixel();
    let texture = Texture::new();
    texture.set_image(
        0,
        Some(Image::new(
            ImageFormat::Rgba8,
            width,
            height,
            Some(DataContainer::new(vec![0xff; size], true)),
        )),
    );
    texture
}

#[derive(Default)]
pub struct TestRunnerBuilder {
    options: RendererOptions,
    missing_features: Vec<Feature>,
    binder_warning_threshold: Option<usize>,
}

impl TestRunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: RendererOptions) -> Self {
        self.options = options;
        self
    }

    /// Makes the fake driver report `feature` as unavailable.
    pub fn without_feature(mut self, feature: Feature) -> Self {
        self.missing_features.push(feature);
        self
    }

    pub fn binder_warning_threshold(mut self, threshold: usize) -> Self {
        self.binder_warning_threshold = Some(threshold);
        self
    }

    pub fn build(self) -> TestRunner {
        let log = LogChecker::start();
        let gm = FakeGraphicsManager::new();
        for feature in self.missing_features {
            gm.set_feature(feature, false);
        }
        let registry = Arc::new(match self.binder_warning_threshold {
            Some(threshold) => ContextRegistry::with_binder_warning_threshold(threshold),
            None => ContextRegistry::new(),
        });
        let renderer = Renderer::new(gm.clone(), Arc::clone(&registry), self.options);
        TestRunner {
            renderer,
            gm,
            registry,
            inputs: input_registry(),
            log,
        }
    }
}

/// A renderer drawing through a [`FakeGraphicsManager`], with log capture.
pub struct TestRunner {
    pub renderer: Renderer,
    pub gm: Arc<FakeGraphicsManager>,
    pub registry: Arc<ContextRegistry>,
    pub inputs: Arc<ShaderInputRegistry>,
    pub log: LogChecker,
}

impl Deref for TestRunner {
    type Target = Renderer;

    fn deref(&self) -> &Self::Target {
        &self.renderer
    }
}

impl TestRunner {
    pub fn new() -> Self {
        TestRunnerBuilder::new().build()
    }

    pub fn builder() -> TestRunnerBuilder {
        TestRunnerBuilder::new()
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}
