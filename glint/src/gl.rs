//! The driver dispatch surface.
//!
//! Everything glint does to the GPU goes through [`GraphicsManager`]. The
//! trait mirrors the object lifecycle of a GL-style API: objects are named
//! by integer handles, 0 meaning "none". Implementations wrap a real driver
//! or, in tests, record the calls they receive.

use std::ops::Range;

use glam::{Vec2, Vec4};
use glint_types::{
    AttachmentPoint, BlendEquations, BlendFunctions, BufferTarget, BufferUsage, Capability, ClearMask, ComponentType,
    CullFaceMode, FrontFaceMode, HintMode, ImageFormat, MapMode, CompareFunction, PolygonOffset, PrimitiveType, Rect,
    SampleCoverage, SamplerParameter, ShaderStage, StencilFunction, StencilOperations, TexImageTarget, TextureTarget,
};

/// Name of a driver object. 0 is never a valid object.
pub type GLuint = u32;

/// Opaque identity of a driver context.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(pub u64);

impl ContextId {
    /// Returned when no context is current.
    pub const NONE: Self = Self(0);
}

/// Optional driver functionality that is queried at runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Feature {
    CopyBufferSubData,
    DebugLabel,
    GeometryShaders,
    InstancedDrawing,
    MapBuffer,
    MapBufferRange,
    NpotTextures,
    SamplerObjects,
    TessellationShaders,
    TextureFilterAnisotropic,
    VertexArrays,
}

impl Feature {
    pub const ALL: [Feature; 11] = [
        Feature::CopyBufferSubData,
        Feature::DebugLabel,
        Feature::GeometryShaders,
        Feature::InstancedDrawing,
        Feature::MapBuffer,
        Feature::MapBufferRange,
        Feature::NpotTextures,
        Feature::SamplerObjects,
        Feature::TessellationShaders,
        Feature::TextureFilterAnisotropic,
        Feature::VertexArrays,
    ];
}

/// Integer limits reported by the driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    MaxCubeMapTextureSize,
    MaxRenderbufferSize,
    MaxTextureImageUnits,
    MaxTextureSize,
    MaxVertexAttribs,
}

impl Constant {
    pub const ALL: [Constant; 5] = [
        Constant::MaxCubeMapTextureSize,
        Constant::MaxRenderbufferSize,
        Constant::MaxTextureImageUnits,
        Constant::MaxTextureSize,
        Constant::MaxVertexAttribs,
    ];
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StringName {
    Vendor,
    Renderer,
    Version,
    Extensions,
}

/// Kinds of driver objects that can carry a debug label.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    Framebuffer,
    Program,
    Renderbuffer,
    Sampler,
    Shader,
    Texture,
    VertexArray,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilFace {
    Front,
    Back,
}

/// Type of an active program input as reported by the driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Float,
    FloatVec2,
    FloatVec3,
    FloatVec4,
    Int,
    IntVec2,
    IntVec3,
    IntVec4,
    UnsignedInt,
    FloatMat2,
    FloatMat3,
    FloatMat4,
    Sampler2D,
    SamplerCube,
}

/// An attribute or uniform the linker kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveInput {
    pub name: String,
    pub value_type: ValueType,
    /// Array length, 1 for non-arrays.
    pub size: i32,
}

/// A texture parameter. Sampler state is only sent this way when the driver
/// lacks sampler objects.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TextureParameter {
    Sampler(SamplerParameter),
    BaseLevel(i32),
    MaxLevel(i32),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    Complete,
    IncompleteAttachment,
    IncompleteDimensions,
    IncompleteMissingAttachment,
    Unsupported,
}

/// The calls glint issues against a driver context.
///
/// Methods act on whichever context is current on the calling thread, the
/// same way the underlying API does. Object creation returns 0 on failure.
pub trait GraphicsManager: Send + Sync {
    // Context and capabilities

    fn current_context(&self) -> ContextId;
    fn is_feature_available(&self, feature: Feature) -> bool;
    fn get_constant(&self, constant: Constant) -> i32;
    fn get_string(&self, name: StringName) -> String;
    fn object_label(&self, kind: ObjectKind, id: GLuint, label: &str);

    // Pipeline state

    fn enable(&self, capability: Capability);
    fn disable(&self, capability: Capability);
    fn blend_color(&self, color: Vec4);
    fn blend_equation_separate(&self, equations: BlendEquations);
    fn blend_func_separate(&self, functions: BlendFunctions);
    fn clear_color(&self, color: Vec4);
    fn clear_depth(&self, depth: f32);
    fn clear_stencil(&self, stencil: i32);
    fn clear(&self, mask: ClearMask);
    fn color_mask(&self, mask: [bool; 4]);
    fn cull_face(&self, mode: CullFaceMode);
    fn front_face(&self, mode: FrontFaceMode);
    fn depth_func(&self, function: CompareFunction);
    fn depth_range(&self, range: Vec2);
    fn depth_mask(&self, write: bool);
    fn hint_generate_mipmap(&self, mode: HintMode);
    fn line_width(&self, width: f32);
    fn min_sample_shading(&self, value: f32);
    fn polygon_offset(&self, offset: PolygonOffset);
    fn sample_coverage(&self, coverage: SampleCoverage);
    fn scissor(&self, rect: Rect);
    fn stencil_func_separate(&self, face: StencilFace, function: StencilFunction);
    fn stencil_op_separate(&self, face: StencilFace, operations: StencilOperations);
    fn stencil_mask_separate(&self, face: StencilFace, mask: u32);
    fn viewport(&self, rect: Rect);

    // Buffers

    fn gen_buffer(&self) -> GLuint;
    fn delete_buffer(&self, id: GLuint);
    fn is_buffer(&self, id: GLuint) -> bool;
    fn bind_buffer(&self, target: BufferTarget, id: GLuint);
    /// Allocates `size` bytes for the bound buffer, initialised from `data`
    /// when given.
    fn buffer_data(&self, target: BufferTarget, size: usize, data: Option<&[u8]>, usage: BufferUsage);
    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]);
    fn copy_buffer_sub_data(
        &self,
        read_target: BufferTarget,
        write_target: BufferTarget,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    );
    /// Maps part of the bound buffer, returning its current bytes.
    fn map_buffer_range(&self, target: BufferTarget, range: Range<usize>, mode: MapMode) -> Option<Vec<u8>>;
    fn map_buffer(&self, target: BufferTarget, mode: MapMode) -> Option<Vec<u8>>;
    /// Unmaps the bound buffer, writing back `data` over the mapped range.
    fn unmap_buffer(&self, target: BufferTarget, data: Option<&[u8]>) -> bool;

    // Textures and samplers

    fn gen_texture(&self) -> GLuint;
    fn delete_texture(&self, id: GLuint);
    fn is_texture(&self, id: GLuint) -> bool;
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: TextureTarget, id: GLuint);
    fn tex_image_2d(
        &self,
        target: TexImageTarget,
        level: usize,
        format: ImageFormat,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    );
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_2d(
        &self,
        target: TexImageTarget,
        level: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: ImageFormat,
        data: &[u8],
    );
    fn generate_mipmap(&self, target: TextureTarget);
    fn tex_parameter(&self, target: TextureTarget, parameter: TextureParameter);

    fn gen_sampler(&self) -> GLuint;
    fn delete_sampler(&self, id: GLuint);
    fn is_sampler(&self, id: GLuint) -> bool;
    fn bind_sampler(&self, unit: u32, id: GLuint);
    fn sampler_parameter(&self, id: GLuint, parameter: SamplerParameter);

    // Shaders and programs

    fn create_shader(&self, stage: ShaderStage) -> GLuint;
    fn delete_shader(&self, id: GLuint);
    fn is_shader(&self, id: GLuint) -> bool;
    fn shader_source(&self, id: GLuint, source: &str);
    fn compile_shader(&self, id: GLuint);
    fn get_shader_compile_status(&self, id: GLuint) -> bool;
    fn get_shader_info_log(&self, id: GLuint) -> String;

    fn create_program(&self) -> GLuint;
    fn delete_program(&self, id: GLuint);
    fn is_program(&self, id: GLuint) -> bool;
    fn attach_shader(&self, program: GLuint, shader: GLuint);
    fn detach_shader(&self, program: GLuint, shader: GLuint);
    fn bind_attrib_location(&self, program: GLuint, location: u32, name: &str);
    fn link_program(&self, id: GLuint);
    fn get_program_link_status(&self, id: GLuint) -> bool;
    fn get_program_info_log(&self, id: GLuint) -> String;
    fn get_active_attributes(&self, program: GLuint) -> Vec<ActiveInput>;
    fn get_active_uniforms(&self, program: GLuint) -> Vec<ActiveInput>;
    /// Location of a uniform in the linked program, -1 when it has none.
    fn get_uniform_location(&self, program: GLuint, name: &str) -> i32;
    fn use_program(&self, id: GLuint);

    // Uniforms of the program in use. Vector values are flattened.

    fn uniform_1iv(&self, location: i32, values: &[i32]);
    fn uniform_2iv(&self, location: i32, values: &[i32]);
    fn uniform_3iv(&self, location: i32, values: &[i32]);
    fn uniform_4iv(&self, location: i32, values: &[i32]);
    fn uniform_1uiv(&self, location: i32, values: &[u32]);
    fn uniform_1fv(&self, location: i32, values: &[f32]);
    fn uniform_2fv(&self, location: i32, values: &[f32]);
    fn uniform_3fv(&self, location: i32, values: &[f32]);
    fn uniform_4fv(&self, location: i32, values: &[f32]);
    fn uniform_matrix_2fv(&self, location: i32, values: &[f32]);
    fn uniform_matrix_3fv(&self, location: i32, values: &[f32]);
    fn uniform_matrix_4fv(&self, location: i32, values: &[f32]);

    // Vertex arrays

    fn gen_vertex_array(&self) -> GLuint;
    fn delete_vertex_array(&self, id: GLuint);
    fn is_vertex_array(&self, id: GLuint) -> bool;
    fn bind_vertex_array(&self, id: GLuint);
    fn enable_vertex_attrib_array(&self, location: u32);
    fn disable_vertex_attrib_array(&self, location: u32);
    /// Points `location` at the buffer bound to [`BufferTarget::Array`].
    fn vertex_attrib_pointer(
        &self,
        location: u32,
        components: usize,
        component_type: ComponentType,
        normalized: bool,
        stride: usize,
        offset: usize,
    );
    fn vertex_attrib_divisor(&self, location: u32, divisor: u32);
    fn vertex_attrib_4fv(&self, location: u32, value: Vec4);

    // Framebuffers

    fn gen_framebuffer(&self) -> GLuint;
    fn delete_framebuffer(&self, id: GLuint);
    fn is_framebuffer(&self, id: GLuint) -> bool;
    fn bind_framebuffer(&self, id: GLuint);
    fn get_framebuffer_binding(&self) -> GLuint;
    fn gen_renderbuffer(&self) -> GLuint;
    fn delete_renderbuffer(&self, id: GLuint);
    fn bind_renderbuffer(&self, id: GLuint);
    fn renderbuffer_storage(&self, format: ImageFormat, width: u32, height: u32);
    fn framebuffer_renderbuffer(&self, point: AttachmentPoint, renderbuffer: GLuint);
    fn framebuffer_texture_2d(&self, point: AttachmentPoint, target: TexImageTarget, texture: GLuint, level: u32);
    fn check_framebuffer_status(&self) -> FramebufferStatus;

    // Drawing and read-back

    fn draw_arrays(&self, mode: PrimitiveType, first: usize, count: usize);
    fn draw_arrays_instanced(&self, mode: PrimitiveType, first: usize, count: usize, instances: u32);
    fn draw_elements(&self, mode: PrimitiveType, count: usize, index_type: ComponentType, offset: usize);
    fn draw_elements_instanced(
        &self,
        mode: PrimitiveType,
        count: usize,
        index_type: ComponentType,
        offset: usize,
        instances: u32,
    );
    fn read_pixels(&self, region: Rect, format: ImageFormat) -> Vec<u8>;
}
