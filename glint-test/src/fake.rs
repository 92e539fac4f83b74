use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    ops::Range,
    sync::Arc,
};

use glam::{Vec2, Vec4};
use glint::{
    types::{
        AttachmentPoint, BlendEquations, BlendFunctions, BufferTarget, BufferUsage, Capability, ClearMask,
        CompareFunction, ComponentType, CullFaceMode, FrontFaceMode, HintMode, ImageFormat, MapMode, PolygonOffset,
        PrimitiveType, Rect, SampleCoverage, SamplerParameter, ShaderStage, StencilFunction, StencilOperations,
        TexImageTarget, TextureTarget,
    },
    ActiveInput, Constant, ContextId, Feature, FramebufferStatus, GLuint, GraphicsManager, ObjectKind, StencilFace,
    StringName, TextureParameter, ValueType,
};
use parking_lot::Mutex;

/// One driver call received by [`FakeGraphicsManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: &'static str,
    pub args: String,
}

#[derive(Debug, Clone)]
struct FakeShader {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    info_log: String,
}

#[derive(Debug, Clone, Default)]
struct FakeProgram {
    shaders: Vec<GLuint>,
    linked: bool,
    info_log: String,
    attributes: Vec<ActiveInput>,
    uniforms: Vec<ActiveInput>,
}

#[derive(Debug)]
struct FakeState {
    context: ContextId,
    features: HashSet<Feature>,
    constants: HashMap<Constant, i32>,
    fail_creation: bool,
    forced_status: Option<FramebufferStatus>,
    next_id: GLuint,

    buffers: HashMap<GLuint, Vec<u8>>,
    bound_buffers: HashMap<(ContextId, BufferTarget), GLuint>,
    mapped: HashMap<GLuint, Range<usize>>,
    textures: HashSet<GLuint>,
    samplers: HashSet<GLuint>,
    shaders: HashMap<GLuint, FakeShader>,
    programs: HashMap<GLuint, FakeProgram>,
    vertex_arrays: HashSet<GLuint>,
    framebuffers: HashMap<GLuint, [GLuint; 3]>,
    renderbuffers: HashSet<GLuint>,
    framebuffer: GLuint,
}

impl FakeState {
    fn new() -> Self {
        Self {
            context: ContextId(1),
            features: Feature::ALL.into_iter().collect(),
            constants: HashMap::from([
                (Constant::MaxCubeMapTextureSize, 4096),
                (Constant::MaxRenderbufferSize, 4096),
                (Constant::MaxTextureImageUnits, 16),
                (Constant::MaxTextureSize, 4096),
                (Constant::MaxVertexAttribs, 16),
            ]),
            fail_creation: false,
            forced_status: None,
            next_id: 1,
            buffers: HashMap::new(),
            bound_buffers: HashMap::new(),
            mapped: HashMap::new(),
            textures: HashSet::new(),
            samplers: HashSet::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashSet::new(),
            framebuffers: HashMap::new(),
            renderbuffers: HashSet::new(),
            framebuffer: 0,
        }
    }

    fn gen(&mut self) -> GLuint {
        if self.fail_creation {
            return 0;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn bound_buffer_mut(&mut self, target: BufferTarget) -> Option<&mut Vec<u8>> {
        let id = self.bound_buffers.get(&(self.context, target)).copied()?;
        self.buffers.get_mut(&id)
    }
}

/// A [`GraphicsManager`] that records every call and emulates just enough
/// of a driver for the renderer to run against it.
///
/// Shaders "compile" by scanning for `uniform`, `attribute` and vertex `in`
/// declarations. A source containing `#error` fails to compile.
#[derive(Debug)]
pub struct FakeGraphicsManager {
    calls: Mutex<Vec<Call>>,
    state: Mutex<FakeState>,
}

impl FakeGraphicsManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            state: Mutex::new(FakeState::new()),
        })
    }

    fn record(&self, name: &'static str, args: impl Debug) {
        self.calls.lock().push(Call {
            name,
            args: format!("{:?}", args),
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Returns and forgets the calls recorded so far.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|call| call.name == name).count()
    }

    /// Arguments of every call to `name`, in order.
    pub fn args_of(&self, name: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.name == name)
            .map(|call| call.args.clone())
            .collect()
    }

    pub fn set_feature(&self, feature: Feature, available: bool) {
        let mut state = self.state.lock();
        match available {
            true => state.features.insert(feature),
            false => state.features.remove(&feature),
        };
    }

    pub fn set_constant(&self, constant: Constant, value: i32) {
        self.state.lock().constants.insert(constant, value);
    }

    pub fn make_current(&self, context: ContextId) {
        self.state.lock().context = context;
    }

    /// Makes every object creation return 0 until reset.
    pub fn set_fail_creation(&self, fail: bool) {
        self.state.lock().fail_creation = fail;
    }

    /// Overrides what framebuffer completeness checks report.
    pub fn force_framebuffer_status(&self, status: Option<FramebufferStatus>) {
        self.state.lock().forced_status = status;
    }

    pub fn buffer_contents(&self, id: GLuint) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&id).cloned()
    }

    /// Number of driver objects alive, of every kind.
    pub fn live_object_count(&self) -> usize {
        let state = self.state.lock();
        state.buffers.len()
            + state.textures.len()
            + state.samplers.len()
            + state.shaders.len()
            + state.programs.len()
            + state.vertex_arrays.len()
            + state.framebuffers.len()
            + state.renderbuffers.len()
    }
}

fn value_type(name: &str) -> Option<ValueType> {
    Some(match name {
        "float" => ValueType::Float,
        "vec2" => ValueType::FloatVec2,
        "vec3" => ValueType::FloatVec3,
        "vec4" => ValueType::FloatVec4,
        "int" => ValueType::Int,
        "ivec2" => ValueType::IntVec2,
        "ivec3" => ValueType::IntVec3,
        "ivec4" => ValueType::IntVec4,
        "uint" => ValueType::UnsignedInt,
        "mat2" => ValueType::FloatMat2,
        "mat3" => ValueType::FloatMat3,
        "mat4" => ValueType::FloatMat4,
        "sampler2D" => ValueType::Sampler2D,
        "samplerCube" => ValueType::SamplerCube,
        _ => return None,
    })
}

/// Parses `<qualifier> <type> <name>[<size>];` declarations.
fn declarations(source: &str, qualifiers: &[&str]) -> Vec<ActiveInput> {
    let mut inputs = Vec::new();
    for line in source.lines() {
        let mut words = line.trim().trim_end_matches(';').split_whitespace();
        let (Some(qualifier), Some(type_name), Some(name)) = (words.next(), words.next(), words.next()) else {
            continue;
        };
        if !qualifiers.contains(&qualifier) {
            continue;
        }
        let Some(value_type) = value_type(type_name) else {
            continue;
        };
        let (name, size) = match name.split_once('[') {
            Some((base, rest)) => {
                let size = rest.trim_end_matches(']').parse().unwrap_or(1);
                (format!("{}[0]", base), size)
            }
            None => (name.to_owned(), 1),
        };
        inputs.push(ActiveInput { name, value_type, size });
    }
    inputs
}

impl GraphicsManager for FakeGraphicsManager {
    fn current_context(&self) -> ContextId {
        self.state.lock().context
    }

    fn is_feature_available(&self, feature: Feature) -> bool {
        self.state.lock().features.contains(&feature)
    }

    fn get_constant(&self, constant: Constant) -> i32 {
        self.state.lock().constants.get(&constant).copied().unwrap_or(0)
    }

    fn get_string(&self, name: StringName) -> String {
        match name {
            StringName::Vendor => "glint".to_owned(),
            StringName::Renderer => "fake".to_owned(),
            StringName::Version => "fake 1.0".to_owned(),
            StringName::Extensions => String::new(),
        }
    }

    fn object_label(&self, kind: ObjectKind, id: GLuint, label: &str) {
        self.record("object_label", (kind, id, label));
    }

    fn enable(&self, capability: Capability) {
        self.record("enable", capability);
    }

    fn disable(&self, capability: Capability) {
        self.record("disable", capability);
    }

    fn blend_color(&self, color: Vec4) {
        self.record("blend_color", color);
    }

    fn blend_equation_separate(&self, equations: BlendEquations) {
        self.record("blend_equation_separate", equations);
    }

    fn blend_func_separate(&self, functions: BlendFunctions) {
        self.record("blend_func_separate", functions);
    }

    fn clear_color(&self, color: Vec4) {
        self.record("clear_color", color);
    }

    fn clear_depth(&self, depth: f32) {
        self.record("clear_depth", depth);
    }

    fn clear_stencil(&self, stencil: i32) {
        self.record("clear_stencil", stencil);
    }

    fn clear(&self, mask: ClearMask) {
        self.record("clear", mask);
    }

    fn color_mask(&self, mask: [bool; 4]) {
        self.record("color_mask", mask);
    }

    fn cull_face(&self, mode: CullFaceMode) {
        self.record("cull_face", mode);
    }

    fn front_face(&self, mode: FrontFaceMode) {
        self.record("front_face", mode);
    }

    fn depth_func(&self, function: CompareFunction) {
        self.record("depth_func", function);
    }

    fn depth_range(&self, range: Vec2) {
        self.record("depth_range", range);
    }

    fn depth_mask(&self, write: bool) {
        self.record("depth_mask", write);
    }

    fn hint_generate_mipmap(&self, mode: HintMode) {
        self.record("hint_generate_mipmap", mode);
    }

    fn line_width(&self, width: f32) {
        self.record("line_width", width);
    }

    fn min_sample_shading(&self, value: f32) {
        self.record("min_sample_shading", value);
    }

    fn polygon_offset(&self, offset: PolygonOffset) {
        self.record("polygon_offset", offset);
    }

    fn sample_coverage(&self, coverage: SampleCoverage) {
        self.record("sample_coverage", coverage);
    }

    fn scissor(&self, rect: Rect) {
        self.record("scissor", rect);
    }

    fn stencil_func_separate(&self, face: StencilFace, function: StencilFunction) {
        self.record("stencil_func_separate", (face, function));
    }

    fn stencil_op_separate(&self, face: StencilFace, operations: StencilOperations) {
        self.record("stencil_op_separate", (face, operations));
    }

    fn stencil_mask_separate(&self, face: StencilFace, mask: u32) {
        self.record("stencil_mask_separate", (face, mask));
    }

    fn viewport(&self, rect: Rect) {
        self.record("viewport", rect);
    }

    fn gen_buffer(&self) -> GLuint {
        let mut state = self.state.lock();
        let id = state.gen();
        if id != 0 {
            state.buffers.insert(id, Vec::new());
        }
        drop(state);
        self.record("gen_buffer", id);
        id
    }

    fn delete_buffer(&self, id: GLuint) {
        self.record("delete_buffer", id);
        let mut state = self.state.lock();
        state.buffers.remove(&id);
        state.mapped.remove(&id);
    }

    fn is_buffer(&self, id: GLuint) -> bool {
        self.state.lock().buffers.contains_key(&id)
    }

    fn bind_buffer(&self, target: BufferTarget, id: GLuint) {
        self.record("bind_buffer", (target, id));
        let mut state = self.state.lock();
        let context = state.context;
        state.bound_buffers.insert((context, target), id);
    }

    fn buffer_data(&self, target: BufferTarget, size: usize, data: Option<&[u8]>, usage: BufferUsage) {
        self.record("buffer_data", (target, size, usage));
        if let Some(buffer) = self.state.lock().bound_buffer_mut(target) {
            *buffer = vec![0; size];
            if let Some(data) = data {
                let len = data.len().min(size);
                buffer[..len].copy_from_slice(&data[..len]);
            }
        }
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.record("buffer_sub_data", (target, offset, data.len()));
        if let Some(buffer) = self.state.lock().bound_buffer_mut(target) {
            if let Some(range) = buffer.get_mut(offset..offset + data.len()) {
                range.copy_from_slice(data);
            }
        }
    }

    fn copy_buffer_sub_data(
        &self,
        read_target: BufferTarget,
        write_target: BufferTarget,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) {
        self.record(
            "copy_buffer_sub_data",
            (read_target, write_target, read_offset, write_offset, size),
        );
        let mut state = self.state.lock();
        let bytes = state
            .bound_buffer_mut(read_target)
            .and_then(|buffer| buffer.get(read_offset..read_offset + size).map(<[u8]>::to_vec));
        if let (Some(bytes), Some(buffer)) = (bytes, state.bound_buffer_mut(write_target)) {
            if let Some(range) = buffer.get_mut(write_offset..write_offset + size) {
                range.copy_from_slice(&bytes);
            }
        }
    }

    fn map_buffer_range(&self, target: BufferTarget, range: Range<usize>, mode: MapMode) -> Option<Vec<u8>> {
        self.record("map_buffer_range", (target, range.clone(), mode));
        let mut state = self.state.lock();
        let id = state.bound_buffers.get(&(state.context, target)).copied()?;
        let bytes = state.buffers.get(&id)?.get(range.clone())?.to_vec();
        state.mapped.insert(id, range);
        Some(bytes)
    }

    fn map_buffer(&self, target: BufferTarget, mode: MapMode) -> Option<Vec<u8>> {
        self.record("map_buffer", (target, mode));
        let mut state = self.state.lock();
        let id = state.bound_buffers.get(&(state.context, target)).copied()?;
        let bytes = state.buffers.get(&id)?.clone();
        state.mapped.insert(id, 0..bytes.len());
        Some(bytes)
    }

    fn unmap_buffer(&self, target: BufferTarget, data: Option<&[u8]>) -> bool {
        self.record("unmap_buffer", (target, data.map(<[u8]>::len)));
        let mut state = self.state.lock();
        let Some(id) = state.bound_buffers.get(&(state.context, target)).copied() else {
            return false;
        };
        let Some(range) = state.mapped.remove(&id) else {
            return false;
        };
        if let (Some(data), Some(buffer)) = (data, state.buffers.get_mut(&id)) {
            let len = data.len().min(range.len());
            if let Some(slot) = buffer.get_mut(range.start..range.start + len) {
                slot.copy_from_slice(&data[..len]);
            }
        }
        true
    }

    fn gen_texture(&self) -> GLuint {
        let mut state = self.state.lock();
        let id = state.gen();
        if id != 0 {
            state.textures.insert(id);
        }
        drop(state);
        self.record("gen_texture", id);
        id
    }

    fn delete_texture(&self, id: GLuint) {
        self.record("delete_texture", id);
        self.state.lock().textures.remove(&id);
    }

    fn is_texture(&self, id: GLuint) -> bool {
        self.state.lock().textures.contains(&id)
    }

    fn active_texture(&self, unit: u32) {
        self.record("active_texture", unit);
    }

    fn bind_texture(&self, target: TextureTarget, id: GLuint) {
        self.record("bind_texture", (target, id));
    }

    fn tex_image_2d(
        &self,
        target: TexImageTarget,
        level: usize,
        format: ImageFormat,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) {
        self.record(
            "tex_image_2d",
            (target, level, format, width, height, data.map(<[u8]>::len)),
        );
    }

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
    ) {
        self.record(
            "tex_sub_image_2d",
            (target, level, x, y, width, height, format, data.len()),
        );
    }

    fn generate_mipmap(&self, target: TextureTarget) {
        self.record("generate_mipmap", target);
    }

    fn tex_parameter(&self, target: TextureTarget, parameter: TextureParameter) {
        self.record("tex_parameter", (target, parameter));
    }

    fn gen_sampler(&self) -> GLuint {
        let mut state = self.state.lock();
        let id = state.gen();
        if id != 0 {
            state.samplers.insert(id);
        }
        drop(state);
        self.record("gen_sampler", id);
        id
    }

    fn delete_sampler(&self, id: GLuint) {
        self.record("delete_sampler", id);
        self.state.lock().samplers.remove(&id);
    }

    fn is_sampler(&self, id: GLuint) -> bool {
        self.state.lock().samplers.contains(&id)
    }

    fn bind_sampler(&self, unit: u32, id: GLuint) {
        self.record("bind_sampler", (unit, id));
    }

    fn sampler_parameter(&self, id: GLuint, parameter: SamplerParameter) {
        self.record("sampler_parameter", (id, parameter));
    }

    fn create_shader(&self, stage: ShaderStage) -> GLuint {
        let mut state = self.state.lock();
        let id = state.gen();
        if id != 0 {
            state.shaders.insert(id, FakeShader {
                stage,
                source: String::new(),
                compiled: false,
                info_log: String::new(),
            });
        }
        drop(state);
        self.record("create_shader", (stage, id));
        id
    }

    fn delete_shader(&self, id: GLuint) {
        self.record("delete_shader", id);
        self.state.lock().shaders.remove(&id);
    }

    fn is_shader(&self, id: GLuint) -> bool {
        self.state.lock().shaders.contains_key(&id)
    }

    fn shader_source(&self, id: GLuint, source: &str) {
        self.record("shader_source", id);
        if let Some(shader) = self.state.lock().shaders.get_mut(&id) {
            shader.source = source.to_owned();
        }
    }

    fn compile_shader(&self, id: GLuint) {
        self.record("compile_shader", id);
        if let Some(shader) = self.state.lock().shaders.get_mut(&id) {
            match shader.source.lines().position(|line| line.trim_start().starts_with("#error")) {
                Some(line) => {
                    shader.compiled = false;
                    shader.info_log = format!("ERROR: 0:{}: '#error' : user error", line + 1);
                }
                None => {
                    shader.compiled = true;
                    shader.info_log.clear();
                }
            }
        }
    }

    fn get_shader_compile_status(&self, id: GLuint) -> bool {
        self.state.lock().shaders.get(&id).map_or(false, |shader| shader.compiled)
    }

    fn get_shader_info_log(&self, id: GLuint) -> String {
        self.state
            .lock()
            .shaders
            .get(&id)
            .map(|shader| shader.info_log.clone())
            .unwrap_or_default()
    }

    fn create_program(&self) -> GLuint {
        let mut state = self.state.lock();
        let id = state.gen();
        if id != 0 {
            state.programs.insert(id, FakeProgram::default());
        }
        drop(state);
        self.record("create_program", id);
        id
    }

    fn delete_program(&self, id: GLuint) {
        self.record("delete_program", id);
        self.state.lock().programs.remove(&id);
    }

    fn is_program(&self, id: GLuint) -> bool {
        self.state.lock().programs.contains_key(&id)
    }

    fn attach_shader(&self, program: GLuint, shader: GLuint) {
        self.record("attach_shader", (program, shader));
        if let Some(program) = self.state.lock().programs.get_mut(&program) {
            program.shaders.push(shader);
        }
    }

    fn detach_shader(&self, program: GLuint, shader: GLuint) {
        self.record("detach_shader", (program, shader));
        if let Some(program) = self.state.lock().programs.get_mut(&program) {
            program.shaders.retain(|attached| *attached != shader);
        }
    }

    fn bind_attrib_location(&self, program: GLuint, location: u32, name: &str) {
        self.record("bind_attrib_location", (program, location, name));
    }

    fn link_program(&self, id: GLuint) {
        self.record("link_program", id);
        let mut state = self.state.lock();
        let Some(shader_ids) = state.programs.get(&id).map(|program| program.shaders.clone()) else {
            return;
        };
        let shaders: Vec<FakeShader> = shader_ids
            .iter()
            .filter_map(|shader| state.shaders.get(shader).cloned())
            .collect();

        let mut error = None;
        if !shaders.iter().any(|shader| shader.stage == ShaderStage::Vertex) {
            error = Some("error: no vertex shader attached".to_owned());
        } else if shaders.iter().any(|shader| !shader.compiled) {
            error = Some("error: attached shader is not compiled".to_owned());
        }

        let mut uniforms: Vec<ActiveInput> = Vec::new();
        let mut attributes = Vec::new();
        for shader in &shaders {
            for uniform in declarations(&shader.source, &["uniform"]) {
                match uniforms.iter().find(|existing| existing.name == uniform.name) {
                    Some(existing) if existing.value_type != uniform.value_type => {
                        error = Some(format!(
                            "error: uniform '{}' declared with different types",
                            uniform.name
                        ));
                    }
                    Some(_) => {}
                    None => uniforms.push(uniform),
                }
            }
            if shader.stage == ShaderStage::Vertex {
                attributes.extend(declarations(&shader.source, &["attribute", "in"]));
            }
        }

        if let Some(program) = state.programs.get_mut(&id) {
            match error {
                Some(log) => {
                    *program = FakeProgram {
                        shaders: shader_ids,
                        linked: false,
                        info_log: log,
                        ..FakeProgram::default()
                    }
                }
                None => {
                    program.linked = true;
                    program.info_log.clear();
                    program.attributes = attributes;
                    program.uniforms = uniforms;
                }
            }
        }
    }

    fn get_program_link_status(&self, id: GLuint) -> bool {
        self.state.lock().programs.get(&id).map_or(false, |program| program.linked)
    }

    fn get_program_info_log(&self, id: GLuint) -> String {
        self.state
            .lock()
            .programs
            .get(&id)
            .map(|program| program.info_log.clone())
            .unwrap_or_default()
    }

    fn get_active_attributes(&self, program: GLuint) -> Vec<ActiveInput> {
        self.state
            .lock()
            .programs
            .get(&program)
            .map(|program| program.attributes.clone())
            .unwrap_or_default()
    }

    fn get_active_uniforms(&self, program: GLuint) -> Vec<ActiveInput> {
        self.state
            .lock()
            .programs
            .get(&program)
            .map(|program| program.uniforms.clone())
            .unwrap_or_default()
    }

    fn get_uniform_location(&self, program: GLuint, name: &str) -> i32 {
        let state = self.state.lock();
        let Some(program) = state.programs.get(&program) else {
            return -1;
        };
        program
            .uniforms
            .iter()
            .position(|uniform| {
                uniform.name == name || uniform.name.strip_suffix("[0]") == Some(name)
            })
            .map_or(-1, |index| index as i32)
    }

    fn use_program(&self, id: GLuint) {
        self.record("use_program", id);
    }

    fn uniform_1iv(&self, location: i32, values: &[i32]) {
        self.record("uniform_1iv", (location, values));
    }

    fn uniform_2iv(&self, location: i32, values: &[i32]) {
        self.record("uniform_2iv", (location, values));
    }

    fn uniform_3iv(&self, location: i32, values: &[i32]) {
        self.record("uniform_3iv", (location, values));
    }

    fn uniform_4iv(&self, location: i32, values: &[i32]) {
        self.record("uniform_4iv", (location, values));
    }

    fn uniform_1uiv(&self, location: i32, values: &[u32]) {
        self.record("uniform_1uiv", (location, values));
    }

    fn uniform_1fv(&self, location: i32, values: &[f32]) {
        self.record("uniform_1fv", (location, values));
    }

    fn uniform_2fv(&self, location: i32, values: &[f32]) {
        self.record("uniform_2fv", (location, values));
    }

    fn uniform_3fv(&self, location: i32, values: &[f32]) {
        self.record("uniform_3fv", (location, values));
    }

    fn uniform_4fv(&self, location: i32, values: &[f32]) {
        self.record("uniform_4fv", (location, values));
    }

    fn uniform_matrix_2fv(&self, location: i32, values: &[f32]) {
        self.record("uniform_matrix_2fv", (location, values));
    }

    fn uniform_matrix_3fv(&self, location: i32, values: &[f32]) {
        self.record("uniform_matrix_3fv", (location, values));
    }

    fn uniform_matrix_4fv(&self, location: i32, values: &[f32]) {
        self.record("uniform_matrix_4fv", (location, values));
    }

    fn gen_vertex_array(&self) -> GLuint {
        let mut state = self.state.lock();
        let id = state.gen();
        if id != 0 {
            state.vertex_arrays.insert(id);
        }
        drop(state);
        self.record("gen_vertex_array", id);
        id
    }

    fn delete_vertex_array(&self, id: GLuint) {
        self.record("delete_vertex_array", id);
        self.state.lock().vertex_arrays.remove(&id);
    }

    fn is_vertex_array(&self, id: GLuint) -> bool {
        self.state.lock().vertex_arrays.contains(&id)
    }

    fn bind_vertex_array(&self, id: GLuint) {
        self.record("bind_vertex_array", id);
    }

    fn enable_vertex_attrib_array(&self, location: u32) {
        self.record("enable_vertex_attrib_array", location);
    }

    fn disable_vertex_attrib_array(&self, location: u32) {
        self.record("disable_vertex_attrib_array", location);
    }

    fn vertex_attrib_pointer(
        &self,
        location: u32,
        components: usize,
        component_type: ComponentType,
        normalized: bool,
        stride: usize,
        offset: usize,
    ) {
        self.record(
            "vertex_attrib_pointer",
            (location, components, component_type, normalized, stride, offset),
        );
    }

    fn vertex_attrib_divisor(&self, location: u32, divisor: u32) {
        self.record("vertex_attrib_divisor", (location, divisor));
    }

    fn vertex_attrib_4fv(&self, location: u32, value: Vec4) {
        self.record("vertex_attrib_4fv", (location, value));
    }

    fn gen_framebuffer(&self) -> GLuint {
        let mut state = self.state.lock();
        let id = state.gen();
        if id != 0 {
            state.framebuffers.insert(id, [0; 3]);
        }
        drop(state);
        self.record("gen_framebuffer", id);
        id
    }

    fn delete_framebuffer(&self, id: GLuint) {
        self.record("delete_framebuffer", id);
        self.state.lock().framebuffers.remove(&id);
    }

    fn is_framebuffer(&self, id: GLuint) -> bool {
        self.state.lock().framebuffers.contains_key(&id)
    }

    fn bind_framebuffer(&self, id: GLuint) {
        self.record("bind_framebuffer", id);
        self.state.lock().framebuffer = id;
    }

    fn get_framebuffer_binding(&self) -> GLuint {
        self.state.lock().framebuffer
    }

    fn gen_renderbuffer(&self) -> GLuint {
        let mut state = self.state.lock();
        let id = state.gen();
        if id != 0 {
            state.renderbuffers.insert(id);
        }
        drop(state);
        self.record("gen_renderbuffer", id);
        id
    }

    fn delete_renderbuffer(&self, id: GLuint) {
        self.record("delete_renderbuffer", id);
        self.state.lock().renderbuffers.remove(&id);
    }

    fn bind_renderbuffer(&self, id: GLuint) {
        self.record("bind_renderbuffer", id);
    }

    fn renderbuffer_storage(&self, format: ImageFormat, width: u32, height: u32) {
        self.record("renderbuffer_storage", (format, width, height));
    }

    fn framebuffer_renderbuffer(&self, point: AttachmentPoint, renderbuffer: GLuint) {
        self.record("framebuffer_renderbuffer", (point, renderbuffer));
        let mut state = self.state.lock();
        let bound = state.framebuffer;
        if let Some(attachments) = state.framebuffers.get_mut(&bound) {
            attachments[point as usize] = renderbuffer;
        }
    }

    fn framebuffer_texture_2d(&self, point: AttachmentPoint, target: TexImageTarget, texture: GLuint, level: u32) {
        self.record("framebuffer_texture_2d", (point, target, texture, level));
        let mut state = self.state.lock();
        let bound = state.framebuffer;
        if let Some(attachments) = state.framebuffers.get_mut(&bound) {
            attachments[point as usize] = texture;
        }
    }

    fn check_framebuffer_status(&self) -> FramebufferStatus {
        let state = self.state.lock();
        if let Some(status) = state.forced_status {
            return status;
        }
        match state.framebuffers.get(&state.framebuffer) {
            Some(attachments) if attachments.iter().all(|id| *id == 0) => FramebufferStatus::IncompleteMissingAttachment,
            _ => FramebufferStatus::Complete,
        }
    }

    fn draw_arrays(&self, mode: PrimitiveType, first: usize, count: usize) {
        self.record("draw_arrays", (mode, first, count));
    }

    fn draw_arrays_instanced(&self, mode: PrimitiveType, first: usize, count: usize, instances: u32) {
        self.record("draw_arrays_instanced", (mode, first, count, instances));
    }

    fn draw_elements(&self, mode: PrimitiveType, count: usize, index_type: ComponentType, offset: usize) {
        self.record("draw_elements", (mode, count, index_type, offset));
    }

    fn draw_elements_instanced(
        &self,
        mode: PrimitiveType,
        count: usize,
        index_type: ComponentType,
        offset: usize,
        instances: u32,
    ) {
        self.record("draw_elements_instanced", (mode, count, index_type, offset, instances));
    }

    fn read_pixels(&self, region: Rect, format: ImageFormat) -> Vec<u8> {
        self.record("read_pixels", (region, format));
        let pixels = region.width.max(0) as usize * region.height.max(0) as usize;
        vec![0x7f; pixels * format.bytes_per_pixel()]
    }
}
