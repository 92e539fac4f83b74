use std::sync::Arc;

use parking_lot::RwLock;

use crate::{holder::impl_holder, HolderBase, ShaderInputRegistry, FIRST_HOLDER_CHANGE};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 5] = [
        ShaderStage::Vertex,
        ShaderStage::TessControl,
        ShaderStage::TessEvaluation,
        ShaderStage::Geometry,
        ShaderStage::Fragment,
    ];
}

/// Source code of a single shader stage.
#[derive(Debug)]
pub struct Shader {
    base: HolderBase,
    source: RwLock<String>,
    info_log: RwLock<String>,
}
impl_holder!(Shader);

impl Shader {
    pub const SOURCE_CHANGED: u32 = FIRST_HOLDER_CHANGE;

    pub fn new(source: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            base: HolderBase::new(),
            source: RwLock::new(source.into()),
            info_log: RwLock::new(String::new()),
        })
    }

    pub fn source(&self) -> String {
        self.source.read().clone()
    }

    pub fn set_source(&self, source: impl Into<String>) {
        *self.source.write() = source.into();
        self.base.notify(Self::SOURCE_CHANGED);
    }

    /// Compiler output of the last failed compile, empty after success.
    pub fn info_log(&self) -> String {
        self.info_log.read().clone()
    }

    pub fn set_info_log(&self, log: impl Into<String>) {
        *self.info_log.write() = log.into();
    }
}

#[derive(Debug, Default)]
struct ProgramStages {
    vertex: Option<Arc<Shader>>,
    tess_control: Option<Arc<Shader>>,
    tess_evaluation: Option<Arc<Shader>>,
    geometry: Option<Arc<Shader>>,
    fragment: Option<Arc<Shader>>,
}

/// A set of shader stages linked against a [`ShaderInputRegistry`].
#[derive(Debug)]
pub struct ShaderProgram {
    base: HolderBase,
    registry: Arc<ShaderInputRegistry>,
    stages: RwLock<ProgramStages>,
    concurrent: RwLock<bool>,
    info_log: RwLock<String>,
}
impl_holder!(ShaderProgram);

impl ShaderProgram {
    pub const VERTEX_SHADER_CHANGED: u32 = FIRST_HOLDER_CHANGE;
    pub const TESS_CONTROL_SHADER_CHANGED: u32 = FIRST_HOLDER_CHANGE + 1;
    pub const TESS_EVALUATION_SHADER_CHANGED: u32 = FIRST_HOLDER_CHANGE + 2;
    pub const GEOMETRY_SHADER_CHANGED: u32 = FIRST_HOLDER_CHANGE + 3;
    pub const FRAGMENT_SHADER_CHANGED: u32 = FIRST_HOLDER_CHANGE + 4;

    pub fn new(registry: Arc<ShaderInputRegistry>) -> Arc<Self> {
        Arc::new(Self {
            base: HolderBase::new(),
            registry,
            stages: RwLock::new(ProgramStages::default()),
            concurrent: RwLock::new(false),
            info_log: RwLock::new(String::new()),
        })
    }

    /// Convenience constructor for the common vertex + fragment case.
    pub fn from_sources(
        registry: Arc<ShaderInputRegistry>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Arc<Self> {
        let program = Self::new(registry);
        program.set_shader(ShaderStage::Vertex, Some(Shader::new(vertex)));
        program.set_shader(ShaderStage::Fragment, Some(Shader::new(fragment)));
        program
    }

    pub fn registry(&self) -> &Arc<ShaderInputRegistry> {
        &self.registry
    }

    pub fn shader(&self, stage: ShaderStage) -> Option<Arc<Shader>> {
        let stages = self.stages.read();
        match stage {
            ShaderStage::Vertex => stages.vertex.clone(),
            ShaderStage::TessControl => stages.tess_control.clone(),
            ShaderStage::TessEvaluation => stages.tess_evaluation.clone(),
            ShaderStage::Geometry => stages.geometry.clone(),
            ShaderStage::Fragment => stages.fragment.clone(),
        }
    }

    pub fn set_shader(&self, stage: ShaderStage, shader: Option<Arc<Shader>>) {
        let bit = {
            let mut stages = self.stages.write();
            let (slot, bit) = match stage {
                ShaderStage::Vertex => (&mut stages.vertex, Self::VERTEX_SHADER_CHANGED),
                ShaderStage::TessControl => (&mut stages.tess_control, Self::TESS_CONTROL_SHADER_CHANGED),
                ShaderStage::TessEvaluation => (&mut stages.tess_evaluation, Self::TESS_EVALUATION_SHADER_CHANGED),
                ShaderStage::Geometry => (&mut stages.geometry, Self::GEOMETRY_SHADER_CHANGED),
                ShaderStage::Fragment => (&mut stages.fragment, Self::FRAGMENT_SHADER_CHANGED),
            };
            *slot = shader;
            bit
        };
        self.base.notify(bit);
    }

    /// A concurrent program tracks uniform values separately for every
    /// thread that draws with it.
    pub fn set_concurrent(&self, concurrent: bool) {
        *self.concurrent.write() = concurrent;
    }

    pub fn is_concurrent(&self) -> bool {
        *self.concurrent.read()
    }

    /// Linker output of the last failed link, empty after success.
    pub fn info_log(&self) -> String {
        self.info_log.read().clone()
    }

    pub fn set_info_log(&self, log: impl Into<String>) {
        *self.info_log.write() = log.into();
    }
}
