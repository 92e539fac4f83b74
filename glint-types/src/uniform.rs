use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use crate::{CubeMapTexture, Holder, InputError, ShaderInputRegistry, Texture, UniformSpec};

static UNIFORM_STAMP: AtomicU64 = AtomicU64::new(1);

fn next_stamp() -> u64 {
    UNIFORM_STAMP.fetch_add(1, Ordering::Relaxed)
}

/// Element type of a uniform. Arrays report the type of their elements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UniformType {
    Int,
    UnsignedInt,
    Float,
    IntVector2,
    IntVector3,
    IntVector4,
    FloatVector2,
    FloatVector3,
    FloatVector4,
    Matrix2,
    Matrix3,
    Matrix4,
    Texture,
    CubeMapTexture,
}

impl UniformType {
    pub fn is_texture(self) -> bool {
        matches!(self, UniformType::Texture | UniformType::CubeMapTexture)
    }
}

#[derive(Clone)]
pub enum UniformValue {
    Int(i32),
    UnsignedInt(u32),
    Float(f32),
    IntVector2(IVec2),
    IntVector3(IVec3),
    IntVector4(IVec4),
    FloatVector2(Vec2),
    FloatVector3(Vec3),
    FloatVector4(Vec4),
    Matrix2(Mat2),
    Matrix3(Mat3),
    Matrix4(Mat4),
    Texture(Arc<Texture>),
    CubeMapTexture(Arc<CubeMapTexture>),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    FloatVector2Array(Vec<Vec2>),
    FloatVector3Array(Vec<Vec3>),
    FloatVector4Array(Vec<Vec4>),
    Matrix4Array(Vec<Mat4>),
    TextureArray(Vec<Arc<Texture>>),
    CubeMapTextureArray(Vec<Arc<CubeMapTexture>>),
}

impl UniformValue {
    pub fn uniform_type(&self) -> UniformType {
        match self {
            UniformValue::Int(_) | UniformValue::IntArray(_) => UniformType::Int,
            UniformValue::UnsignedInt(_) => UniformType::UnsignedInt,
            UniformValue::Float(_) | UniformValue::FloatArray(_) => UniformType::Float,
            UniformValue::IntVector2(_) => UniformType::IntVector2,
            UniformValue::IntVector3(_) => UniformType::IntVector3,
            UniformValue::IntVector4(_) => UniformType::IntVector4,
            UniformValue::FloatVector2(_) | UniformValue::FloatVector2Array(_) => UniformType::FloatVector2,
            UniformValue::FloatVector3(_) | UniformValue::FloatVector3Array(_) => UniformType::FloatVector3,
            UniformValue::FloatVector4(_) | UniformValue::FloatVector4Array(_) => UniformType::FloatVector4,
            UniformValue::Matrix2(_) => UniformType::Matrix2,
            UniformValue::Matrix3(_) => UniformType::Matrix3,
            UniformValue::Matrix4(_) | UniformValue::Matrix4Array(_) => UniformType::Matrix4,
            UniformValue::Texture(_) | UniformValue::TextureArray(_) => UniformType::Texture,
            UniformValue::CubeMapTexture(_) | UniformValue::CubeMapTextureArray(_) => UniformType::CubeMapTexture,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            UniformValue::IntArray(_)
                | UniformValue::FloatArray(_)
                | UniformValue::FloatVector2Array(_)
                | UniformValue::FloatVector3Array(_)
                | UniformValue::FloatVector4Array(_)
                | UniformValue::Matrix4Array(_)
                | UniformValue::TextureArray(_)
                | UniformValue::CubeMapTextureArray(_)
        )
    }

    /// Number of elements; 1 for non-array values.
    pub fn count(&self) -> usize {
        match self {
            UniformValue::IntArray(v) => v.len(),
            UniformValue::FloatArray(v) => v.len(),
            UniformValue::FloatVector2Array(v) => v.len(),
            UniformValue::FloatVector3Array(v) => v.len(),
            UniformValue::FloatVector4Array(v) => v.len(),
            UniformValue::Matrix4Array(v) => v.len(),
            UniformValue::TextureArray(v) => v.len(),
            UniformValue::CubeMapTextureArray(v) => v.len(),
            _ => 1,
        }
    }

    /// Raw bytes used to decide whether a value has changed since it was
    /// last sent. Textures contribute their holder ids.
    pub fn to_bytes(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();
        match self {
            UniformValue::Int(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::UnsignedInt(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Float(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::IntVector2(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::IntVector3(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::IntVector4(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::FloatVector2(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::FloatVector3(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::FloatVector4(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Matrix2(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Matrix3(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Matrix4(v) => bytes.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Texture(t) => bytes.extend_from_slice(&t.id().get().to_ne_bytes()),
            UniformValue::CubeMapTexture(t) => bytes.extend_from_slice(&t.id().get().to_ne_bytes()),
            UniformValue::IntArray(v) => bytes.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::FloatArray(v) => bytes.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::FloatVector2Array(v) => bytes.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::FloatVector3Array(v) => bytes.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::FloatVector4Array(v) => bytes.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Matrix4Array(v) => bytes.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::TextureArray(v) => {
                for t in v {
                    bytes.extend_from_slice(&t.id().get().to_ne_bytes());
                }
            }
            UniformValue::CubeMapTextureArray(v) => {
                for t in v {
                    bytes.extend_from_slice(&t.id().get().to_ne_bytes());
                }
            }
        }
        bytes
    }
}

impl Debug for UniformValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniformValue::Texture(t) => f.debug_tuple("Texture").field(&t.label()).finish(),
            UniformValue::CubeMapTexture(t) => f.debug_tuple("CubeMapTexture").field(&t.label()).finish(),
            UniformValue::TextureArray(v) => f.debug_tuple("TextureArray").field(&v.len()).finish(),
            UniformValue::CubeMapTextureArray(v) => f.debug_tuple("CubeMapTextureArray").field(&v.len()).finish(),
            other => write!(f, "{:?}({:?})", other.uniform_type(), other.to_bytes().as_slice()),
        }
    }
}

/// A named value for a registry uniform spec.
///
/// Each assignment of a value takes a fresh stamp, so two uniforms with the
/// same stamp are known to hold the same value without comparing bytes.
#[derive(Clone)]
pub struct Uniform {
    registry: Arc<ShaderInputRegistry>,
    index: usize,
    value: UniformValue,
    stamp: u64,
}

impl Uniform {
    pub(crate) fn new(registry: Arc<ShaderInputRegistry>, index: usize, value: UniformValue) -> Self {
        Self {
            registry,
            index,
            value,
            stamp: next_stamp(),
        }
    }

    pub fn registry(&self) -> &Arc<ShaderInputRegistry> {
        &self.registry
    }

    /// Index of the spec in its registry.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn spec(&self) -> Option<Arc<UniformSpec>> {
        self.registry.uniform_spec(self.index)
    }

    pub fn name(&self) -> String {
        self.spec().map(|spec| spec.name.clone()).unwrap_or_default()
    }

    pub fn value(&self) -> &UniformValue {
        &self.value
    }

    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Replaces the value if it has the type the spec declares.
    pub fn set_value(&mut self, value: UniformValue) -> Result<(), InputError> {
        if let Some(spec) = self.spec() {
            if spec.value_type != value.uniform_type() {
                return Err(InputError::TypeMismatch {
                    name: spec.name.clone(),
                    expected: format!("{:?}", spec.value_type),
                    actual: format!("{:?}", value.uniform_type()),
                });
            }
        }
        self.value = value;
        self.stamp = next_stamp();
        Ok(())
    }
}

impl Debug for Uniform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uniform")
            .field("name", &self.name())
            .field("value", &self.value)
            .field("stamp", &self.stamp)
            .finish()
    }
}

/// A group of uniforms that can be switched on and off as a whole.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    label: String,
    enabled: bool,
    uniforms: Vec<Uniform>,
}

impl UniformBlock {
    pub fn new() -> Self {
        Self {
            label: String::new(),
            enabled: true,
            uniforms: Vec::new(),
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

    pub fn uniforms(&self) -> &[Uniform] {
        &self.uniforms
    }
}

impl Default for UniformBlock {
    fn default() -> Self {
        Self::new()
    }
}
