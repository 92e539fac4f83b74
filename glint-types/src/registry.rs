use std::{fmt::Debug, sync::Arc};

use parking_lot::RwLock;
use thiserror::Error;

use crate::{
    holder::impl_holder, Attribute, AttributeValue, HolderBase, Uniform, UniformType, UniformValue,
    FIRST_HOLDER_CHANGE,
};

/// Errors raised while building uniforms and attributes.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("No {kind} named \"{name}\" is registered")]
    UnknownInput { kind: &'static str, name: String },
    #[error("An input named \"{0}\" is already registered")]
    Duplicate(String),
    #[error("Value for \"{name}\" has type {actual} but the spec declares {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("Index {0} is out of range")]
    IndexOutOfRange(usize),
    #[error("Attribute array already holds the maximum of {0} attributes")]
    TooManyAttributes(usize),
}

/// Merges an inherited uniform with a new one further down the tree.
pub type CombineFunction = Arc<dyn Fn(&Uniform, &Uniform) -> Uniform + Send + Sync>;
/// Derives additional uniforms from a uniform as it is pushed.
pub type GenerateFunction = Arc<dyn Fn(&Uniform) -> Vec<Uniform> + Send + Sync>;

pub struct UniformSpec {
    pub name: String,
    pub value_type: UniformType,
    pub doc: String,
    /// Called with the inherited value and the new value when a node sets a
    /// uniform that an ancestor already set.
    pub combine: Option<CombineFunction>,
    pub generate: Option<GenerateFunction>,
}

impl UniformSpec {
    pub fn new(name: impl Into<String>, value_type: UniformType) -> Self {
        Self {
            name: name.into(),
            value_type,
            doc: String::new(),
            combine: None,
            generate: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn with_combine(mut self, combine: CombineFunction) -> Self {
        self.combine = Some(combine);
        self
    }

    pub fn with_generate(mut self, generate: GenerateFunction) -> Self {
        self.generate = Some(generate);
        self
    }
}

impl Debug for UniformSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniformSpec")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("combine", &self.combine.is_some())
            .field("generate", &self.generate.is_some())
            .finish()
    }
}

/// Shader-visible type of a vertex attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Float,
    FloatVector2,
    FloatVector3,
    FloatVector4,
    Matrix2,
    Matrix3,
    Matrix4,
}

impl AttributeType {
    /// Attribute locations the type occupies.
    pub fn slot_count(self) -> u32 {
        match self {
            AttributeType::Matrix2 => 2,
            AttributeType::Matrix3 => 3,
            AttributeType::Matrix4 => 4,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub name: String,
    pub value_type: AttributeType,
    pub doc: String,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, value_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            value_type,
            doc: String::new(),
        }
    }
}

/// Declares the uniforms and attributes shaders may use.
#[derive(Debug)]
pub struct ShaderInputRegistry {
    base: HolderBase,
    uniforms: RwLock<Vec<Arc<UniformSpec>>>,
    attributes: RwLock<Vec<AttributeSpec>>,
}
impl_holder!(ShaderInputRegistry);

impl ShaderInputRegistry {
    pub const UNIFORM_SPEC_ADDED: u32 = FIRST_HOLDER_CHANGE;
    pub const ATTRIBUTE_SPEC_ADDED: u32 = FIRST_HOLDER_CHANGE + 1;

    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: HolderBase::new(),
            uniforms: RwLock::new(Vec::new()),
            attributes: RwLock::new(Vec::new()),
        })
    }

    pub fn add_uniform_spec(&self, spec: UniformSpec) -> Result<usize, InputError> {
        let index = {
            let mut uniforms = self.uniforms.write();
            if uniforms.iter().any(|u| u.name == spec.name) {
                return Err(InputError::Duplicate(spec.name));
            }
            uniforms.push(Arc::new(spec));
            uniforms.len() - 1
        };
        self.base.notify(Self::UNIFORM_SPEC_ADDED);
        Ok(index)
    }

    pub fn add_attribute_spec(&self, spec: AttributeSpec) -> Result<usize, InputError> {
        let index = {
            let mut attributes = self.attributes.write();
            if attributes.iter().any(|a| a.name == spec.name) {
                return Err(InputError::Duplicate(spec.name));
            }
            attributes.push(spec);
            attributes.len() - 1
        };
        self.base.notify(Self::ATTRIBUTE_SPEC_ADDED);
        Ok(index)
    }

    pub fn uniform_spec(&self, index: usize) -> Option<Arc<UniformSpec>> {
        self.uniforms.read().get(index).cloned()
    }

    pub fn find_uniform(&self, name: &str) -> Option<(usize, Arc<UniformSpec>)> {
        self.uniforms
            .read()
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.name == name)
            .map(|(index, spec)| (index, spec.clone()))
    }

    pub fn uniform_count(&self) -> usize {
        self.uniforms.read().len()
    }

    pub fn attribute_spec(&self, index: usize) -> Option<AttributeSpec> {
        self.attributes.read().get(index).cloned()
    }

    pub fn find_attribute(&self, name: &str) -> Option<(usize, AttributeSpec)> {
        self.attributes
            .read()
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.name == name)
            .map(|(index, spec)| (index, spec.clone()))
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.read().len()
    }

    /// Location the attribute is bound to before linking. Locations are
    /// assigned in spec order, with matrices taking one per column.
    pub fn attribute_location(&self, index: usize) -> Option<u32> {
        let attributes = self.attributes.read();
        if index >= attributes.len() {
            return None;
        }
        Some(attributes[..index].iter().map(|spec| spec.value_type.slot_count()).sum())
    }

    /// Creates a uniform for the spec called `name`, checking the type.
    pub fn create_uniform(self: &Arc<Self>, name: &str, value: UniformValue) -> Result<Uniform, InputError> {
        let (index, spec) = self.find_uniform(name).ok_or_else(|| InputError::UnknownInput {
            kind: "uniform",
            name: name.to_owned(),
        })?;
        if spec.value_type != value.uniform_type() {
            return Err(InputError::TypeMismatch {
                name: name.to_owned(),
                expected: format!("{:?}", spec.value_type),
                actual: format!("{:?}", value.uniform_type()),
            });
        }
        Ok(Uniform::new(self.clone(), index, value))
    }

    /// Creates an attribute for the spec called `name`. Buffer-backed values
    /// are accepted for any spec type; constant values must match it.
    pub fn create_attribute(self: &Arc<Self>, name: &str, value: AttributeValue) -> Result<Attribute, InputError> {
        let (index, spec) = self.find_attribute(name).ok_or_else(|| InputError::UnknownInput {
            kind: "attribute",
            name: name.to_owned(),
        })?;
        if let Some(value_type) = value.constant_type() {
            if value_type != spec.value_type {
                return Err(InputError::TypeMismatch {
                    name: name.to_owned(),
                    expected: format!("{:?}", spec.value_type),
                    actual: format!("{:?}", value_type),
                });
            }
        }
        Ok(Attribute::new(self.clone(), index, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_locations_skip_matrix_columns() {
        let registry = ShaderInputRegistry::new();
        registry
            .add_attribute_spec(AttributeSpec::new("aPosition", AttributeType::FloatVector3))
            .unwrap();
        registry
            .add_attribute_spec(AttributeSpec::new("aTransform", AttributeType::Matrix4))
            .unwrap();
        registry
            .add_attribute_spec(AttributeSpec::new("aColor", AttributeType::FloatVector4))
            .unwrap();

        assert_eq!(registry.attribute_location(0), Some(0));
        assert_eq!(registry.attribute_location(1), Some(1));
        assert_eq!(registry.attribute_location(2), Some(5));
        assert_eq!(registry.attribute_location(3), None);
    }

    #[test]
    fn create_uniform_checks_type() {
        let registry = ShaderInputRegistry::new();
        registry
            .add_uniform_spec(UniformSpec::new("uScale", UniformType::Float))
            .unwrap();

        assert!(registry.create_uniform("uScale", UniformValue::Float(2.0)).is_ok());
        assert!(matches!(
            registry.create_uniform("uScale", UniformValue::Int(2)),
            Err(InputError::TypeMismatch { .. })
        ));
        assert!(matches!(
            registry.create_uniform("uMissing", UniformValue::Float(2.0)),
            Err(InputError::UnknownInput { .. })
        ));
        assert!(matches!(
            registry.add_uniform_spec(UniformSpec::new("uScale", UniformType::Int)),
            Err(InputError::Duplicate(_))
        ));
    }
}
