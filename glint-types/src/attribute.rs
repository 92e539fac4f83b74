use std::{fmt::Debug, sync::Arc};

use glam::{Vec2, Vec3, Vec4};
use parking_lot::RwLock;

use crate::{
    holder::impl_holder, AttributeType, BufferObject, Holder, HolderBase, InputError, ShaderInputRegistry,
    FIRST_HOLDER_CHANGE,
};

/// Maximum number of attributes an [`AttributeArray`] holds.
pub const MAX_ATTRIBUTES: usize = 16;

/// One field of a buffer's structs, used as a per-vertex attribute.
#[derive(Clone)]
pub struct BufferObjectElement {
    pub buffer: Arc<BufferObject>,
    /// Index of the element spec in the buffer.
    pub spec_index: usize,
}

impl Debug for BufferObjectElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferObjectElement")
            .field("buffer", &self.buffer.label())
            .field("spec_index", &self.spec_index)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum AttributeValue {
    Float(f32),
    FloatVector2(Vec2),
    FloatVector3(Vec3),
    FloatVector4(Vec4),
    Buffer(BufferObjectElement),
}

impl AttributeValue {
    /// Type of a constant value; `None` for buffer-backed values.
    pub fn constant_type(&self) -> Option<AttributeType> {
        match self {
            AttributeValue::Float(_) => Some(AttributeType::Float),
            AttributeValue::FloatVector2(_) => Some(AttributeType::FloatVector2),
            AttributeValue::FloatVector3(_) => Some(AttributeType::FloatVector3),
            AttributeValue::FloatVector4(_) => Some(AttributeType::FloatVector4),
            AttributeValue::Buffer(_) => None,
        }
    }

    /// Components of a constant value, padded to what the driver expects.
    pub fn constant_components(&self) -> Option<Vec4> {
        match *self {
            AttributeValue::Float(v) => Some(Vec4::new(v, 0.0, 0.0, 1.0)),
            AttributeValue::FloatVector2(v) => Some(v.extend(0.0).extend(1.0)),
            AttributeValue::FloatVector3(v) => Some(v.extend(1.0)),
            AttributeValue::FloatVector4(v) => Some(v),
            AttributeValue::Buffer(_) => None,
        }
    }
}

/// A value for a registry attribute spec.
#[derive(Debug, Clone)]
pub struct Attribute {
    registry: Arc<ShaderInputRegistry>,
    index: usize,
    value: AttributeValue,
    normalized: bool,
    divisor: u32,
}

impl Attribute {
    pub(crate) fn new(registry: Arc<ShaderInputRegistry>, index: usize, value: AttributeValue) -> Self {
        Self {
            registry,
            index,
            value,
            normalized: false,
            divisor: 0,
        }
    }

    pub fn registry(&self) -> &Arc<ShaderInputRegistry> {
        &self.registry
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> String {
        self.registry
            .attribute_spec(self.index)
            .map(|spec| spec.name)
            .unwrap_or_default()
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    pub fn buffer_element(&self) -> Option<&BufferObjectElement> {
        match &self.value {
            AttributeValue::Buffer(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    /// Instancing divisor. 0 advances the attribute every vertex.
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    pub fn with_divisor(mut self, divisor: u32) -> Self {
        self.divisor = divisor;
        self
    }
}

#[derive(Debug, Clone)]
struct AttributeSlot {
    attribute: Attribute,
    enabled: bool,
}

/// The vertex inputs of a shape.
#[derive(Debug)]
pub struct AttributeArray {
    base: HolderBase,
    slots: RwLock<Vec<AttributeSlot>>,
}
impl_holder!(AttributeArray);

impl AttributeArray {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: HolderBase::new(),
            slots: RwLock::new(Vec::new()),
        })
    }

    /// Change bit for the attribute at `index`.
    pub const fn attribute_changed_bit(index: usize) -> u32 {
        FIRST_HOLDER_CHANGE + index as u32
    }

    /// Change bit for the enabled state of the attribute at `index`.
    pub const fn enabled_changed_bit(index: usize) -> u32 {
        FIRST_HOLDER_CHANGE + (MAX_ATTRIBUTES + index) as u32
    }

    /// Adds an enabled attribute and returns its index.
    pub fn add_attribute(&self, attribute: Attribute) -> Result<usize, InputError> {
        let index = {
            let mut slots = self.slots.write();
            if slots.len() >= MAX_ATTRIBUTES {
                return Err(InputError::TooManyAttributes(MAX_ATTRIBUTES));
            }
            if let Some(existing) = slots.iter().find(|slot| {
                slot.attribute.index == attribute.index && Arc::ptr_eq(&slot.attribute.registry, &attribute.registry)
            }) {
                return Err(InputError::Duplicate(existing.attribute.name()));
            }
            slots.push(AttributeSlot {
                attribute,
                enabled: true,
            });
            slots.len() - 1
        };
        self.base.notify(Self::attribute_changed_bit(index));
        Ok(index)
    }

    pub fn replace_attribute(&self, index: usize, attribute: Attribute) -> Result<(), InputError> {
        {
            let mut slots = self.slots.write();
            let slot = slots.get_mut(index).ok_or(InputError::IndexOutOfRange(index))?;
            slot.attribute = attribute;
        }
        self.base.notify(Self::attribute_changed_bit(index));
        Ok(())
    }

    pub fn enable_attribute(&self, index: usize, enabled: bool) {
        let changed = {
            let mut slots = self.slots.write();
            match slots.get_mut(index) {
                Some(slot) if slot.enabled != enabled => {
                    slot.enabled = enabled;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.base.notify(Self::enabled_changed_bit(index));
        }
    }

    pub fn is_attribute_enabled(&self, index: usize) -> bool {
        self.slots.read().get(index).map_or(false, |slot| slot.enabled)
    }

    pub fn attribute(&self, index: usize) -> Option<Attribute> {
        self.slots.read().get(index).map(|slot| slot.attribute.clone())
    }

    pub fn attribute_count(&self) -> usize {
        self.slots.read().len()
    }

    /// Snapshot of every attribute with its enabled flag.
    pub fn attributes(&self) -> Vec<(Attribute, bool)> {
        self.slots
            .read()
            .iter()
            .map(|slot| (slot.attribute.clone(), slot.enabled))
            .collect()
    }
}
