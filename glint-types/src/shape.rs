use std::{ops::Range, sync::Arc};

use crate::{AttributeArray, BufferObject};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleFan,
    TriangleStrip,
}

/// A subrange of the vertices (or indices) of a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexRange {
    pub range: Range<usize>,
    pub enabled: bool,
    /// Number of instances to draw; 0 draws without instancing.
    pub instance_count: u32,
}

impl VertexRange {
    pub fn new(range: Range<usize>) -> Self {
        Self {
            range,
            enabled: true,
            instance_count: 0,
        }
    }

    pub fn with_instance_count(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }
}

/// Something drawable: vertex inputs, optional indices, and a primitive.
#[derive(Debug, Clone)]
pub struct Shape {
    pub label: String,
    pub primitive_type: PrimitiveType,
    pub attribute_array: Option<Arc<AttributeArray>>,
    pub index_buffer: Option<Arc<BufferObject>>,
    pub vertex_ranges: Vec<VertexRange>,
    /// Instances drawn when there are no vertex ranges; 0 disables
    /// instancing.
    pub instance_count: u32,
}

impl Shape {
    pub fn new(primitive_type: PrimitiveType, attribute_array: Arc<AttributeArray>) -> Self {
        Self {
            label: String::new(),
            primitive_type,
            attribute_array: Some(attribute_array),
            index_buffer: None,
            vertex_ranges: Vec::new(),
            instance_count: 0,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_index_buffer(mut self, index_buffer: Arc<BufferObject>) -> Self {
        self.index_buffer = Some(index_buffer);
        self
    }

    pub fn with_vertex_range(mut self, range: VertexRange) -> Self {
        self.vertex_ranges.push(range);
        self
    }

    pub fn with_instance_count(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }
}
