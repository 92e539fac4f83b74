use std::{ops::Range, sync::Arc};

use parking_lot::{Mutex, MutexGuard, RwLock};
use smallvec::SmallVec;

use crate::{holder::impl_holder, DataContainer, HolderBase, FIRST_HOLDER_CHANGE};

/// Binding point a buffer is bound to while it is updated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
    CopyRead,
    CopyWrite,
}

impl BufferTarget {
    pub const ALL: [BufferTarget; 4] = [
        BufferTarget::Array,
        BufferTarget::ElementArray,
        BufferTarget::CopyRead,
        BufferTarget::CopyWrite,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Static,
    Dynamic,
    Stream,
}

/// Type of a single component of a buffer element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
    FloatMatrix2,
    FloatMatrix3,
    FloatMatrix4,
}

impl ComponentType {
    /// Size in bytes of one component. Matrices count one column.
    pub fn size(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort => 2,
            ComponentType::Int | ComponentType::UnsignedInt | ComponentType::Float => 4,
            ComponentType::FloatMatrix2 => 8,
            ComponentType::FloatMatrix3 => 12,
            ComponentType::FloatMatrix4 => 16,
        }
    }

    /// Number of columns for matrix types, each of which binds to its own
    /// attribute slot.
    pub fn matrix_columns(self) -> Option<usize> {
        match self {
            ComponentType::FloatMatrix2 => Some(2),
            ComponentType::FloatMatrix3 => Some(3),
            ComponentType::FloatMatrix4 => Some(4),
            _ => None,
        }
    }
}

/// Describes one field of the structs stored in a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BufferElementSpec {
    pub component_type: ComponentType,
    pub component_count: usize,
    pub byte_offset: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MapMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Where the bytes of a mapped buffer came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MappedDataSource {
    /// Mapped through the driver.
    Gpu,
    /// Copied from the buffer's unwiped data container.
    DataContainer,
    /// Freshly allocated, zeroed memory. Reads return garbage.
    Allocated,
}

/// Client-visible bytes of a mapped range.
#[derive(Debug, Clone)]
pub struct MappedBufferData {
    pub range: Range<usize>,
    pub mode: MapMode,
    pub source: MappedDataSource,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum SubDataSource {
    Data(Arc<DataContainer>),
    /// Copy from another buffer, or from this buffer when `source` is `None`.
    Copy {
        source: Option<Arc<BufferObject>>,
        read_offset: usize,
    },
}

/// A pending partial update of a buffer.
#[derive(Debug, Clone)]
pub struct BufferSubData {
    pub range: Range<usize>,
    pub source: SubDataSource,
}

#[derive(Debug)]
struct BufferInner {
    data: Option<Arc<DataContainer>>,
    struct_size: usize,
    count: usize,
    usage: BufferUsage,
    specs: SmallVec<[BufferElementSpec; 4]>,
    sub_data: Vec<(u64, BufferSubData)>,
    next_sub_data: u64,
}

/// Vertex or index data.
#[derive(Debug)]
pub struct BufferObject {
    base: HolderBase,
    target: BufferTarget,
    inner: RwLock<BufferInner>,
    mapped: Mutex<Option<MappedBufferData>>,
}
impl_holder!(BufferObject);

impl BufferObject {
    pub const DATA_CHANGED: u32 = FIRST_HOLDER_CHANGE;
    pub const SUB_DATA_CHANGED: u32 = FIRST_HOLDER_CHANGE + 1;

    pub fn new(target: BufferTarget) -> Arc<Self> {
        Arc::new(Self {
            base: HolderBase::new(),
            target,
            inner: RwLock::new(BufferInner {
                data: None,
                struct_size: 0,
                count: 0,
                usage: BufferUsage::Static,
                specs: SmallVec::new(),
                sub_data: Vec::new(),
                next_sub_data: 0,
            }),
            mapped: Mutex::new(None),
        })
    }

    /// An element buffer whose single spec describes the index type.
    pub fn index_buffer(index_type: ComponentType) -> Arc<Self> {
        let buffer = Self::new(BufferTarget::ElementArray);
        buffer.add_spec(index_type, 1, 0);
        buffer
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Adds a description of one struct field, returning its index.
    pub fn add_spec(&self, component_type: ComponentType, component_count: usize, byte_offset: usize) -> usize {
        let mut inner = self.inner.write();
        inner.specs.push(BufferElementSpec {
            component_type,
            component_count,
            byte_offset,
        });
        inner.specs.len() - 1
    }

    pub fn spec(&self, index: usize) -> Option<BufferElementSpec> {
        self.inner.read().specs.get(index).copied()
    }

    pub fn spec_count(&self) -> usize {
        self.inner.read().specs.len()
    }

    /// Index type of an element buffer.
    pub fn index_type(&self) -> Option<ComponentType> {
        match self.target {
            BufferTarget::ElementArray => self.spec(0).map(|spec| spec.component_type),
            _ => None,
        }
    }

    /// Replaces the contents of the buffer. Pending sub-data is dropped.
    pub fn set_data(&self, data: Arc<DataContainer>, struct_size: usize, count: usize, usage: BufferUsage) {
        {
            let mut inner = self.inner.write();
            inner.data = Some(data);
            inner.struct_size = struct_size;
            inner.count = count;
            inner.usage = usage;
            inner.sub_data.clear();
        }
        self.base.notify(Self::DATA_CHANGED);
    }

    pub fn data(&self) -> Option<Arc<DataContainer>> {
        self.inner.read().data.clone()
    }

    pub fn struct_size(&self) -> usize {
        self.inner.read().struct_size
    }

    pub fn count(&self) -> usize {
        self.inner.read().count
    }

    pub fn usage(&self) -> BufferUsage {
        self.inner.read().usage
    }

    /// Total size of the buffer in bytes.
    pub fn size(&self) -> usize {
        let inner = self.inner.read();
        inner.struct_size * inner.count
    }

    /// Queues replacement of the bytes starting at `offset`.
    pub fn set_sub_data(&self, offset: usize, data: Arc<DataContainer>) {
        let range = offset..offset + data.size();
        self.push_sub_data(BufferSubData {
            range,
            source: SubDataSource::Data(data),
        });
    }

    /// Queues a copy of `range.len()` bytes starting at `read_offset` in
    /// `source` to `range` in this buffer.
    pub fn copy_sub_data(self: &Arc<Self>, source: &Arc<BufferObject>, range: Range<usize>, read_offset: usize) {
        let source = match Arc::ptr_eq(self, source) {
            true => None,
            false => Some(source.clone()),
        };
        self.push_sub_data(BufferSubData {
            range,
            source: SubDataSource::Copy { source, read_offset },
        });
    }

    fn push_sub_data(&self, sub_data: BufferSubData) {
        {
            let mut inner = self.inner.write();
            let sequence = inner.next_sub_data;
            inner.next_sub_data += 1;
            inner.sub_data.push((sequence, sub_data));
        }
        self.base.notify(Self::SUB_DATA_CHANGED);
    }

    /// Pending sub-data entries with a sequence number of at least `since`,
    /// along with the sequence number following the last of them.
    pub fn sub_data_since(&self, since: u64) -> (Vec<BufferSubData>, u64) {
        let inner = self.inner.read();
        let entries = inner
            .sub_data
            .iter()
            .filter(|(sequence, _)| *sequence >= since)
            .map(|(_, sub_data)| sub_data.clone())
            .collect();
        (entries, inner.next_sub_data)
    }

    pub fn clear_sub_data(&self) {
        self.inner.write().sub_data.clear();
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.lock().is_some()
    }

    /// The currently mapped range. Writes made through the guard are
    /// uploaded when the buffer is unmapped.
    pub fn mapped_data(&self) -> MutexGuard<'_, Option<MappedBufferData>> {
        self.mapped.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_data_drops_pending_sub_data() {
        let buffer = BufferObject::new(BufferTarget::Array);
        buffer.set_sub_data(0, DataContainer::new(vec![1, 2], false));
        assert_eq!(buffer.sub_data_since(0).0.len(), 1);

        buffer.set_data(DataContainer::new(vec![0; 16], false), 4, 4, BufferUsage::Dynamic);
        let (pending, next) = buffer.sub_data_since(0);
        assert!(pending.is_empty());
        assert_eq!(next, 1);
        assert_eq!(buffer.size(), 16);
    }

    #[test]
    fn self_copy_does_not_hold_a_reference() {
        let buffer = BufferObject::new(BufferTarget::Array);
        buffer.copy_sub_data(&buffer, 0..4, 8);
        assert_eq!(Arc::strong_count(&buffer), 1);
        let (pending, _) = buffer.sub_data_since(0);
        assert!(matches!(pending[0].source, SubDataSource::Copy { source: None, read_offset: 8 }));
    }

    #[test]
    fn index_type_comes_from_first_spec() {
        let indices = BufferObject::index_buffer(ComponentType::UnsignedShort);
        assert_eq!(indices.index_type(), Some(ComponentType::UnsignedShort));
        assert_eq!(BufferObject::new(BufferTarget::Array).index_type(), None);
    }
}
