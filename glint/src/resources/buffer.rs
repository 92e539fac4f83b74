use std::{ops::Range, sync::Arc};

use glint_types::{
    BufferObject, BufferSubData, BufferTarget, BufferUsage, Holder, MapMode, MappedBufferData, MappedDataSource,
    SubDataSource, LABEL_CHANGED, RESOURCE_CHANGED,
};

use crate::{
    binder::{bindings::BindingShadow, ResourceBinder},
    error::ResourceError,
    format_sso,
    gl::{Feature, GLuint, GraphicsManager, ObjectKind},
    resources::{is_set, Resource, ResourceKind, ResourceLink},
};

/// A driver buffer object.
#[derive(Debug)]
pub(crate) struct BufferResource {
    link: Arc<ResourceLink>,
    gl_id: GLuint,
    target: BufferTarget,
    size: usize,
    usage: BufferUsage,
    /// Sequence number of the first sub-data entry not yet applied.
    next_sub_data: u64,
}

impl BufferResource {
    fn new(link: Arc<ResourceLink>, target: BufferTarget) -> Self {
        Self {
            link,
            gl_id: 0,
            target,
            size: 0,
            usage: BufferUsage::Static,
            next_sub_data: 0,
        }
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Resource for BufferResource {
    fn link(&self) -> &Arc<ResourceLink> {
        &self.link
    }

    fn gl_id(&self) -> GLuint {
        self.gl_id
    }

    fn gpu_memory(&self) -> usize {
        self.size
    }

    fn destroy(self, gm: &dyn GraphicsManager, bindings: &mut BindingShadow) {
        if self.gl_id != 0 {
            bindings.unbind_buffer(gm, self.gl_id);
            gm.delete_buffer(self.gl_id);
        }
    }
}

/// Copy of `range` of the client-side bytes of `buffer`, if they were not
/// wiped.
fn client_bytes(buffer: &BufferObject, range: Range<usize>) -> Option<Vec<u8>> {
    let data = buffer.data()?;
    let bytes = data.data()?;
    bytes.get(range).map(<[u8]>::to_vec)
}

impl ResourceBinder {
    /// Uploads whatever changed in `buffer` since it was last used on this
    /// context, leaving it bound to its target.
    pub(crate) fn update_buffer(&mut self, buffer: &Arc<BufferObject>) -> Result<GLuint, ResourceError> {
        let (gl_id, pending) = self.upload_buffer(buffer)?;
        for sub_data in pending {
            self.apply_sub_data(buffer, gl_id, sub_data);
        }
        Ok(gl_id)
    }

    /// Does the whole-buffer part of an update, returning the sub-data
    /// entries still to be applied.
    fn upload_buffer(&mut self, buffer: &Arc<BufferObject>) -> Result<(GLuint, Vec<BufferSubData>), ResourceError> {
        let releases = self.releases();
        let labels = self.has_feature(Feature::DebugLabel);
        let gm = &*self.gm;
        let bindings = &mut self.bindings;
        let resource = self.resources.buffers.get_or_insert_with(buffer.id(), buffer, || {
            BufferResource::new(
                ResourceLink::observe(&**buffer, ResourceKind::BufferObject, releases),
                buffer.target(),
            )
        });

        let bits = resource.link.take_dirty();
        if bits == 0 && resource.gl_id != 0 {
            return Ok((resource.gl_id, Vec::new()));
        }
        let label = || format_sso!("{}", buffer.label());

        if resource.gl_id == 0 {
            resource.gl_id = gm.gen_buffer();
            if resource.gl_id == 0 {
                resource.link.restore_dirty(bits);
                return Err(ResourceError::CreationFailed {
                    kind: ResourceKind::BufferObject,
                    label: label(),
                });
            }
            log::trace!("Created buffer {} for {:?}", resource.gl_id, buffer.id());
        }
        bindings.bind_buffer(gm, resource.target, resource.gl_id);

        if labels && is_set(bits, LABEL_CHANGED) {
            gm.object_label(ObjectKind::Buffer, resource.gl_id, &buffer.label());
        }

        if is_set(bits, RESOURCE_CHANGED) || is_set(bits, BufferObject::DATA_CHANGED) {
            if let Some(data) = buffer.data() {
                if buffer.struct_size() == 0 {
                    resource.link.restore_dirty(bits);
                    return Err(ResourceError::InvalidConfiguration {
                        kind: ResourceKind::BufferObject,
                        label: label(),
                        reason: "struct size is 0".into(),
                    });
                }
                if buffer.count() == 0 {
                    resource.link.restore_dirty(bits);
                    return Err(ResourceError::InvalidConfiguration {
                        kind: ResourceKind::BufferObject,
                        label: label(),
                        reason: "struct count is 0".into(),
                    });
                }
                profiling::scope!("upload buffer data");
                if data.is_wipeable() && data.is_wiped() {
                    log::warn!(
                        "Data of buffer \"{}\" was wiped before this context uploaded it, storage is left uninitialized",
                        buffer.label()
                    );
                }
                let size = buffer.size();
                {
                    let bytes = data.data();
                    let bytes = bytes.as_deref().map(|bytes| &bytes[..bytes.len().min(size)]);
                    gm.buffer_data(resource.target, size, bytes, buffer.usage());
                }
                data.mark_uploaded(resource.link.id(), buffer.observer_count());
                resource.size = size;
                resource.usage = buffer.usage();
            }
        }

        let (pending, next) = buffer.sub_data_since(resource.next_sub_data);
        resource.next_sub_data = next;
        Ok((resource.gl_id, pending))
    }

    fn apply_sub_data(&mut self, buffer: &Arc<BufferObject>, gl_id: GLuint, sub_data: BufferSubData) {
        match sub_data.source {
            SubDataSource::Data(data) => {
                let gm = Arc::clone(&self.gm);
                self.bindings.bind_buffer(&*gm, buffer.target(), gl_id);
                if let Some(bytes) = data.data() {
                    let len = bytes.len().min(sub_data.range.len());
                    gm.buffer_sub_data(buffer.target(), sub_data.range.start, &bytes[..len]);
                }
                if let Some(resource) = self.resources.buffers.get(buffer.id()) {
                    data.mark_uploaded(resource.link.id(), buffer.observer_count());
                }
            }
            SubDataSource::Copy { source, read_offset } => {
                self.copy_buffer_range(buffer, gl_id, source.as_ref(), sub_data.range, read_offset);
            }
        }
    }

    /// Copies `range.len()` bytes from `read_offset` in `source` (or in
    /// `destination` itself) to `range` of `destination`, using the best
    /// path the driver offers.
    fn copy_buffer_range(
        &mut self,
        destination: &Arc<BufferObject>,
        destination_id: GLuint,
        source: Option<&Arc<BufferObject>>,
        range: Range<usize>,
        read_offset: usize,
    ) {
        profiling::scope!("ResourceBinder::copy_buffer_range");
        let gm = Arc::clone(&self.gm);
        let gm = &*gm;
        let source_holder = source.unwrap_or(destination);
        let source_id = match source {
            None => destination_id,
            Some(source) => match self.update_buffer(source) {
                Ok(id) => id,
                Err(error) => {
                    self.report(error);
                    return;
                }
            },
        };

        if self.has_feature(Feature::CopyBufferSubData) {
            if source_id == destination_id {
                let target = destination.target();
                self.bindings.bind_buffer(gm, target, destination_id);
                gm.copy_buffer_sub_data(target, target, read_offset, range.start, range.len());
            } else {
                self.bindings.bind_buffer(gm, BufferTarget::CopyRead, source_id);
                self.bindings.bind_buffer(gm, BufferTarget::CopyWrite, destination_id);
                gm.copy_buffer_sub_data(
                    BufferTarget::CopyRead,
                    BufferTarget::CopyWrite,
                    read_offset,
                    range.start,
                    range.len(),
                );
            }
            // Keep an unwiped client copy in sync.
            if let Some(bytes) = client_bytes(source_holder, read_offset..read_offset + range.len()) {
                if let Some(data) = destination.data() {
                    data.write_range(range.start, &bytes);
                }
            }
            return;
        }

        let bytes = self.read_buffer_range(source_holder, source_id, read_offset..read_offset + range.len());
        if let Some(data) = destination.data() {
            data.write_range(range.start, &bytes);
        }
        self.bindings.bind_buffer(gm, destination.target(), destination_id);
        gm.buffer_sub_data(destination.target(), range.start, &bytes);
    }

    /// Reads bytes of a buffer through the driver if it allows mapping, else
    /// from the unwiped client copy, else returns zeroes.
    fn read_buffer_range(&mut self, buffer: &Arc<BufferObject>, gl_id: GLuint, range: Range<usize>) -> Vec<u8> {
        let gm = Arc::clone(&self.gm);
        let gm = &*gm;
        let target = buffer.target();

        if self.has_feature(Feature::MapBufferRange) {
            self.bindings.bind_buffer(gm, target, gl_id);
            if let Some(bytes) = gm.map_buffer_range(target, range.clone(), MapMode::ReadOnly) {
                gm.unmap_buffer(target, None);
                return bytes;
            }
        }
        if self.has_feature(Feature::MapBuffer) {
            self.bindings.bind_buffer(gm, target, gl_id);
            if let Some(bytes) = gm.map_buffer(target, MapMode::ReadOnly) {
                gm.unmap_buffer(target, None);
                if let Some(bytes) = bytes.get(range.clone()) {
                    return bytes.to_vec();
                }
            }
        }
        if let Some(bytes) = client_bytes(buffer, range.clone()) {
            return bytes;
        }

        self.warn_once(format_sso!("scratch-read-{}", buffer.id().get()), || {
            format!(
                "Buffer \"{}\" cannot be read back, copying from it produces zeroes",
                buffer.label()
            )
        });
        vec![0; range.len()]
    }

    /// Maps `range` (or all) of `buffer` into its mapped-data slot.
    pub(crate) fn map_buffer(&mut self, buffer: &Arc<BufferObject>, mode: MapMode, range: Option<Range<usize>>) {
        if buffer.is_mapped() {
            self.warn_once(format_sso!("already-mapped-{}", buffer.id().get()), || {
                format!("Buffer \"{}\" is already mapped", buffer.label())
            });
            return;
        }
        let gl_id = match self.update_buffer(buffer) {
            Ok(id) => id,
            Err(error) => {
                self.report(error);
                return;
            }
        };

        let size = buffer.size();
        let whole = range.is_none();
        let range = range.unwrap_or(0..size);
        if range.start > range.end || range.end > size {
            log::warn!(
                "Cannot map range {:?} of buffer \"{}\" of size {}",
                range,
                buffer.label(),
                size
            );
            return;
        }

        let gm = Arc::clone(&self.gm);
        let gm = &*gm;
        let target = buffer.target();
        let mut mapped = None;
        if self.has_feature(Feature::MapBufferRange) {
            self.bindings.bind_buffer(gm, target, gl_id);
            mapped = gm.map_buffer_range(target, range.clone(), mode);
        } else if whole && self.has_feature(Feature::MapBuffer) {
            self.bindings.bind_buffer(gm, target, gl_id);
            mapped = gm.map_buffer(target, mode);
        }

        let (source, bytes) = match mapped {
            Some(bytes) => (MappedDataSource::Gpu, bytes),
            None => match client_bytes(buffer, range.clone()) {
                Some(bytes) => (MappedDataSource::DataContainer, bytes),
                None => {
                    if mode != MapMode::WriteOnly {
                        self.warn_once(format_sso!("scratch-map-{}", buffer.id().get()), || {
                            format!(
                                "Buffer \"{}\" is mapped for reading but its contents are unavailable, reads return zeroes",
                                buffer.label()
                            )
                        });
                    }
                    (MappedDataSource::Allocated, vec![0; range.len()])
                }
            },
        };

        *buffer.mapped_data() = Some(MappedBufferData {
            range,
            mode,
            source,
            bytes,
        });
    }

    /// Writes back and releases the mapped range of `buffer`.
    pub(crate) fn unmap_buffer(&mut self, buffer: &Arc<BufferObject>) {
        let Some(mapped) = buffer.mapped_data().take() else {
            self.warn_once(format_sso!("not-mapped-{}", buffer.id().get()), || {
                format!("Buffer \"{}\" is not mapped", buffer.label())
            });
            return;
        };
        let gl_id = self.gl_id(ResourceKind::BufferObject, buffer.id());
        if gl_id == 0 {
            return;
        }

        let gm = Arc::clone(&self.gm);
        let gm = &*gm;
        let target = buffer.target();
        self.bindings.bind_buffer(gm, target, gl_id);
        match (mapped.source, mapped.mode) {
            (MappedDataSource::Gpu, MapMode::ReadOnly) => {
                gm.unmap_buffer(target, None);
            }
            (MappedDataSource::Gpu, _) => {
                gm.unmap_buffer(target, Some(&mapped.bytes));
            }
            (_, MapMode::ReadOnly) => {}
            (_, _) => {
                if let Some(data) = buffer.data() {
                    data.write_range(mapped.range.start, &mapped.bytes);
                }
                gm.buffer_sub_data(target, mapped.range.start, &mapped.bytes);
            }
        }
    }
}
