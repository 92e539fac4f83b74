use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use smallvec::SmallVec;

/// Byte storage backing buffers and images.
///
/// A wipeable container drops its bytes once every interested context has
/// uploaded them, which keeps large static data from living in client memory
/// twice. The size is remembered after wiping.
#[derive(Debug)]
pub struct DataContainer {
    bytes: RwLock<Option<Vec<u8>>>,
    size: usize,
    wipeable: bool,
    uploaded_by: Mutex<SmallVec<[u64; 2]>>,
}

impl DataContainer {
    pub fn new(bytes: Vec<u8>, wipeable: bool) -> Arc<Self> {
        let size = bytes.len();
        Arc::new(Self {
            bytes: RwLock::new(Some(bytes)),
            size,
            wipeable,
            uploaded_by: Mutex::new(SmallVec::new()),
        })
    }

    pub fn from_slice<T: Pod>(data: &[T], wipeable: bool) -> Arc<Self> {
        Self::new(bytemuck::cast_slice(data).to_vec(), wipeable)
    }

    /// A container with a size but no bytes. Uploads allocate storage
    /// without initializing it.
    pub fn uninitialized(size: usize) -> Arc<Self> {
        Arc::new(Self {
            bytes: RwLock::new(None),
            size,
            wipeable: false,
            uploaded_by: Mutex::new(SmallVec::new()),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_wipeable(&self) -> bool {
        self.wipeable
    }

    pub fn is_wiped(&self) -> bool {
        self.bytes.read().is_none()
    }

    /// The bytes, or `None` if the container was wiped or never had any.
    pub fn data(&self) -> Option<MappedRwLockReadGuard<'_, [u8]>> {
        RwLockReadGuard::try_map(self.bytes.read(), |bytes| bytes.as_deref()).ok()
    }

    /// Copies `bytes` into the container at `offset`. Does nothing on a wiped
    /// container or when the range does not fit.
    pub fn write_range(&self, offset: usize, bytes: &[u8]) -> bool {
        let mut guard = self.bytes.write();
        match guard.as_mut() {
            Some(data) if offset + bytes.len() <= data.len() => {
                data[offset..offset + bytes.len()].copy_from_slice(bytes);
                true
            }
            _ => false,
        }
    }

    /// Drops the bytes if the container is wipeable.
    pub fn wipe(&self) {
        if self.wipeable {
            *self.bytes.write() = None;
        }
    }

    /// Records that `uploader` sent the bytes to the driver, and wipes the
    /// container once `interested` distinct uploaders have.
    pub fn mark_uploaded(&self, uploader: u64, interested: usize) {
        if !self.wipeable {
            return;
        }
        let mut uploaded = self.uploaded_by.lock();
        if !uploaded.contains(&uploader) {
            uploaded.push(uploader);
        }
        if uploaded.len() >= interested {
            *self.bytes.write() = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wipe_keeps_size() {
        let data = DataContainer::from_slice(&[1.0_f32, 2.0, 3.0], true);
        assert_eq!(data.size(), 12);
        data.wipe();
        assert!(data.is_wiped());
        assert!(data.data().is_none());
        assert_eq!(data.size(), 12);
    }

    #[test]
    fn wiped_after_every_uploader() {
        let data = DataContainer::from_slice(&[1u8, 2, 3, 4], true);
        data.mark_uploaded(7, 2);
        data.mark_uploaded(7, 2);
        assert!(!data.is_wiped());
        data.mark_uploaded(8, 2);
        assert!(data.is_wiped());

        let kept = DataContainer::new(vec![1, 2], false);
        kept.mark_uploaded(7, 1);
        assert!(!kept.is_wiped());
    }

    #[test]
    fn non_wipeable_survives_wipe() {
        let data = DataContainer::new(vec![1, 2, 3, 4], false);
        data.wipe();
        assert_eq!(data.data().as_deref(), Some(&[1, 2, 3, 4][..]));
        assert!(data.write_range(2, &[9, 9]));
        assert!(!data.write_range(3, &[9, 9]));
        assert_eq!(data.data().as_deref(), Some(&[1, 2, 9, 9][..]));
    }
}
