use std::{
    hash::Hash,
    sync::{Arc, Weak},
};

use glint_types::HolderId;
use indexmap::map::IndexMap;

use crate::util::typedefs::FastBuildHasher;

#[derive(Debug)]
struct ResourceStorage<T, H: ?Sized> {
    holder: Weak<H>,
    data: T,
}

/// Registry of per-context resources, keyed by the identity of the holder
/// they mirror.
///
/// The registry never keeps a holder alive. Destroyed holders announce
/// themselves through the release queue of the owning binder.
#[derive(Debug)]
pub(crate) struct ResourceRegistry<K, T, H: ?Sized> {
    mapping: IndexMap<K, ResourceStorage<T, H>, FastBuildHasher>,
}

impl<K, T, H> ResourceRegistry<K, T, H>
where
    K: Copy + Eq + Hash,
    H: ?Sized,
{
    pub fn new() -> Self {
        Self {
            mapping: IndexMap::with_hasher(FastBuildHasher::default()),
        }
    }

    #[cfg(test)]
    pub fn insert(&mut self, key: K, holder: &Arc<H>, data: T) -> &mut T {
        let (idx, _) = self.mapping.insert_full(
            key,
            ResourceStorage {
                holder: Arc::downgrade(holder),
                data,
            },
        );
        &mut self.mapping[idx].data
    }

    /// Returns the resource for `key`, inserting the result of `create` if
    /// there is none yet.
    pub fn get_or_insert_with(&mut self, key: K, holder: &Arc<H>, create: impl FnOnce() -> T) -> &mut T {
        let entry = self.mapping.entry(key).or_insert_with(|| ResourceStorage {
            holder: Arc::downgrade(holder),
            data: create(),
        });
        &mut entry.data
    }

    pub fn remove(&mut self, key: K) -> Option<T> {
        self.mapping.swap_remove(&key).map(|storage| storage.data)
    }

    /// Removes every resource whose key matches `predicate`.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> Vec<T> {
        let keys: Vec<K> = self.mapping.keys().copied().filter(|key| predicate(key)).collect();
        keys.into_iter().filter_map(|key| self.remove(key)).collect()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&K, &T)> + Clone {
        self.mapping.iter().map(|(key, ResourceStorage { data, .. })| (key, data))
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> + Clone {
        self.mapping.keys()
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = &T> + Clone {
        self.mapping.values().map(|ResourceStorage { data, .. }| data)
    }

    pub fn get(&self, key: K) -> Option<&T> {
        self.mapping.get(&key).map(|storage| &storage.data)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.mapping.get_mut(&key).map(|storage| &mut storage.data)
    }

    /// The holder a resource mirrors, if it is still alive.
    pub fn holder(&self, key: K) -> Option<Arc<H>> {
        self.mapping.get(&key).and_then(|storage| storage.holder.upgrade())
    }

    #[cfg(test)]
    pub fn count(&self) -> usize {
        self.mapping.len()
    }
}

impl<K, T, H> Default for ResourceRegistry<K, T, H>
where
    K: Copy + Eq + Hash,
    H: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Registry keyed directly by holder identity.
pub(crate) type HolderRegistry<T, H> = ResourceRegistry<HolderId, T, H>;

#[cfg(test)]
mod tests {
    use glint_types::{BufferObject, BufferTarget, Holder};

    use super::*;

    #[test]
    fn holders_are_not_kept_alive() {
        let buffer = BufferObject::new(BufferTarget::Array);
        let id = buffer.id();
        let mut registry = HolderRegistry::<u32, BufferObject>::new();
        registry.insert(id, &buffer, 1);
        assert!(registry.holder(id).is_some());

        drop(buffer);
        assert!(registry.holder(id).is_none());
        assert_eq!(registry.remove(id), Some(1));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn get_or_insert_only_creates_once() {
        let buffer = BufferObject::new(BufferTarget::Array);
        let mut registry = HolderRegistry::<u32, BufferObject>::new();
        *registry.get_or_insert_with(buffer.id(), &buffer, || 5) += 1;
        *registry.get_or_insert_with(buffer.id(), &buffer, || 100) += 1;
        assert_eq!(registry.get(buffer.id()), Some(&7));
    }
}
