use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use parking_lot::{Mutex, RwLock};

/// Change bit set whenever the holder is swapped out wholesale. Every
/// resource treats it as "rebuild everything".
pub const RESOURCE_CHANGED: u32 = 0;
/// Change bit set when the debug label of a holder changes.
pub const LABEL_CHANGED: u32 = 1;
/// First change bit available to individual holder kinds.
pub const FIRST_HOLDER_CHANGE: u32 = 2;

static HOLDER_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a holder.
///
/// Ids are never reused, so a resource keyed by a `HolderId` can never be
/// confused with a resource belonging to a holder created later at the same
/// address.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HolderId(u64);

impl HolderId {
    pub fn next() -> Self {
        Self(HOLDER_ID_ALLOCATOR.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Something that wants to hear about changes to a holder.
///
/// Per-context resources implement this. Holders only ever keep weak
/// references to their observers, so an observer going away never keeps a
/// holder alive and vice versa.
pub trait ResourceObserver: Send + Sync {
    /// Called every time the aspect identified by `bit` is modified.
    fn on_changed(&self, bit: u32);
    /// Called once when the holder is dropped.
    fn on_destroyed(&self);
}

/// List of weak observer handles owned by a holder.
#[derive(Default)]
pub struct Notifier {
    observers: Mutex<Vec<Weak<dyn ResourceObserver>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&self, observer: &Arc<dyn ResourceObserver>) {
        let mut observers = self.observers.lock();
        observers.retain(|o| o.strong_count() != 0);
        observers.push(Arc::downgrade(observer));
    }

    pub fn notify_changed(&self, bit: u32) {
        self.observers.lock().retain(|observer| match observer.upgrade() {
            Some(observer) => {
                observer.on_changed(bit);
                true
            }
            None => false,
        });
    }

    pub fn notify_destroyed(&self) {
        for observer in self.observers.lock().drain(..) {
            if let Some(observer) = observer.upgrade() {
                observer.on_destroyed();
            }
        }
    }

    /// Number of observers that are still alive.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().iter().filter(|o| o.strong_count() != 0).count()
    }
}

impl Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// State shared by every holder: identity, label, and observers.
#[derive(Debug)]
pub struct HolderBase {
    id: HolderId,
    label: RwLock<String>,
    notifier: Notifier,
}

impl HolderBase {
    pub fn new() -> Self {
        Self {
            id: HolderId::next(),
            label: RwLock::new(String::new()),
            notifier: Notifier::new(),
        }
    }

    pub fn id(&self) -> HolderId {
        self.id
    }

    pub fn label(&self) -> String {
        self.label.read().clone()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        *self.label.write() = label.into();
        self.notify(LABEL_CHANGED);
    }

    /// Tells every observer that the aspect identified by `bit` changed.
    pub fn notify(&self, bit: u32) {
        self.notifier.notify_changed(bit);
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

impl Default for HolderBase {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HolderBase {
    fn drop(&mut self) {
        self.notifier.notify_destroyed();
    }
}

/// A client-side, reference counted description of a GPU object.
pub trait Holder: Send + Sync + 'static {
    fn base(&self) -> &HolderBase;

    fn id(&self) -> HolderId {
        self.base().id()
    }

    fn label(&self) -> String {
        self.base().label()
    }

    fn set_label(&self, label: impl Into<String>)
    where
        Self: Sized,
    {
        self.base().set_label(label);
    }

    fn add_observer(&self, observer: &Arc<dyn ResourceObserver>) {
        self.base().notifier().add_observer(observer);
    }

    /// Number of live resources mirroring this holder, one per context at most.
    fn observer_count(&self) -> usize {
        self.base().notifier().observer_count()
    }
}

macro_rules! impl_holder {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::Holder for $ty {
                fn base(&self) -> &$crate::HolderBase {
                    &self.base
                }
            }
        )*
    };
}
pub(crate) use impl_holder;

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        bits: AtomicU64,
        destroyed: AtomicU32,
    }

    impl ResourceObserver for Recorder {
        fn on_changed(&self, bit: u32) {
            self.bits.fetch_or(1 << bit, Ordering::Relaxed);
        }

        fn on_destroyed(&self) {
            self.destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn ids_are_unique() {
        let a = HolderBase::new();
        let b = HolderBase::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn label_change_notifies() {
        let base = HolderBase::new();
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn ResourceObserver> = recorder.clone();
        base.notifier().add_observer(&observer);

        base.set_label("quad");
        assert_eq!(base.label(), "quad");
        assert_eq!(recorder.bits.load(Ordering::Relaxed), 1 << LABEL_CHANGED);
    }

    #[test]
    fn drop_notifies_live_observers_once() {
        let base = HolderBase::new();
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn ResourceObserver> = recorder.clone();
        base.notifier().add_observer(&observer);

        let dead: Arc<dyn ResourceObserver> = Arc::new(Recorder::default());
        base.notifier().add_observer(&dead);
        drop(dead);
        assert_eq!(base.notifier().observer_count(), 1);

        drop(base);
        assert_eq!(recorder.destroyed.load(Ordering::Relaxed), 1);
    }
}
