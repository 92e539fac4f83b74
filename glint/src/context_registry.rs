use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;

use crate::{
    binder::ResourceBinder,
    gl::{ContextId, GraphicsManager},
    util::typedefs::FastHashMap,
};

/// Number of live binders above which [`ContextRegistry`] starts warning.
pub const DEFAULT_BINDER_WARNING_THRESHOLD: usize = 16;

/// Identity of a [`Renderer`](crate::Renderer) within a registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RendererId(u64);

impl RendererId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A binder shared between the registry and the renderer using it.
pub type SharedBinder = Arc<Mutex<ResourceBinder>>;

/// Maps (renderer, context) pairs to their [`ResourceBinder`].
///
/// One registry is usually created per process and shared by every
/// renderer. Each renderer gets a binder of its own for every context it
/// draws on.
#[derive(Debug)]
pub struct ContextRegistry {
    binders: Mutex<FastHashMap<(RendererId, ContextId), SharedBinder>>,
    warning_threshold: usize,
    warned: AtomicBool,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::with_binder_warning_threshold(DEFAULT_BINDER_WARNING_THRESHOLD)
    }

    /// A registry that warns once more than `threshold` binders are alive.
    pub fn with_binder_warning_threshold(threshold: usize) -> Self {
        Self {
            binders: Mutex::new(FastHashMap::default()),
            warning_threshold: threshold,
            warned: AtomicBool::new(false),
        }
    }

    /// The binder of `renderer` for the context current on `gm`, created and
    /// passed to `init` if it does not exist yet.
    pub(crate) fn get_or_create_binder(
        &self,
        renderer: RendererId,
        gm: &Arc<dyn GraphicsManager>,
        init: impl FnOnce(&mut ResourceBinder),
    ) -> SharedBinder {
        let context = gm.current_context();
        let mut binders = self.binders.lock();
        if let Some(binder) = binders.get(&(renderer, context)) {
            return Arc::clone(binder);
        }

        let mut binder = ResourceBinder::new(Arc::clone(gm));
        init(&mut binder);
        let binder = Arc::new(Mutex::new(binder));
        binders.insert((renderer, context), Arc::clone(&binder));

        if binders.len() > self.warning_threshold && !self.warned.swap(true, Ordering::Relaxed) {
            log::warn!(
                "{} resource binders are alive. Renderers should be kept across frames, not created per frame",
                binders.len()
            );
        }
        binder
    }

    /// Removes the binder of `renderer` for `context`. Returns it so the
    /// caller can release its resources.
    pub(crate) fn destroy(&self, renderer: RendererId, context: ContextId) -> Option<SharedBinder> {
        let removed = self.binders.lock().remove(&(renderer, context));
        if removed.is_some() {
            log::debug!("Destroyed resource binder of {:?} for context {:?}", renderer, context);
        }
        removed
    }

    /// Removes every binder of `renderer`.
    pub(crate) fn destroy_renderer(&self, renderer: RendererId) -> Vec<(ContextId, SharedBinder)> {
        let mut binders = self.binders.lock();
        let contexts: Vec<ContextId> = binders
            .keys()
            .filter(|(owner, _)| *owner == renderer)
            .map(|&(_, context)| context)
            .collect();
        contexts
            .into_iter()
            .filter_map(|context| {
                binders
                    .remove(&(renderer, context))
                    .map(|binder| (context, binder))
            })
            .collect()
    }

    /// Drops every binder without touching the driver. For contexts that
    /// are all gone, such as at the end of a test.
    pub fn destroy_all(&self) {
        let count = {
            let mut binders = self.binders.lock();
            let count = binders.len();
            binders.clear();
            count
        };
        log::debug!("Dropped all {} resource binders", count);
    }

    pub fn binder_count(&self) -> usize {
        self.binders.lock().len()
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}
