//! Non-owning registry of the stream views derived from one array.
//!
//! The registry does not hold views. It holds one [`ViewLiveness`] flag per
//! view, shared with the view itself, in a generational [`SlotTable`]. A view
//! that is closed or dropped removes its own entry; the array can still
//! enumerate every live view and force all of them closed when it is
//! disposed. Registration and forced closure share one lock, so a view
//! requested while disposal runs either lands before the drain (and is
//! closed by it) or is refused.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use offheap_core::{ArrayError, ViewKey};
use smallvec::SmallVec;
use tracing::trace;

use crate::slots::SlotTable;

/// Closed flag shared between a view and the registry entry for it.
#[derive(Debug, Default)]
pub(crate) struct ViewLiveness {
    closed: AtomicBool,
}

impl ViewLiveness {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark closed. Returns `true` for the call that performed the change.
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

struct RegistryState {
    views: SlotTable<Arc<ViewLiveness>>,
    closing: bool,
}

/// Per-array table of live views.
pub(crate) struct ViewRegistry {
    state: Mutex<RegistryState>,
}

impl ViewRegistry {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                views: SlotTable::new(),
                closing: false,
            }),
        }
    }

    /// Add a view. Fails with `ObjectDisposed` once the owner has begun
    /// closing.
    pub(crate) fn register(&self) -> Result<(ViewKey, Arc<ViewLiveness>), ArrayError> {
        let mut state = self.lock();
        if state.closing {
            return Err(ArrayError::disposed("UnmanagedArray"));
        }
        let liveness = Arc::new(ViewLiveness::default());
        let key = state.views.insert(Arc::clone(&liveness));
        trace!(view = %key, live = state.views.len(), "registered stream view");
        Ok((key, liveness))
    }

    /// Drop the entry for `key`. Stale keys are ignored.
    pub(crate) fn deregister(&self, key: ViewKey) {
        let mut state = self.lock();
        if state.views.remove(key).is_some() {
            trace!(view = %key, live = state.views.len(), "deregistered stream view");
        }
    }

    /// Whether `key` still names a registered view.
    #[cfg(test)]
    pub(crate) fn contains(&self, key: ViewKey) -> bool {
        self.lock().views.get(key).is_some()
    }

    /// Call `f` for every registered view that has not closed itself.
    pub(crate) fn for_each_live(&self, mut f: impl FnMut(ViewKey)) {
        let state = self.lock();
        for (key, liveness) in state.views.iter() {
            if !liveness.is_closed() {
                f(key);
            }
        }
    }

    /// Number of registered views that have not closed themselves.
    pub(crate) fn live_count(&self) -> usize {
        let mut n = 0;
        self.for_each_live(|_| n += 1);
        n
    }

    /// Refuse further registrations, close every live view, and clear the
    /// table. Returns how many views were closed by this call.
    pub(crate) fn force_close_all(&self) -> usize {
        let mut drained: SmallVec<[Arc<ViewLiveness>; 8]> = SmallVec::new();
        {
            let mut state = self.lock();
            state.closing = true;
            state.views.drain_into(&mut drained);
        }
        drained.iter().filter(|liveness| liveness.close()).count()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
