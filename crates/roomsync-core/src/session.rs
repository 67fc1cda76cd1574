//! Per-connection tracker session.
//!
//! A [`TrackerSession`] is created for each successful connection. It owns the
//! [`ChangeTracker`] and the snapshot generation counter, and is shared with
//! the room's state-change handler. Detaching the session on disconnect makes
//! any notification still in flight a no-op, so a room being left never
//! repopulates the store, and releases the tracker's collection listeners.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use crate::{ChangeTracker, ReplicatedState, Store};

/// Change-propagation session bound to one room connection.
pub struct TrackerSession<R> {
    tracker: ChangeTracker,
    store: Arc<Store<R>>,
    generation: AtomicU64,
    active: AtomicBool,
}

impl<R> TrackerSession<R> {
    /// Start tracking the collections of `initial`, publishing to `store`.
    pub fn start(initial: &ReplicatedState, store: Arc<Store<R>>) -> Self {
        Self {
            tracker: ChangeTracker::attach(initial),
            store,
            generation: AtomicU64::new(0),
            active: AtomicBool::new(true),
        }
    }

    /// Handle a state-change notification from the room.
    ///
    /// `None` payloads and notifications after [`detach`](Self::detach) are
    /// ignored.
    pub fn on_state_change(&self, state: Option<&ReplicatedState>) {
        if !self.is_active() {
            tracing::debug!("ignoring state change for detached session");
            return;
        }
        let Some(state) = state else {
            tracing::debug!("ignoring empty state change");
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = self.tracker.snapshot(state, generation);
        tracing::trace!(generation, fields = snapshot.len(), "publishing snapshot");
        self.store.set_state(Some(Arc::new(snapshot)));
    }

    /// Stop publishing to the store and unregister collection listeners.
    pub fn detach(&self) {
        self.active.store(false, Ordering::Release);
        self.tracker.detach();
    }

    /// Whether the session still publishes.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Generation of the last published snapshot.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The session's change tracker.
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }
}
