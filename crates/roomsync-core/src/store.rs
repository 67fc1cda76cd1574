//! Observable store holding the bound room and its latest snapshot.
//!
//! The store is a `tokio::sync::watch` channel over [`StoreState`]. Every
//! mutation bumps [`StoreState::generation`], and subscribers wake on the next
//! generation instead of comparing identities.

use std::sync::Arc;

use tokio::sync::watch;

use crate::Snapshot;

/// Contents of the store at one generation.
#[derive(Debug)]
pub struct StoreState<R> {
    /// Room held by the binding. `None` while disconnected.
    pub room: Option<Arc<R>>,
    /// Latest snapshot. `None` while disconnected.
    pub state: Option<Arc<Snapshot>>,
    /// Incremented on every store mutation.
    pub generation: u64,
}

impl<R> Default for StoreState<R> {
    fn default() -> Self {
        Self { room: None, state: None, generation: 0 }
    }
}

impl<R> Clone for StoreState<R> {
    fn clone(&self) -> Self {
        Self { room: self.room.clone(), state: self.state.clone(), generation: self.generation }
    }
}

/// Observable store of room and state.
pub struct Store<R> {
    tx: watch::Sender<StoreState<R>>,
}

impl<R> Default for Store<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Store<R> {
    /// Create an empty store at generation 0.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StoreState::default());
        Self { tx }
    }

    /// Copy of the current contents.
    pub fn get_state(&self) -> StoreState<R> {
        self.tx.borrow().clone()
    }

    /// Current room.
    pub fn room(&self) -> Option<Arc<R>> {
        self.tx.borrow().room.clone()
    }

    /// Current snapshot.
    pub fn state(&self) -> Option<Arc<Snapshot>> {
        self.tx.borrow().state.clone()
    }

    /// Current store generation.
    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    /// Replace the room.
    pub fn set_room(&self, room: Option<Arc<R>>) {
        self.update(|contents| contents.room = room);
    }

    /// Replace the snapshot.
    pub fn set_state(&self, state: Option<Arc<Snapshot>>) {
        self.update(|contents| contents.state = state);
    }

    /// Replace room and snapshot in a single generation.
    pub fn replace(&self, room: Arc<R>, state: Arc<Snapshot>) {
        self.update(|contents| {
            contents.room = Some(room);
            contents.state = Some(state);
        });
    }

    /// Clear room and snapshot in a single generation.
    pub fn clear(&self) {
        self.update(|contents| {
            contents.room = None;
            contents.state = None;
        });
    }

    /// Subscribe to store changes.
    ///
    /// The subscription starts with the current generation marked as seen.
    pub fn subscribe(&self) -> Subscription<R> {
        Subscription { rx: self.tx.subscribe() }
    }

    fn update(&self, mutate: impl FnOnce(&mut StoreState<R>)) {
        self.tx.send_modify(|contents| {
            mutate(contents);
            contents.generation += 1;
        });
    }
}

/// Read handle on a [`Store`] that can wait for changes.
pub struct Subscription<R> {
    rx: watch::Receiver<StoreState<R>>,
}

impl<R> Subscription<R> {
    /// Wait for a generation newer than the last one seen.
    ///
    /// Returns `false` once the store has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Whether a newer generation is available without waiting.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Mark the current generation as seen and return it.
    pub fn mark_seen(&mut self) -> u64 {
        self.rx.borrow_and_update().generation
    }

    /// Current store generation.
    pub fn generation(&self) -> u64 {
        self.rx.borrow().generation
    }

    /// Currently held room.
    pub fn use_room(&self) -> Option<Arc<R>> {
        self.rx.borrow().room.clone()
    }

    /// Latest snapshot.
    pub fn use_state(&self) -> Option<Arc<Snapshot>> {
        self.rx.borrow().state.clone()
    }

    /// Projection of the latest snapshot. `None` while no state is held.
    pub fn use_state_with<T>(&self, selector: impl FnOnce(&Snapshot) -> T) -> Option<T> {
        self.rx.borrow().state.as_deref().map(selector)
    }
}
