//! Simulated room.
//!
//! [`SimRoom`] stands in for a server-backed room. Tests hold a clone of the
//! handle to mutate the replicated state and deliver patches, while the
//! binding holds another clone through the [`Room`] trait.

use std::{
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use roomsync_client::{Room, StateListener};
use roomsync_core::ReplicatedState;
use tokio::sync::watch;

use crate::SimError;

type SharedListener = Arc<dyn Fn(Option<&ReplicatedState>) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SimRoomInner {
    id: String,
    name: String,
    state: Mutex<ReplicatedState>,
    listeners: Mutex<Vec<SharedListener>>,
    fail_leaves: AtomicUsize,
    leave_calls: AtomicUsize,
    left: AtomicBool,
    gate: watch::Sender<bool>,
}

/// Cloneable handle to a simulated room.
#[derive(Clone)]
pub struct SimRoom {
    inner: Arc<SimRoomInner>,
}

impl std::fmt::Debug for SimRoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimRoom")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("left", &self.has_left())
            .finish_non_exhaustive()
    }
}

impl SimRoom {
    /// Create a room with the given initial state.
    pub fn new(id: impl Into<String>, name: impl Into<String>, state: ReplicatedState) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(SimRoomInner {
                id: id.into(),
                name: name.into(),
                state: Mutex::new(state),
                listeners: Mutex::new(Vec::new()),
                fail_leaves: AtomicUsize::new(0),
                leave_calls: AtomicUsize::new(0),
                left: AtomicBool::new(false),
                gate,
            }),
        }
    }

    /// Mutate the live state without notifying listeners.
    pub fn mutate(&self, f: impl FnOnce(&mut ReplicatedState)) {
        f(&mut lock(&self.inner.state));
    }

    /// Deliver the current state to every listener.
    pub fn broadcast(&self) {
        let state = lock(&self.inner.state).clone();
        for listener in self.listeners() {
            listener(Some(&state));
        }
    }

    /// Mutate the live state, then deliver it.
    pub fn patch(&self, f: impl FnOnce(&mut ReplicatedState)) {
        self.mutate(f);
        self.broadcast();
    }

    /// Deliver an update without a state.
    pub fn broadcast_empty(&self) {
        for listener in self.listeners() {
            listener(None);
        }
    }

    /// Make the next `count` leave calls fail.
    pub fn fail_next_leaves(&self, count: usize) {
        self.inner.fail_leaves.store(count, Ordering::SeqCst);
    }

    /// Park leave calls until [`release_leaves`](Self::release_leaves).
    pub fn hold_leaves(&self) {
        self.inner.gate.send_replace(false);
    }

    /// Let parked and future leave calls proceed.
    pub fn release_leaves(&self) {
        self.inner.gate.send_replace(true);
    }

    /// Number of leave calls received.
    pub fn leave_count(&self) -> usize {
        self.inner.leave_calls.load(Ordering::SeqCst)
    }

    /// Whether a leave succeeded.
    pub fn has_left(&self) -> bool {
        self.inner.left.load(Ordering::SeqCst)
    }

    /// Number of registered state listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Listeners copied out so callbacks run without the lock held.
    fn listeners(&self) -> Vec<SharedListener> {
        lock(&self.inner.listeners).clone()
    }

    /// Whether both handles point at the same room.
    pub fn same_room(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Room for SimRoom {
    type Error = SimError;

    fn id(&self) -> &str {
        &self.inner.id
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn state(&self) -> ReplicatedState {
        lock(&self.inner.state).clone()
    }

    fn on_state_change(&self, listener: StateListener) {
        lock(&self.inner.listeners).push(SharedListener::from(listener));
    }

    fn leave(&self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.leave_calls.fetch_add(1, Ordering::SeqCst);

            let mut gate = inner.gate.subscribe();
            let _ = gate.wait_for(|open| *open).await;

            let scheduled_failure = inner
                .fail_leaves
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if scheduled_failure {
                return Err(SimError::LeaveRejected { room_id: inner.id.clone() });
            }
            if inner.left.swap(true, Ordering::SeqCst) {
                return Err(SimError::AlreadyLeft { room_id: inner.id.clone() });
            }

            lock(&inner.listeners).clear();
            tracing::debug!(room = %inner.id, "simulated room left");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use roomsync_core::Value;

    use super::*;

    #[test]
    fn patch_reaches_listeners() {
        let room = SimRoom::new("r1", "lobby", ReplicatedState::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        room.on_state_change(Box::new(move |state: Option<&ReplicatedState>| {
            if state.and_then(|s| s.scalar("score")).is_some() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        room.patch(|state| {
            state.set("score", Value::from(1));
        });
        room.broadcast_empty();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_can_reenter_room() {
        let room = SimRoom::new("r1", "lobby", ReplicatedState::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let handle = room.clone();
        let counter = Arc::clone(&seen);
        room.on_state_change(Box::new(move |_: Option<&ReplicatedState>| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                handle.on_state_change(Box::new(|_: Option<&ReplicatedState>| {}));
                handle.broadcast_empty();
            }
        }));

        room.broadcast();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(room.listener_count(), 2);
    }

    #[tokio::test]
    async fn scheduled_leave_failure_then_success() {
        let room = SimRoom::new("r1", "lobby", ReplicatedState::new());
        room.on_state_change(Box::new(|_: Option<&ReplicatedState>| {}));
        room.fail_next_leaves(1);

        assert_eq!(room.leave().await, Err(SimError::LeaveRejected { room_id: "r1".into() }));
        assert!(!room.has_left());
        assert_eq!(room.leave().await, Ok(()));
        assert!(room.has_left());
        assert_eq!(room.listener_count(), 0);
        assert_eq!(room.leave_count(), 2);
    }
}
