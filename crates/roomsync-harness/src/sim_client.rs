//! Simulated room client.
//!
//! [`SimClient`] implements [`RoomClient`] entirely in memory. Room names map
//! to seeded initial states; the first join for a name creates a [`SimRoom`]
//! from its seed and later joins reuse it until it has been left.
//!
//! Fault injection:
//! - [`fail_next_joins`](SimClient::fail_next_joins) rejects upcoming joins
//! - [`hold_joins`](SimClient::hold_joins) parks joins until
//!   [`release_joins`](SimClient::release_joins), keeping them in flight

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use roomsync_client::{JoinOptions, RoomClient};
use roomsync_core::ReplicatedState;
use tokio::sync::watch;

use crate::{SimError, SimRoom};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SimClientInner {
    seeds: Mutex<HashMap<String, ReplicatedState>>,
    rooms: Mutex<HashMap<String, SimRoom>>,
    last_options: Mutex<Option<JoinOptions>>,
    joins: AtomicUsize,
    fail_joins: AtomicUsize,
    next_room: AtomicU64,
    gate: watch::Sender<bool>,
}

/// In-memory room client.
#[derive(Clone)]
pub struct SimClient {
    endpoint: String,
    inner: Arc<SimClientInner>,
}

impl SimClient {
    /// Create a client for `endpoint` with no seeded rooms.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            endpoint: endpoint.into(),
            inner: Arc::new(SimClientInner {
                seeds: Mutex::new(HashMap::new()),
                rooms: Mutex::new(HashMap::new()),
                last_options: Mutex::new(None),
                joins: AtomicUsize::new(0),
                fail_joins: AtomicUsize::new(0),
                next_room: AtomicU64::new(1),
                gate,
            }),
        }
    }

    /// Seed the initial state for rooms created under `name`.
    ///
    /// Unseeded names start with empty state.
    #[must_use]
    pub fn with_room(self, name: impl Into<String>, initial: ReplicatedState) -> Self {
        lock(&self.inner.seeds).insert(name.into(), initial);
        self
    }

    /// Room currently open under `name`.
    pub fn room(&self, name: &str) -> Option<SimRoom> {
        lock(&self.inner.rooms).get(name).cloned()
    }

    /// Number of join-or-create calls received.
    pub fn join_count(&self) -> usize {
        self.inner.joins.load(Ordering::SeqCst)
    }

    /// Options received by the most recent join.
    pub fn last_options(&self) -> Option<JoinOptions> {
        lock(&self.inner.last_options).clone()
    }

    /// Reject the next `count` joins.
    pub fn fail_next_joins(&self, count: usize) {
        self.inner.fail_joins.store(count, Ordering::SeqCst);
    }

    /// Park joins until [`release_joins`](Self::release_joins).
    pub fn hold_joins(&self) {
        self.inner.gate.send_replace(false);
    }

    /// Let parked and future joins proceed.
    pub fn release_joins(&self) {
        self.inner.gate.send_replace(true);
    }

    fn open_room(inner: &SimClientInner, room_name: &str) -> SimRoom {
        let mut rooms = lock(&inner.rooms);
        if let Some(room) = rooms.get(room_name).filter(|room| !room.has_left()) {
            return room.clone();
        }

        let initial = lock(&inner.seeds).get(room_name).cloned().unwrap_or_default();
        let id = format!("{room_name}-{}", inner.next_room.fetch_add(1, Ordering::SeqCst));
        tracing::debug!(room = room_name, %id, "simulated room created");

        let room = SimRoom::new(id, room_name, initial);
        rooms.insert(room_name.to_owned(), room.clone());
        room
    }
}

impl RoomClient for SimClient {
    type Room = SimRoom;
    type Error = SimError;

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn join_or_create(
        &self,
        room_name: &str,
        options: &JoinOptions,
    ) -> impl Future<Output = Result<Self::Room, Self::Error>> + Send {
        let inner = Arc::clone(&self.inner);
        let room_name = room_name.to_owned();
        let options = options.clone();

        async move {
            inner.joins.fetch_add(1, Ordering::SeqCst);
            *lock(&inner.last_options) = Some(options);

            let mut gate = inner.gate.subscribe();
            // The sender lives in `inner`, so the gate cannot close while we wait.
            let _ = gate.wait_for(|open| *open).await;

            let scheduled_failure = inner
                .fail_joins
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if scheduled_failure {
                return Err(SimError::JoinRejected { room_name });
            }

            Ok(Self::open_room(&inner, &room_name))
        }
    }
}
