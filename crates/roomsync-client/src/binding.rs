//! Room-to-store binding.
//!
//! [`RoomBinding`] owns the connection lifecycle: it joins a room through a
//! [`RoomClient`], mirrors the room's state into a [`Store`], and runs a
//! [`TrackerSession`] so nested collection changes reach subscribers.
//!
//! # Failure policy
//!
//! Every operation is best-effort. A failed join is logged and leaves the
//! store untouched; a failed leave is traced at debug level and dropped after
//! the store has already been cleared. Nothing here returns an error to the
//! caller.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use roomsync_core::{ReplicatedState, Snapshot, Store, Subscription, TrackerSession};

use crate::{BindingConfig, BindingError, JoinOptions, Room, RoomClient};

/// Result of a [`RoomBinding::connect`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Joined the room; store and tracker are live.
    Connected,
    /// A room is already held; nothing was done.
    AlreadyConnected,
    /// Another connect is in flight; nothing was done.
    InProgress,
    /// The join failed; the store is unchanged.
    Failed,
}

/// Clears the connecting flag when dropped, including when the connect future
/// is cancelled mid-join.
struct ConnectingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ConnectingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Binds a room client to an observable store.
pub struct RoomBinding<C: RoomClient> {
    client: C,
    config: BindingConfig,
    store: Arc<Store<C::Room>>,
    connecting: AtomicBool,
    session: Mutex<Option<Arc<TrackerSession<C::Room>>>>,
}

impl<C: RoomClient> RoomBinding<C> {
    /// Create a binding with default configuration.
    pub fn new(client: C) -> Self {
        Self::with_config(client, BindingConfig::default())
    }

    /// Create a binding with the given configuration.
    pub fn with_config(client: C, config: BindingConfig) -> Self {
        Self {
            client,
            config,
            store: Arc::new(Store::new()),
            connecting: AtomicBool::new(false),
            session: Mutex::new(None),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Active configuration.
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Join `room_name` with the configured default options.
    pub async fn connect(&self, room_name: &str) -> ConnectOutcome {
        self.connect_with(room_name, JoinOptions::default()).await
    }

    /// Join `room_name` with `options` layered over the configured defaults.
    ///
    /// No-op while a room is held or another connect is in flight.
    pub async fn connect_with(&self, room_name: &str, options: JoinOptions) -> ConnectOutcome {
        if self.store.room().is_some() {
            tracing::debug!(room = room_name, "connect skipped: already connected");
            return ConnectOutcome::AlreadyConnected;
        }
        let Some(_connecting) = ConnectingGuard::acquire(&self.connecting) else {
            tracing::debug!(room = room_name, "connect skipped: connection in progress");
            return ConnectOutcome::InProgress;
        };
        // Another connect may have finished between the room check and acquire.
        if self.store.room().is_some() {
            tracing::debug!(room = room_name, "connect skipped: already connected");
            return ConnectOutcome::AlreadyConnected;
        }

        let options = options.merged_over(&self.config.default_options);
        match self.client.join_or_create(room_name, &options).await {
            Ok(room) => {
                self.attach(room);
                tracing::info!(
                    room = room_name,
                    endpoint = self.client.endpoint(),
                    "connected to room"
                );
                ConnectOutcome::Connected
            },
            Err(source) => {
                let err = BindingError::Join {
                    room_name: room_name.to_owned(),
                    source: Box::new(source),
                };
                tracing::error!(
                    endpoint = self.client.endpoint(),
                    error = %err,
                    "failed to connect"
                );
                ConnectOutcome::Failed
            },
        }
    }

    /// Leave the held room.
    ///
    /// The store is cleared before the leave is attempted. Leave failures and
    /// timeouts are dropped. No-op when no room is held.
    pub async fn disconnect(&self) {
        let Some(room) = self.store.room() else {
            tracing::debug!("disconnect skipped: not connected");
            return;
        };

        let session = self.lock_session().take();
        if let Some(session) = session {
            session.detach();
        }
        self.store.clear();

        match self.leave(&room).await {
            Ok(()) => tracing::info!(room = room.name(), "disconnected from room"),
            Err(err) => tracing::debug!(error = %err, "leave failed after disconnect"),
        }
    }

    /// Currently held room.
    pub fn use_room(&self) -> Option<Arc<C::Room>> {
        self.store.room()
    }

    /// Latest snapshot.
    pub fn use_state(&self) -> Option<Arc<Snapshot>> {
        self.store.state()
    }

    /// Projection of the latest snapshot. `None` while no state is held.
    pub fn use_state_with<T>(&self, selector: impl FnOnce(&Snapshot) -> T) -> Option<T> {
        self.store.state().map(|snapshot| selector(&snapshot))
    }

    /// Subscribe to store changes.
    pub fn subscribe(&self) -> Subscription<C::Room> {
        self.store.subscribe()
    }

    /// Whether a connect is in flight.
    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::Acquire)
    }

    /// Fields classified as tracked collections for the current connection.
    /// Empty while disconnected.
    pub fn tracked_fields(&self) -> Vec<String> {
        self.lock_session()
            .as_ref()
            .map(|session| session.tracker().tracked_fields().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    fn attach(&self, room: C::Room) {
        let room = Arc::new(room);
        let initial = room.state();

        self.store.replace(Arc::clone(&room), Arc::new(Snapshot::initial(initial.clone())));

        let session = Arc::new(TrackerSession::start(&initial, Arc::clone(&self.store)));
        let handler = Arc::clone(&session);
        room.on_state_change(Box::new(move |state: Option<&ReplicatedState>| {
            handler.on_state_change(state);
        }));

        let previous = self.lock_session().replace(session);
        if let Some(previous) = previous {
            tracing::debug!("replacing an attached tracker session");
            previous.detach();
        }
    }

    async fn leave(&self, room: &C::Room) -> Result<(), BindingError> {
        let timeout = self.config.leave_timeout;
        match tokio::time::timeout(timeout, room.leave()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => {
                Err(BindingError::Leave { room_id: room.id().to_owned(), source: Box::new(source) })
            },
            Err(_elapsed) => {
                Err(BindingError::LeaveTimedOut { room_id: room.id().to_owned(), timeout })
            },
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Arc<TrackerSession<C::Room>>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
