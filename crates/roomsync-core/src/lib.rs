//! Core of the room state binding.
//!
//! Replicated state model, change-propagation tracking and the observable
//! store. Nothing here performs I/O; the connection lifecycle lives in
//! `roomsync-client`.
//!
//! # Components
//!
//! - [`TrackableCollection`]: nested collection reporting membership changes,
//!   implemented by [`ReplicatedList`] and [`ReplicatedMap`]
//! - [`ReplicatedState`]: field map mirrored from a room
//! - [`ChangeTracker`]: decides which fields get a fresh identity per snapshot
//! - [`Store`]: observable holder of room and latest [`Snapshot`]
//! - [`TrackerSession`]: per-connection glue between room notifications and the
//!   store

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod collection;
mod session;
mod snapshot;
mod state;
mod store;
mod tracker;

pub use ciborium::Value;
pub use collection::{
    ChangeKind, CollectionChange, CollectionKey, CollectionListener, ListenerId, ReplicatedList,
    ReplicatedMap, SharedCollection, TrackableCollection,
};
pub use session::TrackerSession;
pub use snapshot::Snapshot;
pub use state::{Field, ReplicatedState};
pub use store::{Store, StoreState, Subscription};
pub use tracker::ChangeTracker;
