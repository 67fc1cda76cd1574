//! Room binding client.
//!
//! Connects a networked-room client to the observable store from
//! [`roomsync_core`], keeping the store in step with the room's replicated
//! state.
//!
//! # Components
//!
//! - [`RoomClient`] / [`Room`]: the room client the binding drives
//! - [`RoomBinding`]: connect, disconnect and read hooks
//! - [`BindingConfig`]: default join options and leave timeout
//! - [`BindingError`]: structured context for logged and dropped failures

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod binding;
mod config;
mod error;
mod room;

pub use binding::{ConnectOutcome, RoomBinding};
pub use config::{BindingConfig, DEFAULT_LEAVE_TIMEOUT};
pub use error::{BindingError, BoxError};
pub use room::{JoinOptions, Room, RoomClient, StateListener};
pub use roomsync_core::{ReplicatedState, Snapshot, Subscription, Value};
