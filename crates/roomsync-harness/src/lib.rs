//! Simulation harness for room binding tests.
//!
//! In-memory implementations of the [`roomsync_client::RoomClient`] and
//! [`roomsync_client::Room`] traits with fault injection, a seeded mutation
//! script, and invariant checks over recorded binding state.
//!
//! # Invariant Testing
//!
//! The `invariants` module verifies WHAT must be true after every operation.
//! Use [`InvariantRegistry::standard()`] for the binding invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod invariants;
pub mod script;
pub mod sim_client;
pub mod sim_room;

pub use error::SimError;
pub use invariants::{
    BindingSnapshot, ConnectingExcludesRoom, Invariant, InvariantRegistry, InvariantResult,
    RoomStatePairing, SnapshotGenerationMonotonicity, StoreGenerationMonotonicity, Violation,
};
pub use script::{DemoRoom, RoomScript, ScriptStep};
pub use sim_client::SimClient;
pub use sim_room::SimRoom;
