//! Simulation error types.

use thiserror::Error;

/// Failures injected by the simulated room client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// A scheduled join failure fired.
    #[error("join rejected for room {room_name}")]
    JoinRejected {
        /// Requested room name.
        room_name: String,
    },

    /// A scheduled leave failure fired.
    #[error("leave rejected for room {room_id}")]
    LeaveRejected {
        /// Room being left.
        room_id: String,
    },

    /// The room was already left.
    #[error("room {room_id} already left")]
    AlreadyLeft {
        /// Room being left.
        room_id: String,
    },
}
