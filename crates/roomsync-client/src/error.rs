//! Binding error types.

use std::time::Duration;

use thiserror::Error;

/// Boxed error from a room client implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while driving a room connection.
///
/// None of these reach callers of [`crate::RoomBinding`]: join failures are
/// logged and leave failures are dropped. They exist so both paths carry
/// structured context.
#[derive(Debug, Error)]
pub enum BindingError {
    /// Join-or-create was rejected or could not reach the server.
    #[error("failed to join room {room_name}: {source}")]
    Join {
        /// Requested room name.
        room_name: String,
        /// Client error.
        #[source]
        source: BoxError,
    },

    /// Leaving the room failed.
    #[error("failed to leave room {room_id}: {source}")]
    Leave {
        /// Identifier of the room being left.
        room_id: String,
        /// Client error.
        #[source]
        source: BoxError,
    },

    /// Leaving the room did not complete in time.
    #[error("leaving room {room_id} timed out after {timeout:?}")]
    LeaveTimedOut {
        /// Identifier of the room being left.
        room_id: String,
        /// Configured leave timeout.
        timeout: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_error_keeps_source() {
        let source: BoxError = "connection refused".into();
        let err = BindingError::Join { room_name: "lobby".into(), source };

        assert_eq!(err.to_string(), "failed to join room lobby: connection refused");
        assert!(std::error::Error::source(&err).is_some());
    }
}
