//! Binding configuration.

use std::time::Duration;

use crate::JoinOptions;

/// Default bound on how long a disconnect waits for the room to be left.
pub const DEFAULT_LEAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`RoomBinding`](crate::RoomBinding).
#[derive(Debug, Clone)]
pub struct BindingConfig {
    /// Options sent with every join; per-call options take precedence.
    pub default_options: JoinOptions,
    /// How long a disconnect waits for the leave to complete. The store is
    /// cleared before waiting, so this only bounds the best-effort cleanup.
    pub leave_timeout: Duration,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self { default_options: JoinOptions::default(), leave_timeout: DEFAULT_LEAVE_TIMEOUT }
    }
}

impl BindingConfig {
    /// Set the options sent with every join.
    #[must_use]
    pub fn with_default_options(mut self, options: JoinOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Set the leave timeout.
    #[must_use]
    pub fn with_leave_timeout(mut self, timeout: Duration) -> Self {
        self.leave_timeout = timeout;
        self
    }
}
