//! Room client abstraction.
//!
//! The [`RoomClient`] and [`Room`] traits describe the networked-room client
//! the binding drives. Transport, schema decoding and matchmaking stay behind
//! these traits; implementations only have to deliver the replicated state and
//! its change notifications.

use std::{collections::BTreeMap, future::Future};

use ciborium::Value;
use roomsync_core::ReplicatedState;

/// Callback invoked with the room's state after each server patch.
///
/// `None` is delivered when the client reports an update without a state.
pub type StateListener = Box<dyn Fn(Option<&ReplicatedState>) + Send + Sync>;

/// Options sent with a join-or-create request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinOptions {
    values: BTreeMap<String, Value>,
}

impl JoinOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style option insertion.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Option value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no option is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// These options layered over `defaults`; keys set here win.
    #[must_use]
    pub fn merged_over(&self, defaults: &Self) -> Self {
        let mut values = defaults.values.clone();
        values.extend(self.values.iter().map(|(key, value)| (key.clone(), value.clone())));
        Self { values }
    }
}

/// A joined room.
///
/// The binding holds the room behind an `Arc` for as long as it is connected.
pub trait Room: Send + Sync + 'static {
    /// Error returned when leaving fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Server-assigned room identifier.
    fn id(&self) -> &str;

    /// Name the room was joined under.
    fn name(&self) -> &str;

    /// Current replicated state (shallow copy of the live state).
    fn state(&self) -> ReplicatedState;

    /// Register a listener for state changes.
    fn on_state_change(&self, listener: StateListener);

    /// Leave the room.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the leave or the connection is
    /// already gone.
    fn leave(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A client able to join or create rooms.
pub trait RoomClient: Send + Sync {
    /// Room handle produced by a successful join.
    type Room: Room;

    /// Error returned when joining fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Endpoint the client talks to.
    fn endpoint(&self) -> &str;

    /// Join the room named `room_name`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or refuses the join.
    fn join_or_create(
        &self,
        room_name: &str,
        options: &JoinOptions,
    ) -> impl Future<Output = Result<Self::Room, Self::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_options_override_defaults() {
        let defaults = JoinOptions::new().with("mode", "casual").with("region", "eu");
        let call = JoinOptions::new().with("mode", "ranked");

        let merged = call.merged_over(&defaults);

        assert_eq!(merged.get("mode"), Some(&Value::from("ranked")));
        assert_eq!(merged.get("region"), Some(&Value::from("eu")));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn empty_options_take_defaults() {
        let defaults = JoinOptions::new().with("seats", 4);

        assert_eq!(JoinOptions::new().merged_over(&defaults), defaults);
        assert!(JoinOptions::new().is_empty());
    }
}
