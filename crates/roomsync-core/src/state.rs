//! Replicated room state.
//!
//! [`ReplicatedState`] is the client-side view of a room's replicated object
//! graph: an ordered map from field name to [`Field`]. Cloning the state is a
//! shallow copy; collection fields keep their identity and only the handles
//! are duplicated.

use std::{collections::BTreeMap, sync::Arc};

use ciborium::Value;

use crate::{SharedCollection, TrackableCollection};

/// A top-level field of replicated state.
#[derive(Debug, Clone)]
pub enum Field {
    /// Plain value without change notifications.
    Scalar(Value),
    /// Nested collection reporting membership changes.
    Collection(SharedCollection),
}

impl Field {
    /// Scalar value, if this field is a scalar.
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            Self::Collection(_) => None,
        }
    }

    /// Collection handle, if this field is a collection.
    pub fn as_collection(&self) -> Option<&SharedCollection> {
        match self {
            Self::Collection(collection) => Some(collection),
            Self::Scalar(_) => None,
        }
    }

    /// Whether two fields share identity.
    ///
    /// Collections compare by handle, scalars by value.
    pub fn same_identity(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Collection(a), Self::Collection(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl<C: TrackableCollection + 'static> From<Arc<C>> for Field {
    fn from(collection: Arc<C>) -> Self {
        Self::Collection(collection)
    }
}

/// Replicated state of a room, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct ReplicatedState {
    fields: BTreeMap<String, Field>,
}

impl ReplicatedState {
    /// Create state with no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    /// Set a field, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, field: impl Into<Field>) -> Option<Field> {
        self.fields.insert(name.into(), field.into())
    }

    /// Remove a field.
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    /// Field by name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Scalar field by name. `None` if missing or not a scalar.
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Field::as_scalar)
    }

    /// Collection field by name. `None` if missing or not a collection.
    pub fn collection(&self, name: &str) -> Option<&SharedCollection> {
        self.get(name).and_then(Field::as_collection)
    }

    /// Fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the state has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReplicatedList;

    #[test]
    fn clone_is_shallow() {
        let items = Arc::new(ReplicatedList::new());
        let state = ReplicatedState::new()
            .with_field("items", Arc::clone(&items))
            .with_field("score", Value::from(0));

        let copy = state.clone();
        items.push(Value::from("x"));

        let copied = copy.collection("items").map(|c| c.len());
        assert_eq!(copied, Some(1));
        assert!(copy.get("items").zip(state.get("items")).is_some_and(|(a, b)| a.same_identity(b)));
    }

    #[test]
    fn typed_accessors_reject_other_kind() {
        let state = ReplicatedState::new()
            .with_field("items", Arc::new(ReplicatedList::new()))
            .with_field("score", Value::from(3));

        assert!(state.scalar("items").is_none());
        assert!(state.collection("score").is_none());
        assert_eq!(state.scalar("score"), Some(&Value::from(3)));
        assert!(state.get("missing").is_none());
    }

    #[test]
    fn scalar_identity_is_value_equality() {
        let a = Field::from(Value::from(5));
        let b = Field::from(Value::from(5));
        let list = Field::from(Arc::new(ReplicatedList::new()));

        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&list));
    }
}
