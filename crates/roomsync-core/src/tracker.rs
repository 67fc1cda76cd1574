//! Change-propagation tracking for nested collections.
//!
//! Room state is mutated in place, so a collection field keeps the same handle
//! while elements come and go. Subscribers that only look at top-level
//! identity would miss those changes. The [`ChangeTracker`] listens to every
//! collection present in the initial state and, when building a snapshot,
//! replaces the collections that changed since the previous snapshot with a
//! fresh clone. Unchanged fields keep their identity so subscribers selecting
//! them see nothing new.
//!
//! # Invariants
//!
//! - The set of tracked fields is decided once, from the initial state. A
//!   field that later turns into a collection is never tracked. A dirty
//!   tracked field is cloned from whatever collection it currently holds; one
//!   that stopped being a collection is copied as-is.
//! - A clean tracked field still holding the attached collection carries the
//!   handle of the previous snapshot, so its identity only changes when its
//!   membership did.
//! - Listeners live exactly as long as the tracker: [`ChangeTracker::detach`]
//!   (or drop) unregisters them from every collection.
//! - A dirty flag is tested and cleared in one atomic step, so a notification
//!   racing with snapshot construction is never lost: it is either observed by
//!   this snapshot or leaves the flag set for the next one.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    CollectionChange, CollectionListener, Field, ListenerId, ReplicatedState, SharedCollection,
    Snapshot,
};

struct TrackedField {
    name: String,
    dirty: Arc<AtomicBool>,
    /// Collection the listeners are attached to.
    live: SharedCollection,
    listeners: [ListenerId; 2],
    /// Handle carried by the last snapshot.
    published: Mutex<SharedCollection>,
}

/// Per-connection change tracker.
pub struct ChangeTracker {
    tracked: Vec<TrackedField>,
}

impl ChangeTracker {
    /// Classify the fields of `initial` and attach listeners to every
    /// collection field.
    pub fn attach(initial: &ReplicatedState) -> Self {
        let mut tracked = Vec::new();

        for (name, field) in initial.fields() {
            let Field::Collection(collection) = field else {
                continue;
            };

            let dirty = Arc::new(AtomicBool::new(false));
            let listeners =
                [collection.on_add(mark_dirty(&dirty)), collection.on_remove(mark_dirty(&dirty))];

            tracing::trace!(field = name, "tracking collection field");
            tracked.push(TrackedField {
                name: name.to_owned(),
                dirty,
                live: Arc::clone(collection),
                listeners,
                published: Mutex::new(Arc::clone(collection)),
            });
        }

        Self { tracked }
    }

    /// Names of tracked fields in name order.
    pub fn tracked_fields(&self) -> impl Iterator<Item = &str> {
        self.tracked.iter().map(|field| field.name.as_str())
    }

    /// Whether `name` was classified as a tracked collection.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.tracked.iter().any(|field| field.name == name)
    }

    /// Whether `name` changed since the last snapshot. `false` for untracked
    /// fields.
    pub fn is_dirty(&self, name: &str) -> bool {
        self.tracked
            .iter()
            .find(|field| field.name == name)
            .is_some_and(|field| field.dirty.load(Ordering::Acquire))
    }

    /// Build the snapshot for `state` at `generation`.
    ///
    /// Shallow-copies `state` and swaps every dirty tracked field for a clone
    /// of its current value, clearing the flag. Clean tracked fields carry the
    /// handle of the previous snapshot.
    pub fn snapshot(&self, state: &ReplicatedState, generation: u64) -> Snapshot {
        let mut copy = state.clone();

        for field in &self.tracked {
            let dirty = field.dirty.swap(false, Ordering::AcqRel);

            let Some(collection) = state.collection(&field.name) else {
                if dirty {
                    tracing::debug!(field = %field.name, "dirty field is no longer a collection");
                }
                continue;
            };

            let is_live = Arc::ptr_eq(collection, &field.live);
            let mut published = field.published.lock().unwrap_or_else(PoisonError::into_inner);
            if dirty {
                let fresh = collection.clone_collection();
                if is_live {
                    *published = Arc::clone(&fresh);
                }
                copy.set(field.name.clone(), Field::Collection(fresh));
            } else if is_live {
                copy.set(field.name.clone(), Field::Collection(Arc::clone(&published)));
            }
        }

        Snapshot::new(generation, copy)
    }

    /// Unregister every listener this tracker attached. Idempotent.
    pub fn detach(&self) {
        for field in &self.tracked {
            for id in field.listeners {
                field.live.off(id);
            }
        }
    }
}

impl Drop for ChangeTracker {
    fn drop(&mut self) {
        self.detach();
    }
}

fn mark_dirty(dirty: &Arc<AtomicBool>) -> CollectionListener {
    let dirty = Arc::clone(dirty);
    Box::new(move |_: &CollectionChange| dirty.store(true, Ordering::Release))
}

#[cfg(test)]
mod tests {
    use ciborium::Value;

    use super::*;
    use crate::{ReplicatedList, ReplicatedMap};

    fn state_with(items: &Arc<ReplicatedList>) -> ReplicatedState {
        ReplicatedState::new()
            .with_field("items", Arc::clone(items))
            .with_field("score", Value::from(0))
    }

    fn same(a: &Snapshot, b: &ReplicatedState, name: &str) -> bool {
        a.get(name).zip(b.get(name)).is_some_and(|(x, y)| x.same_identity(y))
    }

    #[test]
    fn classifies_only_collections() {
        let items = Arc::new(ReplicatedList::new());
        let state = state_with(&items).with_field("players", Arc::new(ReplicatedMap::new()));

        let tracker = ChangeTracker::attach(&state);

        assert_eq!(tracker.tracked_fields().collect::<Vec<_>>(), vec!["items", "players"]);
        assert!(!tracker.is_tracked("score"));
        assert_eq!(items.listener_count(), 2);
    }

    #[test]
    fn clean_fields_keep_identity() {
        let items = Arc::new(ReplicatedList::new());
        let state = state_with(&items);
        let tracker = ChangeTracker::attach(&state);

        let snapshot = tracker.snapshot(&state, 1);

        assert!(same(&snapshot, &state, "items"));
        assert_eq!(snapshot.generation(), 1);
    }

    #[test]
    fn dirty_field_is_cloned_and_flag_cleared() {
        let items = Arc::new(ReplicatedList::new());
        let state = state_with(&items);
        let tracker = ChangeTracker::attach(&state);

        items.push(Value::from("x"));
        assert!(tracker.is_dirty("items"));

        let snapshot = tracker.snapshot(&state, 1);
        assert!(!same(&snapshot, &state, "items"));
        assert!(!tracker.is_dirty("items"));
        assert_eq!(
            snapshot.collection("items").map(|c| c.values()),
            Some(vec![Value::from("x")])
        );

        // Nothing changed since: the clone is carried forward.
        let next = tracker.snapshot(&state, 2);
        let carried = next.get("items").zip(snapshot.get("items"));
        assert!(carried.is_some_and(|(a, b)| a.same_identity(b)));
    }

    #[test]
    fn removal_marks_dirty() {
        let items = Arc::new(ReplicatedList::from_values([Value::from(1)]));
        let state = state_with(&items);
        let tracker = ChangeTracker::attach(&state);

        let _ = items.remove(0);

        assert!(tracker.is_dirty("items"));
    }

    #[test]
    fn dirty_field_replaced_by_scalar_is_skipped() {
        let items = Arc::new(ReplicatedList::new());
        let mut state = state_with(&items);
        let tracker = ChangeTracker::attach(&state);

        items.push(Value::from(1));
        state.set("items", Value::from("gone"));

        let snapshot = tracker.snapshot(&state, 1);
        assert_eq!(snapshot.scalar("items"), Some(&Value::from("gone")));
        assert!(!tracker.is_dirty("items"));
    }

    #[test]
    fn dirty_field_holding_replacement_is_cloned() {
        let items = Arc::new(ReplicatedList::new());
        let mut state = state_with(&items);
        let tracker = ChangeTracker::attach(&state);

        let replacement = Arc::new(ReplicatedList::from_values([Value::from(2)]));
        state.set("items", Arc::clone(&replacement));
        let first = tracker.snapshot(&state, 1);
        assert!(same(&first, &state, "items"));

        items.push(Value::from(9));
        let second = tracker.snapshot(&state, 2);

        assert!(!same(&second, &state, "items"));
        let carried = second.get("items").zip(first.get("items"));
        assert!(!carried.is_some_and(|(a, b)| a.same_identity(b)));
        assert_eq!(
            second.collection("items").map(|c| c.values()),
            Some(vec![Value::from(2)])
        );
        assert!(!tracker.is_dirty("items"));
        assert_eq!(replacement.listener_count(), 0);
    }

    #[test]
    fn detach_unregisters_listeners() {
        let items = Arc::new(ReplicatedList::new());
        let state = state_with(&items);
        let tracker = ChangeTracker::attach(&state);
        assert_eq!(items.listener_count(), 2);

        tracker.detach();
        tracker.detach();
        items.push(Value::from(1));

        assert_eq!(items.listener_count(), 0);
        assert!(!tracker.is_dirty("items"));

        let again = ChangeTracker::attach(&state);
        drop(again);
        assert_eq!(items.listener_count(), 0);
    }

    #[test]
    fn late_collection_is_never_tracked() {
        let state = ReplicatedState::new().with_field("items", Value::Null);
        let tracker = ChangeTracker::attach(&state);

        let items = Arc::new(ReplicatedList::new());
        let later = ReplicatedState::new().with_field("items", Arc::clone(&items));
        items.push(Value::from(1));

        let snapshot = tracker.snapshot(&later, 1);
        assert!(same(&snapshot, &later, "items"));
        assert_eq!(items.listener_count(), 0);
    }
}
