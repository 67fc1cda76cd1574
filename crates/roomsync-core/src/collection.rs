//! Trackable replicated collections.
//!
//! A [`TrackableCollection`] is a nested field value that reports membership
//! changes. The [`crate::ChangeTracker`] relies on these notifications to
//! decide which fields need a fresh identity in the next snapshot, since
//! in-place mutation of a shared collection is invisible to subscribers that
//! compare by identity or generation.
//!
//! Two concrete collections are provided: [`ReplicatedList`] (indexed) and
//! [`ReplicatedMap`] (string-keyed). Both use interior mutability so a single
//! shared handle can be mutated by the room while snapshots hold it.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use ciborium::Value;

/// Shared handle to a trackable collection.
pub type SharedCollection = Arc<dyn TrackableCollection>;

/// Callback invoked when a collection changes membership.
pub type CollectionListener = Box<dyn Fn(&CollectionChange) + Send + Sync>;

type SharedListener = Arc<dyn Fn(&CollectionChange) + Send + Sync>;

/// Handle returned when registering a listener, used to unregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Position of an element inside a collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CollectionKey {
    /// Position in an indexed collection.
    Index(usize),
    /// Key in a keyed collection.
    Key(String),
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "[{index}]"),
            Self::Key(key) => write!(f, "{key:?}"),
        }
    }
}

/// Kind of membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Element inserted.
    Add,
    /// Element removed.
    Remove,
}

/// A single membership change delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionChange {
    /// Whether the element was added or removed.
    pub kind: ChangeKind,
    /// Where the element lives (or lived).
    pub key: CollectionKey,
    /// The element value.
    pub value: Value,
}

/// A replicated collection that reports membership changes.
///
/// Implementations must deliver add and remove notifications synchronously
/// from the mutating call, after the mutation is visible through
/// [`values`](TrackableCollection::values).
pub trait TrackableCollection: fmt::Debug + Send + Sync {
    /// Produce a new collection with a distinct identity and equivalent
    /// contents.
    ///
    /// Listeners are not carried over to the clone.
    fn clone_collection(&self) -> SharedCollection;

    /// Register a listener for element insertions.
    fn on_add(&self, listener: CollectionListener) -> ListenerId;

    /// Register a listener for element removals.
    fn on_remove(&self, listener: CollectionListener) -> ListenerId;

    /// Unregister a listener. Returns `false` if `id` was not registered.
    fn off(&self, id: ListenerId) -> bool;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the collection has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element values in collection order.
    fn values(&self) -> Vec<Value>;
}

/// Recover the guard from a poisoned lock; collection data stays consistent
/// because every mutation completes before listeners run.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    add: Vec<(ListenerId, SharedListener)>,
    remove: Vec<(ListenerId, SharedListener)>,
}

impl Listeners {
    fn register(&mut self, kind: ChangeKind, listener: CollectionListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        let entry = (id, SharedListener::from(listener));
        match kind {
            ChangeKind::Add => self.add.push(entry),
            ChangeKind::Remove => self.remove.push(entry),
        }
        id
    }

    fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.len();
        self.add.retain(|(registered, _)| *registered != id);
        self.remove.retain(|(registered, _)| *registered != id);
        self.len() != before
    }

    /// Listeners for `kind`, copied out so they run without the lock held.
    fn for_kind(&self, kind: ChangeKind) -> Vec<SharedListener> {
        let listeners = match kind {
            ChangeKind::Add => &self.add,
            ChangeKind::Remove => &self.remove,
        };
        listeners.iter().map(|(_, listener)| Arc::clone(listener)).collect()
    }

    fn len(&self) -> usize {
        self.add.len() + self.remove.len()
    }
}

fn emit(listeners: &Mutex<Listeners>, kind: ChangeKind, key: CollectionKey, value: Value) {
    let targets = lock(listeners).for_kind(kind);
    let change = CollectionChange { kind, key, value };
    for listener in targets {
        listener(&change);
    }
}

/// Indexed replicated collection.
///
/// Removing an element shifts later elements down, like `Vec::remove`.
#[derive(Default)]
pub struct ReplicatedList {
    items: Mutex<Vec<Value>>,
    listeners: Mutex<Listeners>,
}

impl ReplicatedList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a list holding `values`. No notifications are emitted.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self { items: Mutex::new(values.into_iter().collect()), listeners: Mutex::default() }
    }

    /// Append a value and notify add listeners.
    pub fn push(&self, value: Value) {
        let index = {
            let mut items = lock(&self.items);
            items.push(value.clone());
            items.len() - 1
        };
        self.emit(ChangeKind::Add, CollectionKey::Index(index), value);
    }

    /// Insert a value at `index` and notify add listeners.
    ///
    /// Returns `false` without notifying if `index` is past the end.
    pub fn insert(&self, index: usize, value: Value) -> bool {
        {
            let mut items = lock(&self.items);
            if index > items.len() {
                return false;
            }
            items.insert(index, value.clone());
        }
        self.emit(ChangeKind::Add, CollectionKey::Index(index), value);
        true
    }

    /// Remove the value at `index` and notify remove listeners.
    ///
    /// Returns `None` without notifying if `index` is out of bounds.
    pub fn remove(&self, index: usize) -> Option<Value> {
        let removed = {
            let mut items = lock(&self.items);
            (index < items.len()).then(|| items.remove(index))
        }?;
        self.emit(ChangeKind::Remove, CollectionKey::Index(index), removed.clone());
        Some(removed)
    }

    /// Remove every value, notifying once per element from the back.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *lock(&self.items));
        for (index, value) in drained.into_iter().enumerate().rev() {
            self.emit(ChangeKind::Remove, CollectionKey::Index(index), value);
        }
    }

    /// Value at `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        lock(&self.items).get(index).cloned()
    }

    /// Number of registered listeners (add and remove combined).
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn emit(&self, kind: ChangeKind, key: CollectionKey, value: Value) {
        emit(&self.listeners, kind, key, value);
    }
}

impl fmt::Debug for ReplicatedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(lock(&self.items).iter()).finish()
    }
}

impl TrackableCollection for ReplicatedList {
    fn clone_collection(&self) -> SharedCollection {
        Arc::new(Self::from_values(lock(&self.items).iter().cloned()))
    }

    fn on_add(&self, listener: CollectionListener) -> ListenerId {
        lock(&self.listeners).register(ChangeKind::Add, listener)
    }

    fn on_remove(&self, listener: CollectionListener) -> ListenerId {
        lock(&self.listeners).register(ChangeKind::Remove, listener)
    }

    fn off(&self, id: ListenerId) -> bool {
        lock(&self.listeners).unregister(id)
    }

    fn len(&self) -> usize {
        lock(&self.items).len()
    }

    fn values(&self) -> Vec<Value> {
        lock(&self.items).clone()
    }
}

/// String-keyed replicated collection.
///
/// Replacing the value under an existing key is reported as a removal of the
/// old value followed by an addition of the new one.
#[derive(Default)]
pub struct ReplicatedMap {
    entries: Mutex<BTreeMap<String, Value>>,
    listeners: Mutex<Listeners>,
}

impl ReplicatedMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map holding `entries`. No notifications are emitted.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self { entries: Mutex::new(entries.into_iter().collect()), listeners: Mutex::default() }
    }

    /// Insert `value` under `key`, returning the replaced value.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        let previous = lock(&self.entries).insert(key.clone(), value.clone());
        if let Some(old) = &previous {
            self.emit(ChangeKind::Remove, CollectionKey::Key(key.clone()), old.clone());
        }
        self.emit(ChangeKind::Add, CollectionKey::Key(key), value);
        previous
    }

    /// Remove the value under `key` and notify remove listeners.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = lock(&self.entries).remove(key)?;
        self.emit(ChangeKind::Remove, CollectionKey::Key(key.to_owned()), removed.clone());
        Some(removed)
    }

    /// Value under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        lock(&self.entries).get(key).cloned()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

    /// Number of registered listeners (add and remove combined).
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn emit(&self, kind: ChangeKind, key: CollectionKey, value: Value) {
        emit(&self.listeners, kind, key, value);
    }
}

impl fmt::Debug for ReplicatedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(lock(&self.entries).iter()).finish()
    }
}

impl TrackableCollection for ReplicatedMap {
    fn clone_collection(&self) -> SharedCollection {
        Arc::new(Self::from_entries(lock(&self.entries).clone()))
    }

    fn on_add(&self, listener: CollectionListener) -> ListenerId {
        lock(&self.listeners).register(ChangeKind::Add, listener)
    }

    fn on_remove(&self, listener: CollectionListener) -> ListenerId {
        lock(&self.listeners).register(ChangeKind::Remove, listener)
    }

    fn off(&self, id: ListenerId) -> bool {
        lock(&self.listeners).unregister(id)
    }

    fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    fn values(&self) -> Vec<Value> {
        lock(&self.entries).values().cloned().collect()
    }
}
