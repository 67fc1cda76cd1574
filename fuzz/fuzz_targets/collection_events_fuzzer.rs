//! Fuzz target for collection change events
//!
//! # Strategy
//!
//! - Indexed and keyed mutations at in-range and out-of-range positions
//! - Replacing existing keys
//! - Clearing populated and empty collections
//!
//! # Invariants
//!
//! - Contents match a plain `Vec` / `BTreeMap` model
//! - Every successful mutation fires at least one event
//! - Adds minus removes always equals the current length
//! - Clones are detached from later mutations

#![no_main]

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomsync_core::{CollectionChange, ReplicatedList, ReplicatedMap, TrackableCollection, Value};

#[derive(Debug, Clone, Arbitrary)]
enum CollectionOp {
    Push(i64),
    Insert { index: u8, value: i64 },
    Remove { index: u8 },
    ClearList,
    Put { key: u8, value: i64 },
    Delete { key: u8 },
    CloneList,
}

fn counter(count: &Arc<AtomicUsize>) -> Box<dyn Fn(&CollectionChange) + Send + Sync> {
    let count = Arc::clone(count);
    Box::new(move |_: &CollectionChange| {
        count.fetch_add(1, Ordering::SeqCst);
    })
}

fuzz_target!(|ops: Vec<CollectionOp>| {
    let list = ReplicatedList::new();
    let map = ReplicatedMap::new();
    let mut list_model: Vec<Value> = Vec::new();
    let mut map_model: BTreeMap<String, Value> = BTreeMap::new();

    let list_adds = Arc::new(AtomicUsize::new(0));
    let list_removes = Arc::new(AtomicUsize::new(0));
    let map_adds = Arc::new(AtomicUsize::new(0));
    let map_removes = Arc::new(AtomicUsize::new(0));
    list.on_add(counter(&list_adds));
    list.on_remove(counter(&list_removes));
    map.on_add(counter(&map_adds));
    map.on_remove(counter(&map_removes));

    for op in ops {
        let events_before = list_adds.load(Ordering::SeqCst)
            + list_removes.load(Ordering::SeqCst)
            + map_adds.load(Ordering::SeqCst)
            + map_removes.load(Ordering::SeqCst);

        let mutated = match op {
            CollectionOp::Push(value) => {
                list.push(Value::from(value));
                list_model.push(Value::from(value));
                true
            }
            CollectionOp::Insert { index, value } => {
                let index = usize::from(index);
                let inserted = list.insert(index, Value::from(value));
                assert_eq!(inserted, index <= list_model.len());
                if inserted {
                    list_model.insert(index, Value::from(value));
                }
                inserted
            }
            CollectionOp::Remove { index } => {
                let index = usize::from(index);
                let removed = list.remove(index);
                let expected = (index < list_model.len()).then(|| list_model.remove(index));
                assert_eq!(removed, expected);
                removed.is_some()
            }
            CollectionOp::ClearList => {
                let populated = !list_model.is_empty();
                list.clear();
                list_model.clear();
                populated
            }
            CollectionOp::Put { key, value } => {
                let key = format!("k{key}");
                let previous = map.insert(key.clone(), Value::from(value));
                assert_eq!(previous, map_model.insert(key, Value::from(value)));
                true
            }
            CollectionOp::Delete { key } => {
                let key = format!("k{key}");
                let removed = map.remove(&key);
                assert_eq!(removed, map_model.remove(&key));
                removed.is_some()
            }
            CollectionOp::CloneList => {
                let copy = list.clone_collection();
                list.push(Value::Null);
                assert_eq!(copy.values(), list_model);
                list_model.push(Value::Null);
                true
            }
        };

        let events_after = list_adds.load(Ordering::SeqCst)
            + list_removes.load(Ordering::SeqCst)
            + map_adds.load(Ordering::SeqCst)
            + map_removes.load(Ordering::SeqCst);
        assert_eq!(events_after > events_before, mutated);

        assert_eq!(list.values(), list_model);
        assert_eq!(map.keys(), map_model.keys().cloned().collect::<Vec<_>>());
        assert_eq!(
            list_adds.load(Ordering::SeqCst) - list_removes.load(Ordering::SeqCst),
            list_model.len()
        );
        assert_eq!(
            map_adds.load(Ordering::SeqCst) - map_removes.load(Ordering::SeqCst),
            map_model.len()
        );
    }
});
