//! Fuzz target for change tracking across notifications
//!
//! # Strategy
//!
//! - Membership changes on an indexed and a keyed collection
//! - Scalar updates, including overwriting a tracked field with a scalar
//! - Notifications with and without a state payload
//!
//! # Invariants
//!
//! - A tracked field gets a new identity exactly when its membership changed
//! - Published collection contents match the live collection
//! - Snapshot generations strictly increase
//! - Empty notifications publish nothing

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomsync_core::{
    ReplicatedList, ReplicatedMap, ReplicatedState, Snapshot, Store, TrackableCollection,
    TrackerSession, Value,
};

#[derive(Debug, Clone, Arbitrary)]
enum TrackerOp {
    Push(i64),
    Insert { index: u8, value: i64 },
    Remove { index: u8 },
    Clear,
    Put { key: u8, value: i64 },
    Delete { key: u8 },
    Score(i64),
    OverwriteItems,
    Notify,
    NotifyEmpty,
}

fuzz_target!(|ops: Vec<TrackerOp>| {
    let items = Arc::new(ReplicatedList::new());
    let players = Arc::new(ReplicatedMap::new());
    let mut state = ReplicatedState::new()
        .with_field("items", Arc::clone(&items))
        .with_field("players", Arc::clone(&players))
        .with_field("score", Value::from(0));

    let store: Arc<Store<()>> = Arc::new(Store::new());
    let session = TrackerSession::start(&state, Arc::clone(&store));

    let mut previous = Arc::new(Snapshot::initial(state.clone()));
    let mut items_changed = false;
    let mut players_changed = false;
    let mut items_overwritten = false;

    for op in ops {
        match op {
            TrackerOp::Push(value) => {
                items.push(Value::from(value));
                items_changed = true;
            }
            TrackerOp::Insert { index, value } => {
                items_changed |= items.insert(usize::from(index), Value::from(value));
            }
            TrackerOp::Remove { index } => {
                items_changed |= items.remove(usize::from(index)).is_some();
            }
            TrackerOp::Clear => {
                items_changed |= !items.is_empty();
                items.clear();
            }
            TrackerOp::Put { key, value } => {
                let _ = players.insert(format!("p{key}"), Value::from(value));
                players_changed = true;
            }
            TrackerOp::Delete { key } => {
                players_changed |= players.remove(&format!("p{key}")).is_some();
            }
            TrackerOp::Score(value) => {
                state.set("score", Value::from(value));
            }
            TrackerOp::OverwriteItems => {
                state.set("items", Value::Null);
                items_overwritten = true;
            }
            TrackerOp::NotifyEmpty => {
                let before = store.generation();
                session.on_state_change(None);
                assert_eq!(store.generation(), before);
            }
            TrackerOp::Notify => {
                session.on_state_change(Some(&state));
                let latest = store.state().expect("notification must publish a snapshot");

                assert!(latest.generation() > previous.generation());
                assert_eq!(latest.scalar("score"), state.scalar("score"));

                let same_players = latest
                    .get("players")
                    .zip(previous.get("players"))
                    .is_some_and(|(a, b)| a.same_identity(b));
                assert_eq!(same_players, !players_changed);
                let published = latest.collection("players").map(|c| c.len());
                assert_eq!(published, Some(players.len()));

                if items_overwritten {
                    assert_eq!(latest.scalar("items"), Some(&Value::Null));
                } else {
                    let same_items = latest
                        .get("items")
                        .zip(previous.get("items"))
                        .is_some_and(|(a, b)| a.same_identity(b));
                    assert_eq!(same_items, !items_changed);
                    let published = latest.collection("items").map(|c| c.values());
                    assert_eq!(published, Some(items.values()));
                }

                items_changed = false;
                players_changed = false;
                previous = latest;
            }
        }
    }
});
