//! Property-based tests for change tracking.
//!
//! Arbitrary sequences of collection mutations and notifications are applied
//! to a tracked state. After every notification, a field's identity must have
//! changed exactly when its collection changed membership since the previous
//! notification.

use std::sync::Arc;

use proptest::prelude::*;
use roomsync_core::{
    ChangeTracker, ReplicatedList, ReplicatedMap, ReplicatedState, Snapshot, Store,
    TrackableCollection, TrackerSession, Value,
};

#[derive(Debug, Clone)]
enum Op {
    Push(i64),
    RemoveFirst,
    Insert(u8, i64),
    RemoveKey(u8),
    Score(i64),
    Notify,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<i64>().prop_map(Op::Push),
        2 => Just(Op::RemoveFirst),
        2 => (0u8..4, any::<i64>()).prop_map(|(k, v)| Op::Insert(k, v)),
        1 => (0u8..4).prop_map(Op::RemoveKey),
        1 => any::<i64>().prop_map(Op::Score),
        3 => Just(Op::Notify),
    ]
}

struct Fixture {
    items: Arc<ReplicatedList>,
    players: Arc<ReplicatedMap>,
    state: ReplicatedState,
}

impl Fixture {
    fn new() -> Self {
        let items = Arc::new(ReplicatedList::new());
        let players = Arc::new(ReplicatedMap::new());
        let state = ReplicatedState::new()
            .with_field("items", Arc::clone(&items))
            .with_field("players", Arc::clone(&players))
            .with_field("score", Value::from(0));
        Self { items, players, state }
    }
}

fn same_field(a: &Snapshot, b: &Snapshot, name: &str) -> bool {
    a.get(name).zip(b.get(name)).is_some_and(|(x, y)| x.same_identity(y))
}

proptest! {
    #[test]
    fn prop_identity_changes_iff_membership_changed(
        ops in prop::collection::vec(op_strategy(), 0..80)
    ) {
        let mut fixture = Fixture::new();
        let store: Arc<Store<()>> = Arc::new(Store::new());
        let session = TrackerSession::start(&fixture.state, Arc::clone(&store));

        let mut previous = Arc::new(Snapshot::initial(fixture.state.clone()));
        let mut items_changed = false;
        let mut players_changed = false;

        for op in ops {
            match op {
                Op::Push(v) => {
                    fixture.items.push(Value::from(v));
                    items_changed = true;
                },
                Op::RemoveFirst => {
                    items_changed |= fixture.items.remove(0).is_some();
                },
                Op::Insert(k, v) => {
                    let _ = fixture.players.insert(format!("p{k}"), Value::from(v));
                    players_changed = true;
                },
                Op::RemoveKey(k) => {
                    players_changed |= fixture.players.remove(&format!("p{k}")).is_some();
                },
                Op::Score(v) => {
                    fixture.state.set("score", Value::from(v));
                },
                Op::Notify => {
                    session.on_state_change(Some(&fixture.state));
                    let Some(latest) = store.state() else {
                        return Err(TestCaseError::fail("no snapshot published"));
                    };

                    prop_assert_eq!(same_field(&latest, &previous, "items"), !items_changed);
                    prop_assert_eq!(same_field(&latest, &previous, "players"), !players_changed);
                    prop_assert_eq!(latest.scalar("score"), fixture.state.scalar("score"));
                    prop_assert_eq!(
                        latest.collection("items").map(|c| c.values()),
                        Some(fixture.items.values())
                    );
                    prop_assert!(latest.generation() > previous.generation());

                    items_changed = false;
                    players_changed = false;
                    previous = latest;
                },
            }
        }
    }

    #[test]
    fn prop_classification_happens_once(notifications in 0usize..20) {
        let fixture = Fixture::new();
        let store: Arc<Store<()>> = Arc::new(Store::new());
        let session = TrackerSession::start(&fixture.state, Arc::clone(&store));

        for _ in 0..notifications {
            session.on_state_change(Some(&fixture.state));
        }

        let tracked: Vec<_> = session.tracker().tracked_fields().collect();
        prop_assert_eq!(tracked, vec!["items", "players"]);
        prop_assert_eq!(fixture.items.listener_count(), 2);
        prop_assert_eq!(fixture.players.listener_count(), 2);
    }
}

#[test]
fn snapshot_values_are_detached_from_live_collection() {
    let fixture = Fixture::new();
    let tracker = ChangeTracker::attach(&fixture.state);

    fixture.items.push(Value::from("x"));
    let snapshot = tracker.snapshot(&fixture.state, 1);
    fixture.items.push(Value::from("y"));

    assert_eq!(snapshot.collection("items").map(|c| c.len()), Some(1));
    assert_eq!(fixture.items.len(), 2);
}
