//! Property-based tests for the room binding.
//!
//! Random sequences of connects, disconnects, fault injections and room
//! patches are applied to a binding. After every step the standard invariants
//! run against the recorded state, and the held room is compared against a
//! simple connected/disconnected model.

use std::sync::Arc;

use proptest::prelude::*;
use roomsync_client::{ConnectOutcome, RoomBinding};
use roomsync_core::{ReplicatedList, ReplicatedState, TrackableCollection, Value};
use roomsync_harness::{BindingSnapshot, DemoRoom, InvariantRegistry, RoomScript, SimClient};

#[derive(Debug, Clone)]
enum Op {
    Connect,
    Disconnect,
    FailNextJoin,
    FailNextLeave,
    Push(i64),
    Score(i64),
    Broadcast,
    BroadcastEmpty,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Connect),
        2 => Just(Op::Disconnect),
        1 => Just(Op::FailNextJoin),
        1 => Just(Op::FailNextLeave),
        2 => any::<i64>().prop_map(Op::Push),
        2 => any::<i64>().prop_map(Op::Score),
        2 => Just(Op::Broadcast),
        1 => Just(Op::BroadcastEmpty),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

proptest! {
    #[test]
    fn prop_binding_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let items = Arc::new(ReplicatedList::new());
        let client = SimClient::new("sim://prop").with_room(
            "arena",
            ReplicatedState::new()
                .with_field("items", Arc::clone(&items))
                .with_field("score", Value::from(0)),
        );
        let binding = RoomBinding::new(client);
        let registry = InvariantRegistry::standard();
        let mut recorded = BindingSnapshot::empty();
        let mut joins_failing = false;
        let mut connected = false;

        runtime().block_on(async {
            for op in &ops {
                match op {
                    Op::Connect => {
                        let outcome = binding.connect("arena").await;
                        let expected = match (connected, joins_failing) {
                            (true, _) => ConnectOutcome::AlreadyConnected,
                            (false, true) => ConnectOutcome::Failed,
                            (false, false) => ConnectOutcome::Connected,
                        };
                        assert_eq!(outcome, expected);
                        if outcome == ConnectOutcome::Failed {
                            joins_failing = false;
                        }
                        connected |= outcome == ConnectOutcome::Connected;
                    },
                    Op::Disconnect => {
                        binding.disconnect().await;
                        connected = false;
                    },
                    Op::FailNextJoin => {
                        binding.client().fail_next_joins(1);
                        joins_failing = true;
                    },
                    Op::FailNextLeave => {
                        if let Some(room) = binding.client().room("arena") {
                            room.fail_next_leaves(1);
                        }
                    },
                    Op::Push(value) => {
                        items.push(Value::from(*value));
                    },
                    Op::Score(value) => {
                        if let Some(room) = binding.client().room("arena") {
                            room.mutate(|state| {
                                state.set("score", Value::from(*value));
                            });
                        }
                    },
                    Op::Broadcast => {
                        if let Some(room) = binding.client().room("arena") {
                            room.broadcast();
                        }
                    },
                    Op::BroadcastEmpty => {
                        if let Some(room) = binding.client().room("arena") {
                            room.broadcast_empty();
                        }
                    },
                }

                recorded.record(&binding);
                if let Err(violations) = registry.check_all(&recorded) {
                    panic!("after {op:?}: {violations:?}");
                }
                assert_eq!(binding.use_room().is_some(), connected, "after {op:?}");
                assert!(!binding.is_connecting());
            }
        });
    }

    #[test]
    fn prop_snapshot_mirrors_collection(seed in any::<u64>(), ticks in 1usize..40) {
        let demo = DemoRoom::new();
        let client = SimClient::new("sim://prop").with_room("demo", demo.initial_state());
        let binding = RoomBinding::new(client);

        runtime().block_on(async {
            assert_eq!(binding.connect("demo").await, ConnectOutcome::Connected);
        });
        let Some(room) = binding.client().room("demo") else {
            panic!("room should be open after connect");
        };

        let mut script = RoomScript::seeded(seed);
        for _ in 0..ticks {
            script.step(&demo, &room);

            let Some(snapshot) = binding.use_state() else {
                panic!("state should be held while connected");
            };
            let items = snapshot.collection("items").map(|c| c.values());
            prop_assert_eq!(items, Some(demo.items.values()));
            let players = snapshot.collection("players").map(|c| c.len());
            prop_assert_eq!(players, Some(demo.players.len()));
        }
    }
}
