//! Seeded room mutation scripts.
//!
//! [`RoomScript`] produces a deterministic stream of server-side mutations for
//! a [`DemoRoom`]: items pushed and removed, players joining and leaving, and
//! score updates. Each applied step ends with one state broadcast, like a
//! server patch tick. The same seed always yields the same steps.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use roomsync_core::{ReplicatedList, ReplicatedMap, ReplicatedState, TrackableCollection, Value};

use crate::SimRoom;

const PLAYER_POOL: usize = 6;

/// Collections backing the demo room state.
#[derive(Debug, Clone, Default)]
pub struct DemoRoom {
    /// Indexed collection field `items`.
    pub items: Arc<ReplicatedList>,
    /// Keyed collection field `players`.
    pub players: Arc<ReplicatedMap>,
}

impl DemoRoom {
    /// Create empty collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial state: `items`, `players`, `score = 0`, `tick = 0`.
    pub fn initial_state(&self) -> ReplicatedState {
        ReplicatedState::new()
            .with_field("items", Arc::clone(&self.items))
            .with_field("players", Arc::clone(&self.players))
            .with_field("score", Value::from(0))
            .with_field("tick", Value::from(0))
    }
}

/// One scripted mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Append to `items`.
    PushItem(i64),
    /// Remove from `items` at an index (ignored when out of range).
    RemoveItem(usize),
    /// Insert a player into `players`.
    JoinPlayer(String),
    /// Remove a player from `players`.
    LeavePlayer(String),
    /// Set the `score` scalar.
    Score(i64),
    /// Broadcast without changes.
    Idle,
}

/// Deterministic generator of [`ScriptStep`]s.
pub struct RoomScript {
    rng: ChaCha8Rng,
    next_item: i64,
    tick: i64,
}

impl RoomScript {
    /// Script seeded with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed), next_item: 0, tick: 0 }
    }

    /// Draw the next step for the current contents of `demo`.
    pub fn next_step(&mut self, demo: &DemoRoom) -> ScriptStep {
        match self.rng.gen_range(0..6) {
            0 | 1 => {
                self.next_item += 1;
                ScriptStep::PushItem(self.next_item)
            },
            2 if !demo.items.is_empty() => {
                ScriptStep::RemoveItem(self.rng.gen_range(0..demo.items.len()))
            },
            3 => ScriptStep::JoinPlayer(format!("player-{}", self.rng.gen_range(0..PLAYER_POOL))),
            4 if !demo.players.is_empty() => {
                let keys = demo.players.keys();
                ScriptStep::LeavePlayer(keys[self.rng.gen_range(0..keys.len())].clone())
            },
            5 => ScriptStep::Score(self.rng.gen_range(0..100)),
            _ => ScriptStep::Idle,
        }
    }

    /// Apply `step` to `demo` and deliver one patch through `room`.
    pub fn apply(&mut self, step: &ScriptStep, demo: &DemoRoom, room: &SimRoom) {
        match step {
            ScriptStep::PushItem(item) => demo.items.push(Value::from(*item)),
            ScriptStep::RemoveItem(index) => {
                let _ = demo.items.remove(*index);
            },
            ScriptStep::JoinPlayer(name) => {
                let _ = demo.players.insert(name.clone(), Value::from(self.tick));
            },
            ScriptStep::LeavePlayer(name) => {
                let _ = demo.players.remove(name);
            },
            ScriptStep::Score(_) | ScriptStep::Idle => {},
        }

        self.tick += 1;
        let tick = self.tick;
        room.patch(|state| {
            if let ScriptStep::Score(score) = step {
                state.set("score", Value::from(*score));
            }
            state.set("tick", Value::from(tick));
        });
    }

    /// Draw and apply the next step, returning it.
    pub fn step(&mut self, demo: &DemoRoom, room: &SimRoom) -> ScriptStep {
        let step = self.next_step(demo);
        self.apply(&step, demo, room);
        step
    }
}
