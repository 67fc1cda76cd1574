//! Published state snapshots.

use std::ops::Deref;

use crate::ReplicatedState;

/// Shallow copy of replicated state published to the store.
///
/// Every snapshot carries a generation. The state stored right after
/// connecting is generation 0; each state-change notification produces the
/// next generation. Subscribers compare generations instead of identities.
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: u64,
    state: ReplicatedState,
}

impl Snapshot {
    /// Snapshot of the state received on connect, stored without cloning
    /// any collection.
    pub fn initial(state: ReplicatedState) -> Self {
        Self { generation: 0, state }
    }

    /// Snapshot at an explicit generation.
    pub fn new(generation: u64, state: ReplicatedState) -> Self {
        Self { generation, state }
    }

    /// Position of this snapshot in the session's sequence.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Captured state.
    pub fn state(&self) -> &ReplicatedState {
        &self.state
    }

    /// Consume the snapshot, returning the captured state.
    pub fn into_state(self) -> ReplicatedState {
        self.state
    }
}

impl Deref for Snapshot {
    type Target = ReplicatedState;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}
