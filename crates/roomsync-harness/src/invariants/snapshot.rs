//! Recorded binding state for invariant checking.

use roomsync_client::{RoomBinding, RoomClient};

/// Observable binding state plus the generation history seen so far.
#[derive(Debug, Clone, Default)]
pub struct BindingSnapshot {
    /// A connect was in flight at the last observation.
    pub connecting: bool,
    /// A room was held at the last observation.
    pub has_room: bool,
    /// A snapshot was held at the last observation.
    pub has_state: bool,
    /// Store generation at every observation.
    pub store_generations: Vec<u64>,
    /// Snapshot generation at every observation of the current connection.
    pub snapshot_generations: Vec<u64>,
}

impl BindingSnapshot {
    /// Snapshot with nothing recorded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record the binding's current observable state.
    ///
    /// Snapshot generation history restarts whenever no state is held, since
    /// each connection numbers its snapshots from zero.
    pub fn record<C: RoomClient>(&mut self, binding: &RoomBinding<C>) {
        let contents = binding.subscribe();

        self.connecting = binding.is_connecting();
        self.has_room = contents.use_room().is_some();
        self.store_generations.push(contents.generation());

        match contents.use_state() {
            Some(snapshot) => {
                self.has_state = true;
                self.snapshot_generations.push(snapshot.generation());
            },
            None => {
                self.has_state = false;
                self.snapshot_generations.clear();
            },
        }
    }
}
