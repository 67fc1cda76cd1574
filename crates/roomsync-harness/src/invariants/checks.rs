//! Standard binding invariants.

use super::{BindingSnapshot, Invariant, InvariantResult, Violation};

/// Room and snapshot are held together or not at all.
///
/// Connect stores both in one generation and disconnect clears both in one
/// generation, so a subscriber never sees a room without state.
pub struct RoomStatePairing;

impl Invariant for RoomStatePairing {
    fn name(&self) -> &'static str {
        "room_state_pairing"
    }

    fn check(&self, state: &BindingSnapshot) -> InvariantResult {
        if state.has_room == state.has_state {
            return Ok(());
        }
        Err(Violation {
            invariant: self.name(),
            message: format!("has_room={} but has_state={}", state.has_room, state.has_state),
        })
    }
}

/// A connect is never observed in flight while a room is held.
pub struct ConnectingExcludesRoom;

impl Invariant for ConnectingExcludesRoom {
    fn name(&self) -> &'static str {
        "connecting_excludes_room"
    }

    fn check(&self, state: &BindingSnapshot) -> InvariantResult {
        if state.connecting && state.has_room {
            return Err(Violation {
                invariant: self.name(),
                message: "connect in flight while a room is held".into(),
            });
        }
        Ok(())
    }
}

/// Store generations never decrease.
pub struct StoreGenerationMonotonicity;

impl Invariant for StoreGenerationMonotonicity {
    fn name(&self) -> &'static str {
        "store_generation_monotonicity"
    }

    fn check(&self, state: &BindingSnapshot) -> InvariantResult {
        non_decreasing(self.name(), "store", &state.store_generations)
    }
}

/// Snapshot generations never decrease within a connection.
pub struct SnapshotGenerationMonotonicity;

impl Invariant for SnapshotGenerationMonotonicity {
    fn name(&self) -> &'static str {
        "snapshot_generation_monotonicity"
    }

    fn check(&self, state: &BindingSnapshot) -> InvariantResult {
        non_decreasing(self.name(), "snapshot", &state.snapshot_generations)
    }
}

fn non_decreasing(invariant: &'static str, what: &str, history: &[u64]) -> InvariantResult {
    for window in history.windows(2) {
        if window[1] < window[0] {
            return Err(Violation {
                invariant,
                message: format!("{what} generation decreased {} → {}", window[0], window[1]),
            });
        }
    }
    Ok(())
}
