//! Raw contents of a replay buffer, for checkpointing.
use serde::{Deserialize, Serialize};

/// Storage, cursor and occupancy of every field of a replay buffer.
///
/// Produced by [`ReplayBuffer::snapshot`](super::ReplayBuffer::snapshot) and
/// accepted by [`ReplayBuffer::restore`](super::ReplayBuffer::restore).
/// Each array holds all `capacity` rows, written or not. Writing snapshots to
/// disk is left to the caller; host snapshots implement serde traits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<A> {
    /// Capacity of the buffer.
    pub capacity: usize,

    /// Write cursor shared by all fields.
    pub cursor: usize,

    /// Occupancy shared by all fields.
    pub size: usize,

    /// Raw storage of each field, keyed by field name.
    pub fields: Vec<(String, A)>,
}
