//! Multi-field replay buffer.
//!
//! A [`ReplayBuffer`] stores each field of transitions (observations, actions,
//! rewards, terminal flags, ...) in its own [`RingBuffer`](crate::RingBuffer).
//! Transitions are pushed as [`Transition`]s and sampled as field-aligned
//! [`Batch`]es with a generator supplied by the caller.
mod base;
mod batch;
mod config;
mod snapshot;
mod transition;
pub use base::ReplayBuffer;
pub use batch::Batch;
pub use config::{ReplayBufferConfig, ACS0, DONES1, OBS0, OBS1, REWS};
pub use snapshot::Snapshot;
pub use transition::Transition;
