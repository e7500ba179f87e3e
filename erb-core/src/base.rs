//! Interfaces shared by plain and lock-guarded replay buffers.
//!
//! Producers (environment loops) only need [`ExperienceBufferBase`], learners
//! only need [`ReplayBufferBase`], so either side can be written once for
//! [`ReplayBuffer`](crate::ReplayBuffer) and
//! [`SharedReplayBuffer`](crate::SharedReplayBuffer).
use anyhow::Result;
use rand::Rng;

/// Interface of buffers that store experiences from environments.
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the current number of experiences in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no experience.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface of buffers that generate minibatches for training.
pub trait ReplayBufferBase {
    /// Minibatch type.
    type Batch;

    /// Samples `size` experiences uniformly with replacement using `rng`.
    fn batch<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Result<Self::Batch>;
}
