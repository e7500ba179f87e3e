//! Replay buffer guarded by a lock, for concurrent producers and learners.
use crate::{
    Backend, Batch, ErbError, ExperienceBufferBase, ReplayBuffer, ReplayBufferBase, Snapshot,
    Transition,
};
use anyhow::Result;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard};

/// A cloneable handle to a replay buffer behind a single exclusive lock.
///
/// Use it only when an environment worker and the learner can touch the same
/// buffer at the same time; push and sample each hold the lock for their
/// whole duration. A buffer owned by a single thread needs no handle.
pub struct SharedReplayBuffer<B: Backend> {
    inner: Arc<Mutex<ReplayBuffer<B>>>,
}

impl<B: Backend> Clone for SharedReplayBuffer<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: Backend> SharedReplayBuffer<B> {
    /// Moves a replay buffer behind a lock.
    pub fn new(buffer: ReplayBuffer<B>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReplayBuffer<B>>> {
        self.inner
            .lock()
            .map_err(|_| ErbError::LockPoisoned.into())
    }

    /// Pushes a transition under the lock.
    pub fn push(&self, tr: Transition<B::Array>) -> Result<()> {
        self.lock()?.push(tr)
    }

    /// Samples a minibatch under the lock.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Batch<B::Array>> {
        self.lock()?.sample(batch_size, rng)
    }

    /// Current number of transitions.
    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(rb) => rb.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Returns `true` if no transition has been pushed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Audits the buffer under the lock.
    pub fn sanity_check(&self) -> Result<()> {
        self.lock()?.sanity_check()
    }

    /// Copies the buffer contents under the lock.
    pub fn snapshot(&self) -> Result<Snapshot<B::Array>> {
        self.lock()?.snapshot()
    }

    /// Runs `f` with exclusive access to the buffer.
    pub fn with<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ReplayBuffer<B>) -> Result<T>,
    {
        let mut rb = self.lock()?;
        f(&mut rb)
    }
}

impl<B: Backend> ExperienceBufferBase for SharedReplayBuffer<B> {
    type Item = Transition<B::Array>;

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        SharedReplayBuffer::push(self, tr)
    }

    fn len(&self) -> usize {
        SharedReplayBuffer::len(self)
    }
}

impl<B: Backend> ReplayBufferBase for SharedReplayBuffer<B> {
    type Batch = Batch<B::Array>;

    fn batch<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Result<Self::Batch> {
        self.sample(size, rng)
    }
}
