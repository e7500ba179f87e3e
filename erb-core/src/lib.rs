#![warn(missing_docs)]
//! Experience replay storage for off-policy reinforcement learning.
//!
//! The building blocks, leaves first:
//!
//! * [`FieldStore`]: fixed-length backing array of one named field, allocated
//!   by a storage [`Backend`] (host memory with [`HostBackend`], or an
//!   accelerator in other crates).
//! * [`RingBuffer`]: a field store with a write cursor and an occupancy
//!   counter, overwriting the oldest row once full.
//! * [`ReplayBuffer`]: one ring buffer per field of a fixed [`Schema`],
//!   advancing in lockstep so that index `i` is the same transition in every
//!   field. Transitions are pushed as [`Transition`]s and sampled uniformly
//!   with replacement as [`Batch`]es, always with a generator given by the
//!   caller.
//! * [`ReplayBufferPool`]: one replay buffer per parallel environment.
//!
//! Buffers are not internally synchronized. When a producer and the learner
//! must share one buffer across threads, wrap it in a [`SharedReplayBuffer`].
//!
//! ```rust
//! use erb_core::{
//!     DType, HostBackend, ReplayBufferConfig, ReplayBufferPool, ReplayBufferPoolConfig,
//!     Transition,
//! };
//!
//! let config = ReplayBufferPoolConfig::default()
//!     .num_env(2)
//!     .batch_size(64)
//!     .replay_buffer(
//!         ReplayBufferConfig::default()
//!             .capacity(1000)
//!             .off_policy_fields(&[3], &[1], DType::F32),
//!     );
//! let mut pool = ReplayBufferPool::build(&config, HostBackend).unwrap();
//!
//! let tr = Transition::new()
//!     .with("obs0", vec![0f32, 0., 0.])
//!     .with("acs0", vec![0.5f32])
//!     .with("rews", 1f32)
//!     .with("dones1", 0u8)
//!     .with("obs1", vec![0.1f32, 0., 0.]);
//! pool.push(1, tr).unwrap();
//!
//! let batch = pool.batch(1, config.per_env_batch_size().unwrap()).unwrap();
//! assert_eq!(batch.len(), 32);
//! assert_eq!(pool[0].len(), 0);
//! ```
mod base;
mod error;
mod field;
mod field_store;
mod pool;
mod replay_buffer;
mod ring_buffer;
mod shared;
mod storage;
pub use base::{ExperienceBufferBase, ReplayBufferBase};
pub use error::ErbError;
pub use field::{DType, FieldId, FieldSpec, Schema};
pub use field_store::FieldStore;
pub use pool::{PoolSampling, ReplayBufferPool, ReplayBufferPoolConfig};
pub use replay_buffer::{
    Batch, ReplayBuffer, ReplayBufferConfig, Snapshot, Transition, ACS0, DONES1, OBS0, OBS1,
    REWS,
};
pub use ring_buffer::RingBuffer;
pub use shared::SharedReplayBuffer;
pub use storage::{Backend, Device, HostArray, HostBackend, HostStorage, Storage};
