//! Replay buffer storage on [candle](https://crates.io/crates/candle-core) tensors.
//!
//! [`CandleBackend`] allocates the field arrays of a replay buffer as candle
//! tensors on a CPU or CUDA device, so that sampled batches are ready for a
//! candle model without a host round trip. Everything else, from cursor
//! bookkeeping to pools and snapshots, is shared with the host backend of
//! [`erb_core`].
//!
//! ```rust
//! use erb_candle::CandleBackend;
//! use erb_core::{DType, HostArray, ReplayBuffer, ReplayBufferConfig, Transition};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let config = ReplayBufferConfig::default()
//!     .capacity(100)
//!     .off_policy_fields(&[4], &[1], DType::I64);
//! let backend = CandleBackend::from_config(&config).unwrap();
//! let mut rb = ReplayBuffer::build(&config, backend.clone()).unwrap();
//!
//! let tr: Transition<HostArray> = Transition::new()
//!     .with("obs0", vec![0f32; 4])
//!     .with("acs0", vec![1i64])
//!     .with("rews", 0.5f32)
//!     .with("dones1", 0u8)
//!     .with("obs1", vec![1f32; 4]);
//! rb.push(backend.stage_transition(tr).unwrap()).unwrap();
//!
//! let batch = rb.sample(8, &mut StdRng::seed_from_u64(0)).unwrap();
//! assert_eq!(batch.get("obs0").unwrap().dims(), &[8, 4]);
//! ```
mod backend;
pub mod util;
pub use backend::{CandleBackend, CandleStorage};
