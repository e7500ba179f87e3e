//! Replay buffers of parallel environments.
mod base;
mod config;
pub use base::{PoolSampling, ReplayBufferPool};
pub use config::ReplayBufferPoolConfig;
