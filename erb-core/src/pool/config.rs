//! Configuration of [`ReplayBufferPool`](super::ReplayBufferPool).
use crate::{ErbError, ReplayBufferConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of a pool of replay buffers, one per parallel environment.
///
/// Every member shares `replay_buffer`, except for the generator seed which
/// is `replay_buffer.seed + k` for member `k`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferPoolConfig {
    /// Number of parallel environments, hence of replay buffers.
    pub num_env: usize,

    /// Batch size of a training step, summed over all members.
    pub batch_size: usize,

    /// Configuration shared by the members.
    pub replay_buffer: ReplayBufferConfig,
}

impl Default for ReplayBufferPoolConfig {
    fn default() -> Self {
        Self {
            num_env: 1,
            batch_size: 256,
            replay_buffer: ReplayBufferConfig::default(),
        }
    }
}

impl ReplayBufferPoolConfig {
    /// Sets the number of environments.
    pub fn num_env(mut self, num_env: usize) -> Self {
        self.num_env = num_env;
        self
    }

    /// Sets the batch size summed over all members.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the configuration shared by the members.
    pub fn replay_buffer(mut self, replay_buffer: ReplayBufferConfig) -> Self {
        self.replay_buffer = replay_buffer;
        self
    }

    /// Seed of the generator of member `env_index`.
    pub fn member_seed(&self, env_index: usize) -> u64 {
        self.replay_buffer.seed.wrapping_add(env_index as u64)
    }

    /// Batch size drawn from each member so that the total stays close to
    /// `batch_size`.
    ///
    /// With more than one environment, `batch_size` must be at least
    /// `num_env`.
    pub fn per_env_batch_size(&self) -> Result<usize> {
        if self.num_env == 0 {
            return Err(ErbError::Construction("num_env must be positive".into()).into());
        }
        if self.num_env > 1 && self.batch_size < self.num_env {
            return Err(ErbError::Construction(format!(
                "batch_size {} is smaller than num_env {}",
                self.batch_size, self.num_env
            ))
            .into());
        }
        Ok(self.batch_size / self.num_env)
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::DType;
    use tempdir::TempDir;

    #[test]
    fn test_per_env_batch_size() -> Result<()> {
        let config = ReplayBufferPoolConfig::default().batch_size(256);
        assert_eq!(config.per_env_batch_size()?, 256);

        let config = config.num_env(4);
        assert_eq!(config.per_env_batch_size()?, 64);

        let config = config.num_env(3).batch_size(100);
        assert_eq!(config.per_env_batch_size()?, 33);

        let config = config.num_env(8).batch_size(4);
        assert!(config.per_env_batch_size().is_err());

        let config = config.num_env(0);
        assert!(config.per_env_batch_size().is_err());
        Ok(())
    }

    #[test]
    fn test_member_seeds_differ() {
        let config = ReplayBufferPoolConfig::default()
            .num_env(3)
            .replay_buffer(ReplayBufferConfig::default().seed(10));
        assert_eq!(
            (0..3).map(|k| config.member_seed(k)).collect::<Vec<_>>(),
            vec![10, 11, 12]
        );
    }

    #[test]
    fn test_serde_pool_config() -> Result<()> {
        let config = ReplayBufferPoolConfig::default()
            .num_env(2)
            .batch_size(64)
            .replay_buffer(
                ReplayBufferConfig::default()
                    .capacity(100)
                    .off_policy_fields(&[4], &[], DType::I64),
            );

        let dir = TempDir::new("pool_config")?;
        let path = dir.path().join("pool_config.yaml");
        config.save(&path)?;
        assert_eq!(ReplayBufferPoolConfig::load(&path)?, config);
        Ok(())
    }
}
