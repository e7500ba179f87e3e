//! Configuration of [`ReplayBuffer`](super::ReplayBuffer).
use crate::{DType, Device, FieldSpec};
use anyhow::Result;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Name of the field of observations before a step.
pub const OBS0: &str = "obs0";

/// Name of the field of actions.
pub const ACS0: &str = "acs0";

/// Name of the field of rewards.
pub const REWS: &str = "rews";

/// Name of the field of terminal flags after a step.
pub const DONES1: &str = "dones1";

/// Name of the field of observations after a step.
pub const OBS1: &str = "obs1";

/// Configuration of a replay buffer.
///
/// # Examples
///
/// ```rust
/// use erb_core::{DType, ReplayBufferConfig};
///
/// let config = ReplayBufferConfig::default()
///     .capacity(100_000)
///     .seed(42)
///     .off_policy_fields(&[17], &[6], DType::F32);
/// assert_eq!(config.fields.len(), 5);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Maximum number of transitions. Older transitions are overwritten
    /// once the buffer is full.
    pub capacity: usize,

    /// Seed of the generator returned by [`ReplayBufferConfig::generator`].
    pub seed: u64,

    /// Device on which the storage is placed.
    #[serde(default)]
    pub device: Device,

    /// Fields of transitions.
    pub fields: Vec<FieldSpec>,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            seed: 42,
            device: Device::Cpu,
            fields: vec![],
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the device of the storage.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Appends a field.
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends the fields of a standard off-policy transition:
    /// `obs0`, `acs0`, `rews`, `dones1` and `obs1`.
    pub fn off_policy_fields(self, obs_shape: &[usize], act_shape: &[usize], act_dtype: DType) -> Self {
        self.field(FieldSpec::new(OBS0, obs_shape, DType::F32))
            .field(FieldSpec::new(ACS0, act_shape, act_dtype))
            .field(FieldSpec::scalar(REWS, DType::F32))
            .field(FieldSpec::scalar(DONES1, DType::U8))
            .field(FieldSpec::new(OBS1, obs_shape, DType::F32))
    }

    /// Returns a fresh generator seeded with `seed`.
    pub fn generator(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
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
