//! Storage backends holding the contiguous array of a field.
//!
//! [`Backend`] decides where the memory lives (host or an accelerator) and
//! allocates a [`Storage`] per field. Field stores and ring buffers only talk
//! to these traits, so the same ring-buffer logic runs on every backend.
mod host;
use crate::FieldSpec;
use anyhow::Result;
pub use host::{HostArray, HostBackend, HostStorage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device on which the storage of a replay buffer is placed.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Host memory.
    Cpu,

    /// CUDA device with the given ordinal.
    Cuda(usize),
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
        }
    }
}

/// Memory of a single field: `rows` entries of the field's element shape.
///
/// Rows are addressed from `0` to `rows() - 1`. The number of rows never
/// changes after allocation.
pub trait Storage {
    /// Array type written to and gathered from the storage.
    type Array;

    /// Descriptor of the stored field.
    fn field(&self) -> &FieldSpec;

    /// Length of the storage along its first axis.
    fn rows(&self) -> usize;

    /// Checks that `value` can be written as a single row.
    fn validate(&self, value: &Self::Array) -> Result<()>;

    /// Overwrites the row at `index`.
    ///
    /// The value is expected to have passed [`Storage::validate`].
    fn write(&mut self, index: usize, value: &Self::Array) -> Result<()>;

    /// Gathers rows in the order of `indices` into an array of shape
    /// `(indices.len(),) + shape`.
    fn read_batch(&self, indices: &[usize]) -> Result<Self::Array>;

    /// Returns a copy of the whole storage, all rows included.
    fn export(&self) -> Result<Self::Array>;

    /// Replaces the whole storage with `raw`, which must have the layout
    /// returned by [`Storage::export`].
    fn import(&mut self, raw: Self::Array) -> Result<()>;
}

/// Allocator of field storage on a fixed device.
pub trait Backend: Clone + fmt::Debug {
    /// Array type exchanged with the storage.
    type Array: Clone + fmt::Debug;

    /// Storage allocated by this backend.
    type Storage: Storage<Array = Self::Array>;

    /// Device on which the storage lives.
    fn device(&self) -> Device;

    /// Allocates zero-initialized storage with `capacity` rows for `field`.
    fn allocate(&self, field: &FieldSpec, capacity: usize) -> Result<Self::Storage>;
}
