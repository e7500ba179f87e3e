//! Errors in the library.
use thiserror::Error;

/// Errors raised by replay buffers and their building blocks.
///
/// Every variant is a violation of the contract between the caller and the
/// buffer; none of them is transient, so nothing in this crate retries.
/// Public functions return [`anyhow::Result`]; match on the kind with
/// `err.downcast_ref::<ErbError>()`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErbError {
    /// Invalid construction parameters, e.g., zero capacity or an empty schema.
    #[error("Construction error: {0}")]
    Construction(String),

    /// The shape of a value disagrees with its field descriptor.
    #[error("Shape mismatch for field '{field}': expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Name of the field.
        field: String,
        /// Shape declared for the field.
        expected: Vec<usize>,
        /// Shape of the value.
        got: Vec<usize>,
    },

    /// The dtype of a value disagrees with its field descriptor.
    #[error("DType mismatch for field '{field}': expected {expected}, got {got}")]
    DTypeMismatch {
        /// Name of the field.
        field: String,
        /// Element type declared for the field.
        expected: String,
        /// Element type of the value.
        got: String,
    },

    /// A value lives on a device other than the one of the storage.
    #[error("Device mismatch for field '{field}': storage on {expected}, value on {got}")]
    DeviceMismatch {
        /// Name of the field.
        field: String,
        /// Device of the storage.
        expected: String,
        /// Device of the value.
        got: String,
    },

    /// A registered field is absent from a pushed transition.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// A pushed transition has a field which is not registered.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A pushed transition gives the same field twice.
    #[error("Duplicate field: {0}")]
    DuplicateField(String),

    /// Sampling was requested on a buffer without any transition.
    #[error("Replay buffer is empty")]
    EmptyBuffer,

    /// Sampling was requested with a batch size of zero.
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(usize),

    /// An index is beyond the valid range.
    #[error("Index {index} out of range for size {size}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of valid rows.
        size: usize,
    },

    /// An environment index is beyond the number of pool members.
    #[error("Environment index {index} out of range for {num_env} environments")]
    EnvIndexOutOfRange {
        /// The offending environment index.
        index: usize,
        /// Number of pool members.
        num_env: usize,
    },

    /// A self-consistency audit failed.
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    /// A thread panicked while holding the lock of a shared buffer.
    #[error("Lock of a shared replay buffer is poisoned")]
    LockPoisoned,
}
