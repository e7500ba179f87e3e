//! Circular buffer over a single field store.
use crate::{Backend, ErbError, FieldSpec, FieldStore};
use anyhow::Result;
use log::trace;

/// A field store with a write cursor and an occupancy counter.
///
/// Pushing never fails for lack of space: once `len() == capacity()`, each
/// push overwrites the oldest row. Before the first wrap, `len()` equals the
/// cursor.
pub struct RingBuffer<B: Backend> {
    store: FieldStore<B>,

    /// Next write position, in `[0, capacity)`.
    cursor: usize,

    /// Number of valid rows, in `[0, capacity]`.
    size: usize,
}

impl<B: Backend> RingBuffer<B> {
    /// Creates an empty ring buffer. `capacity` must be positive.
    pub fn new(field: &FieldSpec, capacity: usize, backend: &B) -> Result<Self> {
        Ok(Self {
            store: FieldStore::new(field, capacity, backend)?,
            cursor: 0,
            size: 0,
        })
    }

    /// Descriptor of the stored field.
    pub fn field(&self) -> &FieldSpec {
        self.store.field()
    }

    /// Maximum number of rows.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Number of valid rows.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if nothing has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Next write position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Writes `value` at the cursor, then advances the cursor.
    pub fn push(&mut self, value: &B::Array) -> Result<()> {
        self.store.validate(value)?;
        self.store.write_unchecked(self.cursor, value)?;
        self.advance();
        Ok(())
    }

    /// Returns `true` iff every index refers to a valid row.
    pub fn sample_indices_valid(&self, indices: &[usize]) -> bool {
        indices.iter().all(|&ix| ix < self.size)
    }

    /// Gathers valid rows at `indices`.
    pub fn read_batch(&self, indices: &[usize]) -> Result<B::Array> {
        if self.size == 0 {
            return Err(ErbError::EmptyBuffer.into());
        }
        if !self.sample_indices_valid(indices) {
            let index = indices
                .iter()
                .copied()
                .find(|&ix| ix >= self.size)
                .unwrap_or(self.size);
            return Err(ErbError::IndexOutOfRange {
                index,
                size: self.size,
            }
            .into());
        }
        self.store.read_batch(indices)
    }

    /// Audits the cursor, the occupancy and the storage length.
    ///
    /// Meant for startup and after a restore, not for every push.
    pub fn sanity_check(&self) -> Result<()> {
        let name = &self.field().name;
        let capacity = self.capacity();
        if self.cursor >= capacity {
            return Err(self.violation(format!(
                "cursor {} of '{}' is not below capacity {}",
                self.cursor, name, capacity
            )));
        }
        if self.size > capacity {
            return Err(self.violation(format!(
                "size {} of '{}' exceeds capacity {}",
                self.size, name, capacity
            )));
        }
        if self.size < capacity && self.cursor != self.size {
            return Err(self.violation(format!(
                "'{}' has not wrapped (size {} < capacity {}) but cursor is {}",
                name, self.size, capacity, self.cursor
            )));
        }
        if self.store.rows() != capacity {
            return Err(self.violation(format!(
                "storage of '{}' has {} rows, expected {}",
                name,
                self.store.rows(),
                capacity
            )));
        }
        Ok(())
    }

    /// Copy of the full storage, including rows not yet written.
    pub fn export(&self) -> Result<B::Array> {
        self.store.export()
    }

    pub(crate) fn validate(&self, value: &B::Array) -> Result<()> {
        self.store.validate(value)
    }

    /// Writes at `index` without moving the cursor.
    pub(crate) fn write_at(&mut self, index: usize, value: &B::Array) -> Result<()> {
        self.store.write_unchecked(index, value)
    }

    pub(crate) fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.capacity();
        self.size = (self.size + 1).min(self.capacity());
        trace!(
            "'{}' advanced: cursor={}, size={}",
            self.field().name,
            self.cursor,
            self.size
        );
    }

    /// Replaces storage, cursor and size together.
    pub(crate) fn load(&mut self, raw: B::Array, cursor: usize, size: usize) -> Result<()> {
        self.store.import(raw)?;
        self.cursor = cursor;
        self.size = size;
        Ok(())
    }

    fn violation(&self, msg: String) -> anyhow::Error {
        ErbError::ConsistencyViolation(msg).into()
    }
}
