//! Minibatches sampled from a replay buffer.
use crate::{FieldId, Schema};
use std::sync::Arc;

/// Field-aligned minibatch.
///
/// Row `j` of every field array belongs to the transition stored at
/// `indices()[j]`.
#[derive(Clone, Debug)]
pub struct Batch<A> {
    schema: Arc<Schema>,
    arrays: Vec<A>,
    indices: Vec<usize>,
}

impl<A> Batch<A> {
    pub(crate) fn new(schema: Arc<Schema>, arrays: Vec<A>, indices: Vec<usize>) -> Self {
        debug_assert_eq!(schema.len(), arrays.len());
        Self {
            schema,
            arrays,
            indices,
        }
    }

    /// Number of sampled transitions.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if the batch has no transition.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Buffer indices of the sampled transitions.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Schema of the buffer the batch was sampled from.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the batch array of a field.
    pub fn get(&self, name: &str) -> Option<&A> {
        self.schema.id(name).map(|id| &self.arrays[id.index()])
    }

    /// Returns the batch array of a field by id.
    pub fn field(&self, id: FieldId) -> &A {
        &self.arrays[id.index()]
    }

    /// Iterates over field names and batch arrays.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &A)> {
        self.schema.names().zip(self.arrays.iter())
    }

    /// Decomposes the batch into `(name, array)` pairs and the sampled indices.
    pub fn unpack(self) -> (Vec<(String, A)>, Vec<usize>) {
        let arrays = self
            .schema
            .names()
            .map(String::from)
            .zip(self.arrays.into_iter())
            .collect();
        (arrays, self.indices)
    }
}
