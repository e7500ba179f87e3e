//! Transitions pushed into a replay buffer.
use std::iter::FromIterator;

/// One environment step: a value per registered field, keyed by field name.
///
/// The key set must match the fields of the target replay buffer exactly.
///
/// ```
/// use erb_core::{HostArray, Transition};
///
/// let tr: Transition<HostArray> = Transition::new()
///     .with("obs", vec![0.1f32, 0.2])
///     .with("reward", 1f32);
/// assert_eq!(tr.len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct Transition<A> {
    values: Vec<(String, A)>,
}

impl<A> Default for Transition<A> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

impl<A> Transition<A> {
    /// Creates a transition without any value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the value of a field.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<A>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds the value of a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<A>) {
        self.values.push((name.into(), value.into()));
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no value was added.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value of a field.
    pub fn get(&self, name: &str) -> Option<&A> {
        self.values.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

impl<A, K: Into<String>> FromIterator<(K, A)> for Transition<A> {
    fn from_iter<I: IntoIterator<Item = (K, A)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<A> IntoIterator for Transition<A> {
    type Item = (String, A);
    type IntoIter = std::vec::IntoIter<(String, A)>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
