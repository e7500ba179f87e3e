//! Field descriptors and the schema of a replay buffer.
use crate::ErbError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a field.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 32-bit float, used for observations, continuous actions and rewards.
    F32,
    /// 64-bit signed integer, used for discrete actions.
    I64,
    /// Byte, used for flags and pixel observations.
    U8,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F32 => write!(f, "f32"),
            Self::I64 => write!(f, "i64"),
            Self::U8 => write!(f, "u8"),
        }
    }
}

/// Descriptor of a single named field of transitions.
///
/// The backing storage of a field has shape `(capacity,) + shape`.
/// An empty `shape` means a scalar per transition, e.g., a reward.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct FieldSpec {
    /// Name of the field, e.g., `obs0`.
    pub name: String,

    /// Shape of a single element.
    #[serde(default)]
    pub shape: Vec<usize>,

    /// Element type.
    pub dtype: DType,
}

impl FieldSpec {
    /// Creates a field descriptor.
    pub fn new(name: impl Into<String>, shape: &[usize], dtype: DType) -> Self {
        Self {
            name: name.into(),
            shape: shape.to_vec(),
            dtype,
        }
    }

    /// Creates a scalar field descriptor.
    pub fn scalar(name: impl Into<String>, dtype: DType) -> Self {
        Self::new(name, &[], dtype)
    }

    /// Number of scalar elements in a single row.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Shape of the backing storage for the given capacity.
    pub fn storage_shape(&self, capacity: usize) -> Vec<usize> {
        let mut shape = Vec::with_capacity(self.shape.len() + 1);
        shape.push(capacity);
        shape.extend_from_slice(&self.shape);
        shape
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ErbError::Construction("field name must not be empty".into()).into());
        }
        if self.shape.iter().any(|&d| d == 0) {
            return Err(ErbError::Construction(format!(
                "field '{}' has a zero dimension in shape {:?}",
                self.name, self.shape
            ))
            .into());
        }
        Ok(())
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}{:?}", self.name, self.dtype, self.shape)
    }
}

/// Position of a field in a [`Schema`].
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct FieldId(pub(crate) usize);

impl FieldId {
    /// Index of the field in the schema.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Validated, ordered set of field descriptors.
///
/// Fields are addressed by [`FieldId`], fixed when the schema is built.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Builds a schema, rejecting an empty set, empty or duplicated names
    /// and zero-sized dimensions.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        if fields.is_empty() {
            return Err(ErbError::Construction("no field descriptors given".into()).into());
        }
        for (i, field) in fields.iter().enumerate() {
            field.validate()?;
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(ErbError::Construction(format!(
                    "field '{}' is registered twice",
                    field.name
                ))
                .into());
            }
        }
        Ok(Self { fields })
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always `false`, a schema has at least one field.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up a field by name.
    pub fn id(&self, name: &str) -> Option<FieldId> {
        self.fields.iter().position(|f| f.name == name).map(FieldId)
    }

    /// Returns the descriptor of a field.
    pub fn field(&self, id: FieldId) -> &FieldSpec {
        &self.fields[id.0]
    }

    /// Iterates over ids and descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &FieldSpec)> {
        self.fields.iter().enumerate().map(|(i, f)| (FieldId(i), f))
    }

    /// Field names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}
