//! Fixed-length backing array of a single named field.
use crate::{Backend, ErbError, FieldSpec, Storage};
use anyhow::Result;

/// Contiguous storage of one field with `capacity` rows.
///
/// Rows are overwritten in place; the store never grows. Memory operations
/// are delegated to the [`Storage`] allocated by a [`Backend`], whose device
/// is fixed for the lifetime of the store.
pub struct FieldStore<B: Backend> {
    capacity: usize,
    storage: B::Storage,
}

impl<B: Backend> FieldStore<B> {
    /// Allocates storage for `field` with `capacity` rows on `backend`.
    pub fn new(field: &FieldSpec, capacity: usize, backend: &B) -> Result<Self> {
        if capacity == 0 {
            return Err(ErbError::Construction(format!(
                "capacity of field '{}' must be positive",
                field.name
            ))
            .into());
        }
        Ok(Self {
            capacity,
            storage: backend.allocate(field, capacity)?,
        })
    }

    /// Descriptor of the field.
    pub fn field(&self) -> &FieldSpec {
        self.storage.field()
    }

    /// Number of rows declared at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of rows actually held by the backing storage.
    pub fn rows(&self) -> usize {
        self.storage.rows()
    }

    /// Checks the shape, dtype and device of a value without writing it.
    pub fn validate(&self, value: &B::Array) -> Result<()> {
        self.storage.validate(value)
    }

    /// Overwrites the row at `index`.
    pub fn write(&mut self, index: usize, value: &B::Array) -> Result<()> {
        self.check_index(index, self.capacity)?;
        self.storage.validate(value)?;
        self.storage.write(index, value)
    }

    /// Gathers rows at `indices`, preserving their order.
    pub fn read_batch(&self, indices: &[usize]) -> Result<B::Array> {
        for &ix in indices {
            self.check_index(ix, self.capacity)?;
        }
        self.storage.read_batch(indices)
    }

    /// Copy of the full storage.
    pub fn export(&self) -> Result<B::Array> {
        self.storage.export()
    }

    /// Replaces the full storage.
    pub fn import(&mut self, raw: B::Array) -> Result<()> {
        self.storage.import(raw)
    }

    pub(crate) fn write_unchecked(&mut self, index: usize, value: &B::Array) -> Result<()> {
        self.storage.write(index, value)
    }

    fn check_index(&self, index: usize, size: usize) -> Result<()> {
        if index >= size {
            return Err(ErbError::IndexOutOfRange { index, size }.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{DType, HostArray, HostBackend};

    #[test]
    fn test_field_store_rejects_zero_capacity() {
        let field = FieldSpec::scalar("x", DType::F32);
        let err = FieldStore::new(&field, 0, &HostBackend).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::Construction(_))
        ));
    }

    #[test]
    fn test_field_store_write_read() -> Result<()> {
        let field = FieldSpec::new("x", &[1], DType::F32);
        let mut store = FieldStore::new(&field, 3, &HostBackend)?;
        store.write(1, &vec![7f32].into())?;

        let err = store.write(3, &vec![8f32].into()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ErbError>(),
            Some(&ErbError::IndexOutOfRange { index: 3, size: 3 })
        );

        let err = store.write(0, &vec![8f32, 9.].into()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::ShapeMismatch { .. })
        ));

        let batch = store.read_batch(&[1, 0])?;
        assert_eq!(batch.shape(), &[2, 1]);
        assert_eq!(
            batch,
            HostArray::F32(ndarray::arr2(&[[7f32], [0.]]).into_dyn())
        );
        assert!(store.read_batch(&[5]).is_err());
        Ok(())
    }
}
