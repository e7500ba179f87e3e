//! Host memory backend based on [`ndarray`].
use super::{Backend, Device, Storage};
use crate::{DType, ErbError, FieldSpec};
use anyhow::Result;
use ndarray::{arr0, Array1, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

/// Dynamically-shaped host array of one of the supported element types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum HostArray {
    /// Array of `f32`.
    F32(ArrayD<f32>),
    /// Array of `i64`.
    I64(ArrayD<i64>),
    /// Array of `u8`.
    U8(ArrayD<u8>),
}

impl HostArray {
    /// Creates an array filled with zeros.
    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        let shape = IxDyn(shape);
        match dtype {
            DType::F32 => Self::F32(ArrayD::zeros(shape)),
            DType::I64 => Self::I64(ArrayD::zeros(shape)),
            DType::U8 => Self::U8(ArrayD::zeros(shape)),
        }
    }

    /// Element type of the array.
    pub fn dtype(&self) -> DType {
        match self {
            Self::F32(_) => DType::F32,
            Self::I64(_) => DType::I64,
            Self::U8(_) => DType::U8,
        }
    }

    /// Shape of the array.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::F32(a) => a.shape(),
            Self::I64(a) => a.shape(),
            Self::U8(a) => a.shape(),
        }
    }

    /// Returns the inner array if the element type is `f32`.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::F32(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the inner array if the element type is `i64`.
    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            Self::I64(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the inner array if the element type is `u8`.
    pub fn as_u8(&self) -> Option<&ArrayD<u8>> {
        match self {
            Self::U8(a) => Some(a),
            _ => None,
        }
    }
}

impl From<ArrayD<f32>> for HostArray {
    fn from(a: ArrayD<f32>) -> Self {
        Self::F32(a)
    }
}

impl From<ArrayD<i64>> for HostArray {
    fn from(a: ArrayD<i64>) -> Self {
        Self::I64(a)
    }
}

impl From<ArrayD<u8>> for HostArray {
    fn from(a: ArrayD<u8>) -> Self {
        Self::U8(a)
    }
}

impl From<f32> for HostArray {
    fn from(v: f32) -> Self {
        Self::F32(arr0(v).into_dyn())
    }
}

impl From<i64> for HostArray {
    fn from(v: i64) -> Self {
        Self::I64(arr0(v).into_dyn())
    }
}

impl From<u8> for HostArray {
    fn from(v: u8) -> Self {
        Self::U8(arr0(v).into_dyn())
    }
}

impl From<Vec<f32>> for HostArray {
    fn from(v: Vec<f32>) -> Self {
        Self::F32(Array1::from(v).into_dyn())
    }
}

impl From<Vec<i64>> for HostArray {
    fn from(v: Vec<i64>) -> Self {
        Self::I64(Array1::from(v).into_dyn())
    }
}

impl From<Vec<u8>> for HostArray {
    fn from(v: Vec<u8>) -> Self {
        Self::U8(Array1::from(v).into_dyn())
    }
}

/// Backend keeping storage in host memory.
#[derive(Clone, Debug, Default)]
pub struct HostBackend;

impl Backend for HostBackend {
    type Array = HostArray;
    type Storage = HostStorage;

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn allocate(&self, field: &FieldSpec, capacity: usize) -> Result<Self::Storage> {
        Ok(HostStorage {
            field: field.clone(),
            buf: HostArray::zeros(field.dtype, &field.storage_shape(capacity)),
        })
    }
}

/// Host storage of a field, a single array of shape `(capacity,) + shape`.
#[derive(Clone, Debug)]
pub struct HostStorage {
    field: FieldSpec,
    buf: HostArray,
}

fn dtype_mismatch(field: &FieldSpec, got: DType) -> ErbError {
    ErbError::DTypeMismatch {
        field: field.name.clone(),
        expected: field.dtype.to_string(),
        got: got.to_string(),
    }
}

impl HostStorage {
    fn check_dtype(&self, dtype: DType) -> Result<()> {
        if dtype != self.field.dtype {
            return Err(dtype_mismatch(&self.field, dtype).into());
        }
        Ok(())
    }
}

impl Storage for HostStorage {
    type Array = HostArray;

    fn field(&self) -> &FieldSpec {
        &self.field
    }

    fn rows(&self) -> usize {
        self.buf.shape()[0]
    }

    fn validate(&self, value: &HostArray) -> Result<()> {
        self.check_dtype(value.dtype())?;
        if value.shape() != self.field.shape.as_slice() {
            return Err(ErbError::ShapeMismatch {
                field: self.field.name.clone(),
                expected: self.field.shape.clone(),
                got: value.shape().to_vec(),
            }
            .into());
        }
        Ok(())
    }

    fn write(&mut self, index: usize, value: &HostArray) -> Result<()> {
        if index >= self.rows() {
            return Err(ErbError::IndexOutOfRange {
                index,
                size: self.rows(),
            }
            .into());
        }
        self.validate(value)?;
        match (&mut self.buf, value) {
            (HostArray::F32(buf), HostArray::F32(v)) => buf.index_axis_mut(Axis(0), index).assign(v),
            (HostArray::I64(buf), HostArray::I64(v)) => buf.index_axis_mut(Axis(0), index).assign(v),
            (HostArray::U8(buf), HostArray::U8(v)) => buf.index_axis_mut(Axis(0), index).assign(v),
            (_, v) => return Err(dtype_mismatch(&self.field, v.dtype()).into()),
        }
        Ok(())
    }

    fn read_batch(&self, indices: &[usize]) -> Result<HostArray> {
        Ok(match &self.buf {
            HostArray::F32(buf) => HostArray::F32(buf.select(Axis(0), indices)),
            HostArray::I64(buf) => HostArray::I64(buf.select(Axis(0), indices)),
            HostArray::U8(buf) => HostArray::U8(buf.select(Axis(0), indices)),
        })
    }

    fn export(&self) -> Result<HostArray> {
        Ok(self.buf.clone())
    }

    fn import(&mut self, raw: HostArray) -> Result<()> {
        self.check_dtype(raw.dtype())?;
        if raw.shape() != self.buf.shape() {
            return Err(ErbError::ShapeMismatch {
                field: self.field.name.clone(),
                expected: self.buf.shape().to_vec(),
                got: raw.shape().to_vec(),
            }
            .into());
        }
        self.buf = raw;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_host_storage_write_and_gather() -> Result<()> {
        let field = FieldSpec::new("obs", &[2], DType::F32);
        let mut storage = HostBackend.allocate(&field, 3)?;
        assert_eq!(storage.rows(), 3);

        storage.write(0, &vec![1f32, 2.].into())?;
        storage.write(2, &vec![5f32, 6.].into())?;

        let batch = storage.read_batch(&[2, 0, 2])?;
        let expected = arr2(&[[5f32, 6.], [1., 2.], [5., 6.]]).into_dyn();
        assert_eq!(batch.as_f32(), Some(&expected));
        Ok(())
    }

    #[test]
    fn test_host_storage_scalar_field() -> Result<()> {
        let field = FieldSpec::scalar("reward", DType::F32);
        let mut storage = HostBackend.allocate(&field, 4)?;
        storage.write(1, &1.5f32.into())?;
        storage.write(3, &(-2f32).into())?;

        let batch = storage.read_batch(&[3, 1])?;
        assert_eq!(batch.as_f32(), Some(&arr1(&[-2f32, 1.5]).into_dyn()));
        Ok(())
    }

    #[test]
    fn test_host_storage_validate() -> Result<()> {
        let field = FieldSpec::new("acs0", &[1], DType::I64);
        let storage = HostBackend.allocate(&field, 2)?;
        assert!(storage.validate(&vec![3i64].into()).is_ok());

        let err = storage.validate(&vec![3i64, 4].into()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::ShapeMismatch { .. })
        ));

        let err = storage.validate(&vec![3f32].into()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::DTypeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_host_storage_write_checks_row_and_value() -> Result<()> {
        let field = FieldSpec::new("obs", &[2], DType::F32);
        let mut storage = HostBackend.allocate(&field, 3)?;

        let err = storage.write(5, &vec![1f32, 2.].into()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ErbError>(),
            Some(&ErbError::IndexOutOfRange { index: 5, size: 3 })
        );

        let err = storage.write(0, &vec![1f32, 2., 3.].into()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::ShapeMismatch { .. })
        ));
        assert_eq!(storage.export()?, HostArray::zeros(DType::F32, &[3, 2]));
        Ok(())
    }

    #[test]
    fn test_host_storage_import_checks_layout() -> Result<()> {
        let field = FieldSpec::scalar("dones1", DType::U8);
        let mut storage = HostBackend.allocate(&field, 3)?;

        let err = storage.import(vec![1u8, 0].into()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::ShapeMismatch { .. })
        ));

        storage.import(vec![1u8, 0, 1].into())?;
        assert_eq!(storage.export()?, HostArray::from(vec![1u8, 0, 1]));
        Ok(())
    }
}
