//! Conversion between host arrays and candle tensors.
use anyhow::{bail, Result};
use candle_core::{DeviceLocation, Tensor};
use erb_core::{DType, HostArray};
use ndarray::{ArrayD, IxDyn};

/// Converts a field element type to the candle one.
pub fn to_candle_dtype(dtype: DType) -> candle_core::DType {
    match dtype {
        DType::F32 => candle_core::DType::F32,
        DType::I64 => candle_core::DType::I64,
        DType::U8 => candle_core::DType::U8,
    }
}

/// Converts a candle element type to the field one.
///
/// Fails for candle types no field can be declared with.
pub fn from_candle_dtype(dtype: candle_core::DType) -> Result<DType> {
    match dtype {
        candle_core::DType::F32 => Ok(DType::F32),
        candle_core::DType::I64 => Ok(DType::I64),
        candle_core::DType::U8 => Ok(DType::U8),
        dtype => bail!("Unsupported element type: {}", dtype.as_str()),
    }
}

/// Name of a candle device, in the notation of [`erb_core::Device`].
pub fn device_name(device: &candle_core::Device) -> String {
    match device.location() {
        DeviceLocation::Cpu => "cpu".to_string(),
        DeviceLocation::Cuda { gpu_id } => format!("cuda:{}", gpu_id),
        DeviceLocation::Metal { gpu_id } => format!("metal:{}", gpu_id),
    }
}

/// Copies a host array into a tensor of the same shape on `device`.
pub fn host_to_tensor(a: &HostArray, device: &candle_core::Device) -> Result<Tensor> {
    let shape = a.shape().to_vec();
    let t = match a {
        HostArray::F32(a) => Tensor::from_vec(a.iter().cloned().collect::<Vec<_>>(), shape, device)?,
        HostArray::I64(a) => Tensor::from_vec(a.iter().cloned().collect::<Vec<_>>(), shape, device)?,
        HostArray::U8(a) => Tensor::from_vec(a.iter().cloned().collect::<Vec<_>>(), shape, device)?,
    };
    Ok(t)
}

/// Copies a tensor, from any device, into a host array of the same shape.
pub fn tensor_to_host(t: &Tensor) -> Result<HostArray> {
    let shape = IxDyn(t.dims());
    let flat = t.flatten_all()?;
    let a = match from_candle_dtype(t.dtype())? {
        DType::F32 => HostArray::F32(ArrayD::from_shape_vec(shape, flat.to_vec1::<f32>()?)?),
        DType::I64 => HostArray::I64(ArrayD::from_shape_vec(shape, flat.to_vec1::<i64>()?)?),
        DType::U8 => HostArray::U8(ArrayD::from_shape_vec(shape, flat.to_vec1::<u8>()?)?),
    };
    Ok(a)
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{arr0, arr2};

    #[test]
    fn test_host_tensor_conversion() -> Result<()> {
        let device = candle_core::Device::Cpu;
        let a = HostArray::F32(arr2(&[[1f32, 2., 3.], [4., 5., 6.]]).into_dyn());
        let t = host_to_tensor(&a, &device)?;
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(t.to_vec2::<f32>()?, vec![vec![1., 2., 3.], vec![4., 5., 6.]]);
        assert_eq!(tensor_to_host(&t)?, a);

        let t = t.t()?;
        let expected = HostArray::F32(arr2(&[[1f32, 4.], [2., 5.], [3., 6.]]).into_dyn());
        assert_eq!(tensor_to_host(&t)?, expected);
        Ok(())
    }

    #[test]
    fn test_scalar_conversion() -> Result<()> {
        let device = candle_core::Device::Cpu;
        let a = HostArray::U8(arr0(1u8).into_dyn());
        let t = host_to_tensor(&a, &device)?;
        assert_eq!(t.rank(), 0);
        assert_eq!(t.dtype(), candle_core::DType::U8);
        assert_eq!(tensor_to_host(&t)?, a);
        Ok(())
    }

    #[test]
    fn test_dtype_mapping() {
        for dtype in [DType::F32, DType::I64, DType::U8] {
            assert_eq!(from_candle_dtype(to_candle_dtype(dtype)).ok(), Some(dtype));
        }
        assert!(from_candle_dtype(candle_core::DType::F64).is_err());
    }
}
