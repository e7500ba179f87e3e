//! Candle backend and storage.
use crate::util::{device_name, host_to_tensor, tensor_to_host, to_candle_dtype};
use anyhow::Result;
use candle_core::Tensor;
use erb_core::{
    Backend, Device, ErbError, FieldSpec, HostArray, ReplayBufferConfig, Snapshot, Storage,
    Transition,
};
use log::info;

/// Backend allocating field storage as candle tensors on one device.
#[derive(Clone, Debug)]
pub struct CandleBackend {
    device: Device,
    candle_device: candle_core::Device,
}

impl CandleBackend {
    /// Backend on the host CPU.
    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
            candle_device: candle_core::Device::Cpu,
        }
    }

    /// Opens `device`.
    ///
    /// Fails if a CUDA device is requested and candle cannot open it, for
    /// example when the crate is built without the `cuda` feature.
    pub fn new(device: Device) -> Result<Self> {
        let candle_device = match device {
            Device::Cpu => candle_core::Device::Cpu,
            Device::Cuda(ordinal) => candle_core::Device::new_cuda(ordinal).map_err(|e| {
                ErbError::Construction(format!("cannot open {}: {}", device, e))
            })?,
        };
        info!("Device for replay buffer storage: {}", device);
        Ok(Self {
            device,
            candle_device,
        })
    }

    /// Opens the device named in a replay buffer configuration.
    pub fn from_config(config: &ReplayBufferConfig) -> Result<Self> {
        Self::new(config.device)
    }

    /// The candle device holding the storage.
    pub fn candle_device(&self) -> &candle_core::Device {
        &self.candle_device
    }

    /// Copies a host array to the storage device.
    pub fn stage(&self, a: &HostArray) -> Result<Tensor> {
        host_to_tensor(a, &self.candle_device)
    }

    /// Copies every value of a host transition to the storage device.
    pub fn stage_transition(&self, tr: Transition<HostArray>) -> Result<Transition<Tensor>> {
        tr.into_iter()
            .map(|(name, a)| -> Result<_> { Ok((name, self.stage(&a)?)) })
            .collect()
    }

    /// Copies a host snapshot to the storage device, to be restored into a
    /// buffer of this backend.
    pub fn stage_snapshot(&self, snapshot: Snapshot<HostArray>) -> Result<Snapshot<Tensor>> {
        let fields = snapshot
            .fields
            .iter()
            .map(|(name, a)| -> Result<_> { Ok((name.clone(), self.stage(a)?)) })
            .collect::<Result<Vec<_>>>()?;
        Ok(Snapshot {
            capacity: snapshot.capacity,
            cursor: snapshot.cursor,
            size: snapshot.size,
            fields,
        })
    }

    /// Copies a snapshot taken on this backend to host memory, where it can
    /// be serialized.
    pub fn unstage_snapshot(snapshot: &Snapshot<Tensor>) -> Result<Snapshot<HostArray>> {
        let fields = snapshot
            .fields
            .iter()
            .map(|(name, t)| -> Result<_> { Ok((name.clone(), tensor_to_host(t)?)) })
            .collect::<Result<Vec<_>>>()?;
        Ok(Snapshot {
            capacity: snapshot.capacity,
            cursor: snapshot.cursor,
            size: snapshot.size,
            fields,
        })
    }
}

impl Backend for CandleBackend {
    type Array = Tensor;
    type Storage = CandleStorage;

    fn device(&self) -> Device {
        self.device
    }

    fn allocate(&self, field: &FieldSpec, capacity: usize) -> Result<Self::Storage> {
        let buf = Tensor::zeros(
            field.storage_shape(capacity),
            to_candle_dtype(field.dtype),
            &self.candle_device,
        )?;
        Ok(CandleStorage {
            field: field.clone(),
            buf,
        })
    }
}

/// Tensor storage of a field, of shape `(capacity,) + shape`.
///
/// Not `Clone`: a cloned tensor shares memory, and rows are written in place.
/// Duplicate a storage with [`Storage::export`] and [`Storage::import`].
#[derive(Debug)]
pub struct CandleStorage {
    field: FieldSpec,
    buf: Tensor,
}

impl CandleStorage {
    fn check_layout(&self, t: &Tensor, expected: &[usize]) -> Result<()> {
        let dtype = to_candle_dtype(self.field.dtype);
        if t.dtype() != dtype {
            return Err(ErbError::DTypeMismatch {
                field: self.field.name.clone(),
                expected: dtype.as_str().to_string(),
                got: t.dtype().as_str().to_string(),
            }
            .into());
        }
        if t.dims() != expected {
            return Err(ErbError::ShapeMismatch {
                field: self.field.name.clone(),
                expected: expected.to_vec(),
                got: t.dims().to_vec(),
            }
            .into());
        }
        if !t.device().same_device(self.buf.device()) {
            return Err(ErbError::DeviceMismatch {
                field: self.field.name.clone(),
                expected: device_name(self.buf.device()),
                got: device_name(t.device()),
            }
            .into());
        }
        Ok(())
    }
}

impl Storage for CandleStorage {
    type Array = Tensor;

    fn field(&self) -> &FieldSpec {
        &self.field
    }

    fn rows(&self) -> usize {
        self.buf.dims()[0]
    }

    fn validate(&self, value: &Tensor) -> Result<()> {
        self.check_layout(value, &self.field.shape)
    }

    fn write(&mut self, index: usize, value: &Tensor) -> Result<()> {
        if index >= self.rows() {
            return Err(ErbError::IndexOutOfRange {
                index,
                size: self.rows(),
            }
            .into());
        }
        self.validate(value)?;
        let row = value.contiguous()?.unsqueeze(0)?;
        self.buf.slice_set(&row, 0, index)?;
        Ok(())
    }

    fn read_batch(&self, indices: &[usize]) -> Result<Tensor> {
        let ixs = indices.iter().map(|&ix| ix as u32).collect::<Vec<_>>();
        let ixs = Tensor::from_vec(ixs, indices.len(), self.buf.device())?;
        Ok(self.buf.index_select(&ixs, 0)?)
    }

    fn export(&self) -> Result<Tensor> {
        Ok(self.buf.copy()?)
    }

    fn import(&mut self, raw: Tensor) -> Result<()> {
        let expected = self.buf.dims().to_vec();
        self.check_layout(&raw, &expected)?;
        // The storage is written in place, so it must not alias the caller's tensor.
        self.buf = raw.contiguous()?.copy()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use erb_core::{DType, ReplayBuffer};
    use rand::{rngs::StdRng, SeedableRng};
    use test_log::test;

    fn config(capacity: usize) -> ReplayBufferConfig {
        ReplayBufferConfig::default()
            .capacity(capacity)
            .field(FieldSpec::new("obs", &[2], DType::F32))
            .field(FieldSpec::scalar("act", DType::I64))
            .field(FieldSpec::scalar("done", DType::U8))
    }

    fn transition(backend: &CandleBackend, i: usize) -> Result<Transition<Tensor>> {
        let tr = Transition::<HostArray>::new()
            .with("obs", vec![i as f32, -(i as f32)])
            .with("act", i as i64)
            .with("done", (i % 2) as u8);
        backend.stage_transition(tr)
    }

    #[test]
    fn test_candle_storage_write_and_gather() -> Result<()> {
        let backend = CandleBackend::cpu();
        let field = FieldSpec::new("obs", &[2], DType::F32);
        let mut storage = backend.allocate(&field, 3)?;
        assert_eq!(storage.rows(), 3);

        let device = backend.candle_device();
        storage.write(0, &Tensor::new(&[1f32, 2.], device)?)?;
        storage.write(2, &Tensor::new(&[5f32, 6.], device)?)?;

        let batch = storage.read_batch(&[2, 0, 2])?;
        assert_eq!(
            batch.to_vec2::<f32>()?,
            vec![vec![5., 6.], vec![1., 2.], vec![5., 6.]]
        );
        Ok(())
    }

    #[test]
    fn test_candle_storage_validate() -> Result<()> {
        let backend = CandleBackend::cpu();
        let field = FieldSpec::new("acs0", &[1], DType::I64);
        let storage = backend.allocate(&field, 2)?;
        let device = backend.candle_device();
        assert!(storage.validate(&Tensor::new(&[3i64], device)?).is_ok());

        let err = storage
            .validate(&Tensor::new(&[3i64, 4], device)?)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::ShapeMismatch { .. })
        ));

        let err = storage.validate(&Tensor::new(&[3f32], device)?).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::DTypeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_export_does_not_alias_storage() -> Result<()> {
        let backend = CandleBackend::cpu();
        let field = FieldSpec::scalar("reward", DType::F32);
        let mut storage = backend.allocate(&field, 2)?;
        let device = backend.candle_device();

        let raw = Tensor::new(&[1f32, 2.], device)?;
        storage.import(raw.clone())?;
        storage.write(0, &Tensor::new(7f32, device)?)?;
        assert_eq!(raw.to_vec1::<f32>()?, vec![1., 2.]);

        let exported = storage.export()?;
        storage.write(1, &Tensor::new(9f32, device)?)?;
        assert_eq!(exported.to_vec1::<f32>()?, vec![7., 2.]);
        Ok(())
    }

    #[test]
    fn test_duplicated_storage_is_independent() -> Result<()> {
        let backend = CandleBackend::cpu();
        let field = FieldSpec::scalar("reward", DType::F32);
        let device = backend.candle_device();
        let mut original = backend.allocate(&field, 2)?;
        original.write(1, &Tensor::new(3f32, device)?)?;

        let mut duplicate = backend.allocate(&field, 2)?;
        duplicate.import(original.export()?)?;
        duplicate.write(0, &Tensor::new(7f32, device)?)?;

        assert_eq!(original.export()?.to_vec1::<f32>()?, vec![0., 3.]);
        assert_eq!(duplicate.export()?.to_vec1::<f32>()?, vec![7., 3.]);
        Ok(())
    }

    #[test]
    fn test_candle_storage_write_checks_row_and_value() -> Result<()> {
        let backend = CandleBackend::cpu();
        let field = FieldSpec::new("obs", &[2], DType::F32);
        let mut storage = backend.allocate(&field, 2)?;
        let device = backend.candle_device();

        let err = storage
            .write(5, &Tensor::new(&[1f32, 2.], device)?)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ErbError>(),
            Some(&ErbError::IndexOutOfRange { index: 5, size: 2 })
        );

        let err = storage
            .write(0, &Tensor::new(&[1f32, 2., 3.], device)?)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::ShapeMismatch { .. })
        ));
        assert_eq!(storage.export()?.to_vec2::<f32>()?, vec![vec![0., 0.]; 2]);
        Ok(())
    }

    #[test]
    fn test_replay_buffer_on_candle() -> Result<()> {
        let backend = CandleBackend::from_config(&config(3))?;
        let mut rb = ReplayBuffer::build(&config(3), backend.clone())?;
        for i in 0..5 {
            rb.push(transition(&backend, i)?)?;
        }
        rb.sanity_check()?;
        assert_eq!((rb.len(), rb.cursor()), (3, 2));

        let batch = rb.gather(vec![0, 1, 2])?;
        assert_eq!(batch.get("act").unwrap().to_vec1::<i64>()?, vec![3, 4, 2]);
        assert_eq!(batch.get("done").unwrap().to_vec1::<u8>()?, vec![1, 0, 0]);
        assert_eq!(batch.get("obs").unwrap().dims(), &[3, 2]);

        let batch = rb.sample(16, &mut StdRng::seed_from_u64(3))?;
        let obs = batch.get("obs").unwrap().to_vec2::<f32>()?;
        let act = batch.get("act").unwrap().to_vec1::<i64>()?;
        for (o, a) in obs.iter().zip(act.iter()) {
            assert_eq!(o[0], *a as f32);
            assert_eq!(o[1], -(*a as f32));
        }
        Ok(())
    }

    #[test]
    fn test_snapshot_through_host() -> Result<()> {
        let backend = CandleBackend::cpu();
        let mut rb = ReplayBuffer::build(&config(4), backend.clone())?;
        for i in 0..6 {
            rb.push(transition(&backend, i)?)?;
        }

        let host = CandleBackend::unstage_snapshot(&rb.snapshot()?)?;
        assert_eq!((host.size, host.cursor), (4, 2));

        let mut restored = ReplayBuffer::build(&config(4), backend.clone())?;
        restored.restore(backend.stage_snapshot(host.clone())?)?;
        assert_eq!((restored.len(), restored.cursor()), (4, 2));
        assert_eq!(CandleBackend::unstage_snapshot(&restored.snapshot()?)?, host);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_transition_atomically() -> Result<()> {
        let backend = CandleBackend::cpu();
        let mut rb = ReplayBuffer::build(&config(4), backend.clone())?;
        rb.push(transition(&backend, 0)?)?;

        let device = backend.candle_device();
        let tr = Transition::new()
            .with("obs", Tensor::new(&[1f32, 2.], device)?)
            .with("act", Tensor::new(1f32, device)?)
            .with("done", Tensor::new(0u8, device)?);
        let err = rb.push(tr).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::DTypeMismatch { .. })
        ));
        assert_eq!((rb.len(), rb.cursor()), (1, 1));
        Ok(())
    }

    #[test]
    fn test_device_must_match_config() {
        let config = config(4).device(Device::Cuda(0));
        let err = ReplayBuffer::build(&config, CandleBackend::cpu()).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::Construction(_))
        ));
    }
}
