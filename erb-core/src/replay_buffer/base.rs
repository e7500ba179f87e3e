//! Multi-field replay buffer.
use super::{Batch, ReplayBufferConfig, Snapshot, Transition};
use crate::{
    Backend, Device, ErbError, ExperienceBufferBase, ReplayBufferBase, RingBuffer, Schema,
};
use anyhow::Result;
use log::debug;
use rand::Rng;
use std::{fmt, sync::Arc};

/// A fixed-capacity replay buffer storing each field of transitions in its
/// own [`RingBuffer`].
///
/// All ring buffers share the capacity and advance in lockstep, so index `i`
/// refers to the same transition in every field.
///
/// # Examples
///
/// ```rust
/// use erb_core::{DType, FieldSpec, HostBackend, ReplayBuffer, ReplayBufferConfig, Transition};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let config = ReplayBufferConfig::default()
///     .capacity(5)
///     .field(FieldSpec::new("obs", &[2], DType::F32))
///     .field(FieldSpec::scalar("reward", DType::F32));
/// let mut buffer = ReplayBuffer::build(&config, HostBackend).unwrap();
///
/// buffer
///     .push(Transition::new().with("obs", vec![0.1f32, 0.2]).with("reward", 1f32))
///     .unwrap();
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let batch = buffer.sample(4, &mut rng).unwrap();
/// assert_eq!(batch.get("obs").unwrap().shape(), &[4, 2]);
/// ```
pub struct ReplayBuffer<B: Backend> {
    schema: Arc<Schema>,
    capacity: usize,
    device: Device,

    /// One ring buffer per field, in schema order.
    rings: Vec<RingBuffer<B>>,
}

impl<B: Backend> ReplayBuffer<B> {
    /// Creates an empty replay buffer with storage allocated on `backend`.
    pub fn new(schema: Schema, capacity: usize, backend: &B) -> Result<Self> {
        if capacity == 0 {
            return Err(ErbError::Construction("capacity must be positive".into()).into());
        }
        let rings = schema
            .iter()
            .map(|(_, field)| RingBuffer::new(field, capacity, backend))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema: Arc::new(schema),
            capacity,
            device: backend.device(),
            rings,
        })
    }

    /// Builds a replay buffer from a configuration.
    ///
    /// The device in the configuration must be the one of `backend`.
    pub fn build(config: &ReplayBufferConfig, backend: B) -> Result<Self> {
        if config.device != backend.device() {
            return Err(ErbError::Construction(format!(
                "configured device {} differs from backend device {}",
                config.device,
                backend.device()
            ))
            .into());
        }
        let schema = Schema::new(config.fields.clone())?;
        let buffer = Self::new(schema, config.capacity, &backend)?;
        debug!("Built {}", buffer);
        Ok(buffer)
    }

    /// Schema of transitions.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Maximum number of transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Device of the storage.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Current number of transitions, at most `capacity()`.
    pub fn len(&self) -> usize {
        self.rings[0].len()
    }

    /// Returns `true` if no transition has been pushed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position at which the next transition will be written.
    pub fn cursor(&self) -> usize {
        self.rings[0].cursor()
    }

    /// Ring buffer of a field.
    pub fn ring_buffer(&self, name: &str) -> Option<&RingBuffer<B>> {
        self.schema.id(name).map(|id| &self.rings[id.index()])
    }

    /// Pushes a transition.
    ///
    /// Its key set must equal the registered field names. Every value is
    /// validated before any field is written, so a rejected transition leaves
    /// the buffer unchanged.
    pub fn push(&mut self, tr: Transition<B::Array>) -> Result<()> {
        let values = self.resolve(tr)?;
        for (ring, value) in self.rings.iter().zip(values.iter()) {
            ring.validate(value)?;
        }

        let ix = self.cursor();
        for (ring, value) in self.rings.iter_mut().zip(values.iter()) {
            ring.write_at(ix, value)?;
        }
        for ring in self.rings.iter_mut() {
            ring.advance();
        }
        Ok(())
    }

    /// Draws `batch_size` indices uniformly with replacement from `[0, len())`.
    pub fn sample_indices<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        let size = self.len();
        if size == 0 {
            return Err(ErbError::EmptyBuffer.into());
        }
        if batch_size == 0 {
            return Err(ErbError::InvalidBatchSize(batch_size).into());
        }
        Ok((0..batch_size).map(|_| rng.gen_range(0..size)).collect())
    }

    /// Samples a minibatch of `batch_size` transitions using `rng`.
    ///
    /// Sampling does not modify the buffer.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Batch<B::Array>> {
        let ixs = self.sample_indices(batch_size, rng)?;
        self.gather(ixs)
    }

    /// Gathers the transitions at the given indices.
    pub fn gather(&self, ixs: Vec<usize>) -> Result<Batch<B::Array>> {
        let arrays = self
            .rings
            .iter()
            .map(|ring| ring.read_batch(&ixs))
            .collect::<Result<Vec<_>>>()?;
        Ok(Batch::new(self.schema.clone(), arrays, ixs))
    }

    /// Audits every ring buffer and checks they share size and cursor.
    pub fn sanity_check(&self) -> Result<()> {
        for ring in self.rings.iter() {
            ring.sanity_check()?;
        }
        let (size, cursor) = (self.rings[0].len(), self.rings[0].cursor());
        for ring in self.rings.iter().skip(1) {
            if ring.len() != size || ring.cursor() != cursor {
                return Err(ErbError::ConsistencyViolation(format!(
                    "'{}' (size={}, cursor={}) is misaligned with '{}' (size={}, cursor={})",
                    ring.field().name,
                    ring.len(),
                    ring.cursor(),
                    self.rings[0].field().name,
                    size,
                    cursor
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Copies the raw storage of every field together with cursor and size.
    pub fn snapshot(&self) -> Result<Snapshot<B::Array>> {
        let fields = self
            .rings
            .iter()
            .map(|ring| -> Result<_> { Ok((ring.field().name.clone(), ring.export()?)) })
            .collect::<Result<Vec<_>>>()?;
        Ok(Snapshot {
            capacity: self.capacity,
            cursor: self.cursor(),
            size: self.len(),
            fields,
        })
    }

    /// Restores storage, cursor and size of every field from a snapshot,
    /// then runs [`ReplayBuffer::sanity_check`].
    ///
    /// If the snapshot does not match the buffer or fails the check, the
    /// buffer keeps its previous contents.
    pub fn restore(&mut self, snapshot: Snapshot<B::Array>) -> Result<()> {
        if snapshot.capacity != self.capacity {
            return Err(ErbError::ConsistencyViolation(format!(
                "snapshot capacity {} differs from buffer capacity {}",
                snapshot.capacity, self.capacity
            ))
            .into());
        }
        let raws = self.resolve(snapshot.fields)?;
        let backup = self.snapshot()?;

        let result = self
            .load(raws, snapshot.cursor, snapshot.size)
            .and_then(|_| self.sanity_check());
        if let Err(e) = result {
            debug!("Restore failed, rolling back: {}", e);
            let raws = self.resolve(backup.fields)?;
            self.load(raws, backup.cursor, backup.size)?;
            return Err(e);
        }

        debug!("Restored {}", self);
        Ok(())
    }

    fn load(&mut self, raws: Vec<B::Array>, cursor: usize, size: usize) -> Result<()> {
        for (ring, raw) in self.rings.iter_mut().zip(raws.into_iter()) {
            ring.load(raw, cursor, size)?;
        }
        Ok(())
    }

    /// Orders named values by field id, requiring exactly one value per field.
    fn resolve<I>(&self, items: I) -> Result<Vec<B::Array>>
    where
        I: IntoIterator<Item = (String, B::Array)>,
    {
        let mut slots: Vec<Option<B::Array>> = vec![None; self.schema.len()];
        for (name, value) in items {
            let id = match self.schema.id(&name) {
                Some(id) => id,
                None => return Err(ErbError::UnknownField(name).into()),
            };
            let slot = &mut slots[id.index()];
            if slot.is_some() {
                return Err(ErbError::DuplicateField(name).into());
            }
            *slot = Some(value);
        }

        slots
            .into_iter()
            .zip(self.schema.names())
            .map(|(value, name)| {
                value.ok_or_else(|| ErbError::MissingField(name.to_string()).into())
            })
            .collect()
    }
}

impl<B: Backend> fmt::Display for ReplayBuffer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self
            .schema
            .iter()
            .map(|(_, field)| field.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "ReplayBuffer(capacity={}, size={}, cursor={}, device={}, fields=[{}])",
            self.capacity,
            self.len(),
            self.cursor(),
            self.device,
            fields
        )
    }
}

impl<B: Backend> ExperienceBufferBase for ReplayBuffer<B> {
    type Item = Transition<B::Array>;

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        ReplayBuffer::push(self, tr)
    }

    fn len(&self) -> usize {
        ReplayBuffer::len(self)
    }
}

impl<B: Backend> ReplayBufferBase for ReplayBuffer<B> {
    type Batch = Batch<B::Array>;

    fn batch<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Result<Self::Batch> {
        self.sample(size, rng)
    }
}
