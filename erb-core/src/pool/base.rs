//! Pool of replay buffers for vectorized environments.
use super::ReplayBufferPoolConfig;
use crate::{Backend, Batch, ErbError, ReplayBuffer, SharedReplayBuffer, Transition};
use anyhow::Result;
use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// How [`ReplayBufferPool::sample_all`] spreads a batch over the members.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PoolSampling {
    /// Every non-empty member draws the full batch size.
    Independent,

    /// The batch size is split over the members in proportion to their
    /// occupancy.
    Proportional,
}

/// One replay buffer per parallel environment.
///
/// Member `k` always serves environment `k`. Each member owns a generator
/// seeded with [`ReplayBufferPoolConfig::member_seed`], used by
/// [`ReplayBufferPool::batch`]; the other sampling methods take the
/// generator from the caller.
pub struct ReplayBufferPool<B: Backend> {
    buffers: Vec<ReplayBuffer<B>>,
    rngs: Vec<StdRng>,
}

impl<B: Backend> ReplayBufferPool<B> {
    /// Builds `config.num_env` replay buffers on `backend` and audits them.
    pub fn build(config: &ReplayBufferPoolConfig, backend: B) -> Result<Self> {
        if config.num_env == 0 {
            return Err(ErbError::Construction("num_env must be at least 1".into()).into());
        }

        let mut buffers = Vec::with_capacity(config.num_env);
        let mut rngs = Vec::with_capacity(config.num_env);
        for k in 0..config.num_env {
            let rb = ReplayBuffer::build(&config.replay_buffer, backend.clone())?;
            info!("rb#{} [{}] is set", k, rb);
            buffers.push(rb);
            rngs.push(StdRng::seed_from_u64(config.member_seed(k)));
        }

        let pool = Self { buffers, rngs };
        pool.sanity_check()?;
        info!("Sanity check passed for {} replay buffer(s)", pool.num_env());
        Ok(pool)
    }

    /// Number of members.
    pub fn num_env(&self) -> usize {
        self.buffers.len()
    }

    /// Total number of transitions over all members.
    pub fn total_len(&self) -> usize {
        self.buffers.iter().map(|rb| rb.len()).sum()
    }

    /// Returns the member serving environment `env_index`.
    pub fn get(&self, env_index: usize) -> Option<&ReplayBuffer<B>> {
        self.buffers.get(env_index)
    }

    /// Iterates over the members in environment order.
    pub fn iter(&self) -> impl Iterator<Item = &ReplayBuffer<B>> {
        self.buffers.iter()
    }

    /// Pushes a transition of environment `env_index`.
    pub fn push(&mut self, env_index: usize, tr: Transition<B::Array>) -> Result<()> {
        self.check_env_index(env_index)?;
        self.buffers[env_index].push(tr)
    }

    /// Samples from the member of environment `env_index` with `rng`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        env_index: usize,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Batch<B::Array>> {
        self.check_env_index(env_index)?;
        self.buffers[env_index].sample(batch_size, rng)
    }

    /// Samples from the member of environment `env_index` with its own
    /// generator.
    pub fn batch(&mut self, env_index: usize, batch_size: usize) -> Result<Batch<B::Array>> {
        self.check_env_index(env_index)?;
        let rng = &mut self.rngs[env_index];
        self.buffers[env_index].sample(batch_size, rng)
    }

    /// Samples from every member according to `policy`.
    ///
    /// Returns a batch per contributing member, tagged with its environment
    /// index. Members without transitions, or without a share of the batch
    /// under [`PoolSampling::Proportional`], do not contribute.
    pub fn sample_all<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        policy: PoolSampling,
        rng: &mut R,
    ) -> Result<Vec<(usize, Batch<B::Array>)>> {
        if batch_size == 0 {
            return Err(ErbError::InvalidBatchSize(batch_size).into());
        }
        let sizes = self.buffers.iter().map(|rb| rb.len()).collect::<Vec<_>>();
        if sizes.iter().all(|&s| s == 0) {
            return Err(ErbError::EmptyBuffer.into());
        }

        let shares = match policy {
            PoolSampling::Independent => sizes
                .iter()
                .map(|&s| if s > 0 { batch_size } else { 0 })
                .collect::<Vec<_>>(),
            PoolSampling::Proportional => proportional_shares(batch_size, &sizes),
        };
        debug!("Shares of {:?} sampling: {:?}", policy, shares);

        shares
            .iter()
            .enumerate()
            .filter(|(_, &share)| share > 0)
            .map(|(k, &share)| -> Result<_> {
                Ok((k, self.buffers[k].sample(share, &mut *rng)?))
            })
            .collect()
    }

    /// Audits every member.
    pub fn sanity_check(&self) -> Result<()> {
        for rb in self.buffers.iter() {
            rb.sanity_check()?;
        }
        Ok(())
    }

    /// Hands out the members as lock-guarded buffers, in environment order,
    /// for producers running on their own threads.
    pub fn into_members(self) -> Vec<SharedReplayBuffer<B>> {
        self.buffers.into_iter().map(SharedReplayBuffer::new).collect()
    }

    fn check_env_index(&self, env_index: usize) -> Result<()> {
        if env_index >= self.buffers.len() {
            return Err(ErbError::EnvIndexOutOfRange {
                index: env_index,
                num_env: self.buffers.len(),
            }
            .into());
        }
        Ok(())
    }
}

impl<B: Backend> Index<usize> for ReplayBufferPool<B> {
    type Output = ReplayBuffer<B>;

    fn index(&self, env_index: usize) -> &Self::Output {
        &self.buffers[env_index]
    }
}

/// Splits `batch_size` in proportion to `sizes` with largest-remainder
/// rounding; ties go to the lower index.
fn proportional_shares(batch_size: usize, sizes: &[usize]) -> Vec<usize> {
    let total = sizes.iter().sum::<usize>() as u128;
    let mut shares = Vec::with_capacity(sizes.len());
    let mut remainders = Vec::with_capacity(sizes.len());
    for (k, &s) in sizes.iter().enumerate() {
        let n = batch_size as u128 * s as u128;
        shares.push((n / total) as usize);
        remainders.push((n % total, k));
    }

    let assigned: usize = shares.iter().sum();
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, k) in remainders.iter().take(batch_size - assigned) {
        shares[k] += 1;
    }
    shares
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{DType, FieldSpec, HostArray, HostBackend, ReplayBufferConfig};

    fn config(num_env: usize) -> ReplayBufferPoolConfig {
        ReplayBufferPoolConfig::default().num_env(num_env).replay_buffer(
            ReplayBufferConfig::default()
                .capacity(8)
                .seed(1)
                .field(FieldSpec::new("x", &[1], DType::F32)),
        )
    }

    fn transition(v: f32) -> Transition<HostArray> {
        Transition::new().with("x", vec![v])
    }

    #[test]
    fn test_proportional_shares() {
        assert_eq!(proportional_shares(10, &[5, 5]), vec![5, 5]);
        assert_eq!(proportional_shares(10, &[1, 0, 3]), vec![3, 0, 7]);
        assert_eq!(proportional_shares(3, &[1, 1, 1, 1]), vec![1, 1, 1, 0]);
        assert_eq!(proportional_shares(7, &[8]), vec![7]);
        for batch_size in 1..20 {
            let shares = proportional_shares(batch_size, &[3, 8, 1]);
            assert_eq!(shares.iter().sum::<usize>(), batch_size);
        }
    }

    #[test]
    fn test_pool_rejects_zero_env() {
        let err = ReplayBufferPool::build(&config(0), HostBackend).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ErbError>(),
            Some(ErbError::Construction(_))
        ));
    }

    #[test]
    fn test_pool_routes_by_env_index() -> Result<()> {
        let mut pool = ReplayBufferPool::build(&config(3), HostBackend)?;
        pool.push(2, transition(1.))?;
        pool.push(2, transition(2.))?;
        pool.push(0, transition(3.))?;
        assert_eq!(pool[0].len(), 1);
        assert_eq!(pool[1].len(), 0);
        assert_eq!(pool[2].len(), 2);
        assert_eq!(pool.total_len(), 3);

        let err = pool.push(3, transition(0.)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ErbError>(),
            Some(&ErbError::EnvIndexOutOfRange {
                index: 3,
                num_env: 3
            })
        );
        assert!(pool.get(3).is_none());
        Ok(())
    }

    #[test]
    fn test_member_generators_are_seeded_per_env() -> Result<()> {
        let mut pool = ReplayBufferPool::build(&config(2), HostBackend)?;
        for i in 0..8 {
            pool.push(0, transition(i as f32))?;
            pool.push(1, transition(i as f32))?;
        }
        let b0 = pool.batch(0, 32)?;
        let b1 = pool.batch(1, 32)?;
        assert_ne!(b0.indices(), b1.indices());

        let mut rng = StdRng::seed_from_u64(config(2).member_seed(1));
        let expected = pool[1].sample_indices(32, &mut rng)?;
        assert_eq!(b1.indices(), expected.as_slice());
        Ok(())
    }

    #[test]
    fn test_sample_all() -> Result<()> {
        let mut pool = ReplayBufferPool::build(&config(3), HostBackend)?;
        let mut rng = StdRng::seed_from_u64(0);
        let err = pool
            .sample_all(4, PoolSampling::Independent, &mut rng)
            .err()
            .unwrap();
        assert_eq!(err.downcast_ref::<ErbError>(), Some(&ErbError::EmptyBuffer));

        pool.push(0, transition(0.))?;
        for i in 0..3 {
            pool.push(2, transition(i as f32))?;
        }

        let batches = pool.sample_all(4, PoolSampling::Independent, &mut rng)?;
        assert_eq!(
            batches.iter().map(|(k, b)| (*k, b.len())).collect::<Vec<_>>(),
            vec![(0, 4), (2, 4)]
        );

        let batches = pool.sample_all(8, PoolSampling::Proportional, &mut rng)?;
        assert_eq!(
            batches.iter().map(|(k, b)| (*k, b.len())).collect::<Vec<_>>(),
            vec![(0, 2), (2, 6)]
        );
        for (k, batch) in batches.iter() {
            assert!(batch.indices().iter().all(|&ix| ix < pool[*k].len()));
        }
        Ok(())
    }
}
