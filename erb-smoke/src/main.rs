//! Fills a pool of replay buffers with random transitions and samples from it.
//!
//! The pool is built from a YAML file given with `--config`, or from the
//! command line options otherwise. Run with `RUST_LOG=debug` to see every
//! buffer as it is built and sampled.
use anyhow::Result;
use clap::{Parser, ValueEnum};
use erb_candle::CandleBackend;
use erb_core::{
    Backend, DType, Device, FieldSpec, HostArray, HostBackend, PoolSampling, ReplayBufferConfig,
    ReplayBufferPool, ReplayBufferPoolConfig, Transition,
};
use log::info;
use ndarray::{ArrayD, IxDyn};
use rand::{rngs::StdRng, Rng};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StorageKind {
    Host,
    Candle,
}

#[derive(Clone, Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Pool configuration in YAML. Overrides the buffer options below.
    #[arg(long)]
    config: Option<String>,

    /// Writes the configuration in use to this path.
    #[arg(long)]
    save_config: Option<String>,

    /// Where the field arrays live.
    #[arg(long, value_enum, default_value_t = StorageKind::Host)]
    storage: StorageKind,

    /// CUDA ordinal, only with `--storage candle`.
    #[arg(long)]
    cuda: Option<usize>,

    /// Capacity of each replay buffer
    #[arg(long, default_value_t = 1000)]
    capacity: usize,

    /// The number of environments
    #[arg(long, default_value_t = 4)]
    num_env: usize,

    /// Total batch size over all environments
    #[arg(long, default_value_t = 256)]
    batch_size: usize,

    /// Dimension of observations
    #[arg(long, default_value_t = 4)]
    obs_dim: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// The number of steps taken in every environment
    #[arg(long, default_value_t = 2000)]
    steps: usize,
}

fn pool_config(args: &Args) -> Result<ReplayBufferPoolConfig> {
    let mut config = match &args.config {
        Some(path) => ReplayBufferPoolConfig::load(path)?,
        None => ReplayBufferPoolConfig::default()
            .num_env(args.num_env)
            .batch_size(args.batch_size)
            .replay_buffer(
                ReplayBufferConfig::default()
                    .capacity(args.capacity)
                    .seed(args.seed)
                    .off_policy_fields(&[args.obs_dim], &[1], DType::I64),
            ),
    };
    if let Some(ordinal) = args.cuda {
        config.replay_buffer.device = Device::Cuda(ordinal);
    }
    Ok(config)
}

/// Random value matching the layout of `field`.
fn random_value(field: &FieldSpec, rng: &mut StdRng) -> HostArray {
    let shape = IxDyn(&field.shape);
    match field.dtype {
        DType::F32 => HostArray::F32(ArrayD::from_shape_fn(shape, |_| rng.gen_range(-1f32..1.))),
        DType::I64 => HostArray::I64(ArrayD::from_shape_fn(shape, |_| rng.gen_range(0..4))),
        DType::U8 => HostArray::U8(ArrayD::from_shape_fn(shape, |_| rng.gen_bool(0.02) as u8)),
    }
}

fn random_transition(config: &ReplayBufferConfig, rng: &mut StdRng) -> Transition<HostArray> {
    config
        .fields
        .iter()
        .map(|field| (field.name.clone(), random_value(field, rng)))
        .collect()
}

fn run<B, F>(config: &ReplayBufferPoolConfig, backend: B, steps: usize, stage: F) -> Result<()>
where
    B: Backend,
    F: Fn(Transition<HostArray>) -> Result<Transition<B::Array>>,
{
    let mut pool = ReplayBufferPool::build(config, backend)?;
    let mut rng = config.replay_buffer.generator();

    for step in 0..steps {
        for env in 0..pool.num_env() {
            let tr = random_transition(&config.replay_buffer, &mut rng);
            pool.push(env, stage(tr)?)?;
        }
        if (step + 1) % 500 == 0 {
            info!("{} steps, {} transitions in the pool", step + 1, pool.total_len());
        }
    }
    pool.sanity_check()?;

    let per_env = config.per_env_batch_size()?;
    for env in 0..pool.num_env() {
        let batch = pool.batch(env, per_env)?;
        info!("rb#{}: sampled {} of {}", env, batch.len(), pool[env].len());
    }
    for policy in [PoolSampling::Independent, PoolSampling::Proportional] {
        let batches = pool.sample_all(config.batch_size, policy, &mut rng)?;
        let n = batches.iter().map(|(_, b)| b.len()).sum::<usize>();
        info!("{:?}: {} batch(es), {} transitions", policy, batches.len(), n);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = pool_config(&args)?;
    if let Some(path) = &args.save_config {
        config.save(path)?;
        info!("Saved the configuration to {}", path);
    }

    match args.storage {
        StorageKind::Host => run(&config, HostBackend, args.steps, Ok),
        StorageKind::Candle => {
            let backend = CandleBackend::from_config(&config.replay_buffer)?;
            let stager = backend.clone();
            run(&config, backend, args.steps, |tr| stager.stage_transition(tr))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    fn args() -> Args {
        Args::parse_from(["erb-smoke", "--capacity", "16", "--num-env", "2", "--steps", "40"])
    }

    #[test]
    fn test_random_transition_follows_fields() {
        let config = pool_config(&args()).unwrap();
        let mut rng = config.replay_buffer.generator();
        let tr = random_transition(&config.replay_buffer, &mut rng);
        assert_eq!(tr.len(), 5);
        assert_eq!(tr.get("obs0").unwrap().shape(), &[4]);
        assert_eq!(tr.get("acs0").unwrap().dtype(), DType::I64);
        assert_eq!(tr.get("rews").unwrap().shape(), &[] as &[usize]);
    }

    #[test]
    fn test_run_on_both_storages() -> Result<()> {
        let config = pool_config(&args())?;
        run(&config, HostBackend, 40, Ok)?;

        let backend = CandleBackend::cpu();
        let stager = backend.clone();
        run(&config, backend, 40, |tr| stager.stage_transition(tr))
    }

    #[test]
    fn test_config_file_overrides_options() -> Result<()> {
        let tmp_dir = TempDir::new("erb-smoke")?;
        let path = tmp_dir.path().join("pool.yaml");
        pool_config(&args())?.num_env(3).save(&path)?;

        let args = Args::parse_from([
            "erb-smoke",
            "--config",
            path.to_str().unwrap(),
            "--num-env",
            "5",
        ]);
        let config = pool_config(&args)?;
        assert_eq!(config.num_env, 3);
        assert_eq!(config.replay_buffer.capacity, 16);
        Ok(())
    }
}
