use rayon::prelude::*;

use curve_market_shared::config::{HyperparameterVariance, SimulationConfig};
use curve_market_shared::result::{BatchResult, SimResult};

use crate::engine;

pub fn run_batch(configs: Vec<SimulationConfig>, n_workers: Option<usize>) -> anyhow::Result<BatchResult> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_workers.unwrap_or_else(|| rayon::current_num_threads().min(8)))
        .build()?;

    let results: Result<Vec<SimResult>, _> =
        pool.install(|| configs.par_iter().map(engine::run_simulation).collect());

    Ok(BatchResult::from_results(results?))
}

/// Runs `n_sims` simulations over `base`, each with its own seed and
/// hyperparameters drawn from the default variance ranges.
pub fn run_varied_batch(
    base: &SimulationConfig,
    n_sims: u32,
    n_workers: Option<usize>,
) -> anyhow::Result<BatchResult> {
    let variance = HyperparameterVariance::default();
    let seeds = (0..n_sims).map(|i| base.seed.wrapping_add(i as u64));
    run_batch(variance.generate_configs(base, seeds), n_workers)
}

pub fn run_default_batch(n_sims: u32, n_steps: u32, n_workers: Option<usize>) -> anyhow::Result<BatchResult> {
    let mut base = SimulationConfig::default();
    base.n_steps = n_steps;
    run_varied_batch(&base, n_sims, n_workers)
}
