use curve_market_shared::config::SimulationConfig;
use curve_market_sim::runner;

use crate::output;

pub fn run(config: Option<&str>, simulations: u32, steps: u32, workers: usize, seed_start: u64) -> anyhow::Result<()> {
    let mut base = match config {
        Some(path) => SimulationConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load simulation config {}: {}", path, e))?,
        None => SimulationConfig::default(),
    };
    base.n_steps = steps;
    base.seed = seed_start;
    let n_workers = if workers == 0 { None } else { Some(workers) };

    println!("Running {} simulations ({} steps each)...", simulations, steps);

    let start = std::time::Instant::now();
    let result = runner::run_varied_batch(&base, simulations, n_workers)?;
    let elapsed = start.elapsed();

    tracing::info!(simulations, steps, elapsed_ms = elapsed.as_millis() as u64, "batch finished");
    output::print_results(&result, elapsed);
    Ok(())
}
