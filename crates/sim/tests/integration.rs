use curve_market_shared::config::{MarketConfig, NameVerifier, SimulationConfig};
use curve_market_shared::math::UNIT;
use curve_market_sim::{curve_checks, engine, runner};

fn quick(seed: u64) -> SimulationConfig {
    SimulationConfig {
        n_steps: 200,
        n_tokens: 2,
        n_traders: 4,
        seed,
        ..SimulationConfig::default()
    }
}

#[test]
fn batch_matches_individual_runs() {
    let configs: Vec<_> = (0..4).map(quick).collect();
    let batch = runner::run_batch(configs.clone(), Some(2)).unwrap();
    assert_eq!(batch.n_sims(), 4);

    let mut by_seed = batch.results.clone();
    by_seed.sort_by_key(|r| r.seed);
    for (config, result) in configs.iter().zip(&by_seed) {
        let single = engine::run_simulation(config).unwrap();
        assert_eq!(single.trades, result.trades);
        assert_eq!(single.final_supply, result.final_supply);
        assert_eq!(single.accrued_surplus, result.accrued_surplus);
    }
    assert_eq!(batch.total_trades, by_seed.iter().map(|r| r.trades).sum::<u64>());
}

#[test]
fn varied_batch_uses_consecutive_seeds() {
    let base = quick(100);
    let batch = runner::run_varied_batch(&base, 3, Some(1)).unwrap();
    let mut seeds: Vec<u64> = batch.results.iter().map(|r| r.seed).collect();
    seeds.sort_unstable();
    assert_eq!(seeds, vec![100, 101, 102]);
    assert!(batch.total_trades > 0);
}

#[test]
fn surplus_grows_with_rate_drift() {
    let flat = engine::run_simulation(&SimulationConfig {
        rate_drift: 0.0,
        rate_sigma: 0.0,
        ..quick(8)
    })
    .unwrap();
    let drifting = engine::run_simulation(&SimulationConfig {
        rate_drift: 0.000_5,
        rate_sigma: 0.0,
        ..quick(8)
    })
    .unwrap();
    assert_eq!(flat.accrued_surplus, 0);
    assert!(drifting.accrued_surplus > 0);
}

#[test]
fn custom_market_runs_under_any_verifier() {
    let config = SimulationConfig {
        market: MarketConfig {
            base_cost: UNIT / 2,
            hatch_supply: 0,
            name_verifier: NameVerifier::Any,
            ..MarketConfig::default()
        },
        ..quick(3)
    };
    assert_eq!(curve_checks::market_violation(&config.market, 100_000 * UNIT, 64).unwrap(), None);
    let result = engine::run_simulation(&config).unwrap();
    assert!(result.trades > 0);
}
