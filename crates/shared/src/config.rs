use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::math::UNIT;

// Reference market parameters
pub const BASE_COST: u128 = UNIT / 10; // 0.1 reserve per token
pub const PRICE_RISE: u128 = UNIT / 10_000; // +0.0001 per token past the hatch
pub const HATCH_SUPPLY: u128 = 1_000 * UNIT;
pub const TRADING_FEE_RATE: u128 = 100; // 1%
pub const PLATFORM_FEE_RATE: u128 = 50; // 0.5%

// Baseline simulation parameters
pub const BASELINE_STEPS: u32 = 2_000;
pub const BASELINE_SIMS: u32 = 100;
pub const TOKENS: u32 = 4;
pub const TRADERS: u32 = 16;
pub const TRADER_FUNDS: u128 = 100_000 * UNIT;
pub const ORDER_ARRIVAL_RATE: f64 = 0.8;
pub const ORDER_MEAN_SIZE: f64 = 40.0; // tokens
pub const ORDER_SIZE_SIGMA: f64 = 1.1;
pub const BUY_PROB: f64 = 0.55;
pub const RATE_DRIFT: f64 = 0.000_02; // log-growth of the yield exchange rate per step
pub const RATE_SIGMA: f64 = 0.000_01;

/// Rule a token name must satisfy to be listed in a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameVerifier {
    #[default]
    Any,
    /// Lowercase `label.tld` with no subdomain.
    Domain,
}

impl NameVerifier {
    pub fn verify(&self, name: &str) -> bool {
        match self {
            NameVerifier::Any => !name.is_empty(),
            NameVerifier::Domain => {
                let Some((label, tld)) = name.split_once('.') else {
                    return false;
                };
                let valid_part = |part: &str| {
                    !part.is_empty()
                        && !part.starts_with('-')
                        && !part.ends_with('-')
                        && part
                            .chars()
                            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                };
                valid_part(label) && valid_part(tld)
            }
        }
    }
}

/// Immutable per-market curve and fee parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    #[serde(with = "units")]
    pub base_cost: u128,
    #[serde(with = "units")]
    pub price_rise: u128,
    #[serde(with = "units")]
    pub hatch_supply: u128,
    pub trading_fee_rate: u128,
    pub platform_fee_rate: u128,
    pub name_verifier: NameVerifier,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_cost: BASE_COST,
            price_rise: PRICE_RISE,
            hatch_supply: HATCH_SUPPLY,
            trading_fee_rate: TRADING_FEE_RATE,
            platform_fee_rate: PLATFORM_FEE_RATE,
            name_verifier: NameVerifier::Domain,
        }
    }
}

impl MarketConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub n_steps: u32,
    pub n_tokens: u32,
    pub n_traders: u32,
    #[serde(with = "units")]
    pub trader_funds: u128,
    pub order_arrival_rate: f64,
    pub order_mean_size: f64,
    pub order_size_sigma: f64,
    pub buy_prob: f64,
    pub rate_drift: f64,
    pub rate_sigma: f64,
    pub market: MarketConfig,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_steps: BASELINE_STEPS,
            n_tokens: TOKENS,
            n_traders: TRADERS,
            trader_funds: TRADER_FUNDS,
            order_arrival_rate: ORDER_ARRIVAL_RATE,
            order_mean_size: ORDER_MEAN_SIZE,
            order_size_sigma: ORDER_SIZE_SIGMA,
            buy_prob: BUY_PROB,
            rate_drift: RATE_DRIFT,
            rate_sigma: RATE_SIGMA,
            market: MarketConfig::default(),
            seed: 0,
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[derive(Debug, Clone)]
pub struct HyperparameterVariance {
    pub order_arrival_rate_min: f64,
    pub order_arrival_rate_max: f64,
    pub order_mean_size_min: f64,
    pub order_mean_size_max: f64,
    pub buy_prob_min: f64,
    pub buy_prob_max: f64,
    pub rate_drift_min: f64,
    pub rate_drift_max: f64,
}

impl Default for HyperparameterVariance {
    fn default() -> Self {
        Self {
            order_arrival_rate_min: 0.6,
            order_arrival_rate_max: 1.0,
            order_mean_size_min: 20.0,
            order_mean_size_max: 60.0,
            buy_prob_min: 0.45,
            buy_prob_max: 0.65,
            rate_drift_min: 0.000_005,
            rate_drift_max: 0.000_05,
        }
    }
}

impl HyperparameterVariance {
    pub fn apply(&self, base: &SimulationConfig, seed: u64) -> SimulationConfig {
        let mut rng = Pcg64::seed_from_u64(seed);
        SimulationConfig {
            order_arrival_rate: rng.gen_range(self.order_arrival_rate_min..self.order_arrival_rate_max),
            order_mean_size: rng.gen_range(self.order_mean_size_min..self.order_mean_size_max),
            buy_prob: rng.gen_range(self.buy_prob_min..self.buy_prob_max),
            rate_drift: rng.gen_range(self.rate_drift_min..self.rate_drift_max),
            seed,
            ..base.clone()
        }
    }

    pub fn generate_configs(&self, base: &SimulationConfig, seeds: impl Iterator<Item = u64>) -> Vec<SimulationConfig> {
        seeds.map(|seed| self.apply(base, seed)).collect()
    }
}

/// Fixed-point amounts written as whole-unit decimal strings ("0.1").
mod units {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::math::{format_units, parse_units};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_units(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_units(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_verifier_rejects_subdomains_and_case() {
        let v = NameVerifier::Domain;
        assert!(v.verify("test.com"));
        assert!(v.verify("some-token.io"));
        assert!(!v.verify("www.test.com"));
        assert!(!v.verify("Test.com"));
        assert!(!v.verify("test"));
        assert!(!v.verify(".com"));
        assert!(!v.verify("-bad.com"));
        assert!(NameVerifier::Any.verify("Anything Goes"));
        assert!(!NameVerifier::Any.verify(""));
    }

    #[test]
    fn market_config_parses_decimal_amounts() {
        let config: MarketConfig = toml::from_str(
            r#"
            base_cost = "0.1"
            price_rise = "0.0001"
            hatch_supply = "1000"
            trading_fee_rate = 100
            platform_fee_rate = 50
            name_verifier = "domain"
            "#,
        )
        .unwrap();
        assert_eq!(config, MarketConfig::default());
    }

    #[test]
    fn partial_simulation_config_falls_back_to_defaults() {
        let config: SimulationConfig = toml::from_str("n_steps = 10\n[market]\nbase_cost = \"1\"\n").unwrap();
        assert_eq!(config.n_steps, 10);
        assert_eq!(config.n_traders, TRADERS);
        assert_eq!(config.market.base_cost, UNIT);
        assert_eq!(config.market.hatch_supply, HATCH_SUPPLY);
    }

    #[test]
    fn variance_is_deterministic_per_seed() {
        let variance = HyperparameterVariance::default();
        let base = SimulationConfig::default();
        let a = variance.apply(&base, 7);
        let b = variance.apply(&base, 7);
        assert_eq!(a.order_mean_size, b.order_mean_size);
        assert_eq!(a.seed, 7);
        assert!(a.rate_drift >= variance.rate_drift_min && a.rate_drift < variance.rate_drift_max);
    }
}
