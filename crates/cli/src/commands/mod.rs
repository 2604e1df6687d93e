pub mod quote;
pub mod simulate;
pub mod validate;

use curve_market_shared::config::MarketConfig;

pub(crate) fn load_market(path: Option<&str>) -> anyhow::Result<MarketConfig> {
    match path {
        Some(path) => MarketConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load market config {}: {}", path, e)),
        None => Ok(MarketConfig::default()),
    }
}
