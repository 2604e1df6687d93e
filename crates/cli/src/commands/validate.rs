use curve_market_shared::math::{format_units, parse_units};
use curve_market_sim::curve_checks;

const SAMPLES: usize = 256;

pub fn run(config: Option<&str>, max_supply: &str) -> anyhow::Result<()> {
    let market = super::load_market(config)?;
    let max_supply =
        parse_units(max_supply).map_err(|e| anyhow::anyhow!("Invalid max supply {:?}: {}", max_supply, e))?;

    println!("Validating market up to supply {}", format_units(max_supply));

    if let Some(message) = curve_checks::config_violation(&market) {
        anyhow::bail!("FAIL: {}", message);
    }
    println!(
        "  [PASS] Parameters: base {} rise {} hatch {} fees {}+{}",
        format_units(market.base_cost),
        format_units(market.price_rise),
        format_units(market.hatch_supply),
        market.trading_fee_rate,
        market.platform_fee_rate,
    );

    let points = curve_checks::sample_cost_curve(&market, max_supply, SAMPLES)
        .map_err(|e| anyhow::anyhow!("FAIL: cost curve overflows below supply {}: {}", format_units(max_supply), e))?;
    if let Some(message) = curve_checks::cost_shape_violation(&points) {
        anyhow::bail!("FAIL: {}", message);
    }
    println!("  [PASS] Cost monotonicity and convexity ({} samples)", points.len());

    if let Some(message) = curve_checks::market_violation(&market, max_supply, SAMPLES)? {
        anyhow::bail!("FAIL: {}", message);
    }
    println!("  [PASS] Buy/sell round trips");

    println!("\nAll validation checks passed!");
    Ok(())
}
