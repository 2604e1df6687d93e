use curve_market_exchange::curve;
use curve_market_exchange::exchange::{costs_for_buying, proceeds_for_selling};
use curve_market_shared::math::parse_units;

use crate::output;

pub fn run(config: Option<&str>, supply: &str, amount: &str) -> anyhow::Result<()> {
    let market = super::load_market(config)?;
    let supply = parse_units(supply).map_err(|e| anyhow::anyhow!("Invalid supply {:?}: {}", supply, e))?;
    let amount = parse_units(amount).map_err(|e| anyhow::anyhow!("Invalid amount {:?}: {}", amount, e))?;

    let price = curve::price_at(&market, supply)?;
    let buy = costs_for_buying(&market, supply, amount)?;
    let sell = if amount <= supply {
        Some(proceeds_for_selling(&market, supply, amount)?)
    } else {
        None
    };

    output::print_quote(supply, amount, price, &buy, sell.as_ref());
    Ok(())
}
