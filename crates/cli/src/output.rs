use curve_market_shared::math::{format_units, to_f64};
use curve_market_shared::result::{BatchResult, CostBreakdown, SellBreakdown};
use std::time::Duration;

pub fn print_quote(supply: u128, amount: u128, price: u128, buy: &CostBreakdown, sell: Option<&SellBreakdown>) {
    println!("\n========================================");
    println!("  Supply:        {}", format_units(supply));
    println!("  Amount:        {}", format_units(amount));
    println!("  Spot price:    {}", format_units(price));
    println!("----------------------------------------");
    println!("  Buy total:     {}", format_units(buy.total));
    println!("    curve:       {}", format_units(buy.raw));
    println!("    trading fee: {}", format_units(buy.trading_fee));
    println!("    platform fee:{}", format_units(buy.platform_fee));
    println!("----------------------------------------");
    match sell {
        Some(sell) => {
            println!("  Sell net:      {}", format_units(sell.net));
            println!("    curve:       {}", format_units(sell.raw));
            println!("    trading fee: {}", format_units(sell.trading_fee));
        }
        None => println!("  Sell:          amount exceeds supply"),
    }
    println!("========================================");
}

pub fn print_results(result: &BatchResult, elapsed: Duration) {
    let fees: u128 = result.results.iter().map(|r| r.trading_fees).sum();
    let invested: u128 = result.results.iter().map(|r| r.invested).sum();
    println!("\n========================================");
    println!("  Simulations: {}", result.n_sims());
    println!("  Time:        {:.2}s", elapsed.as_secs_f64());
    println!("  Trades:      {}", result.total_trades);
    println!("  Reverted:    {}", result.total_reverted);
    println!("  Invested:    {:.4}", to_f64(invested));
    println!("  Avg surplus: {:.4}", result.avg_surplus());
    println!("  Total fees:  {:.4} (trading {:.4})", to_f64(result.total_fees), to_f64(fees));
    println!("========================================");
}
