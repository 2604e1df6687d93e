/// What a buyer is charged for a given amount, all in reserve-asset units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostBreakdown {
    pub total: u128,
    pub raw: u128,
    pub trading_fee: u128,
    pub platform_fee: u128,
}

/// What a seller receives for a given amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SellBreakdown {
    pub net: u128,
    pub raw: u128,
    pub trading_fee: u128,
}

#[derive(Debug, Clone)]
pub struct SimResult {
    pub seed: u64,
    pub trades: u64,
    pub reverted: u64,
    pub final_supply: u128,
    pub invested: u128,
    pub accrued_surplus: u128,
    pub trading_fees: u128,
    pub platform_fees: u128,
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub results: Vec<SimResult>,
    pub total_trades: u64,
    pub total_reverted: u64,
    pub total_surplus: u128,
    pub total_fees: u128,
}

impl BatchResult {
    pub fn from_results(results: Vec<SimResult>) -> Self {
        let total_trades = results.iter().map(|r| r.trades).sum();
        let total_reverted = results.iter().map(|r| r.reverted).sum();
        let total_surplus = results.iter().map(|r| r.accrued_surplus).sum();
        let total_fees = results.iter().map(|r| r.trading_fees + r.platform_fees).sum();
        Self {
            results,
            total_trades,
            total_reverted,
            total_surplus,
            total_fees,
        }
    }

    pub fn n_sims(&self) -> usize {
        self.results.len()
    }

    pub fn avg_surplus(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            crate::math::to_f64(self.total_surplus) / self.results.len() as f64
        }
    }
}
