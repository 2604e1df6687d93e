use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal, Poisson};
use rand_pcg::Pcg64;

pub struct RetailOrder {
    pub is_buy: bool,
    /// Token amount, in whole tokens.
    pub size: f64,
    pub trader: usize,
    pub token: usize,
}

/// Poisson order arrivals with log-normal sizes, spread uniformly over
/// traders and listed tokens.
pub struct RetailFlow {
    buy_prob: f64,
    n_traders: usize,
    n_tokens: usize,
    rng: Pcg64,
    poisson: Poisson<f64>,
    lognormal: LogNormal<f64>,
}

impl RetailFlow {
    pub fn new(
        arrival_rate: f64,
        mean_size: f64,
        size_sigma: f64,
        buy_prob: f64,
        n_traders: usize,
        n_tokens: usize,
        seed: u64,
    ) -> anyhow::Result<Self> {
        let sigma = size_sigma.max(0.01);
        let mu_ln = mean_size.max(0.01).ln() - 0.5 * sigma * sigma;
        Ok(Self {
            buy_prob,
            n_traders: n_traders.max(1),
            n_tokens: n_tokens.max(1),
            rng: Pcg64::seed_from_u64(seed),
            poisson: Poisson::new(arrival_rate.max(0.01))?,
            lognormal: LogNormal::new(mu_ln, sigma)?,
        })
    }

    #[inline]
    pub fn generate_orders(&mut self) -> Vec<RetailOrder> {
        let n = self.poisson.sample(&mut self.rng) as usize;
        if n == 0 {
            return Vec::new();
        }
        (0..n)
            .map(|_| {
                let size = self.lognormal.sample(&mut self.rng);
                let is_buy = self.rng.gen::<f64>() < self.buy_prob;
                RetailOrder {
                    is_buy,
                    size,
                    trader: self.rng.gen_range(0..self.n_traders),
                    token: self.rng.gen_range(0..self.n_tokens),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_follow_configured_shape() {
        let mut flow = RetailFlow::new(2.0, 40.0, 0.8, 0.7, 5, 3, 11).unwrap();
        let mut count = 0usize;
        let mut buys = 0usize;
        let mut total_size = 0.0;
        for _ in 0..5_000 {
            for order in flow.generate_orders() {
                assert!(order.size > 0.0);
                assert!(order.trader < 5);
                assert!(order.token < 3);
                count += 1;
                buys += order.is_buy as usize;
                total_size += order.size;
            }
        }
        let per_step = count as f64 / 5_000.0;
        assert!((per_step - 2.0).abs() < 0.1, "arrivals per step: {per_step}");
        let buy_share = buys as f64 / count as f64;
        assert!((buy_share - 0.7).abs() < 0.03, "buy share: {buy_share}");
        let mean = total_size / count as f64;
        assert!((mean - 40.0).abs() < 3.0, "mean size: {mean}");
    }

    #[test]
    fn same_seed_same_orders() {
        let mut a = RetailFlow::new(1.0, 10.0, 1.0, 0.5, 4, 4, 5).unwrap();
        let mut b = RetailFlow::new(1.0, 10.0, 1.0, 0.5, 4, 4, 5).unwrap();
        for _ in 0..100 {
            let left: Vec<_> = a.generate_orders().iter().map(|o| (o.is_buy, o.size, o.trader, o.token)).collect();
            let right: Vec<_> = b.generate_orders().iter().map(|o| (o.is_buy, o.size, o.trader, o.token)).collect();
            assert_eq!(left, right);
        }
    }
}
