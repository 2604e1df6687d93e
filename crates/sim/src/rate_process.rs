use curve_market_shared::math::{self, UNIT, UNIT_F64};
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_pcg::Pcg64;

/// Exchange rate of the yield adapter, as a log-normal walk that never moves
/// down. A step whose draw is negative leaves the rate where it is.
pub struct RateProcess {
    current_rate: f64,
    drift_term: f64,
    vol_term: f64,
    rng: Pcg64,
}

impl RateProcess {
    pub fn new(drift: f64, sigma: f64, seed: u64) -> Self {
        Self {
            current_rate: 1.0,
            drift_term: drift - 0.5 * sigma * sigma,
            vol_term: sigma,
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    #[inline]
    pub fn current_rate(&self) -> u128 {
        math::from_f64(self.current_rate).max(UNIT)
    }

    #[inline]
    pub fn step(&mut self) -> u128 {
        let z: f64 = StandardNormal.sample(&mut self.rng);
        let growth = (self.drift_term + self.vol_term * z).exp();
        if growth > 1.0 {
            self.current_rate *= growth;
        }
        self.current_rate()
    }

    pub fn as_f64(&self) -> f64 {
        self.current_rate() as f64 / UNIT_F64
    }
}
