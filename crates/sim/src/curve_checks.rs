use std::cmp::Ordering;

use curve_market_exchange::curve;
use curve_market_shared::config::MarketConfig;
use curve_market_shared::math::{self, MathError, Rounding, FEE_SCALE, UNIT};

const X_REL_EPS: f64 = 1e-12;
const COST_ABS_TOL: f64 = 1e-15;
const SLOPE_REL_TOL: f64 = 1e-9;
const SLOPE_ABS_TOL: f64 = 1e-12;
const MIN_SAMPLE_SUPPLY: u128 = UNIT / 1_000;
const WEI: f64 = 1e-18;

/// Parameter sanity that the curve math does not enforce on its own.
pub fn config_violation(config: &MarketConfig) -> Option<String> {
    if config.base_cost == 0 && config.price_rise == 0 {
        return Some("curve is free: base cost and price rise are both zero".into());
    }
    let fees = config.trading_fee_rate + config.platform_fee_rate;
    if fees >= FEE_SCALE {
        return Some(format!("fee rates sum to {fees}, must stay below {FEE_SCALE}"));
    }
    None
}

/// Samples cumulative buy cost from zero supply up to `max_supply` on a
/// linear grid plus a geometric grid dense near zero. Points are
/// `(supply, cost)` in whole units. The geometric grid stops at
/// `MIN_SAMPLE_SUPPLY`, below which wei rounding dominates the slopes.
pub fn sample_cost_curve(config: &MarketConfig, max_supply: u128, n: usize) -> Result<Vec<(f64, f64)>, MathError> {
    let n = n.max(2) as u128;
    let mut supplies: Vec<u128> = (0..=n).map(|i| max_supply / n * i).collect();
    let mut point = max_supply;
    while point >= MIN_SAMPLE_SUPPLY && supplies.len() < 4 * n as usize {
        supplies.push(point);
        point /= 2;
    }
    supplies.push(config.hatch_supply.min(max_supply));

    supplies
        .into_iter()
        .map(|supply| {
            let cost = curve::cost(config, 0, supply, Rounding::Up)?;
            Ok((math::to_f64(supply), math::to_f64(cost)))
        })
        .collect()
}

/// Checks that cumulative cost never falls as supply grows and that the
/// marginal price never falls either (convexity), within rounding noise.
pub fn cost_shape_violation(points: &[(f64, f64)]) -> Option<String> {
    let mut sorted: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(supply, cost)| supply.is_finite() && cost.is_finite() && *supply >= 0.0 && *cost >= 0.0)
        .collect();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut cleaned: Vec<(f64, f64)> = Vec::with_capacity(sorted.len());
    for (supply, cost) in sorted {
        if let Some((prev_supply, prev_cost)) = cleaned.last_mut() {
            let eps = X_REL_EPS * prev_supply.abs().max(supply.abs()).max(1.0);
            if (supply - *prev_supply).abs() <= eps {
                if cost > *prev_cost {
                    *prev_cost = cost;
                }
                continue;
            }
        }
        cleaned.push((supply, cost));
    }

    for window in cleaned.windows(2) {
        let (s_a, c_a) = window[0];
        let (s_b, c_b) = window[1];
        if c_b + COST_ABS_TOL < c_a {
            return Some(format!(
                "monotonicity violated: supply {s_a:.6} -> cost {c_a:.9}, supply {s_b:.6} -> cost {c_b:.9}"
            ));
        }
    }

    // (slope, noise) of the previous segment; noise covers wei rounding and
    // f64 cancellation over short segments.
    let mut prev_slope: Option<(f64, f64)> = None;
    for window in cleaned.windows(2) {
        let (s_a, c_a) = window[0];
        let (s_b, c_b) = window[1];
        let ds = s_b - s_a;
        if ds <= 0.0 {
            continue;
        }
        let slope = (c_b - c_a) / ds;
        let noise = (4.0 * f64::EPSILON * c_b.abs() + 2.0 * WEI) / ds;
        if let Some((prev, prev_noise)) = prev_slope {
            let allowed_drop =
                SLOPE_ABS_TOL + SLOPE_REL_TOL * prev.abs().max(slope.abs()) + noise + prev_noise;
            if slope + allowed_drop < prev {
                return Some(format!(
                    "convexity violated: marginal price fell from {prev:.9} to {slope:.9} \
                     between supplies {s_a:.6} and {s_b:.6}"
                ));
            }
        }
        prev_slope = Some((slope, noise));
    }

    None
}

/// Buying `amount` at `supply` and selling it straight back must never
/// return more than was paid.
pub fn round_trip_violation(config: &MarketConfig, supply: u128, amount: u128) -> Result<Option<String>, MathError> {
    let end = math::add(supply, amount)?;
    let paid = curve::cost(config, supply, end, Rounding::Up)?;
    let returned = curve::cost(config, supply, end, Rounding::Down)?;
    if returned > paid {
        return Ok(Some(format!(
            "round trip of {amount} at supply {supply} pays out {returned} for {paid}"
        )));
    }
    Ok(None)
}

/// Runs every check on `config` up to `max_supply`. `Ok(None)` means the
/// market is sound.
pub fn market_violation(config: &MarketConfig, max_supply: u128, samples: usize) -> Result<Option<String>, MathError> {
    if let Some(message) = config_violation(config) {
        return Ok(Some(message));
    }
    let points = sample_cost_curve(config, max_supply, samples)?;
    if let Some(message) = cost_shape_violation(&points) {
        return Ok(Some(message));
    }
    let step = (max_supply / samples.max(1) as u128).max(1);
    let mut supply = 0;
    while supply < max_supply {
        if let Some(message) = round_trip_violation(config, supply, step)? {
            return Ok(Some(message));
        }
        supply += step;
    }
    Ok(None)
}
