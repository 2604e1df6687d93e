//! Bonding-curve pricing.
//!
//! The marginal price is flat at `base_cost` until `hatch_supply` tokens
//! exist, then rises by `price_rise` per whole token. Costs are exact
//! integrals of that price, evaluated in a 256-bit accumulator and rounded
//! once at the end.

use alloy_primitives::U256;
use curve_market_shared::config::MarketConfig;
use curve_market_shared::math::{self, MathError, Rounding, UNIT};

/// Marginal price at `supply`, per whole token.
pub fn price_at(config: &MarketConfig, supply: u128) -> Result<u128, MathError> {
    if supply < config.hatch_supply {
        return Ok(config.base_cost);
    }
    let rise = math::mul_div(config.price_rise, supply - config.hatch_supply, UNIT, Rounding::Down)?;
    math::add(config.base_cost, rise)
}

/// Reserve-asset cost of moving supply from `start` to `end`.
pub fn cost(config: &MarketConfig, start: u128, end: u128, rounding: Rounding) -> Result<u128, MathError> {
    if start > end {
        return Err(MathError::InvalidRange { start, end });
    }
    if start == end {
        return Ok(0);
    }

    let hatch = config.hatch_supply;
    let mut numerator = U256::ZERO;

    // Flat part: len * base / UNIT, lifted onto the common 2 * UNIT^2 denominator.
    let flat_end = end.min(hatch);
    if start < flat_end {
        let len = U256::from(flat_end - start);
        numerator = checked_add(numerator, checked_mul(len, U256::from(config.base_cost) * U256::from(2 * UNIT))?)?;
    }

    // Linear part: trapezoid len * (p(a) + p(b)) / 2, with p scaled by UNIT.
    let linear_start = start.max(hatch);
    if linear_start < end {
        let len = U256::from(end - linear_start);
        let heights = checked_add(scaled_price(config, linear_start)?, scaled_price(config, end)?)?;
        numerator = checked_add(numerator, checked_mul(len, heights)?)?;
    }

    let denominator = U256::from(2u8) * U256::from(UNIT) * U256::from(UNIT);
    math::div_wide(numerator, denominator, rounding)
}

/// `price_at(x) * UNIT` without the intermediate truncation.
fn scaled_price(config: &MarketConfig, x: u128) -> Result<U256, MathError> {
    let base = U256::from(config.base_cost) * U256::from(UNIT);
    let rise = U256::from(config.price_rise) * U256::from(x - config.hatch_supply);
    checked_add(base, rise)
}

fn checked_mul(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

fn checked_add(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}
