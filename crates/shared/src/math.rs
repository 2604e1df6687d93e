use alloy_primitives::U256;

/// Fixed-point scale of token amounts and curve prices (18 decimals).
pub const UNIT: u128 = 1_000_000_000_000_000_000;
pub const UNIT_F64: f64 = 1_000_000_000_000_000_000.0;
pub const DECIMALS: usize = 18;

/// Denominator of fee rates: a rate of 100 is 1%.
pub const FEE_SCALE: u128 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Amounts paid out.
    Down,
    /// Amounts charged.
    Up,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid range: {start} > {end}")]
    InvalidRange { start: u128, end: u128 },
    #[error("invalid decimal amount {0:?}")]
    InvalidUnits(String),
}

/// `a * b / denominator` with a 256-bit intermediate product.
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128, MathError> {
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(MathError::Overflow)?;
    div_wide(product, U256::from(denominator), rounding)
}

/// Narrows `numerator / denominator` back to `u128`, rounding as requested.
pub fn div_wide(numerator: U256, denominator: U256, rounding: Rounding) -> Result<u128, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let mut quotient = numerator / denominator;
    if rounding == Rounding::Up && !(numerator % denominator).is_zero() {
        quotient += U256::from(1u8);
    }
    u128::try_from(quotient).map_err(|_| MathError::Overflow)
}

#[inline]
pub fn add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

#[inline]
pub fn sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

/// Parses a decimal string in whole units ("0.1", "1000") into fixed point.
pub fn parse_units(text: &str) -> Result<u128, MathError> {
    let text = text.trim();
    let invalid = || MathError::InvalidUnits(text.to_string());
    let (whole, frac) = match text.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > DECIMALS || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let frac: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = DECIMALS);
        padded.parse().map_err(|_| invalid())?
    };

    whole
        .checked_mul(UNIT)
        .and_then(|w| w.checked_add(frac))
        .ok_or(MathError::Overflow)
}

pub fn format_units(value: u128) -> String {
    let whole = value / UNIT;
    let frac = value % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0>width$}", width = DECIMALS);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Lossy conversion for reporting and simulation sizing only.
#[inline]
pub fn to_f64(value: u128) -> f64 {
    value as f64 / UNIT_F64
}

#[inline]
pub fn from_f64(value: f64) -> u128 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    (value * UNIT_F64) as u128
}
