use alloy_primitives::Address;
use curve_market_ledger::LedgerError;
use curve_market_shared::math::MathError;

/// Broad failure class, used by callers to decide whether to adjust the
/// request, fix permissions, or treat the failure as a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    State,
    Authorization,
    Invariant,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("cost {cost} exceeds maximum {max}")]
    CostExceedsMaximum { cost: u128, max: u128 },
    #[error("{0}: slippage too high")]
    SlippageTooHigh(&'static str),
    #[error("insufficient input: required {required}, available {available}")]
    InsufficientInput { required: u128, available: u128 },
    #[error("direct native transfers are not supported")]
    UnsupportedDirectTransfer,
    #[error("no swap route from {0} to the reserve asset")]
    UnsupportedAsset(Address),
    #[error("amount must be non-zero")]
    ZeroAmount,
    #[error("fallback amount {fallback} exceeds amount {amount}")]
    InvalidFallback { amount: u128, fallback: u128 },
    #[error("token {0} is not traded on this exchange")]
    UnknownToken(Address),
    #[error("cannot sell {requested} of supply {supply}")]
    InsufficientSupply { requested: u128, supply: u128 },
    #[error("reserve cannot return {requested}: {reason}")]
    InsufficientReserve { requested: u128, reason: String },
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u128, available: u128 },
    #[error("{caller} is not authorized")]
    Unauthorized { caller: Address },
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("malformed composite plan: {0}")]
    MalformedPlan(&'static str),
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ExchangeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExchangeError::CostExceedsMaximum { .. }
            | ExchangeError::SlippageTooHigh(_)
            | ExchangeError::InsufficientInput { .. }
            | ExchangeError::UnsupportedDirectTransfer
            | ExchangeError::UnsupportedAsset(_)
            | ExchangeError::ZeroAmount
            | ExchangeError::InvalidFallback { .. }
            | ExchangeError::MalformedPlan(_)
            | ExchangeError::Math(_) => ErrorKind::Input,
            ExchangeError::UnknownToken(_)
            | ExchangeError::InsufficientSupply { .. }
            | ExchangeError::InsufficientReserve { .. }
            | ExchangeError::InsufficientBalance { .. } => ErrorKind::State,
            ExchangeError::Unauthorized { .. } => ErrorKind::Authorization,
            ExchangeError::InvariantViolation(_) => ErrorKind::Invariant,
            ExchangeError::Ledger(err) => match err {
                LedgerError::Unauthorized { .. } => ErrorKind::Authorization,
                LedgerError::UnknownToken(_)
                | LedgerError::AlreadyRegistered(_)
                | LedgerError::MarketNotFound(_)
                | LedgerError::MarketAlreadyExists(_)
                | LedgerError::TokenNotFound(_)
                | LedgerError::TokenAlreadyExists { .. }
                | LedgerError::InsufficientCash { .. }
                | LedgerError::InsufficientShares { .. }
                | LedgerError::RateDecrease { .. }
                | LedgerError::NoWrappedNative => ErrorKind::State,
                _ => ErrorKind::Input,
            },
        }
    }
}
