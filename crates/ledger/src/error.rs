use alloy_primitives::Address;
use curve_market_shared::math::MathError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("unknown token {0}")]
    UnknownToken(Address),
    #[error("token {0} already registered")]
    AlreadyRegistered(Address),
    #[error("insufficient balance of {token} for {holder}: requested {requested}, available {available}")]
    InsufficientBalance {
        token: Address,
        holder: Address,
        requested: u128,
        available: u128,
    },
    #[error("insufficient allowance of {token} for {spender}: requested {requested}, approved {approved}")]
    InsufficientAllowance {
        token: Address,
        spender: Address,
        requested: u128,
        approved: u128,
    },
    #[error("insufficient native balance for {holder}: requested {requested}, available {available}")]
    InsufficientNative {
        holder: Address,
        requested: u128,
        available: u128,
    },
    #[error("{caller} is not authorized to {action}")]
    Unauthorized { caller: Address, action: &'static str },
    #[error("no wrapped native token configured")]
    NoWrappedNative,
    #[error("{0} refuses plain native transfers")]
    NativeRefused(Address),

    // Constant-product swap router
    #[error("no pair for {0} / {1}")]
    NoPair(Address, Address),
    #[error("invalid swap path")]
    InvalidPath,
    #[error("insufficient liquidity")]
    InsufficientLiquidity,
    #[error("insufficient output amount: got {got}, minimum {min}")]
    InsufficientOutput { got: u128, min: u128 },
    #[error("excessive input amount: need {need}, maximum {max}")]
    ExcessiveInput { need: u128, max: u128 },
    #[error("deadline {deadline} expired at {now}")]
    Expired { deadline: u64, now: u64 },

    // Yield adapter
    #[error("adapter cash {available} cannot cover {requested}")]
    InsufficientCash { requested: u128, available: u128 },
    #[error("insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: u128, held: u128 },
    #[error("exchange rate cannot decrease from {current} to {proposed}")]
    RateDecrease { current: u128, proposed: u128 },

    // Registry
    #[error("market {0} not found")]
    MarketNotFound(u32),
    #[error("market name {0:?} already exists")]
    MarketAlreadyExists(String),
    #[error("token {0:?} not found")]
    TokenNotFound(String),
    #[error("token {name:?} already exists in market {market}")]
    TokenAlreadyExists { name: String, market: u32 },
    #[error("invalid token name {0:?}")]
    InvalidName(String),

    #[error(transparent)]
    Math(#[from] MathError),
}
