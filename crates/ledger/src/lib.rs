pub mod error;
pub mod registry;
pub mod swap;
pub mod token;
pub mod vault;
pub mod yield_adapter;

pub use error::LedgerError;
pub use registry::{MarketId, MarketInfo, Registry, TokenId, TokenInfo, TokenRegistry};
pub use swap::{ConstantProductRouter, SwapOrder, Swapper};
pub use token::{Asset, Ledger};
pub use vault::{LockVault, Vault, DEFAULT_LOCK_DURATION};
pub use yield_adapter::{CTokenAdapter, Conversion, YieldAdapter};
