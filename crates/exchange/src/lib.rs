pub mod curve;
pub mod error;
pub mod exchange;
pub mod protocol;
pub mod reserve;
pub mod router;

pub use error::{ErrorKind, ExchangeError};
pub use exchange::{Exchange, TokenState};
pub use protocol::{AddAndBuy, BuyAndLock, ConvertAddAndBuy, ConvertAndBuy, Protocol, SellAndConvert};
pub use reserve::YieldReserve;
pub use router::{CompositePlan, Funding, Phase, Purchase, Router, Sale};
