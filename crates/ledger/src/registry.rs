use std::collections::HashMap;

use alloy_primitives::{keccak256, Address};
use curve_market_shared::config::MarketConfig;

use crate::error::LedgerError;

pub type MarketId = u32;
pub type TokenId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub id: TokenId,
    pub market: MarketId,
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Clone)]
pub struct MarketInfo {
    pub id: MarketId,
    pub name: String,
    pub config: MarketConfig,
    tokens: Vec<TokenInfo>,
    by_name: HashMap<String, TokenId>,
}

impl MarketInfo {
    pub fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }
}

/// Token and market directory consulted by the exchange and router.
pub trait Registry: Clone {
    /// Lists `name` in `market` and returns the new token. Ids are
    /// sequential per market, starting at 1.
    fn create_token(&mut self, name: &str, market: MarketId) -> Result<TokenInfo, LedgerError>;

    fn resolve_id(&self, name: &str, market: MarketId) -> Result<TokenId, LedgerError>;

    fn market_config(&self, market: MarketId) -> Result<&MarketConfig, LedgerError>;

    fn token(&self, market: MarketId, id: TokenId) -> Result<&TokenInfo, LedgerError>;

    fn token_by_address(&self, address: Address) -> Option<&TokenInfo>;
}

#[derive(Debug, Clone)]
pub struct TokenRegistry {
    owner: Address,
    markets: Vec<MarketInfo>,
    by_address: HashMap<Address, (MarketId, TokenId)>,
}

impl TokenRegistry {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            markets: Vec::new(),
            by_address: HashMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn markets(&self) -> &[MarketInfo] {
        &self.markets
    }

    pub fn market(&self, id: MarketId) -> Result<&MarketInfo, LedgerError> {
        id.checked_sub(1)
            .and_then(|index| self.markets.get(index as usize))
            .ok_or(LedgerError::MarketNotFound(id))
    }

    pub fn market_id(&self, name: &str) -> Option<MarketId> {
        self.markets.iter().find(|m| m.name == name).map(|m| m.id)
    }

    pub fn add_market(&mut self, caller: Address, name: &str, config: MarketConfig) -> Result<MarketId, LedgerError> {
        if caller != self.owner {
            return Err(LedgerError::Unauthorized {
                caller,
                action: "add market",
            });
        }
        if self.market_id(name).is_some() {
            return Err(LedgerError::MarketAlreadyExists(name.to_string()));
        }
        let id = self.markets.len() as MarketId + 1;
        self.markets.push(MarketInfo {
            id,
            name: name.to_string(),
            config,
            tokens: Vec::new(),
            by_name: HashMap::new(),
        });
        Ok(id)
    }

    fn market_mut(&mut self, id: MarketId) -> Result<&mut MarketInfo, LedgerError> {
        id.checked_sub(1)
            .and_then(|index| self.markets.get_mut(index as usize))
            .ok_or(LedgerError::MarketNotFound(id))
    }
}

/// Address of the curve token `name` listed in `market`.
pub fn token_address(market: MarketId, name: &str) -> Address {
    let mut preimage = market.to_be_bytes().to_vec();
    preimage.extend_from_slice(name.as_bytes());
    Address::from_word(keccak256(&preimage))
}

impl Registry for TokenRegistry {
    fn create_token(&mut self, name: &str, market: MarketId) -> Result<TokenInfo, LedgerError> {
        let info = self.market_mut(market)?;
        if !info.config.name_verifier.verify(name) {
            return Err(LedgerError::InvalidName(name.to_string()));
        }
        if info.by_name.contains_key(name) {
            return Err(LedgerError::TokenAlreadyExists {
                name: name.to_string(),
                market,
            });
        }
        let token = TokenInfo {
            id: info.tokens.len() as TokenId + 1,
            market,
            name: name.to_string(),
            address: token_address(market, name),
        };
        info.by_name.insert(token.name.clone(), token.id);
        info.tokens.push(token.clone());
        self.by_address.insert(token.address, (market, token.id));
        Ok(token)
    }

    fn resolve_id(&self, name: &str, market: MarketId) -> Result<TokenId, LedgerError> {
        self.market(market)?
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| LedgerError::TokenNotFound(name.to_string()))
    }

    fn market_config(&self, market: MarketId) -> Result<&MarketConfig, LedgerError> {
        Ok(&self.market(market)?.config)
    }

    fn token(&self, market: MarketId, id: TokenId) -> Result<&TokenInfo, LedgerError> {
        id.checked_sub(1)
            .and_then(|index| self.market(market).ok()?.tokens.get(index as usize))
            .ok_or_else(|| LedgerError::TokenNotFound(format!("#{id} in market {market}")))
    }

    fn token_by_address(&self, address: Address) -> Option<&TokenInfo> {
        let (market, id) = self.by_address.get(&address)?;
        self.token(*market, *id).ok()
    }
}
