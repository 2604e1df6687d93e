use std::collections::HashMap;

use alloy_primitives::Address;
use curve_market_ledger::{Ledger, LedgerError, MarketId, Registry, TokenInfo, YieldAdapter};
use curve_market_shared::config::MarketConfig;
use curve_market_shared::math::{self, Rounding, FEE_SCALE};
use curve_market_shared::result::{CostBreakdown, SellBreakdown};

use crate::curve;
use crate::error::ExchangeError;
use crate::reserve::YieldReserve;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenState {
    pub market: MarketId,
    pub supply: u128,
    /// Reserve asset invested on behalf of this token's supply.
    pub principal: u128,
}

#[derive(Debug, Clone, Copy)]
struct PlatformAccount {
    owner: Address,
    owed: u128,
}

/// Bonding-curve exchange for every listed token.
///
/// Buyers are charged the curve cost plus trading and platform fees; the
/// curve cost is invested through the [`YieldReserve`] while fees stay in
/// the exchange account until withdrawn.
#[derive(Debug, Clone)]
pub struct Exchange<Y> {
    address: Address,
    owner: Address,
    reserve: YieldReserve<Y>,
    tokens: HashMap<Address, TokenState>,
    trading_fee_account: Address,
    trading_fee_owed: u128,
    platform: HashMap<MarketId, PlatformAccount>,
}

impl<Y: YieldAdapter> Exchange<Y> {
    pub fn new(address: Address, owner: Address, reserve: YieldReserve<Y>) -> Self {
        Self {
            address,
            owner,
            reserve,
            tokens: HashMap::new(),
            trading_fee_account: owner,
            trading_fee_owed: 0,
            platform: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn reserve_asset(&self) -> Address {
        self.reserve.asset()
    }

    pub fn reserve(&self) -> &YieldReserve<Y> {
        &self.reserve
    }

    pub fn reserve_mut(&mut self) -> &mut YieldReserve<Y> {
        &mut self.reserve
    }

    pub fn token_state(&self, token: Address) -> Result<&TokenState, ExchangeError> {
        self.tokens.get(&token).ok_or(ExchangeError::UnknownToken(token))
    }

    pub fn tokens(&self) -> impl Iterator<Item = (&Address, &TokenState)> {
        self.tokens.iter()
    }

    pub fn supply_of(&self, token: Address) -> u128 {
        self.tokens.get(&token).map_or(0, |state| state.supply)
    }

    pub fn trading_fee_account(&self) -> Address {
        self.trading_fee_account
    }

    pub fn trading_fee_owed(&self) -> u128 {
        self.trading_fee_owed
    }

    pub fn platform_owner(&self, market: MarketId) -> Address {
        self.platform.get(&market).map_or(self.owner, |account| account.owner)
    }

    pub fn platform_fee_owed(&self, market: MarketId) -> u128 {
        self.platform.get(&market).map_or(0, |account| account.owed)
    }

    pub fn total_platform_fee_owed(&self) -> u128 {
        self.platform.values().map(|account| account.owed).sum()
    }

    /// Creates `name` in the registry, registers its ledger token with the
    /// exchange as sole minter, and opens it for trading at supply 0.
    pub fn list_token<R: Registry>(
        &mut self,
        ledger: &mut Ledger,
        registry: &mut R,
        name: &str,
        market: MarketId,
    ) -> Result<TokenInfo, ExchangeError> {
        let info = registry.create_token(name, market)?;
        if self.tokens.contains_key(&info.address) {
            return Err(LedgerError::AlreadyRegistered(info.address).into());
        }
        ledger.register(info.address, name, Some(self.address))?;
        self.tokens.insert(
            info.address,
            TokenState {
                market,
                supply: 0,
                principal: 0,
            },
        );
        tracing::info!(name, market, id = info.id, token = %info.address, "token listed");
        Ok(info)
    }

    /// Cost of buying `amount` at an explicit supply, for tokens that may
    /// not be listed yet.
    pub fn get_costs_for_buying(
        config: &MarketConfig,
        supply: u128,
        amount: u128,
    ) -> Result<CostBreakdown, ExchangeError> {
        costs_for_buying(config, supply, amount)
    }

    pub fn get_cost_for_buying<R: Registry>(
        &self,
        registry: &R,
        token: Address,
        amount: u128,
    ) -> Result<CostBreakdown, ExchangeError> {
        let state = self.token_state(token)?;
        Self::get_costs_for_buying(registry.market_config(state.market)?, state.supply, amount)
    }

    pub fn get_price_for_selling<R: Registry>(
        &self,
        registry: &R,
        token: Address,
        amount: u128,
    ) -> Result<SellBreakdown, ExchangeError> {
        let state = self.token_state(token)?;
        proceeds_for_selling(registry.market_config(state.market)?, state.supply, amount)
    }

    /// Mints `amount` of `token` to `recipient`, charging `caller` (which
    /// must have approved the exchange) at most `max_cost`.
    #[allow(clippy::too_many_arguments)]
    pub fn buy<R: Registry>(
        &mut self,
        ledger: &mut Ledger,
        registry: &R,
        caller: Address,
        token: Address,
        amount: u128,
        max_cost: u128,
        recipient: Address,
    ) -> Result<CostBreakdown, ExchangeError> {
        if amount == 0 {
            return Err(ExchangeError::ZeroAmount);
        }
        let quote = self.get_cost_for_buying(registry, token, amount)?;
        if quote.total > max_cost {
            return Err(ExchangeError::CostExceedsMaximum {
                cost: quote.total,
                max: max_cost,
            });
        }

        let state = self.tokens.get_mut(&token).ok_or(ExchangeError::UnknownToken(token))?;
        let market = state.market;
        state.supply = math::add(state.supply, amount)?;
        state.principal = math::add(state.principal, quote.raw)?;
        self.trading_fee_owed = math::add(self.trading_fee_owed, quote.trading_fee)?;
        let owner = self.owner;
        let platform = self.platform.entry(market).or_insert(PlatformAccount { owner, owed: 0 });
        platform.owed = math::add(platform.owed, quote.platform_fee)?;

        let asset = self.reserve.asset();
        ledger.transfer_from(asset, self.address, caller, self.address, quote.total)?;
        self.reserve.deposit(ledger, self.address, quote.raw)?;
        ledger.mint(token, self.address, recipient, amount)?;

        tracing::debug!(%token, amount, cost = quote.total, %recipient, "buy");
        Ok(quote)
    }

    /// Burns `amount` of `token` from `caller` and pays the proceeds net of
    /// the trading fee to `recipient`.
    #[allow(clippy::too_many_arguments)]
    pub fn sell<R: Registry>(
        &mut self,
        ledger: &mut Ledger,
        registry: &R,
        caller: Address,
        token: Address,
        amount: u128,
        min_price: u128,
        recipient: Address,
    ) -> Result<SellBreakdown, ExchangeError> {
        if amount == 0 {
            return Err(ExchangeError::ZeroAmount);
        }
        let quote = self.get_price_for_selling(registry, token, amount)?;
        if quote.net < min_price {
            return Err(ExchangeError::SlippageTooHigh("sell"));
        }

        let state = self.tokens.get_mut(&token).ok_or(ExchangeError::UnknownToken(token))?;
        let principal = state.principal;
        state.supply -= amount;
        state.principal = principal.checked_sub(quote.raw).ok_or_else(|| {
            ExchangeError::InvariantViolation(format!(
                "sell of {} exceeds principal {principal} of {token}",
                quote.raw
            ))
        })?;
        self.trading_fee_owed = math::add(self.trading_fee_owed, quote.trading_fee)?;

        ledger.burn(token, self.address, caller, amount)?;
        self.reserve.redeem(ledger, quote.raw, self.address)?;
        ledger.transfer(self.reserve.asset(), self.address, recipient, quote.net)?;

        tracing::debug!(%token, amount, proceeds = quote.net, %recipient, "sell");
        Ok(quote)
    }

    pub fn withdraw_trading_fee(&mut self, ledger: &mut Ledger, caller: Address, amount: u128) -> Result<(), ExchangeError> {
        if caller != self.trading_fee_account {
            return Err(ExchangeError::Unauthorized { caller });
        }
        if amount > self.trading_fee_owed {
            return Err(ExchangeError::InsufficientBalance {
                requested: amount,
                available: self.trading_fee_owed,
            });
        }
        self.trading_fee_owed -= amount;
        ledger.transfer(self.reserve.asset(), self.address, caller, amount)?;
        tracing::info!(amount, %caller, "trading fee withdrawn");
        Ok(())
    }

    pub fn withdraw_platform_fee(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        market: MarketId,
        amount: u128,
    ) -> Result<(), ExchangeError> {
        if caller != self.platform_owner(market) {
            return Err(ExchangeError::Unauthorized { caller });
        }
        let available = self.platform_fee_owed(market);
        if amount > available {
            return Err(ExchangeError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        if let Some(account) = self.platform.get_mut(&market) {
            account.owed -= amount;
        }
        ledger.transfer(self.reserve.asset(), self.address, caller, amount)?;
        tracing::info!(amount, market, %caller, "platform fee withdrawn");
        Ok(())
    }

    pub fn set_trading_fee_account(&mut self, caller: Address, account: Address) -> Result<(), ExchangeError> {
        if caller != self.owner {
            return Err(ExchangeError::Unauthorized { caller });
        }
        self.trading_fee_account = account;
        Ok(())
    }

    pub fn set_platform_owner(&mut self, caller: Address, market: MarketId, owner: Address) -> Result<(), ExchangeError> {
        if caller != self.owner {
            return Err(ExchangeError::Unauthorized { caller });
        }
        let default_owner = self.owner;
        self.platform
            .entry(market)
            .or_insert(PlatformAccount {
                owner: default_owner,
                owed: 0,
            })
            .owner = owner;
        Ok(())
    }

    /// Checks the accounting identities that hold between calls.
    pub fn check_invariants(&self, ledger: &Ledger) -> Result<(), ExchangeError> {
        self.reserve.check_redeemable()?;
        self.reserve.check_backing(ledger)?;
        let principal: u128 = self.tokens.values().map(|state| state.principal).sum();
        if principal != self.reserve.total_invested() {
            return Err(ExchangeError::InvariantViolation(format!(
                "token principal {principal} != invested {}",
                self.reserve.total_invested()
            )));
        }
        let fees = math::add(self.trading_fee_owed, self.total_platform_fee_owed())?;
        let held = ledger.balance_of(self.reserve.asset(), self.address);
        if held != fees {
            return Err(ExchangeError::InvariantViolation(format!(
                "exchange holds {held} but owes {fees} in fees"
            )));
        }
        Ok(())
    }
}

/// Curve cost of buying `amount` from `supply`, plus both fees. Everything
/// rounds up.
pub fn costs_for_buying(config: &MarketConfig, supply: u128, amount: u128) -> Result<CostBreakdown, ExchangeError> {
    let end = math::add(supply, amount)?;
    let raw = curve::cost(config, supply, end, Rounding::Up)?;
    let trading_fee = math::mul_div(raw, config.trading_fee_rate, FEE_SCALE, Rounding::Up)?;
    let platform_fee = math::mul_div(raw, config.platform_fee_rate, FEE_SCALE, Rounding::Up)?;
    let total = math::add(math::add(raw, trading_fee)?, platform_fee)?;
    Ok(CostBreakdown {
        total,
        raw,
        trading_fee,
        platform_fee,
    })
}

/// Proceeds of selling `amount` back to a curve at `supply`. Only the
/// trading fee applies on the way out.
pub fn proceeds_for_selling(config: &MarketConfig, supply: u128, amount: u128) -> Result<SellBreakdown, ExchangeError> {
    if amount > supply {
        return Err(ExchangeError::InsufficientSupply {
            requested: amount,
            supply,
        });
    }
    let raw = curve::cost(config, supply - amount, supply, Rounding::Down)?;
    let trading_fee = math::mul_div(raw, config.trading_fee_rate, FEE_SCALE, Rounding::Up)?;
    Ok(SellBreakdown {
        net: raw.saturating_sub(trading_fee),
        raw,
        trading_fee,
    })
}
