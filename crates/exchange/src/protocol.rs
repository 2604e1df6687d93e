use alloy_primitives::Address;
use curve_market_ledger::{
    Asset, CTokenAdapter, ConstantProductRouter, Ledger, LedgerError, LockVault, MarketId, Registry, Swapper,
    TokenInfo, TokenRegistry, Vault, YieldAdapter, DEFAULT_LOCK_DURATION,
};
use curve_market_shared::address::labeled;
use curve_market_shared::config::MarketConfig;
use curve_market_shared::math::UNIT;
use curve_market_shared::result::{CostBreakdown, SellBreakdown};

use crate::error::ExchangeError;
use crate::exchange::Exchange;
use crate::reserve::YieldReserve;
use crate::router::{CompositePlan, Context, Funding, Purchase, Router, Sale, DEFAULT_DEADLINE_WINDOW};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertAndBuy {
    pub input: Asset,
    pub token: Address,
    pub amount: u128,
    pub fallback: u128,
    pub max_input: u128,
    pub recipient: Address,
    pub lock: bool,
    /// Native value sent along with the call.
    pub value: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellAndConvert {
    pub output: Asset,
    pub token: Address,
    pub amount: u128,
    pub min_output: u128,
    pub recipient: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyAndLock {
    pub token: Address,
    pub amount: u128,
    pub fallback: u128,
    pub max_cost: u128,
    pub recipient: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddAndBuy {
    pub name: String,
    pub market: MarketId,
    pub amount: u128,
    pub recipient: Address,
    pub lock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertAddAndBuy {
    pub name: String,
    pub market: MarketId,
    pub input: Asset,
    pub amount: u128,
    pub fallback: u128,
    pub max_input: u128,
    pub recipient: Address,
    pub lock: bool,
    pub value: u128,
}

/// Every piece of state behind the public entry points.
///
/// Each mutating call runs against a scratch copy and is committed only if
/// it succeeds, so a failure at any phase leaves no trace.
#[derive(Debug, Clone)]
pub struct Protocol<Y = CTokenAdapter, S = ConstantProductRouter, V = LockVault, R = TokenRegistry> {
    ledger: Ledger,
    exchange: Exchange<Y>,
    swapper: S,
    vault: V,
    registry: R,
    router: Router,
    now: u64,
}

impl Protocol {
    /// Reference deployment: DAI reserve in a cToken-style adapter at rate
    /// 1.0, WETH as wrapped native, a constant-product router and a one-year
    /// lock vault. `owner` administers everything.
    pub fn bootstrap(owner: Address) -> Result<Self, ExchangeError> {
        let dai = labeled("dai");
        let weth = labeled("weth");
        let mut ledger = Ledger::new();
        ledger.register(dai, "DAI", None)?;
        ledger.register_wrapped_native(weth, "WETH")?;

        let adapter = CTokenAdapter::new(labeled("cdai"), dai, UNIT);
        let reserve = YieldReserve::new(labeled("yield-reserve"), owner, adapter);
        let exchange = Exchange::new(labeled("exchange"), owner, reserve);
        Ok(Self::new(
            ledger,
            exchange,
            ConstantProductRouter::new(labeled("swap-router")),
            LockVault::new(labeled("lock-vault"), DEFAULT_LOCK_DURATION),
            TokenRegistry::new(owner),
            Router::new(labeled("router"), DEFAULT_DEADLINE_WINDOW),
        ))
    }

    pub fn get_costs_for_buying(
        config: &MarketConfig,
        supply: u128,
        amount: u128,
    ) -> Result<CostBreakdown, ExchangeError> {
        crate::exchange::costs_for_buying(config, supply, amount)
    }

    pub fn reserve_token(&self) -> Address {
        self.exchange.reserve_asset()
    }

    pub fn wrapped_native(&self) -> Option<Address> {
        self.ledger.wrapped_native()
    }

    /// Seeds a swap pool from `provider`'s balances.
    pub fn add_liquidity(
        &mut self,
        provider: Address,
        token_a: Address,
        token_b: Address,
        amount_a: u128,
        amount_b: u128,
    ) -> Result<(), ExchangeError> {
        self.transact("add_liquidity", |p| {
            Ok(p.swapper
                .add_liquidity(&mut p.ledger, provider, token_a, token_b, amount_a, amount_b)?)
        })
    }
}

impl<Y, S, V, R> Protocol<Y, S, V, R>
where
    Y: YieldAdapter,
    S: Swapper,
    V: Vault,
    R: Registry,
{
    pub fn new(mut ledger: Ledger, exchange: Exchange<Y>, swapper: S, vault: V, registry: R, router: Router) -> Self {
        ledger.refuse_plain_native(router.address());
        Self {
            ledger,
            exchange,
            swapper,
            vault,
            registry,
            router,
            now: 0,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Direct token-contract access: approvals, transfers, genesis mints.
    /// The router still refuses plain native transfers made through it.
    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub fn exchange(&self) -> &Exchange<Y> {
        &self.exchange
    }

    pub fn swapper(&self) -> &S {
        &self.swapper
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn router(&self) -> Router {
        self.router
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn advance_time(&mut self, seconds: u64) {
        self.now = self.now.saturating_add(seconds);
    }

    fn transact<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T, ExchangeError>,
    ) -> Result<T, ExchangeError> {
        let mut scratch = self.clone();
        match f(&mut scratch) {
            Ok(value) => {
                *self = scratch;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(op, error = %err, "reverted");
                Err(err)
            }
        }
    }

    fn context(&mut self) -> Context<'_, Y, S, V, R> {
        Context {
            ledger: &mut self.ledger,
            exchange: &mut self.exchange,
            swapper: &mut self.swapper,
            vault: &mut self.vault,
            registry: &mut self.registry,
            now: self.now,
        }
    }

    fn run_plan(&mut self, op: &'static str, caller: Address, plan: CompositePlan) -> Result<Purchase, ExchangeError> {
        self.transact(op, |p| {
            let phases = plan.into_phases()?;
            let router = p.router;
            let purchase = router.execute(&mut p.context(), caller, &phases)?;
            tracing::info!(
                op,
                token = %purchase.token,
                amount = purchase.amount,
                cost = purchase.cost,
                fallback = purchase.used_fallback,
                locked = purchase.locked,
                "composite buy"
            );
            Ok(purchase)
        })
    }

    pub fn add_token(&mut self, name: &str, market: MarketId) -> Result<TokenInfo, ExchangeError> {
        self.transact("add_token", |p| {
            p.exchange.list_token(&mut p.ledger, &mut p.registry, name, market)
        })
    }

    pub fn buy(
        &mut self,
        caller: Address,
        token: Address,
        amount: u128,
        max_cost: u128,
        recipient: Address,
    ) -> Result<CostBreakdown, ExchangeError> {
        self.transact("buy", |p| {
            p.exchange
                .buy(&mut p.ledger, &p.registry, caller, token, amount, max_cost, recipient)
        })
    }

    pub fn sell(
        &mut self,
        caller: Address,
        token: Address,
        amount: u128,
        min_price: u128,
        recipient: Address,
    ) -> Result<SellBreakdown, ExchangeError> {
        self.transact("sell", |p| {
            p.exchange
                .sell(&mut p.ledger, &p.registry, caller, token, amount, min_price, recipient)
        })
    }

    pub fn convert_and_buy(&mut self, caller: Address, request: ConvertAndBuy) -> Result<Purchase, ExchangeError> {
        let funding = input_funding(request.input, request.max_input, request.value)?;
        let plan = CompositePlan::existing(request.token, funding)
            .amount(request.amount, request.fallback)
            .deliver_to(request.recipient, request.lock);
        self.run_plan("convertAndBuy", caller, plan)
    }

    pub fn sell_and_convert(&mut self, caller: Address, request: SellAndConvert) -> Result<Sale, ExchangeError> {
        self.transact("sellAndConvert", |p| {
            let router = p.router;
            let sale = router.sell_and_convert(
                &mut p.context(),
                caller,
                request.output,
                request.token,
                request.amount,
                request.min_output,
                request.recipient,
            )?;
            tracing::info!(token = %request.token, amount = request.amount, output = sale.output, "sell and convert");
            Ok(sale)
        })
    }

    pub fn buy_and_lock(&mut self, caller: Address, request: BuyAndLock) -> Result<Purchase, ExchangeError> {
        let plan = CompositePlan::existing(
            request.token,
            Funding::Reserve {
                max_cost: request.max_cost,
            },
        )
        .amount(request.amount, request.fallback)
        .deliver_to(request.recipient, true);
        self.run_plan("buyAndLock", caller, plan)
    }

    pub fn add_and_buy(&mut self, caller: Address, request: AddAndBuy) -> Result<Purchase, ExchangeError> {
        let plan = CompositePlan::create(&request.name, request.market, Funding::Reserve { max_cost: u128::MAX })
            .amount(request.amount, request.amount)
            .deliver_to(request.recipient, request.lock);
        self.run_plan("addAndBuy", caller, plan)
    }

    pub fn convert_add_and_buy(&mut self, caller: Address, request: ConvertAddAndBuy) -> Result<Purchase, ExchangeError> {
        let funding = input_funding(request.input, request.max_input, request.value)?;
        let plan = CompositePlan::create(&request.name, request.market, funding)
            .amount(request.amount, request.fallback)
            .deliver_to(request.recipient, request.lock);
        self.run_plan("convertAddAndBuy", caller, plan)
    }

    /// Plain native transfer. The router accepts native value only as part
    /// of a composite call.
    pub fn send_native(&mut self, from: Address, to: Address, value: u128) -> Result<(), ExchangeError> {
        self.transact("send_native", |p| {
            p.ledger.transfer_native(from, to, value).map_err(|err| match err {
                LedgerError::NativeRefused(_) => ExchangeError::UnsupportedDirectTransfer,
                other => other.into(),
            })
        })
    }

    pub fn withdraw_trading_fee(&mut self, caller: Address, amount: u128) -> Result<(), ExchangeError> {
        self.transact("withdraw_trading_fee", |p| {
            p.exchange.withdraw_trading_fee(&mut p.ledger, caller, amount)
        })
    }

    pub fn withdraw_platform_fee(&mut self, caller: Address, market: MarketId, amount: u128) -> Result<(), ExchangeError> {
        self.transact("withdraw_platform_fee", |p| {
            p.exchange.withdraw_platform_fee(&mut p.ledger, caller, market, amount)
        })
    }

    pub fn withdraw_surplus(&mut self, caller: Address, amount: u128, recipient: Address) -> Result<(), ExchangeError> {
        self.transact("withdraw_surplus", |p| {
            p.exchange
                .reserve_mut()
                .withdraw_surplus(&mut p.ledger, caller, amount, recipient)
        })
    }

    pub fn set_trading_fee_account(&mut self, caller: Address, account: Address) -> Result<(), ExchangeError> {
        self.transact("set_trading_fee_account", |p| {
            p.exchange.set_trading_fee_account(caller, account)
        })
    }

    pub fn set_platform_owner(&mut self, caller: Address, market: MarketId, owner: Address) -> Result<(), ExchangeError> {
        self.transact("set_platform_owner", |p| p.exchange.set_platform_owner(caller, market, owner))
    }

    pub fn get_cost_for_buying(&self, token: Address, amount: u128) -> Result<CostBreakdown, ExchangeError> {
        self.exchange.get_cost_for_buying(&self.registry, token, amount)
    }

    pub fn get_price_for_selling(&self, token: Address, amount: u128) -> Result<SellBreakdown, ExchangeError> {
        self.exchange.get_price_for_selling(&self.registry, token, amount)
    }

    pub fn accrued_surplus(&self) -> Result<u128, ExchangeError> {
        self.exchange.reserve().accrued_surplus()
    }

    pub fn redeemable_value(&self) -> Result<u128, ExchangeError> {
        self.exchange.reserve().redeemable_value()
    }

    pub fn locked_balance(&self, token: Address, owner: Address) -> u128 {
        self.vault.locked_balance(token, owner)
    }

    pub fn supply_of(&self, token: Address) -> u128 {
        self.exchange.supply_of(token)
    }

    pub fn check_invariants(&self) -> Result<(), ExchangeError> {
        self.exchange.check_invariants(&self.ledger)
    }
}

impl<Y, S, V> Protocol<Y, S, V, TokenRegistry>
where
    Y: YieldAdapter,
    S: Swapper,
    V: Vault,
{
    pub fn add_market(&mut self, caller: Address, name: &str, config: MarketConfig) -> Result<MarketId, ExchangeError> {
        self.transact("add_market", |p| Ok(p.registry.add_market(caller, name, config)?))
    }
}

impl<S, V, R> Protocol<CTokenAdapter, S, V, R>
where
    S: Swapper,
    V: Vault,
    R: Registry,
{
    /// Moves the adapter's exchange rate to `rate`, minting the interest.
    pub fn accrue_interest(&mut self, rate: u128) -> Result<u128, ExchangeError> {
        self.transact("accrue_interest", |p| {
            let interest = p.exchange.reserve_mut().adapter_mut().accrue(&mut p.ledger, rate)?;
            tracing::debug!(rate, interest, "interest accrued");
            Ok(interest)
        })
    }
}

impl<Y, S, R> Protocol<Y, S, LockVault, R>
where
    Y: YieldAdapter,
    S: Swapper,
    R: Registry,
{
    pub fn withdraw_unlocked(&mut self, owner: Address, token: Address) -> Result<u128, ExchangeError> {
        self.transact("withdraw_unlocked", |p| {
            let now = p.now;
            Ok(p.vault.withdraw_unlocked(&mut p.ledger, token, owner, now)?)
        })
    }
}

fn input_funding(input: Asset, max_input: u128, value: u128) -> Result<Funding, ExchangeError> {
    match input {
        Asset::Native => Ok(Funding::Native { value, max_input }),
        // Value sent alongside a token-funded call would be stranded.
        Asset::Token(_) if value > 0 => Err(ExchangeError::UnsupportedDirectTransfer),
        Asset::Token(asset) => Ok(Funding::Token { asset, max_input }),
    }
}
