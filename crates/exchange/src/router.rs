use alloy_primitives::Address;
use curve_market_ledger::{Asset, Ledger, LedgerError, MarketId, Registry, SwapOrder, Swapper, Vault, YieldAdapter};
use curve_market_shared::config::MarketConfig;
use curve_market_shared::result::CostBreakdown;

use crate::error::ExchangeError;
use crate::exchange::{self, Exchange};

/// Seconds a swap quote taken inside a composite action stays valid.
pub const DEFAULT_DEADLINE_WINDOW: u64 = 15 * 60;

/// Mutable view of every collaborator a composite action touches.
pub struct Context<'a, Y, S, V, R> {
    pub ledger: &'a mut Ledger,
    pub exchange: &'a mut Exchange<Y>,
    pub swapper: &'a mut S,
    pub vault: &'a mut V,
    pub registry: &'a mut R,
    pub now: u64,
}

/// Where a composite buy gets its money from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Funding {
    /// Native value attached to the call. At most `max_input` of it is
    /// wrapped and spent; the rest goes back to the caller.
    Native { value: u128, max_input: u128 },
    /// `max_input` of `asset` pulled from the caller up front.
    Token { asset: Address, max_input: u128 },
    /// Reserve asset pulled from the caller at purchase time, exactly the
    /// final cost and never more than `max_cost`.
    Reserve { max_cost: u128 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Create { name: String, market: MarketId },
    Fund(Funding),
    /// `token: None` buys the token listed by the preceding `Create`.
    Purchase {
        token: Option<Address>,
        amount: u128,
        fallback: u128,
    },
    Deliver { recipient: Address, lock: bool },
    Refund,
}

/// Builder for the fixed phase sequence of a composite buy:
/// create, fund, purchase, deliver, refund.
#[derive(Debug, Clone)]
pub struct CompositePlan {
    create: Option<(String, MarketId)>,
    token: Option<Address>,
    funding: Funding,
    amount: u128,
    fallback: u128,
    recipient: Option<Address>,
    lock: bool,
}

impl CompositePlan {
    pub fn existing(token: Address, funding: Funding) -> Self {
        Self {
            create: None,
            token: Some(token),
            funding,
            amount: 0,
            fallback: 0,
            recipient: None,
            lock: false,
        }
    }

    pub fn create(name: &str, market: MarketId, funding: Funding) -> Self {
        Self {
            create: Some((name.to_string(), market)),
            token: None,
            ..Self::existing(Address::ZERO, funding)
        }
    }

    /// `fallback` of 0 disables the second attempt.
    pub fn amount(mut self, amount: u128, fallback: u128) -> Self {
        self.amount = amount;
        self.fallback = fallback;
        self
    }

    pub fn deliver_to(mut self, recipient: Address, lock: bool) -> Self {
        self.recipient = Some(recipient);
        self.lock = lock;
        self
    }

    pub fn into_phases(self) -> Result<Vec<Phase>, ExchangeError> {
        if self.amount == 0 {
            return Err(ExchangeError::ZeroAmount);
        }
        if self.fallback > self.amount {
            return Err(ExchangeError::InvalidFallback {
                amount: self.amount,
                fallback: self.fallback,
            });
        }
        let recipient = self.recipient.ok_or(ExchangeError::MalformedPlan("missing recipient"))?;

        let mut phases = Vec::with_capacity(5);
        if let Some((name, market)) = self.create {
            phases.push(Phase::Create { name, market });
        }
        phases.push(Phase::Fund(self.funding));
        phases.push(Phase::Purchase {
            token: self.token,
            amount: self.amount,
            fallback: self.fallback,
        });
        phases.push(Phase::Deliver {
            recipient,
            lock: self.lock,
        });
        phases.push(Phase::Refund);
        Ok(phases)
    }
}

/// Outcome of a composite buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purchase {
    pub token: Address,
    pub amount: u128,
    /// Reserve asset paid to the exchange, fees included.
    pub cost: u128,
    /// Input asset consumed to cover `cost`.
    pub input_spent: u128,
    /// Input returned to the caller.
    pub refunded: u128,
    pub locked: bool,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sale {
    /// Reserve asset received from the exchange.
    pub proceeds: u128,
    /// Output asset delivered to the recipient.
    pub output: u128,
}

#[derive(Debug, Clone, Copy)]
struct Funds {
    funding: Funding,
    input: Address,
    budget: u128,
}

/// Router balances at the start of a call. A call must leave every recorded
/// balance exactly where it found it.
#[derive(Debug)]
struct Holdings {
    router: Address,
    native: u128,
    tokens: Vec<(Address, u128)>,
}

impl Holdings {
    fn open(ledger: &Ledger, router: Address) -> Self {
        Self {
            router,
            native: ledger.native_balance(router),
            tokens: Vec::new(),
        }
    }

    /// Records `token` the first time the call is about to move it.
    fn record(&mut self, ledger: &Ledger, token: Address) {
        if !self.tokens.iter().any(|&(held, _)| held == token) {
            self.tokens.push((token, ledger.balance_of(token, self.router)));
        }
    }

    fn baseline(&self, token: Address) -> u128 {
        self.tokens
            .iter()
            .find(|&&(held, _)| held == token)
            .map_or(0, |&(_, before)| before)
    }

    /// Balance of `token` gained during the call.
    fn gained(&self, ledger: &Ledger, token: Address) -> u128 {
        ledger
            .balance_of(token, self.router)
            .saturating_sub(self.baseline(token))
    }

    fn native_gained(&self, ledger: &Ledger) -> u128 {
        ledger.native_balance(self.router).saturating_sub(self.native)
    }

    fn check(&self, ledger: &Ledger) -> Result<(), ExchangeError> {
        for &(token, before) in &self.tokens {
            let held = ledger.balance_of(token, self.router);
            if held != before {
                return Err(ExchangeError::InvariantViolation(format!(
                    "router balance of {token} moved from {before} to {held}"
                )));
            }
        }
        let native = ledger.native_balance(self.router);
        if native != self.native {
            return Err(ExchangeError::InvariantViolation(format!(
                "router native balance moved from {} to {native}",
                self.native
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Execution {
    created: Option<Address>,
    funds: Option<Funds>,
    purchase: Option<Purchase>,
    holdings: Holdings,
}

/// Composes swaps, curve trades, and locks into single all-or-nothing
/// calls. Every call leaves the router's balances as it found them; anything
/// sent to it outside a call stays untouched.
#[derive(Debug, Clone, Copy)]
pub struct Router {
    address: Address,
    deadline_window: u64,
}

impl Router {
    pub fn new(address: Address, deadline_window: u64) -> Self {
        Self {
            address,
            deadline_window,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Runs `phases` in order on behalf of `caller`. The caller wraps this
    /// in a transactional scope; an error leaves partial effects behind.
    pub fn execute<Y, S, V, R>(
        &self,
        ctx: &mut Context<'_, Y, S, V, R>,
        caller: Address,
        phases: &[Phase],
    ) -> Result<Purchase, ExchangeError>
    where
        Y: YieldAdapter,
        S: Swapper,
        V: Vault,
        R: Registry,
    {
        let mut run = Execution {
            created: None,
            funds: None,
            purchase: None,
            holdings: Holdings::open(ctx.ledger, self.address),
        };
        for phase in phases {
            tracing::debug!(?phase, "router phase");
            match phase {
                Phase::Create { name, market } => {
                    let info = ctx.exchange.list_token(ctx.ledger, ctx.registry, name, *market)?;
                    run.created = Some(info.address);
                }
                Phase::Fund(funding) => {
                    let input = funding_input(ctx.ledger, ctx.exchange.reserve_asset(), *funding)?;
                    run.holdings.record(ctx.ledger, input);
                    run.holdings.record(ctx.ledger, ctx.exchange.reserve_asset());
                    run.funds = Some(self.fund(ctx, caller, *funding)?);
                }
                Phase::Purchase { token, amount, fallback } => {
                    let token = token
                        .or(run.created)
                        .ok_or(ExchangeError::MalformedPlan("purchase without a token"))?;
                    let funds = run.funds.ok_or(ExchangeError::MalformedPlan("purchase before funding"))?;
                    run.holdings.record(ctx.ledger, token);
                    run.purchase = Some(self.purchase(ctx, caller, funds, token, *amount, *fallback)?);
                }
                Phase::Deliver { recipient, lock } => {
                    let purchase = run
                        .purchase
                        .as_mut()
                        .ok_or(ExchangeError::MalformedPlan("delivery before purchase"))?;
                    if *lock {
                        ctx.ledger
                            .approve(purchase.token, self.address, ctx.vault.address(), purchase.amount)?;
                        ctx.vault.lock(
                            ctx.ledger,
                            self.address,
                            purchase.token,
                            *recipient,
                            purchase.amount,
                            ctx.now,
                        )?;
                    } else {
                        ctx.ledger
                            .transfer(purchase.token, self.address, *recipient, purchase.amount)?;
                    }
                    purchase.locked = *lock;
                }
                Phase::Refund => {
                    let funds = run.funds.ok_or(ExchangeError::MalformedPlan("refund without funding"))?;
                    let refunded = self.refund(ctx.ledger, caller, funds, &run.holdings)?;
                    if let Some(purchase) = run.purchase.as_mut() {
                        purchase.refunded = refunded;
                    }
                }
            }
        }
        run.holdings.check(ctx.ledger)?;
        run.purchase.ok_or(ExchangeError::MalformedPlan("no purchase"))
    }

    /// Sells `amount` of `token` taken from `caller` and converts the
    /// proceeds into `output` for `recipient`.
    #[allow(clippy::too_many_arguments)]
    pub fn sell_and_convert<Y, S, V, R>(
        &self,
        ctx: &mut Context<'_, Y, S, V, R>,
        caller: Address,
        output: Asset,
        token: Address,
        amount: u128,
        min_output: u128,
        recipient: Address,
    ) -> Result<Sale, ExchangeError>
    where
        Y: YieldAdapter,
        S: Swapper,
        V: Vault,
        R: Registry,
    {
        if amount == 0 {
            return Err(ExchangeError::ZeroAmount);
        }
        let reserve = ctx.exchange.reserve_asset();
        let out_token = match output {
            Asset::Native => ctx.ledger.wrapped_native().ok_or(LedgerError::NoWrappedNative)?,
            Asset::Token(asset) => asset,
        };
        let mut holdings = Holdings::open(ctx.ledger, self.address);
        for touched in [token, reserve, out_token] {
            holdings.record(ctx.ledger, touched);
        }

        ctx.ledger.transfer_from(token, self.address, caller, self.address, amount)?;
        let proceeds = ctx
            .exchange
            .sell(ctx.ledger, &*ctx.registry, self.address, token, amount, 0, self.address)?
            .net;

        let converted = if out_token == reserve {
            proceeds
        } else {
            let path = route(ctx.ledger, &*ctx.swapper, reserve, out_token)
                .ok_or(ExchangeError::UnsupportedAsset(out_token))?;
            ctx.ledger.approve(reserve, self.address, ctx.swapper.address(), proceeds)?;
            let order = self.order(&path, ctx.now);
            ctx.swapper.swap_exact_in(ctx.ledger, proceeds, 0, order)?
        };
        tracing::debug!(proceeds, converted, min_output, "sell and convert quote");
        if converted < min_output {
            return Err(ExchangeError::SlippageTooHigh("sellAndConvert"));
        }

        match output {
            Asset::Native => {
                ctx.ledger.unwrap_native(self.address, converted)?;
                ctx.ledger.transfer_native(self.address, recipient, converted)?;
            }
            Asset::Token(_) => ctx.ledger.transfer(out_token, self.address, recipient, converted)?,
        }
        holdings.check(ctx.ledger)?;
        Ok(Sale {
            proceeds,
            output: converted,
        })
    }

    fn fund<Y, S, V, R>(
        &self,
        ctx: &mut Context<'_, Y, S, V, R>,
        caller: Address,
        funding: Funding,
    ) -> Result<Funds, ExchangeError>
    where
        Y: YieldAdapter,
    {
        let input = funding_input(ctx.ledger, ctx.exchange.reserve_asset(), funding)?;
        let budget = match funding {
            Funding::Native { value, max_input } => {
                ctx.ledger.call_with_native(caller, self.address, value)?;
                let budget = value.min(max_input);
                ctx.ledger.wrap_native(self.address, budget)?;
                budget
            }
            Funding::Token { max_input, .. } => {
                ctx.ledger.transfer_from(input, self.address, caller, self.address, max_input)?;
                max_input
            }
            Funding::Reserve { max_cost } => max_cost,
        };
        let funds = Funds { funding, input, budget };
        tracing::debug!(input = %funds.input, budget = funds.budget, "router funded");
        Ok(funds)
    }

    fn purchase<Y, S, V, R>(
        &self,
        ctx: &mut Context<'_, Y, S, V, R>,
        caller: Address,
        funds: Funds,
        token: Address,
        amount: u128,
        fallback: u128,
    ) -> Result<Purchase, ExchangeError>
    where
        Y: YieldAdapter,
        S: Swapper,
        R: Registry,
    {
        let reserve = ctx.exchange.reserve_asset();
        let path = if funds.input == reserve {
            None
        } else {
            Some(route(ctx.ledger, &*ctx.swapper, funds.input, reserve).ok_or(ExchangeError::UnsupportedAsset(funds.input))?)
        };
        let state = *ctx.exchange.token_state(token)?;
        let config = ctx.registry.market_config(state.market)?.clone();
        let needs = |amount: u128| required_input(&*ctx.swapper, &config, state.supply, amount, path.as_deref());

        let first = needs(amount);
        let (amount, quote, required, used_fallback) = match first {
            Some((quote, required)) if required <= funds.budget => (amount, quote, required, false),
            _ => {
                let second = (fallback > 0 && fallback < amount).then(|| needs(fallback)).flatten();
                match second {
                    Some((quote, required)) if required <= funds.budget => (fallback, quote, required, true),
                    _ => {
                        return Err(ExchangeError::InsufficientInput {
                            required: second.or(first).map_or(u128::MAX, |(_, required)| required),
                            available: funds.budget,
                        })
                    }
                }
            }
        };
        tracing::debug!(%token, amount, cost = quote.total, required, used_fallback, "router purchase");

        let spent = match (funds.funding, &path) {
            (Funding::Reserve { .. }, _) => {
                ctx.ledger
                    .transfer_from(reserve, self.address, caller, self.address, quote.total)?;
                quote.total
            }
            (_, None) => quote.total,
            (_, Some(path)) => {
                ctx.ledger.approve(funds.input, self.address, ctx.swapper.address(), required)?;
                let order = self.order(path, ctx.now);
                ctx.swapper.swap_exact_out(ctx.ledger, quote.total, required, order)?
            }
        };

        ctx.ledger
            .approve(reserve, self.address, ctx.exchange.address(), quote.total)?;
        let cost = ctx.exchange.buy(
            ctx.ledger,
            &*ctx.registry,
            self.address,
            token,
            amount,
            quote.total,
            self.address,
        )?;
        Ok(Purchase {
            token,
            amount,
            cost: cost.total,
            input_spent: spent,
            refunded: 0,
            locked: false,
            used_fallback,
        })
    }

    /// Returns whatever of the input the call brought in and did not spend.
    fn refund(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        funds: Funds,
        holdings: &Holdings,
    ) -> Result<u128, ExchangeError> {
        let refunded = match funds.funding {
            Funding::Native { .. } => {
                let wrapped = holdings.gained(ledger, funds.input);
                if wrapped > 0 {
                    ledger.unwrap_native(self.address, wrapped)?;
                }
                let native = holdings.native_gained(ledger);
                ledger.transfer_native(self.address, caller, native)?;
                native
            }
            Funding::Token { asset, .. } => {
                let left = holdings.gained(ledger, asset);
                ledger.transfer(asset, self.address, caller, left)?;
                left
            }
            Funding::Reserve { .. } => 0,
        };
        Ok(refunded)
    }

    fn order<'p>(&self, path: &'p [Address], now: u64) -> SwapOrder<'p> {
        SwapOrder {
            caller: self.address,
            path,
            recipient: self.address,
            deadline: now.saturating_add(self.deadline_window),
            now,
        }
    }
}

/// Asset a funding source puts in the router's hands.
fn funding_input(ledger: &Ledger, reserve: Address, funding: Funding) -> Result<Address, ExchangeError> {
    match funding {
        Funding::Native { .. } => Ok(ledger.wrapped_native().ok_or(LedgerError::NoWrappedNative)?),
        Funding::Token { asset, .. } => Ok(asset),
        Funding::Reserve { .. } => Ok(reserve),
    }
}

/// Swap path from `from` to `to`: the direct pair, else through the wrapped
/// native asset.
pub fn route<S: Swapper>(ledger: &Ledger, swapper: &S, from: Address, to: Address) -> Option<Vec<Address>> {
    if swapper.has_pair(from, to) {
        return Some(vec![from, to]);
    }
    let wrapped = ledger.wrapped_native()?;
    (wrapped != from && wrapped != to && swapper.has_pair(from, wrapped) && swapper.has_pair(wrapped, to))
        .then(|| vec![from, wrapped, to])
}

/// Curve cost of `amount` and the input needed to cover it. `None` when the
/// swap cannot produce the cost at all.
fn required_input<S: Swapper>(
    swapper: &S,
    config: &MarketConfig,
    supply: u128,
    amount: u128,
    path: Option<&[Address]>,
) -> Option<(CostBreakdown, u128)> {
    let quote = exchange::costs_for_buying(config, supply, amount).ok()?;
    let input = match path {
        None => quote.total,
        Some(path) => swapper.quote_in(quote.total, path).ok()?,
    };
    Some((quote, input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_market_shared::address::labeled;

    #[test]
    fn plan_orders_phases() {
        let token = labeled("token");
        let user = labeled("user");
        let phases = CompositePlan::existing(token, Funding::Reserve { max_cost: 10 })
            .amount(5, 4)
            .deliver_to(user, true)
            .into_phases()
            .unwrap();
        assert_eq!(
            phases,
            vec![
                Phase::Fund(Funding::Reserve { max_cost: 10 }),
                Phase::Purchase {
                    token: Some(token),
                    amount: 5,
                    fallback: 4
                },
                Phase::Deliver {
                    recipient: user,
                    lock: true
                },
                Phase::Refund,
            ]
        );

        let created = CompositePlan::create("test.com", 1, Funding::Reserve { max_cost: 10 })
            .amount(5, 5)
            .deliver_to(user, false)
            .into_phases()
            .unwrap();
        assert_eq!(
            created[0],
            Phase::Create {
                name: "test.com".into(),
                market: 1
            }
        );
        assert!(matches!(created[2], Phase::Purchase { token: None, .. }));
    }

    #[test]
    fn plan_rejects_bad_amounts() {
        let plan = CompositePlan::existing(labeled("token"), Funding::Reserve { max_cost: 10 });
        assert!(matches!(
            plan.clone().amount(4, 5).deliver_to(Address::ZERO, false).into_phases(),
            Err(ExchangeError::InvalidFallback { .. })
        ));
        assert!(matches!(
            plan.clone().amount(0, 0).deliver_to(Address::ZERO, false).into_phases(),
            Err(ExchangeError::ZeroAmount)
        ));
        assert!(matches!(
            plan.amount(1, 0).into_phases(),
            Err(ExchangeError::MalformedPlan(_))
        ));
    }

    #[test]
    fn holdings_compare_against_the_opening_balance() {
        let router = labeled("router");
        let dai = labeled("dai");
        let mut ledger = Ledger::new();
        ledger.register(dai, "DAI", None).unwrap();
        ledger.mint(dai, router, router, 7).unwrap();

        let mut holdings = Holdings::open(&ledger, router);
        holdings.record(&ledger, dai);
        ledger.mint(dai, router, router, 5).unwrap();
        holdings.record(&ledger, dai);
        assert_eq!(holdings.gained(&ledger, dai), 5);
        assert!(matches!(holdings.check(&ledger), Err(ExchangeError::InvariantViolation(_))));

        ledger.burn(dai, router, router, 5).unwrap();
        holdings.check(&ledger).unwrap();
    }
}
