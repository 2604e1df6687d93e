use alloy_primitives::Address;
use curve_market_ledger::{Conversion, Ledger, LedgerError, YieldAdapter};
use curve_market_shared::math;

use crate::error::ExchangeError;

/// Custodian of all curve principal, parked in a yield adapter.
///
/// Holds adapter shares in its own account, plus `idle` change the adapter's
/// rounding left behind. Principal (`total_invested`) is always redeemable;
/// anything the shares and idle cash are worth beyond it is surplus.
#[derive(Debug, Clone)]
pub struct YieldReserve<Y> {
    address: Address,
    owner: Address,
    adapter: Y,
    total_invested: u128,
    total_shares: u128,
    idle: u128,
}

impl<Y: YieldAdapter> YieldReserve<Y> {
    pub fn new(address: Address, owner: Address, adapter: Y) -> Self {
        Self {
            address,
            owner,
            adapter,
            total_invested: 0,
            total_shares: 0,
            idle: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn asset(&self) -> Address {
        self.adapter.underlying()
    }

    pub fn adapter(&self) -> &Y {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut Y {
        &mut self.adapter
    }

    pub fn total_invested(&self) -> u128 {
        self.total_invested
    }

    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    pub fn idle(&self) -> u128 {
        self.idle
    }

    pub fn redeemable_value(&self) -> Result<u128, ExchangeError> {
        Ok(math::add(self.adapter.value_of(self.total_shares)?, self.idle)?)
    }

    pub fn accrued_surplus(&self) -> Result<u128, ExchangeError> {
        let redeemable = self.redeemable_value()?;
        redeemable.checked_sub(self.total_invested).ok_or_else(|| {
            ExchangeError::InvariantViolation(format!(
                "redeemable {redeemable} below invested {}",
                self.total_invested
            ))
        })
    }

    /// Moves `amount` of the reserve asset from `from` into the adapter as
    /// principal. Returns the shares credited.
    pub fn deposit(&mut self, ledger: &mut Ledger, from: Address, amount: u128) -> Result<u128, ExchangeError> {
        if amount == 0 {
            return Ok(0);
        }
        let asset = self.asset();
        let expected = self.adapter.shares_for_deposit(amount)?;

        ledger.transfer(asset, from, self.address, amount)?;
        ledger.approve(asset, self.address, self.adapter.address(), amount)?;
        let minted = self.adapter.deposit(ledger, self.address, amount)?;
        ledger.approve(asset, self.address, self.adapter.address(), 0)?;
        if minted.shares != expected {
            return Err(ExchangeError::InvariantViolation(format!(
                "adapter minted {} shares, expected {expected}",
                minted.shares
            )));
        }
        self.total_invested = math::add(self.total_invested, amount)?;
        self.total_shares = math::add(self.total_shares, minted.shares)?;
        self.idle = math::add(self.idle, math::sub(amount, minted.underlying)?)?;
        self.check_redeemable()?;
        Ok(minted.shares)
    }

    /// Withdraws `amount` of principal from the adapter and pays it to `to`.
    pub fn redeem(&mut self, ledger: &mut Ledger, amount: u128, to: Address) -> Result<(), ExchangeError> {
        if amount == 0 {
            return Ok(());
        }
        if amount > self.total_invested {
            return Err(ExchangeError::InsufficientReserve {
                requested: amount,
                reason: format!("only {} invested", self.total_invested),
            });
        }
        self.release(ledger, amount)?;
        self.total_invested -= amount;

        ledger.transfer(self.asset(), self.address, to, amount)?;
        self.check_redeemable()
    }

    /// Pays accrued surplus to `recipient`. Owner only.
    pub fn withdraw_surplus(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        amount: u128,
        recipient: Address,
    ) -> Result<(), ExchangeError> {
        if caller != self.owner {
            return Err(ExchangeError::Unauthorized { caller });
        }
        let available = self.accrued_surplus()?;
        if amount > available {
            return Err(ExchangeError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        self.release(ledger, amount)?;

        ledger.transfer(self.asset(), self.address, recipient, amount)?;
        self.check_redeemable()?;
        tracing::info!(amount, %recipient, "surplus withdrawn");
        Ok(())
    }

    pub fn check_redeemable(&self) -> Result<(), ExchangeError> {
        self.accrued_surplus().map(|_| ())
    }

    /// Checks that real balances, not just share values, cover principal:
    /// the reserve holds its idle cash and the adapter's cash plus idle
    /// covers `total_invested`.
    pub fn check_backing(&self, ledger: &Ledger) -> Result<(), ExchangeError> {
        let held = ledger.balance_of(self.asset(), self.address);
        if held < self.idle {
            return Err(ExchangeError::InvariantViolation(format!(
                "reserve holds {held}, idle cash is {}",
                self.idle
            )));
        }
        let cash = self.adapter.cash(ledger);
        if math::add(cash, self.idle)? < self.total_invested {
            return Err(ExchangeError::InvariantViolation(format!(
                "adapter cash {cash} plus idle {} below invested {}",
                self.idle, self.total_invested
            )));
        }
        Ok(())
    }

    /// Makes `amount` available in the reserve's own account, spending idle
    /// cash first and redeeming shares for the rest.
    fn release(&mut self, ledger: &mut Ledger, amount: u128) -> Result<(), ExchangeError> {
        let from_idle = self.idle.min(amount);
        let needed = amount - from_idle;
        if needed > 0 {
            let redeemed = self.pull_from_adapter(ledger, needed)?;
            self.total_shares = math::sub(self.total_shares, redeemed.shares)?;
            self.idle = math::add(self.idle, math::sub(redeemed.underlying, needed)?)?;
        }
        self.idle -= from_idle;
        Ok(())
    }

    fn pull_from_adapter(&mut self, ledger: &mut Ledger, amount: u128) -> Result<Conversion, ExchangeError> {
        self.adapter
            .redeem(ledger, self.address, amount)
            .map_err(|err| match err {
                LedgerError::InsufficientCash { .. } | LedgerError::InsufficientShares { .. } => {
                    ExchangeError::InsufficientReserve {
                        requested: amount,
                        reason: err.to_string(),
                    }
                }
                other => other.into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_market_ledger::CTokenAdapter;
    use curve_market_shared::address::labeled;
    use curve_market_shared::math::UNIT;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    fn setup(rate: u128) -> (Ledger, YieldReserve<CTokenAdapter>, Address) {
        let mut ledger = Ledger::new();
        let dai = labeled("dai");
        let exchange = labeled("exchange");
        ledger.register(dai, "DAI", None).unwrap();
        ledger.mint(dai, exchange, exchange, 1_000_000 * UNIT).unwrap();
        let adapter = CTokenAdapter::new(labeled("cdai"), dai, rate);
        let reserve = YieldReserve::new(labeled("reserve"), labeled("owner"), adapter);
        (ledger, reserve, exchange)
    }

    #[test]
    fn principal_stays_redeemable_through_random_flows() {
        let (mut ledger, mut reserve, exchange) = setup(UNIT);
        let mut rng = Pcg64::seed_from_u64(3);
        let mut rate = UNIT;
        for _ in 0..500 {
            if rng.gen_bool(0.6) || reserve.total_invested() == 0 {
                reserve.deposit(&mut ledger, exchange, rng.gen_range(1..100 * UNIT)).unwrap();
            } else {
                let amount = rng.gen_range(1..=reserve.total_invested());
                reserve.redeem(&mut ledger, amount, exchange).unwrap();
            }
            rate += rng.gen_range(0..UNIT / 1_000);
            reserve.adapter_mut().accrue(&mut ledger, rate).unwrap();
            assert!(reserve.redeemable_value().unwrap() >= reserve.total_invested());
            reserve.check_backing(&ledger).unwrap();
        }
        let invested = reserve.total_invested();
        reserve.redeem(&mut ledger, invested, exchange).unwrap();
        assert_eq!(reserve.total_invested(), 0);
    }

    #[test]
    fn surplus_is_owner_gated_and_bounded() {
        let (mut ledger, mut reserve, exchange) = setup(UNIT);
        let owner = reserve.owner();
        reserve.deposit(&mut ledger, exchange, 100 * UNIT).unwrap();
        reserve.adapter_mut().accrue(&mut ledger, UNIT + UNIT / 10).unwrap();
        assert_eq!(reserve.accrued_surplus().unwrap(), 10 * UNIT);

        assert!(matches!(
            reserve.withdraw_surplus(&mut ledger, exchange, UNIT, exchange),
            Err(ExchangeError::Unauthorized { .. })
        ));
        assert!(matches!(
            reserve.withdraw_surplus(&mut ledger, owner, 10 * UNIT + 1, owner),
            Err(ExchangeError::InsufficientBalance { .. })
        ));
        reserve.withdraw_surplus(&mut ledger, owner, 4 * UNIT, owner).unwrap();
        assert_eq!(ledger.balance_of(reserve.asset(), owner), 4 * UNIT);
        assert_eq!(reserve.total_invested(), 100 * UNIT);
        assert_eq!(reserve.accrued_surplus().unwrap(), 6 * UNIT);
        reserve.check_backing(&ledger).unwrap();
    }

    #[test]
    fn dust_surplus_withdrawals_drain_only_surplus() {
        let (mut ledger, mut reserve, exchange) = setup(UNIT);
        let owner = reserve.owner();
        reserve.deposit(&mut ledger, exchange, 100 * UNIT).unwrap();
        reserve.adapter_mut().accrue(&mut ledger, UNIT + UNIT / 2).unwrap();
        let surplus = reserve.accrued_surplus().unwrap();

        for withdrawn in 1..=2_000u128 {
            reserve.withdraw_surplus(&mut ledger, owner, 1, owner).unwrap();
            assert_eq!(reserve.accrued_surplus().unwrap(), surplus - withdrawn);
            reserve.check_backing(&ledger).unwrap();
        }
        assert_eq!(ledger.balance_of(reserve.asset(), owner), 2_000);

        let invested = reserve.total_invested();
        reserve.redeem(&mut ledger, invested, exchange).unwrap();
        assert_eq!(reserve.total_invested(), 0);
        assert_eq!(reserve.accrued_surplus().unwrap(), surplus - 2_000);
    }

    #[test]
    fn deposits_below_one_share_stay_idle_and_redeemable() {
        let (mut ledger, mut reserve, exchange) = setup(UNIT);
        reserve.deposit(&mut ledger, exchange, 10 * UNIT).unwrap();
        reserve.adapter_mut().accrue(&mut ledger, 3 * UNIT).unwrap();

        assert_eq!(reserve.deposit(&mut ledger, exchange, 2).unwrap(), 0);
        assert_eq!(reserve.idle(), 2);
        assert_eq!(ledger.balance_of(reserve.asset(), reserve.address()), 2);
        reserve.check_backing(&ledger).unwrap();

        reserve.redeem(&mut ledger, 10 * UNIT + 2, exchange).unwrap();
        assert_eq!(reserve.total_invested(), 0);
        reserve.check_backing(&ledger).unwrap();
    }

    #[test]
    fn redeeming_more_than_principal_fails() {
        let (mut ledger, mut reserve, exchange) = setup(UNIT);
        reserve.deposit(&mut ledger, exchange, 5 * UNIT).unwrap();
        assert!(matches!(
            reserve.redeem(&mut ledger, 5 * UNIT + 1, exchange),
            Err(ExchangeError::InsufficientReserve { .. })
        ));
    }
}
