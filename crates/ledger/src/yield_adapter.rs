use std::collections::HashMap;

use alloy_primitives::Address;
use curve_market_shared::math::{self, Rounding, UNIT};

use crate::error::LedgerError;
use crate::token::Ledger;

/// Result of a share conversion: shares minted or burnt and the underlying
/// that actually moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub shares: u128,
    pub underlying: u128,
}

/// Interest-bearing venue the reserve asset is parked in.
pub trait YieldAdapter: Clone {
    fn address(&self) -> Address;

    fn underlying(&self) -> Address;

    /// Underlying per share, scaled by `UNIT`.
    fn exchange_rate(&self) -> u128;

    /// Shares `deposit(amount)` would credit.
    fn shares_for_deposit(&self, amount: u128) -> Result<u128, LedgerError>;

    /// Shares `redeem(amount)` would burn.
    fn shares_for_redeem(&self, amount: u128) -> Result<u128, LedgerError>;

    /// Underlying redeemable for `shares` at the current rate.
    fn value_of(&self, shares: u128) -> Result<u128, LedgerError>;

    fn shares_of(&self, holder: Address) -> u128;

    /// Underlying the adapter holds.
    fn cash(&self, ledger: &Ledger) -> u128;

    /// Credits `from` with the shares `amount` buys and pulls only the
    /// underlying those shares are worth (at most `amount`). `from` must have
    /// approved the adapter.
    fn deposit(&mut self, ledger: &mut Ledger, from: Address, amount: u128) -> Result<Conversion, LedgerError>;

    /// Burns enough of `holder`'s shares to cover `amount` and pays out what
    /// they were worth (at least `amount`).
    fn redeem(&mut self, ledger: &mut Ledger, holder: Address, amount: u128) -> Result<Conversion, LedgerError>;
}

/// cToken-style adapter with a monotonically increasing exchange rate.
///
/// Conversions round in the adapter's favour: deposits mint shares rounded
/// down and redemptions burn shares rounded up. Underlying moves by exactly
/// the change in `value_of(total_shares)`, so cash always equals the value of
/// the outstanding shares.
#[derive(Debug, Clone)]
pub struct CTokenAdapter {
    address: Address,
    underlying: Address,
    exchange_rate: u128,
    shares: HashMap<Address, u128>,
    total_shares: u128,
}

impl CTokenAdapter {
    pub fn new(address: Address, underlying: Address, exchange_rate: u128) -> Self {
        Self {
            address,
            underlying,
            exchange_rate: exchange_rate.max(1),
            shares: HashMap::new(),
            total_shares: 0,
        }
    }

    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    /// Raises the exchange rate and mints the interest it implies into the
    /// adapter. Returns the interest minted.
    pub fn accrue(&mut self, ledger: &mut Ledger, new_rate: u128) -> Result<u128, LedgerError> {
        if new_rate < self.exchange_rate {
            return Err(LedgerError::RateDecrease {
                current: self.exchange_rate,
                proposed: new_rate,
            });
        }
        let before = self.value_of(self.total_shares)?;
        self.exchange_rate = new_rate;
        let after = self.value_of(self.total_shares)?;
        let interest = math::sub(after, before)?;
        if interest > 0 {
            ledger.mint(self.underlying, self.address, self.address, interest)?;
        }
        Ok(interest)
    }
}

impl YieldAdapter for CTokenAdapter {
    fn address(&self) -> Address {
        self.address
    }

    fn underlying(&self) -> Address {
        self.underlying
    }

    fn exchange_rate(&self) -> u128 {
        self.exchange_rate
    }

    fn shares_for_deposit(&self, amount: u128) -> Result<u128, LedgerError> {
        Ok(math::mul_div(amount, UNIT, self.exchange_rate, Rounding::Down)?)
    }

    fn shares_for_redeem(&self, amount: u128) -> Result<u128, LedgerError> {
        Ok(math::mul_div(amount, UNIT, self.exchange_rate, Rounding::Up)?)
    }

    fn value_of(&self, shares: u128) -> Result<u128, LedgerError> {
        Ok(math::mul_div(shares, self.exchange_rate, UNIT, Rounding::Down)?)
    }

    fn shares_of(&self, holder: Address) -> u128 {
        self.shares.get(&holder).copied().unwrap_or(0)
    }

    fn cash(&self, ledger: &Ledger) -> u128 {
        ledger.balance_of(self.underlying, self.address)
    }

    fn deposit(&mut self, ledger: &mut Ledger, from: Address, amount: u128) -> Result<Conversion, LedgerError> {
        let minted = self.shares_for_deposit(amount)?;
        let total = math::add(self.total_shares, minted)?;
        let taken = math::sub(self.value_of(total)?, self.value_of(self.total_shares)?)?;
        if taken > 0 {
            ledger.transfer_from(self.underlying, self.address, from, self.address, taken)?;
        }
        let held = self.shares.entry(from).or_insert(0);
        *held = math::add(*held, minted)?;
        self.total_shares = total;
        Ok(Conversion {
            shares: minted,
            underlying: taken,
        })
    }

    fn redeem(&mut self, ledger: &mut Ledger, holder: Address, amount: u128) -> Result<Conversion, LedgerError> {
        let held = self.shares_of(holder);
        let burned = self.shares_for_redeem(amount)?;
        if burned > held {
            return Err(LedgerError::InsufficientShares { requested: burned, held });
        }
        let total = math::sub(self.total_shares, burned)?;
        let paid = math::sub(self.value_of(self.total_shares)?, self.value_of(total)?)?;
        let available = self.cash(ledger);
        if available < paid {
            return Err(LedgerError::InsufficientCash {
                requested: paid,
                available,
            });
        }
        self.shares.insert(holder, held - burned);
        self.total_shares = total;
        ledger.transfer(self.underlying, self.address, holder, paid)?;
        Ok(Conversion {
            shares: burned,
            underlying: paid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_market_shared::address::labeled;

    fn setup(rate: u128) -> (Ledger, CTokenAdapter, Address) {
        let mut ledger = Ledger::new();
        let dai = labeled("dai");
        let holder = labeled("reserve");
        ledger.register(dai, "DAI", None).unwrap();
        ledger.mint(dai, holder, holder, 1_000 * UNIT).unwrap();
        let adapter = CTokenAdapter::new(labeled("cdai"), dai, rate);
        ledger.approve(dai, holder, adapter.address(), u128::MAX).unwrap();
        (ledger, adapter, holder)
    }

    #[test]
    fn conversions_round_against_the_holder_at_awkward_rates() {
        let (mut ledger, mut adapter, holder) = setup(UNIT + UNIT / 3);
        for amount in [7, 1_000_003, 3 * UNIT + 1, 17] {
            let deposited = adapter.deposit(&mut ledger, holder, amount).unwrap();
            assert!(deposited.underlying <= amount);
            assert_eq!(adapter.cash(&ledger), adapter.value_of(adapter.total_shares()).unwrap());
        }
        for amount in [5, 999_999, 2 * UNIT] {
            let redeemed = adapter.redeem(&mut ledger, holder, amount).unwrap();
            assert!(redeemed.underlying >= amount);
            assert_eq!(adapter.cash(&ledger), adapter.value_of(adapter.total_shares()).unwrap());
        }
    }

    #[test]
    fn dust_redemptions_always_burn_shares() {
        let (mut ledger, mut adapter, holder) = setup(UNIT);
        adapter.deposit(&mut ledger, holder, 100 * UNIT).unwrap();
        adapter.accrue(&mut ledger, UNIT + UNIT / 2).unwrap();

        for _ in 0..2_000 {
            let before = adapter.shares_of(holder);
            let redeemed = adapter.redeem(&mut ledger, holder, 1).unwrap();
            assert_eq!(redeemed.shares, 1);
            assert_eq!(adapter.shares_of(holder), before - 1);
            assert!(adapter.cash(&ledger) >= adapter.value_of(adapter.shares_of(holder)).unwrap());
        }
        assert_eq!(adapter.cash(&ledger), adapter.value_of(adapter.total_shares()).unwrap());
    }

    #[test]
    fn accrual_mints_interest_and_never_lowers_rate() {
        let (mut ledger, mut adapter, holder) = setup(UNIT);
        adapter.deposit(&mut ledger, holder, 100 * UNIT).unwrap();

        let interest = adapter.accrue(&mut ledger, UNIT + UNIT / 20).unwrap();
        assert_eq!(interest, 5 * UNIT);
        assert_eq!(adapter.cash(&ledger), 105 * UNIT);
        assert_eq!(adapter.value_of(adapter.shares_of(holder)).unwrap(), 105 * UNIT);

        assert!(matches!(
            adapter.accrue(&mut ledger, UNIT),
            Err(LedgerError::RateDecrease { .. })
        ));
    }

    #[test]
    fn redeem_beyond_holding_fails() {
        let (mut ledger, mut adapter, holder) = setup(UNIT);
        adapter.deposit(&mut ledger, holder, 10 * UNIT).unwrap();
        assert!(matches!(
            adapter.redeem(&mut ledger, holder, 10 * UNIT + 1),
            Err(LedgerError::InsufficientShares { .. })
        ));
        adapter.redeem(&mut ledger, holder, 10 * UNIT).unwrap();
        assert_eq!(adapter.shares_of(holder), 0);
    }
}
