use std::collections::HashMap;

use alloy_primitives::Address;
use curve_market_shared::math;

use crate::error::LedgerError;
use crate::token::Ledger;

pub const DEFAULT_LOCK_DURATION: u64 = 365 * 24 * 60 * 60;

/// Holds tokens on behalf of an owner until they mature.
pub trait Vault: Clone {
    fn address(&self) -> Address;

    /// Pulls `amount` of `token` from `from` (which must have approved the
    /// vault) and credits it to `owner`.
    fn lock(
        &mut self,
        ledger: &mut Ledger,
        from: Address,
        token: Address,
        owner: Address,
        amount: u128,
        now: u64,
    ) -> Result<(), LedgerError>;

    fn locked_balance(&self, token: Address, owner: Address) -> u128;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedEntry {
    pub amount: u128,
    pub locked_until: u64,
}

#[derive(Debug, Clone)]
pub struct LockVault {
    address: Address,
    lock_duration: u64,
    entries: HashMap<(Address, Address), Vec<LockedEntry>>,
}

impl LockVault {
    pub fn new(address: Address, lock_duration: u64) -> Self {
        Self {
            address,
            lock_duration,
            entries: HashMap::new(),
        }
    }

    pub fn entries(&self, token: Address, owner: Address) -> &[LockedEntry] {
        self.entries.get(&(token, owner)).map_or(&[], Vec::as_slice)
    }

    /// Releases every matured entry to `owner` and returns the amount.
    pub fn withdraw_unlocked(
        &mut self,
        ledger: &mut Ledger,
        token: Address,
        owner: Address,
        now: u64,
    ) -> Result<u128, LedgerError> {
        let Some(entries) = self.entries.get_mut(&(token, owner)) else {
            return Ok(0);
        };
        let mut released = 0u128;
        for entry in entries.iter().filter(|e| e.locked_until <= now) {
            released = math::add(released, entry.amount)?;
        }
        entries.retain(|e| e.locked_until > now);
        if released > 0 {
            ledger.transfer(token, self.address, owner, released)?;
        }
        Ok(released)
    }
}

impl Vault for LockVault {
    fn address(&self) -> Address {
        self.address
    }

    fn lock(
        &mut self,
        ledger: &mut Ledger,
        from: Address,
        token: Address,
        owner: Address,
        amount: u128,
        now: u64,
    ) -> Result<(), LedgerError> {
        ledger.transfer_from(token, self.address, from, self.address, amount)?;
        self.entries.entry((token, owner)).or_default().push(LockedEntry {
            amount,
            locked_until: now.saturating_add(self.lock_duration),
        });
        Ok(())
    }

    fn locked_balance(&self, token: Address, owner: Address) -> u128 {
        self.entries(token, owner).iter().map(|e| e.amount).sum()
    }
}
