use std::collections::{HashMap, HashSet};

use alloy_primitives::Address;
use curve_market_shared::math;

use crate::error::LedgerError;

/// Asset a caller pays with or asks to be paid in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asset {
    Native,
    Token(Address),
}

#[derive(Debug, Clone)]
struct TokenMeta {
    symbol: String,
    /// Only this account may mint or burn. `None` means freely mintable.
    minter: Option<Address>,
    total_supply: u128,
}

/// Balances of every fungible token plus the native asset.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    tokens: HashMap<Address, TokenMeta>,
    balances: HashMap<(Address, Address), u128>,
    allowances: HashMap<(Address, Address, Address), u128>,
    native: HashMap<Address, u128>,
    /// Accounts that take native value only as part of a call.
    call_only: HashSet<Address>,
    wrapped_native: Option<Address>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, token: Address, symbol: &str, minter: Option<Address>) -> Result<(), LedgerError> {
        if self.tokens.contains_key(&token) {
            return Err(LedgerError::AlreadyRegistered(token));
        }
        self.tokens.insert(
            token,
            TokenMeta {
                symbol: symbol.to_string(),
                minter,
                total_supply: 0,
            },
        );
        Ok(())
    }

    /// Registers `token` as the 1:1 wrapper of the native asset.
    pub fn register_wrapped_native(&mut self, token: Address, symbol: &str) -> Result<(), LedgerError> {
        self.register(token, symbol, None)?;
        self.wrapped_native = Some(token);
        Ok(())
    }

    pub fn wrapped_native(&self) -> Option<Address> {
        self.wrapped_native
    }

    pub fn is_registered(&self, token: Address) -> bool {
        self.tokens.contains_key(&token)
    }

    pub fn symbol(&self, token: Address) -> Option<&str> {
        self.tokens.get(&token).map(|meta| meta.symbol.as_str())
    }

    pub fn total_supply(&self, token: Address) -> u128 {
        self.tokens.get(&token).map_or(0, |meta| meta.total_supply)
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> u128 {
        self.balances.get(&(token, holder)).copied().unwrap_or(0)
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> u128 {
        self.allowances.get(&(token, owner, spender)).copied().unwrap_or(0)
    }

    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: u128) -> Result<(), LedgerError> {
        self.meta(token)?;
        self.allowances.insert((token, owner, spender), amount);
        Ok(())
    }

    pub fn mint(&mut self, token: Address, by: Address, to: Address, amount: u128) -> Result<(), LedgerError> {
        let meta = self.meta_mut(token)?;
        if meta.minter.is_some_and(|minter| minter != by) {
            return Err(LedgerError::Unauthorized { caller: by, action: "mint" });
        }
        meta.total_supply = math::add(meta.total_supply, amount)?;
        let balance = self.balances.entry((token, to)).or_insert(0);
        *balance = math::add(*balance, amount)?;
        Ok(())
    }

    pub fn burn(&mut self, token: Address, by: Address, from: Address, amount: u128) -> Result<(), LedgerError> {
        if self.meta(token)?.minter.is_some_and(|minter| minter != by) {
            return Err(LedgerError::Unauthorized { caller: by, action: "burn" });
        }
        self.debit(token, from, amount)?;
        let meta = self.meta_mut(token)?;
        meta.total_supply = math::sub(meta.total_supply, amount)?;
        Ok(())
    }

    pub fn transfer(&mut self, token: Address, from: Address, to: Address, amount: u128) -> Result<(), LedgerError> {
        self.meta(token)?;
        self.debit(token, from, amount)?;
        let balance = self.balances.entry((token, to)).or_insert(0);
        *balance = math::add(*balance, amount)?;
        Ok(())
    }

    /// Moves `amount` on behalf of `from`, consuming the spender's allowance.
    pub fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if spender != from {
            let approved = self.allowance(token, from, spender);
            if approved < amount {
                return Err(LedgerError::InsufficientAllowance {
                    token,
                    spender,
                    requested: amount,
                    approved,
                });
            }
            self.allowances.insert((token, from, spender), approved - amount);
        }
        self.transfer(token, from, to, amount)
    }

    pub fn native_balance(&self, holder: Address) -> u128 {
        self.native.get(&holder).copied().unwrap_or(0)
    }

    /// Creates native balance out of thin air (genesis allocation).
    pub fn mint_native(&mut self, to: Address, amount: u128) -> Result<(), LedgerError> {
        let balance = self.native.entry(to).or_insert(0);
        *balance = math::add(*balance, amount)?;
        Ok(())
    }

    /// Marks `account` as refusing plain native transfers. Value can still
    /// reach it through `call_with_native`.
    pub fn refuse_plain_native(&mut self, account: Address) {
        self.call_only.insert(account);
    }

    pub fn transfer_native(&mut self, from: Address, to: Address, amount: u128) -> Result<(), LedgerError> {
        if self.call_only.contains(&to) {
            return Err(LedgerError::NativeRefused(to));
        }
        self.move_native(from, to, amount)
    }

    /// Native value attached to a call into `to`.
    pub fn call_with_native(&mut self, from: Address, to: Address, amount: u128) -> Result<(), LedgerError> {
        self.move_native(from, to, amount)
    }

    fn move_native(&mut self, from: Address, to: Address, amount: u128) -> Result<(), LedgerError> {
        let available = self.native_balance(from);
        if available < amount {
            return Err(LedgerError::InsufficientNative {
                holder: from,
                requested: amount,
                available,
            });
        }
        self.native.insert(from, available - amount);
        let balance = self.native.entry(to).or_insert(0);
        *balance = math::add(*balance, amount)?;
        Ok(())
    }

    pub fn wrap_native(&mut self, holder: Address, amount: u128) -> Result<(), LedgerError> {
        let wrapped = self.wrapped_native.ok_or(LedgerError::NoWrappedNative)?;
        let available = self.native_balance(holder);
        if available < amount {
            return Err(LedgerError::InsufficientNative {
                holder,
                requested: amount,
                available,
            });
        }
        self.native.insert(holder, available - amount);
        self.mint(wrapped, holder, holder, amount)
    }

    pub fn unwrap_native(&mut self, holder: Address, amount: u128) -> Result<(), LedgerError> {
        let wrapped = self.wrapped_native.ok_or(LedgerError::NoWrappedNative)?;
        self.burn(wrapped, holder, holder, amount)?;
        self.mint_native(holder, amount)
    }

    fn debit(&mut self, token: Address, holder: Address, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(token, holder);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                token,
                holder,
                requested: amount,
                available,
            });
        }
        self.balances.insert((token, holder), available - amount);
        Ok(())
    }

    fn meta(&self, token: Address) -> Result<&TokenMeta, LedgerError> {
        self.tokens.get(&token).ok_or(LedgerError::UnknownToken(token))
    }

    fn meta_mut(&mut self, token: Address) -> Result<&mut TokenMeta, LedgerError> {
        self.tokens.get_mut(&token).ok_or(LedgerError::UnknownToken(token))
    }
}
