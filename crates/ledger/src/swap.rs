use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use curve_market_shared::math::{self, Rounding};

use crate::error::LedgerError;
use crate::token::Ledger;

const FEE_NUMERATOR: u128 = 997;
const FEE_DENOMINATOR: u128 = 1_000;

/// Who is swapping, where the output goes, and until when the quote is acceptable.
#[derive(Debug, Clone, Copy)]
pub struct SwapOrder<'a> {
    pub caller: Address,
    pub path: &'a [Address],
    pub recipient: Address,
    pub deadline: u64,
    pub now: u64,
}

/// External constant-product swap router.
///
/// Inputs are pulled from `caller` with `transfer_from`, so the caller must
/// have approved [`Swapper::address`] beforehand.
pub trait Swapper: Clone {
    fn address(&self) -> Address;

    fn has_pair(&self, a: Address, b: Address) -> bool;

    /// Output received for exactly `amount_in` along `path`.
    fn quote_out(&self, amount_in: u128, path: &[Address]) -> Result<u128, LedgerError>;

    /// Input required to receive exactly `amount_out` along `path`.
    fn quote_in(&self, amount_out: u128, path: &[Address]) -> Result<u128, LedgerError>;

    fn swap_exact_in(
        &mut self,
        ledger: &mut Ledger,
        amount_in: u128,
        min_out: u128,
        order: SwapOrder<'_>,
    ) -> Result<u128, LedgerError>;

    /// Returns the input actually spent.
    fn swap_exact_out(
        &mut self,
        ledger: &mut Ledger,
        amount_out: u128,
        max_in: u128,
        order: SwapOrder<'_>,
    ) -> Result<u128, LedgerError>;
}

#[derive(Debug, Clone, Copy, Default)]
struct Pair {
    /// Reserve of the lower address.
    reserve0: u128,
    reserve1: u128,
}

/// Uniswap-v2 style router holding every pair's reserves in one account.
#[derive(Debug, Clone)]
pub struct ConstantProductRouter {
    address: Address,
    pairs: HashMap<(Address, Address), Pair>,
}

impl ConstantProductRouter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            pairs: HashMap::new(),
        }
    }

    pub fn add_liquidity(
        &mut self,
        ledger: &mut Ledger,
        provider: Address,
        token_a: Address,
        token_b: Address,
        amount_a: u128,
        amount_b: u128,
    ) -> Result<(), LedgerError> {
        if token_a == token_b {
            return Err(LedgerError::InvalidPath);
        }
        ledger.transfer(token_a, provider, self.address, amount_a)?;
        ledger.transfer(token_b, provider, self.address, amount_b)?;

        let (key, flipped) = pair_key(token_a, token_b);
        let pair = self.pairs.entry(key).or_default();
        let (add0, add1) = if flipped { (amount_b, amount_a) } else { (amount_a, amount_b) };
        pair.reserve0 = math::add(pair.reserve0, add0)?;
        pair.reserve1 = math::add(pair.reserve1, add1)?;
        Ok(())
    }

    pub fn reserves(&self, token_in: Address, token_out: Address) -> Result<(u128, u128), LedgerError> {
        let (key, flipped) = pair_key(token_in, token_out);
        let pair = self
            .pairs
            .get(&key)
            .ok_or(LedgerError::NoPair(token_in, token_out))?;
        Ok(if flipped {
            (pair.reserve1, pair.reserve0)
        } else {
            (pair.reserve0, pair.reserve1)
        })
    }

    fn amounts_out(&self, amount_in: u128, path: &[Address]) -> Result<Vec<u128>, LedgerError> {
        check_path(path)?;
        let mut amounts = Vec::with_capacity(path.len());
        amounts.push(amount_in);
        for hop in path.windows(2) {
            let (reserve_in, reserve_out) = self.reserves(hop[0], hop[1])?;
            let last = amounts[amounts.len() - 1];
            amounts.push(amount_out(last, reserve_in, reserve_out)?);
        }
        Ok(amounts)
    }

    fn amounts_in(&self, amount_out: u128, path: &[Address]) -> Result<Vec<u128>, LedgerError> {
        check_path(path)?;
        let mut amounts = vec![0u128; path.len()];
        amounts[path.len() - 1] = amount_out;
        for i in (1..path.len()).rev() {
            let (reserve_in, reserve_out) = self.reserves(path[i - 1], path[i])?;
            amounts[i - 1] = amount_in(amounts[i], reserve_in, reserve_out)?;
        }
        Ok(amounts)
    }

    fn settle(
        &mut self,
        ledger: &mut Ledger,
        amounts: &[u128],
        order: SwapOrder<'_>,
    ) -> Result<(), LedgerError> {
        ledger.transfer_from(order.path[0], self.address, order.caller, self.address, amounts[0])?;
        for (i, hop) in order.path.windows(2).enumerate() {
            let (key, flipped) = pair_key(hop[0], hop[1]);
            let pair = self
                .pairs
                .get_mut(&key)
                .ok_or(LedgerError::NoPair(hop[0], hop[1]))?;
            let (reserve_in, reserve_out) = if flipped {
                (&mut pair.reserve1, &mut pair.reserve0)
            } else {
                (&mut pair.reserve0, &mut pair.reserve1)
            };
            *reserve_in = math::add(*reserve_in, amounts[i])?;
            *reserve_out = math::sub(*reserve_out, amounts[i + 1])?;
        }
        let out = amounts[amounts.len() - 1];
        let token_out = order.path[order.path.len() - 1];
        ledger.transfer(token_out, self.address, order.recipient, out)
    }
}

impl Swapper for ConstantProductRouter {
    fn address(&self) -> Address {
        self.address
    }

    fn has_pair(&self, a: Address, b: Address) -> bool {
        a != b && self.pairs.contains_key(&pair_key(a, b).0)
    }

    fn quote_out(&self, amount_in: u128, path: &[Address]) -> Result<u128, LedgerError> {
        let amounts = self.amounts_out(amount_in, path)?;
        Ok(amounts[amounts.len() - 1])
    }

    fn quote_in(&self, amount_out: u128, path: &[Address]) -> Result<u128, LedgerError> {
        Ok(self.amounts_in(amount_out, path)?[0])
    }

    fn swap_exact_in(
        &mut self,
        ledger: &mut Ledger,
        amount_in: u128,
        min_out: u128,
        order: SwapOrder<'_>,
    ) -> Result<u128, LedgerError> {
        check_deadline(&order)?;
        let amounts = self.amounts_out(amount_in, order.path)?;
        let out = amounts[amounts.len() - 1];
        if out < min_out {
            return Err(LedgerError::InsufficientOutput { got: out, min: min_out });
        }
        self.settle(ledger, &amounts, order)?;
        tracing::debug!(amount_in, amount_out = out, hops = order.path.len() - 1, "swap exact in");
        Ok(out)
    }

    fn swap_exact_out(
        &mut self,
        ledger: &mut Ledger,
        amount_out: u128,
        max_in: u128,
        order: SwapOrder<'_>,
    ) -> Result<u128, LedgerError> {
        check_deadline(&order)?;
        let amounts = self.amounts_in(amount_out, order.path)?;
        if amounts[0] > max_in {
            return Err(LedgerError::ExcessiveInput { need: amounts[0], max: max_in });
        }
        self.settle(ledger, &amounts, order)?;
        tracing::debug!(amount_in = amounts[0], amount_out, hops = order.path.len() - 1, "swap exact out");
        Ok(amounts[0])
    }
}

fn pair_key(a: Address, b: Address) -> ((Address, Address), bool) {
    if a < b {
        ((a, b), false)
    } else {
        ((b, a), true)
    }
}

fn check_path(path: &[Address]) -> Result<(), LedgerError> {
    if path.len() < 2 || path.windows(2).any(|hop| hop[0] == hop[1]) {
        return Err(LedgerError::InvalidPath);
    }
    Ok(())
}

fn check_deadline(order: &SwapOrder<'_>) -> Result<(), LedgerError> {
    if order.now > order.deadline {
        return Err(LedgerError::Expired {
            deadline: order.deadline,
            now: order.now,
        });
    }
    Ok(())
}

fn amount_out(amount_in: u128, reserve_in: u128, reserve_out: u128) -> Result<u128, LedgerError> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(LedgerError::InsufficientLiquidity);
    }
    let in_with_fee = U256::from(amount_in) * U256::from(FEE_NUMERATOR);
    let numerator = in_with_fee * U256::from(reserve_out);
    let denominator = U256::from(reserve_in) * U256::from(FEE_DENOMINATOR) + in_with_fee;
    Ok(math::div_wide(numerator, denominator, Rounding::Down)?)
}

fn amount_in(amount_out: u128, reserve_in: u128, reserve_out: u128) -> Result<u128, LedgerError> {
    if reserve_in == 0 || reserve_out <= amount_out {
        return Err(LedgerError::InsufficientLiquidity);
    }
    let numerator = U256::from(reserve_in) * U256::from(amount_out) * U256::from(FEE_DENOMINATOR);
    let denominator = U256::from(reserve_out - amount_out) * U256::from(FEE_NUMERATOR);
    let base = math::div_wide(numerator, denominator, Rounding::Down)?;
    Ok(math::add(base, 1)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_market_shared::address::labeled;
    use curve_market_shared::math::UNIT;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    struct Fixture {
        ledger: Ledger,
        router: ConstantProductRouter,
        weth: Address,
        dai: Address,
        some: Address,
        user: Address,
    }

    fn fixture() -> Fixture {
        let mut ledger = Ledger::new();
        let (weth, dai, some) = (labeled("weth"), labeled("dai"), labeled("some"));
        let (admin, user) = (labeled("admin"), labeled("user"));
        for (token, symbol) in [(weth, "WETH"), (dai, "DAI"), (some, "SOME")] {
            ledger.register(token, symbol, None).unwrap();
            ledger.mint(token, admin, admin, 10_000 * UNIT).unwrap();
        }
        let mut router = ConstantProductRouter::new(labeled("swap-router"));
        router.add_liquidity(&mut ledger, admin, weth, dai, UNIT, 200 * UNIT).unwrap();
        router.add_liquidity(&mut ledger, admin, some, dai, 1_000 * UNIT, 100 * UNIT).unwrap();
        Fixture { ledger, router, weth, dai, some, user }
    }

    fn order(user: Address, path: &[Address]) -> SwapOrder<'_> {
        SwapOrder {
            caller: user,
            path,
            recipient: user,
            deadline: 100,
            now: 0,
        }
    }

    #[test]
    fn quote_matches_constant_product_with_fee() {
        let f = fixture();
        // 0.1 WETH into a 1/200 pool: 0.0997 * 200 / 1.0997 = 18.1322...
        let out = f.router.quote_out(UNIT / 10, &[f.weth, f.dai]).unwrap();
        assert!(out > 18_132 * UNIT / 1_000 && out < 18_133 * UNIT / 1_000, "out={out}");
    }

    #[test]
    fn quote_in_covers_requested_output() {
        let f = fixture();
        let mut rng = Pcg64::seed_from_u64(3);
        for _ in 0..200 {
            let want = rng.gen_range(1..50 * UNIT);
            let path = [f.weth, f.dai];
            let need = f.router.quote_in(want, &path).unwrap();
            let got = f.router.quote_out(need, &path).unwrap();
            assert!(got >= want, "quote_in({want}) = {need} only yields {got}");
        }
    }

    #[test]
    fn exact_out_spends_quoted_input() {
        let mut f = fixture();
        let path = [f.weth, f.dai];
        let want = 3 * UNIT;
        let need = f.router.quote_in(want, &path).unwrap();
        f.ledger.mint(f.weth, f.user, f.user, need).unwrap();
        f.ledger.approve(f.weth, f.user, f.router.address(), need).unwrap();

        let o = order(f.user, &path);
        let spent = f.router.swap_exact_out(&mut f.ledger, want, need, o).unwrap();
        assert_eq!(spent, need);
        assert_eq!(f.ledger.balance_of(f.dai, f.user), want);
        assert_eq!(f.ledger.balance_of(f.weth, f.user), 0);
        assert_eq!(f.router.reserves(f.weth, f.dai).unwrap(), (UNIT + need, 200 * UNIT - want));
    }

    #[test]
    fn multi_hop_and_failure_modes() {
        let mut f = fixture();
        let path = [f.some, f.dai, f.weth];
        let out = f.router.quote_out(10 * UNIT, &path).unwrap();
        assert!(out > 0);

        f.ledger.mint(f.some, f.user, f.user, 10 * UNIT).unwrap();
        f.ledger.approve(f.some, f.user, f.router.address(), 10 * UNIT).unwrap();

        let o = order(f.user, &path);
        let err = f.router.swap_exact_in(&mut f.ledger, 10 * UNIT, out + 1, o).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientOutput { .. }));

        let late = SwapOrder { now: 101, ..o };
        assert!(matches!(
            f.router.swap_exact_in(&mut f.ledger, 10 * UNIT, out, late),
            Err(LedgerError::Expired { .. })
        ));

        assert_eq!(f.router.swap_exact_in(&mut f.ledger, 10 * UNIT, out, o).unwrap(), out);
        assert_eq!(f.ledger.balance_of(f.weth, f.user), out);

        assert!(!f.router.has_pair(f.some, f.weth));
        assert!(matches!(f.router.quote_out(1, &[f.some, f.weth]), Err(LedgerError::NoPair(..))));
        assert!(matches!(f.router.quote_in(200 * UNIT, &[f.weth, f.dai]), Err(LedgerError::InsufficientLiquidity)));
    }
}
