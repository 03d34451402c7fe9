// 9.3 liquidity.rs: AMM pool boundary. the engine routes order and user swaps
// through `PoolRouter`; swap-quote math belongs to the pool, not to us.
// amounts crossing this trait are 8-digit ledger units along a path of assets.

use std::collections::HashMap;

use crate::custody::{CustodyError, TokenBridge};
use crate::types::{Amount, AssetId, Price};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("swap path needs at least two assets")]
    InvalidPath,

    #[error("no pool between {from} and {to}")]
    NoRoute { from: AssetId, to: AssetId },

    #[error("pool holds {available} of {asset}, swap needs {requested}")]
    InsufficientLiquidity {
        asset: AssetId,
        requested: Amount,
        available: Amount,
    },

    #[error("swap settlement failed: {0}")]
    Custody(#[from] CustodyError),
}

/// Pool collaborator. quotes are pure. `swap` takes `amount_in` of the first
/// path asset from `recipient`'s custody, pays the output into it and returns
/// the amount actually received.
pub trait PoolRouter {
    fn quote_amount_out(&self, path: &[AssetId], amount_in: Amount) -> Result<Amount, PoolError>;

    fn quote_amount_in(&self, path: &[AssetId], amount_out: Amount) -> Result<Amount, PoolError>;

    fn swap<R: TokenBridge>(&mut self, path: &[AssetId], amount_in: Amount, recipient: &mut R) -> Result<Amount, PoolError>;
}

/// MOCKED pool: every hop converts at a fixed rate and is limited only by the
/// reserve of its output asset.
#[derive(Debug, Clone, Default)]
pub struct FixedRatePool {
    rates: HashMap<(AssetId, AssetId), Price>,
    reserves: HashMap<AssetId, Amount>,
}

impl FixedRatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `from` buys `rate` of `to`.
    pub fn set_rate(&mut self, from: AssetId, to: AssetId, rate: Price) {
        self.rates.insert((from, to), rate);
    }

    pub fn add_liquidity(&mut self, asset: AssetId, amount: Amount) {
        *self.reserves.entry(asset).or_default() += amount;
    }

    pub fn reserve(&self, asset: AssetId) -> Amount {
        self.reserves.get(&asset).copied().unwrap_or_default()
    }

    fn rate(&self, from: AssetId, to: AssetId) -> Result<Price, PoolError> {
        self.rates
            .get(&(from, to))
            .copied()
            .ok_or(PoolError::NoRoute { from, to })
    }

    fn check_reserve(&self, asset: AssetId, requested: Amount) -> Result<(), PoolError> {
        let available = self.reserve(asset);
        if requested > available {
            return Err(PoolError::InsufficientLiquidity {
                asset,
                requested,
                available,
            });
        }
        Ok(())
    }

    /// Per-hop `(from, to, amount_in, amount_out)`.
    fn hops(&self, path: &[AssetId], amount_in: Amount) -> Result<Vec<(AssetId, AssetId, Amount, Amount)>, PoolError> {
        if path.len() < 2 {
            return Err(PoolError::InvalidPath);
        }
        let mut amount = amount_in;
        let mut hops = Vec::with_capacity(path.len() - 1);
        for pair in path.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let out = amount.mul_price(self.rate(from, to)?);
            self.check_reserve(to, out)?;
            hops.push((from, to, amount, out));
            amount = out;
        }
        Ok(hops)
    }
}

impl PoolRouter for FixedRatePool {
    fn quote_amount_out(&self, path: &[AssetId], amount_in: Amount) -> Result<Amount, PoolError> {
        let hops = self.hops(path, amount_in)?;
        Ok(hops.last().map_or(amount_in, |h| h.3))
    }

    fn quote_amount_in(&self, path: &[AssetId], amount_out: Amount) -> Result<Amount, PoolError> {
        if path.len() < 2 {
            return Err(PoolError::InvalidPath);
        }
        let mut amount = amount_out;
        for pair in path.windows(2).rev() {
            let (from, to) = (pair[0], pair[1]);
            self.check_reserve(to, amount)?;
            amount = amount.div_price_ceil(self.rate(from, to)?);
        }
        Ok(amount)
    }

    fn swap<R: TokenBridge>(&mut self, path: &[AssetId], amount_in: Amount, recipient: &mut R) -> Result<Amount, PoolError> {
        let hops = self.hops(path, amount_in)?;
        let amount_out = hops.last().map_or(amount_in, |h| h.3);
        let (first, last) = match (path.first(), path.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(PoolError::InvalidPath),
        };

        // settle with the recipient before touching reserves
        let paid = recipient.to_native_units(first, amount_in)?;
        let delivered = recipient.to_native_units(last, amount_out)?;
        recipient.pay(first, paid)?;
        recipient.receive(last, delivered)?;

        for &(from, to, hop_in, hop_out) in &hops {
            *self.reserves.entry(from).or_default() += hop_in;
            *self.reserves.entry(to).or_default() -= hop_out;
        }
        Ok(amount_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::InMemoryBridge;
    use crate::types::NativeAmount;
    use rust_decimal_macros::dec;

    const ORN: AssetId = AssetId(1);
    const USDT: AssetId = AssetId(2);
    const WBTC: AssetId = AssetId(3);

    fn pool() -> FixedRatePool {
        let mut pool = FixedRatePool::new();
        pool.set_rate(ORN, USDT, Price::new_unchecked(dec!(2)));
        pool.set_rate(USDT, WBTC, Price::new_unchecked(dec!(0.0001)));
        pool.add_liquidity(USDT, Amount::new(dec!(1000)));
        pool.add_liquidity(WBTC, Amount::new(dec!(1)));
        pool
    }

    #[test]
    fn quotes_along_multi_hop_path() {
        let pool = pool();
        let out = pool
            .quote_amount_out(&[ORN, USDT, WBTC], Amount::new(dec!(50)))
            .unwrap();
        assert_eq!(out.value(), dec!(0.01));

        let needed = pool
            .quote_amount_in(&[ORN, USDT, WBTC], Amount::new(dec!(0.01)))
            .unwrap();
        assert_eq!(needed.value(), dec!(50));
    }

    #[test]
    fn exact_out_quote_covers_requested_amount() {
        let mut pool = FixedRatePool::new();
        pool.set_rate(ORN, USDT, Price::new_unchecked(dec!(3)));
        pool.add_liquidity(USDT, Amount::new(dec!(100)));

        let want = Amount::new(dec!(1));
        let needed = pool.quote_amount_in(&[ORN, USDT], want).unwrap();
        assert!(pool.quote_amount_out(&[ORN, USDT], needed).unwrap() >= want);
    }

    fn custody(orn: u128) -> InMemoryBridge {
        let mut bridge = InMemoryBridge::new(AssetId(10));
        for asset in [ORN, USDT, WBTC] {
            bridge.register_asset(asset, 8);
        }
        bridge.fund_custody(ORN, NativeAmount(orn));
        bridge
    }

    #[test]
    fn swap_moves_reserves_and_custody() {
        let mut pool = pool();
        let mut bridge = custody(10_0000_0000);
        let out = pool.swap(&[ORN, USDT], Amount::new(dec!(10)), &mut bridge).unwrap();
        assert_eq!(out.value(), dec!(20));
        assert_eq!(pool.reserve(USDT).value(), dec!(980));
        assert_eq!(pool.reserve(ORN).value(), dec!(10));
        assert_eq!(bridge.custody_balance(ORN), NativeAmount(0));
        assert_eq!(bridge.custody_balance(USDT), NativeAmount(20_0000_0000));
    }

    #[test]
    fn unfunded_swap_leaves_reserves_alone() {
        let mut pool = pool();
        let mut bridge = custody(5_0000_0000);
        let err = pool.swap(&[ORN, USDT], Amount::new(dec!(10)), &mut bridge).unwrap_err();
        assert!(matches!(err, PoolError::Custody(CustodyError::InsufficientCustody { .. })));
        assert_eq!(pool.reserve(USDT).value(), dec!(1000));
        assert_eq!(bridge.custody_balance(ORN), NativeAmount(5_0000_0000));
        assert_eq!(bridge.custody_balance(USDT), NativeAmount(0));
    }

    #[test]
    fn missing_route_and_thin_reserves() {
        let pool = pool();
        assert_eq!(
            pool.quote_amount_out(&[WBTC, ORN], Amount::new(dec!(1))),
            Err(PoolError::NoRoute { from: WBTC, to: ORN })
        );
        assert!(matches!(
            pool.quote_amount_out(&[ORN, USDT], Amount::new(dec!(501))),
            Err(PoolError::InsufficientLiquidity { .. })
        ));
        assert_eq!(pool.quote_amount_out(&[ORN], Amount::ZERO), Err(PoolError::InvalidPath));
    }
}
