//! Fills against the AMM pool, for a signed order or a user's direct swap.
//!
//! The trader's side is funded from its ledger balance first and from the
//! external wallet for any shortfall. The received asset goes to the ledger
//! when the trader already held a nonzero ledger balance of it before the
//! call, otherwise straight to the wallet. Either way the pool settles with
//! exchange custody: the input leaves it and the output lands in it before
//! delivery. The native coin never enters the pool as such: it is wrapped
//! before and unwrapped after the swap.

use super::core::{Engine, Posting};
use super::results::{EngineError, PoolFillOutcome, SwapResult};
use crate::custody::TokenBridge;
use crate::events::{EventPayload, PoolTradeEvent};
use crate::liquidity::{PoolError, PoolRouter};
use crate::oracle::PriceOracle;
use crate::order::{OrderHash, OrderSide, SignedOrder};
use crate::signature::SignatureVerifier;
use crate::types::{AccountId, Amount, AssetId, Price};
use std::cmp::min;
use tracing::{debug, info};

/// One trader leg through the pool, ready to settle.
#[derive(Debug, Clone)]
struct PoolLeg {
    trader: AccountId,
    asset_in: AssetId,
    asset_out: AssetId,
    amount_in: Amount,
    amount_out: Amount,
    route: Vec<AssetId>,
    held_out: bool,
}

impl<O, B, P, V> Engine<O, B, P, V>
where
    O: PriceOracle,
    B: TokenBridge,
    P: PoolRouter,
    V: SignatureVerifier,
{
    /// Fills `requested` base of a signed order against the pool along `path`.
    ///
    /// A pool price beyond the order's limit is not an error: nothing moves,
    /// a zero trade is recorded and [`PoolFillOutcome::Unreachable`] comes
    /// back, so matchers can test prices.
    pub fn fill_against_pool(
        &mut self,
        caller: AccountId,
        signed: &SignedOrder,
        requested: Amount,
        fee_amount: Amount,
        path: &[AssetId],
    ) -> Result<PoolFillOutcome, EngineError> {
        let hash = self.validate_order(signed, caller)?;
        let order = &signed.order;
        if fee_amount.is_negative() {
            return Err(EngineError::InvalidAmount(fee_amount));
        }
        let max_fee = self.remaining_fee(&hash, order);
        if fee_amount > max_fee {
            return Err(EngineError::FeeTooHigh {
                fee: fee_amount,
                max: max_fee,
            });
        }
        self.check_fillable(&hash, order, requested)?;

        let (asset_in, asset_out) = match order.side {
            OrderSide::Buy => (order.quote_asset, order.base_asset),
            OrderSide::Sell => (order.base_asset, order.quote_asset),
        };
        check_path(path, asset_in, asset_out)?;
        let route = self.route(path);
        let limit = requested.mul_price(order.price);

        // (amount_in, amount_out, quote side) if the limit holds
        let quoted = match order.side {
            OrderSide::Sell => self
                .pool
                .quote_amount_out(&route, requested)
                .map(|out| (out >= limit).then_some((requested, out, out)).ok_or(out)),
            OrderSide::Buy => self
                .pool
                .quote_amount_in(&route, requested)
                .map(|needed| (needed <= limit).then_some((needed, requested, needed)).ok_or(needed)),
        };
        let (amount_in, amount_out, quote_amount) = match quoted {
            Ok(Ok(amounts)) => amounts,
            Ok(Err(counter)) => return Ok(self.record_unreachable(hash, signed, requested, Some(counter))),
            Err(PoolError::InsufficientLiquidity { .. }) => {
                return Ok(self.record_unreachable(hash, signed, requested, None))
            }
            Err(err) => return Err(err.into()),
        };

        let leg = PoolLeg {
            trader: order.sender,
            asset_in,
            asset_out,
            amount_in,
            amount_out,
            held_out: !self.balance(order.sender, asset_out).is_zero(),
            route,
        };
        let fee_postings = [
            Posting::new(order.sender, order.fee_asset, -fee_amount),
            Posting::new(caller, order.fee_asset, fee_amount),
        ];
        let (received, from_wallet) = self.atomically(|engine| {
            engine.apply_postings(&fee_postings)?;
            engine.settle_pool_leg(&leg)
        })?;

        let price = Price::new(quote_amount.value() / requested.value()).unwrap_or(order.price);
        let status = self.record_trade(hash, order, price, requested, fee_amount);
        info!(
            order = %hash,
            trader = %order.sender,
            amount = %requested,
            amount_in = %amount_in,
            amount_out = %received,
            fee = %fee_amount,
            ?status,
            "order filled against pool"
        );
        self.emit_event(EventPayload::PoolTrade(PoolTradeEvent {
            order: Some(hash),
            account: order.sender,
            asset_in,
            asset_out,
            amount_in,
            amount_out: received,
            from_wallet,
            to_wallet: !leg.held_out,
        }));

        Ok(PoolFillOutcome::Filled {
            amount: requested,
            amount_in,
            amount_out: received,
            fee: fee_amount,
            status,
        })
    }

    /// User swap without an order. `exact_spend` swaps must yield at least
    /// `amount_receive`, exact-receive swaps may spend at most
    /// `amount_spend`; anything worse fails with a slippage error.
    pub fn swap_against_pool(
        &mut self,
        caller: AccountId,
        path: &[AssetId],
        amount_spend: Amount,
        amount_receive: Amount,
        exact_spend: bool,
    ) -> Result<SwapResult, EngineError> {
        if path.len() < 2 {
            return Err(EngineError::InvalidPath(format!("{} assets", path.len())));
        }
        for amount in [amount_spend, amount_receive] {
            if !amount.is_positive() {
                return Err(EngineError::InvalidAmount(amount));
            }
        }
        let (asset_in, asset_out) = (path[0], path[path.len() - 1]);
        check_path(path, asset_in, asset_out)?;
        let route = self.route(path);

        let (amount_in, amount_out) = if exact_spend {
            let out = self.pool.quote_amount_out(&route, amount_spend)?;
            if out < amount_receive {
                return Err(EngineError::Slippage {
                    expected: amount_receive,
                    actual: out,
                });
            }
            (amount_spend, out)
        } else {
            let needed = self.pool.quote_amount_in(&route, amount_receive)?;
            if needed > amount_spend {
                return Err(EngineError::Slippage {
                    expected: amount_spend,
                    actual: needed,
                });
            }
            (needed, amount_receive)
        };

        let leg = PoolLeg {
            trader: caller,
            asset_in,
            asset_out,
            amount_in,
            amount_out,
            held_out: !self.balance(caller, asset_out).is_zero(),
            route,
        };
        let (received, from_wallet) = self.atomically(|engine| engine.settle_pool_leg(&leg))?;

        info!(
            trader = %caller,
            from = %asset_in,
            to = %asset_out,
            %amount_in,
            amount_out = %received,
            %from_wallet,
            "pool swap"
        );
        self.emit_event(EventPayload::PoolTrade(PoolTradeEvent {
            order: None,
            account: caller,
            asset_in,
            asset_out,
            amount_in,
            amount_out: received,
            from_wallet,
            to_wallet: !leg.held_out,
        }));

        Ok(SwapResult {
            amount_in,
            amount_out: received,
            from_wallet,
            to_wallet: !leg.held_out,
        })
    }

    /// Pool-side asset ids: the native sentinel becomes the wrapped token.
    fn route(&self, path: &[AssetId]) -> Vec<AssetId> {
        let wrapped = self.bridge.wrapped_native();
        path.iter()
            .map(|a| if a.is_native() { wrapped } else { *a })
            .collect()
    }

    fn record_unreachable(
        &mut self,
        hash: OrderHash,
        signed: &SignedOrder,
        requested: Amount,
        quoted: Option<Amount>,
    ) -> PoolFillOutcome {
        let order = &signed.order;
        let status = self.record_trade(hash, order, order.price, Amount::ZERO, Amount::ZERO);
        debug!(order = %hash, %requested, ?quoted, ?status, "pool price unreachable, zero fill");
        PoolFillOutcome::Unreachable { requested, quoted }
    }

    /// Runs inside `atomically`. ledger debits and the margin gate come before
    /// any external call; the only ledger write after them is the delivery,
    /// which never deepens debt. returns (received, pulled from wallet).
    fn settle_pool_leg(&mut self, leg: &PoolLeg) -> Result<(Amount, Amount), EngineError> {
        let on_ledger = self.balance(leg.trader, leg.asset_in).positive_part();
        let from_ledger = min(on_ledger, leg.amount_in);
        let from_wallet = leg.amount_in - from_ledger;

        self.apply_postings(&[Posting::new(leg.trader, leg.asset_in, -from_ledger)])?;
        self.enforce_margin()?;

        if from_wallet.is_positive() {
            let native = self.bridge.to_native_units(leg.asset_in, from_wallet)?;
            self.bridge.transfer_in(leg.asset_in, leg.trader, native)?;
        }
        if leg.asset_in.is_native() {
            let native = self.bridge.to_native_units(leg.asset_in, leg.amount_in)?;
            self.bridge.wrap(native)?;
        }

        let received = self.pool.swap(&leg.route, leg.amount_in, &mut self.bridge)?;
        if received < leg.amount_out {
            return Err(EngineError::Slippage {
                expected: leg.amount_out,
                actual: received,
            });
        }

        if leg.asset_out.is_native() {
            let native = self.bridge.to_native_units(leg.asset_out, received)?;
            self.bridge.unwrap(native)?;
        }
        if leg.held_out {
            self.credit(leg.trader, leg.asset_out, received)?;
        } else {
            let native = self.bridge.to_native_units(leg.asset_out, received)?;
            self.bridge.transfer_out(leg.asset_out, leg.trader, native)?;
        }
        Ok((received, from_wallet))
    }
}

fn check_path(path: &[AssetId], asset_in: AssetId, asset_out: AssetId) -> Result<(), EngineError> {
    match (path.first(), path.last()) {
        (Some(&first), Some(&last)) if path.len() >= 2 && first == asset_in && last == asset_out => Ok(()),
        _ => Err(EngineError::InvalidPath(format!(
            "path must run from {asset_in} to {asset_out}, got {path:?}"
        ))),
    }
}
