//! Order validation, two-sided fills and cancellation.

use super::core::{Engine, Posting};
use super::results::{EngineError, FillResult};
use crate::custody::TokenBridge;
use crate::events::{EventPayload, OrderCancelledEvent, TradeEvent};
use crate::liquidity::PoolRouter;
use crate::oracle::PriceOracle;
use crate::order::{Order, OrderHash, OrderSide, OrderStatus, SignedOrder, TradeRecord};
use crate::signature::SignatureVerifier;
use crate::types::{AccountId, Amount, Price};
use std::cmp::min;
use tracing::info;

impl<O, B, P, V> Engine<O, B, P, V>
where
    O: PriceOracle,
    B: TokenBridge,
    P: PoolRouter,
    V: SignatureVerifier,
{
    /// Checks everything about a signed order that does not depend on the
    /// other side of the trade, in this order: shape, signature, matcher,
    /// expiry.
    pub(super) fn validate_order(&self, signed: &SignedOrder, caller: AccountId) -> Result<OrderHash, EngineError> {
        let order = &signed.order;
        order.validate()?;
        let hash = order.hash();

        let signer = self
            .verifier
            .recover_signer(order, &signed.signature)
            .ok_or(EngineError::InvalidSignature(hash))?;
        if signer != order.sender {
            return Err(EngineError::SignerMismatch {
                order: hash,
                signer,
                sender: order.sender,
            });
        }

        if order.matcher != caller {
            return Err(EngineError::MatcherMismatch {
                order: hash,
                expected: order.matcher,
                caller,
            });
        }
        if let Some(allowed) = self.exchange.allowed_matcher {
            if allowed != caller {
                return Err(EngineError::UnauthorizedMatcher(caller));
            }
        }

        if order.is_expired(self.current_time) {
            return Err(EngineError::OrderExpired(hash));
        }
        Ok(hash)
    }

    pub(super) fn check_fillable(&self, hash: &OrderHash, order: &Order, amount: Amount) -> Result<(), EngineError> {
        match self.orders.get(hash) {
            Some(state) => state.check_fillable(order, amount)?,
            None => crate::order::OrderFillState::default().check_fillable(order, amount)?,
        }
        Ok(())
    }

    /// What is left of the order's fee after earlier fills.
    pub(super) fn remaining_fee(&self, hash: &OrderHash, order: &Order) -> Amount {
        self.orders
            .get(hash)
            .map_or(order.fee, |state| state.remaining_fee(order))
    }

    /// Appends a trade record and returns the order's new status.
    pub(super) fn record_trade(
        &mut self,
        hash: OrderHash,
        order: &Order,
        price: Price,
        amount: Amount,
        fee: Amount,
    ) -> OrderStatus {
        let trade = TradeRecord {
            price,
            amount,
            fee,
            timestamp: self.current_time,
        };
        let state = self.orders.entry(hash).or_default();
        state.record_fill(order, trade);
        state.status
    }

    /// Settles `fill_amount` of base between a crossing buy and sell order at
    /// `fill_price`. both orders pay their pro-rata fee to the matcher.
    pub fn fill(
        &mut self,
        caller: AccountId,
        buy: &SignedOrder,
        sell: &SignedOrder,
        fill_price: Price,
        fill_amount: Amount,
    ) -> Result<FillResult, EngineError> {
        let buy_hash = self.validate_order(buy, caller)?;
        let sell_hash = self.validate_order(sell, caller)?;
        let (b, s) = (&buy.order, &sell.order);

        if b.side != OrderSide::Buy {
            return Err(EngineError::SideMismatch(buy_hash));
        }
        if s.side != OrderSide::Sell {
            return Err(EngineError::SideMismatch(sell_hash));
        }
        if b.base_asset != s.base_asset || b.quote_asset != s.quote_asset {
            return Err(EngineError::AssetPairMismatch);
        }
        if b.price < fill_price || fill_price < s.price {
            return Err(EngineError::PriceNotCrossing {
                buy: b.price,
                fill: fill_price,
                sell: s.price,
            });
        }
        self.check_fillable(&buy_hash, b, fill_amount)?;
        self.check_fillable(&sell_hash, s, fill_amount)?;

        let quote_amount = fill_amount.mul_price(fill_price);
        if !quote_amount.is_positive() {
            return Err(EngineError::InvalidAmount(quote_amount));
        }
        // pro rata, but never past what earlier fills left of the fee
        let buy_fee = min(b.fee.pro_rata(fill_amount, b.amount), self.remaining_fee(&buy_hash, b));
        let sell_fee = min(s.fee.pro_rata(fill_amount, s.amount), self.remaining_fee(&sell_hash, s));

        let postings = [
            Posting::new(b.sender, b.base_asset, fill_amount),
            Posting::new(b.sender, b.quote_asset, -quote_amount),
            Posting::new(s.sender, s.base_asset, -fill_amount),
            Posting::new(s.sender, s.quote_asset, quote_amount),
            Posting::new(b.sender, b.fee_asset, -buy_fee),
            Posting::new(caller, b.fee_asset, buy_fee),
            Posting::new(s.sender, s.fee_asset, -sell_fee),
            Posting::new(caller, s.fee_asset, sell_fee),
        ];
        self.atomically(|engine| engine.apply_postings(&postings))?;

        let buy_status = self.record_trade(buy_hash, b, fill_price, fill_amount, buy_fee);
        let sell_status = self.record_trade(sell_hash, s, fill_price, fill_amount, sell_fee);

        info!(
            buy = %buy_hash,
            sell = %sell_hash,
            price = %fill_price,
            amount = %fill_amount,
            quote = %quote_amount,
            "orders filled"
        );
        for (hash, order, fee, status) in [
            (buy_hash, b, buy_fee, buy_status),
            (sell_hash, s, sell_fee, sell_status),
        ] {
            self.emit_event(EventPayload::Trade(TradeEvent {
                order: hash,
                account: order.sender,
                matcher: caller,
                price: fill_price,
                amount: fill_amount,
                fee,
                status,
            }));
        }

        Ok(FillResult {
            buy_order: buy_hash,
            sell_order: sell_hash,
            amount: fill_amount,
            quote_amount,
            buy_fee,
            sell_fee,
            buy_status,
            sell_status,
        })
    }

    /// Only the order's sender or its matcher may cancel. already filled or
    /// cancelled orders stay as they are.
    pub fn cancel_order(&mut self, caller: AccountId, order: &Order) -> Result<OrderStatus, EngineError> {
        let hash = order.hash();
        if caller != order.sender && caller != order.matcher {
            return Err(EngineError::UnauthorizedCancel { order: hash, caller });
        }

        let mut state = self.orders.get(&hash).cloned().unwrap_or_default();
        let status = state.cancel()?;
        self.orders.insert(hash, state);

        info!(order = %hash, by = %caller, ?status, "order cancelled");
        self.emit_event(EventPayload::OrderCancelled(OrderCancelledEvent {
            order: hash,
            by: caller,
            status,
        }));
        Ok(status)
    }
}
