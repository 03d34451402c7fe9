//! Signed orders and their fill bookkeeping.
//!
//! Orders are created and signed off-exchange and never change. The engine
//! identifies them by a SHA-256 content hash and keeps the mutable part,
//! filled amount, fees paid, status and trade history, in [`OrderFillState`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::signature::Signature;
use crate::types::{AccountId, Amount, AssetId, Price, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    fn tag(&self) -> u8 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub sender: AccountId,
    pub matcher: AccountId,
    pub base_asset: AssetId,
    pub quote_asset: AssetId,
    pub fee_asset: AssetId,
    pub amount: Amount,
    /// Limit price in quote units per base unit.
    pub price: Price,
    /// Fee for filling the whole amount; partial fills pay pro rata.
    pub fee: Amount,
    pub nonce: u64,
    pub expiration: Timestamp,
    pub side: OrderSide,
}

impl Order {
    pub fn hash(&self) -> OrderHash {
        let mut hasher = Sha256::new();
        hasher.update(b"margin-core/order/v1");
        hasher.update(self.sender.0.to_be_bytes());
        hasher.update(self.matcher.0.to_be_bytes());
        hasher.update(self.base_asset.0.to_be_bytes());
        hasher.update(self.quote_asset.0.to_be_bytes());
        hasher.update(self.fee_asset.0.to_be_bytes());
        // normalized so 1.0 and 1 hash alike
        hasher.update(self.amount.value().normalize().serialize());
        hasher.update(self.price.value().normalize().serialize());
        hasher.update(self.fee.value().normalize().serialize());
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(self.expiration.as_millis().to_be_bytes());
        hasher.update([self.side.tag()]);
        OrderHash(hasher.finalize().into())
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expiration
    }

    /// Checks that don't depend on engine state.
    pub fn validate(&self) -> Result<(), OrderError> {
        if !self.amount.is_positive() {
            return Err(OrderError::InvalidAmount(self.amount));
        }
        if self.fee.is_negative() {
            return Err(OrderError::NegativeFee(self.fee));
        }
        if self.base_asset == self.quote_asset {
            return Err(OrderError::SameAssets(self.base_asset));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderHash(pub [u8; 32]);

impl OrderHash {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOrder {
    pub order: Order,
    pub signature: Signature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    PartiallyCancelled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::PartiallyCancelled)
    }
}

/// One fill as seen by one order. zero-amount records mark pool attempts that
/// did not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub price: Price,
    pub amount: Amount,
    pub fee: Amount,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFillState {
    pub total_filled: Amount,
    pub total_fees_paid: Amount,
    pub status: OrderStatus,
    pub trades: Vec<TradeRecord>,
}

impl Default for OrderFillState {
    fn default() -> Self {
        Self {
            total_filled: Amount::ZERO,
            total_fees_paid: Amount::ZERO,
            status: OrderStatus::New,
            trades: Vec::new(),
        }
    }
}

impl OrderFillState {
    pub fn remaining(&self, order: &Order) -> Amount {
        (order.amount - self.total_filled).positive_part()
    }

    /// Part of the order's fee not yet charged. no fill may charge more.
    pub fn remaining_fee(&self, order: &Order) -> Amount {
        (order.fee - self.total_fees_paid).positive_part()
    }

    /// Whether another `amount` may be filled right now.
    pub fn check_fillable(&self, order: &Order, amount: Amount) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Filled => return Err(OrderError::AlreadyFilled),
            s if s.is_cancelled() => return Err(OrderError::Cancelled),
            _ => {}
        }
        if !amount.is_positive() {
            return Err(OrderError::InvalidAmount(amount));
        }
        let remaining = self.remaining(order);
        if amount > remaining {
            return Err(OrderError::Overfill {
                requested: amount,
                remaining,
            });
        }
        Ok(())
    }

    pub fn record_fill(&mut self, order: &Order, trade: TradeRecord) {
        self.total_filled += trade.amount;
        self.total_fees_paid += trade.fee;
        self.status = if self.total_filled >= order.amount {
            OrderStatus::Filled
        } else if self.total_filled.is_positive() {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::New
        };
        self.trades.push(trade);
    }

    pub fn cancel(&mut self) -> Result<OrderStatus, OrderError> {
        match self.status {
            OrderStatus::Filled => Err(OrderError::AlreadyFilled),
            s if s.is_cancelled() => Err(OrderError::Cancelled),
            _ => {
                self.status = if self.total_filled.is_positive() {
                    OrderStatus::PartiallyCancelled
                } else {
                    OrderStatus::Cancelled
                };
                Ok(self.status)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("invalid amount {0}")]
    InvalidAmount(Amount),

    #[error("negative fee {0}")]
    NegativeFee(Amount),

    #[error("base and quote are both {0}")]
    SameAssets(AssetId),

    #[error("order is already filled")]
    AlreadyFilled,

    #[error("order is cancelled")]
    Cancelled,

    #[error("overfill: requested {requested}, remaining {remaining}")]
    Overfill { requested: Amount, remaining: Amount },
}
