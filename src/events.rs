// 11.0: every committed state change produces an event. used for audit trails and
// notifying external systems. the EventPayload enum lists all event types.
// rejected calls leave no event behind.

use crate::liability::LiabilityChange;
use crate::order::{OrderHash, OrderStatus};
use crate::position::PositionState;
use crate::types::{AccountId, Amount, AssetId, Price, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Custody events
    Deposit(TransferEvent),
    Withdrawal(TransferEvent),
    StakeLocked(StakeEvent),
    StakeReleased(StakeEvent),

    // Trade events
    Trade(TradeEvent),
    PoolTrade(PoolTradeEvent),
    OrderCancelled(OrderCancelledEvent),

    // Risk events
    Liability(LiabilityEvent),
    Liquidation(LiquidationEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEvent {
    pub account: AccountId,
    pub asset: AssetId,
    pub amount: Amount,
    pub new_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeEvent {
    pub account: AccountId,
    pub amount: Amount,
    pub locked: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub order: OrderHash,
    pub account: AccountId,
    pub matcher: AccountId,
    pub price: Price,
    pub amount: Amount,
    pub fee: Amount,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolTradeEvent {
    /// `None` for user-initiated swaps.
    pub order: Option<OrderHash>,
    pub account: AccountId,
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    pub amount_in: Amount,
    pub amount_out: Amount,
    pub from_wallet: Amount,
    pub to_wallet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: OrderHash,
    pub by: AccountId,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiabilityEvent {
    pub account: AccountId,
    pub asset: AssetId,
    pub change: LiabilityChange,
    pub balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub target: AccountId,
    pub liquidator: AccountId,
    pub liability_asset: AssetId,
    pub amount: Amount,
    pub reward: Amount,
    pub state_before: PositionState,
    pub state_after: PositionState,
}
