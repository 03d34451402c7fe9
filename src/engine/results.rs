// 8.0.2: result types and errors for engine operations.

use crate::config::ConfigError;
use crate::custody::CustodyError;
use crate::liability::LiabilityError;
use crate::liquidity::PoolError;
use crate::order::{OrderError, OrderHash, OrderStatus};
use crate::position::{PositionError, PositionSnapshot, PositionState};
use crate::types::{AccountId, Amount, AssetId, Price};

#[derive(Debug, Clone)]
pub struct FillResult {
    pub buy_order: OrderHash,
    pub sell_order: OrderHash,
    pub amount: Amount,
    pub quote_amount: Amount,
    pub buy_fee: Amount,
    pub sell_fee: Amount,
    pub buy_status: OrderStatus,
    pub sell_status: OrderStatus,
}

/// Outcome of filling an order against the pool. an unreachable price is a
/// normal outcome, not an error: matchers test prices this way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolFillOutcome {
    Filled {
        amount: Amount,
        amount_in: Amount,
        amount_out: Amount,
        fee: Amount,
        status: OrderStatus,
    },
    Unreachable {
        requested: Amount,
        /// Pool quote for the counter side, when the pool could quote at all.
        quoted: Option<Amount>,
    },
}

impl PoolFillOutcome {
    pub fn filled_amount(&self) -> Amount {
        match self {
            PoolFillOutcome::Filled { amount, .. } => *amount,
            PoolFillOutcome::Unreachable { .. } => Amount::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapResult {
    pub amount_in: Amount,
    pub amount_out: Amount,
    /// Part of `amount_in` pulled from the external wallet.
    pub from_wallet: Amount,
    /// Output went to the wallet rather than the ledger.
    pub to_wallet: bool,
}

#[derive(Debug, Clone)]
pub struct LiquidationResult {
    pub target: AccountId,
    pub liability_asset: AssetId,
    pub amount: Amount,
    pub reward: Amount,
    pub before: PositionSnapshot,
    pub after: PositionSnapshot,
}

/// Failure classes callers react to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input. never retried.
    Validation,
    /// Liability cap or overdue debt. resolve by depositing or liquidation.
    Capacity,
    /// Someone lacks the funds.
    Insufficiency,
    /// Oracle data too old or missing.
    StalePrice,
    /// Position would end up under water.
    Risk,
    Configuration,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Invalid signature on order {0}")]
    InvalidSignature(OrderHash),

    #[error("Order {order} signed by {signer}, sender is {sender}")]
    SignerMismatch {
        order: OrderHash,
        signer: AccountId,
        sender: AccountId,
    },

    #[error("Order {order} names matcher {expected}, caller is {caller}")]
    MatcherMismatch {
        order: OrderHash,
        expected: AccountId,
        caller: AccountId,
    },

    #[error("{0} is not the allowed matcher")]
    UnauthorizedMatcher(AccountId),

    #[error("Order {0} has expired")]
    OrderExpired(OrderHash),

    #[error("Order {0} is on the wrong side")]
    SideMismatch(OrderHash),

    #[error("Orders trade different asset pairs")]
    AssetPairMismatch,

    #[error("Price {fill} does not cross buy {buy} / sell {sell}")]
    PriceNotCrossing { buy: Price, fill: Price, sell: Price },

    #[error("Invalid amount {0}")]
    InvalidAmount(Amount),

    #[error("Fee {fee} exceeds order fee {max}")]
    FeeTooHigh { fee: Amount, max: Amount },

    #[error("Invalid swap path: {0}")]
    InvalidPath(String),

    #[error("{caller} may not cancel order {order}")]
    UnauthorizedCancel { order: OrderHash, caller: AccountId },

    #[error("Slippage: expected {expected}, pool gives {actual}")]
    Slippage { expected: Amount, actual: Amount },

    #[error("{account} is {state:?}, not liquidatable")]
    NotLiquidatable { account: AccountId, state: PositionState },

    #[error("{account} has no liability in {asset}")]
    NoLiability { account: AccountId, asset: AssetId },

    #[error("Liquidation of {requested} exceeds outstanding {outstanding}")]
    OverLiquidation { requested: Amount, outstanding: Amount },

    #[error("{0} cannot liquidate itself")]
    SelfLiquidation(AccountId),

    #[error("Liquidation would leave {account} at weighted position {weighted_position}, ceiling {ceiling}")]
    ExcessiveLiquidation {
        account: AccountId,
        weighted_position: Amount,
        ceiling: Amount,
    },

    #[error("Liability error: {0}")]
    Liability(#[from] LiabilityError),

    #[error("{account} holds {available} of {asset}, needs {requested}")]
    InsufficientBalance {
        account: AccountId,
        asset: AssetId,
        requested: Amount,
        available: Amount,
    },

    #[error("{account} has {available} collateral, liquidation needs {required}")]
    InsufficientCollateral {
        account: AccountId,
        required: Amount,
        available: Amount,
    },

    #[error("{account} has {locked} staked, cannot release {requested}")]
    InsufficientStake {
        account: AccountId,
        requested: Amount,
        locked: Amount,
    },

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("{account} would end {state:?} at weighted position {weighted_position}")]
    InsufficientMargin {
        account: AccountId,
        weighted_position: Amount,
        state: PositionState,
    },

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Liability(_) => ErrorKind::Capacity,
            EngineError::InsufficientBalance { .. }
            | EngineError::InsufficientCollateral { .. }
            | EngineError::InsufficientStake { .. }
            | EngineError::Pool(PoolError::InsufficientLiquidity { .. }) => ErrorKind::Insufficiency,
            EngineError::Custody(CustodyError::UnknownAsset(_))
            | EngineError::Pool(PoolError::Custody(CustodyError::UnknownAsset(_))) => ErrorKind::Validation,
            EngineError::Custody(_) | EngineError::Pool(PoolError::Custody(_)) => ErrorKind::Insufficiency,
            EngineError::Position(_) => ErrorKind::StalePrice,
            EngineError::InsufficientMargin { .. } | EngineError::ExcessiveLiquidation { .. } => ErrorKind::Risk,
            EngineError::Config(_) => ErrorKind::Configuration,
            _ => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    #[test]
    fn kinds_follow_taxonomy() {
        let capacity = EngineError::from(LiabilityError::CapacityExceeded {
            asset: AssetId(4),
            max: 3,
        });
        assert_eq!(capacity.kind(), ErrorKind::Capacity);

        let stale = EngineError::from(PositionError::StalePrice {
            asset: AssetId(2),
            published: Timestamp::from_secs(0),
        });
        assert_eq!(stale.kind(), ErrorKind::StalePrice);

        let overfill = EngineError::from(OrderError::Overfill {
            requested: Amount::from_units(2),
            remaining: Amount::from_units(1),
        });
        assert_eq!(overfill.kind(), ErrorKind::Validation);

        let wallet = EngineError::from(CustodyError::InsufficientWallet {
            account: AccountId(1),
            asset: AssetId(1),
            requested: crate::types::NativeAmount(2),
            available: crate::types::NativeAmount(1),
        });
        assert_eq!(wallet.kind(), ErrorKind::Insufficiency);
    }
}
