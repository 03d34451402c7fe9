//! Risk-weighted position of an account.
//!
//! A snapshot is computed on demand and never stored. Collateral with a
//! positive balance and locked stake count at their haircut value, every
//! liability counts in full against the account. A stale or missing price for
//! any asset involved makes the snapshot unavailable rather than wrong.

use serde::{Deserialize, Serialize};

use crate::config::ExchangeConfig;
use crate::ledger::Ledger;
use crate::oracle::PriceOracle;
use crate::types::{AccountId, Amount, AssetId, Price, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Positive,
    Negative,
    Overdue,
}

impl PositionState {
    pub fn is_liquidatable(&self) -> bool {
        matches!(self, PositionState::Negative | PositionState::Overdue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub weighted_position: Amount,
    pub total_position: Amount,
    /// Settlement-unit value of all liabilities, as a positive magnitude.
    pub total_liabilities: Amount,
    pub state: PositionState,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("no oracle price for {0}")]
    PriceUnavailable(AssetId),

    #[error("oracle price for {asset} from {published} is stale")]
    StalePrice { asset: AssetId, published: Timestamp },
}

/// Fresh price of `asset` in settlement units. the settlement asset itself is
/// always worth exactly one.
pub fn fresh_price(
    asset: AssetId,
    config: &ExchangeConfig,
    oracle: &impl PriceOracle,
    now: Timestamp,
) -> Result<Price, PositionError> {
    if asset == config.settlement_asset {
        return Ok(Price::ONE);
    }
    let data = oracle
        .price_of(asset)
        .ok_or(PositionError::PriceUnavailable(asset))?;
    if data.is_stale(config.price_overdue, now) {
        return Err(PositionError::StalePrice {
            asset,
            published: data.timestamp,
        });
    }
    Ok(data.price)
}

pub fn calculate_position(
    account: AccountId,
    ledger: &Ledger,
    stake: Amount,
    config: &ExchangeConfig,
    oracle: &impl PriceOracle,
    now: Timestamp,
) -> Result<PositionSnapshot, PositionError> {
    let mut weighted = Amount::ZERO;
    let mut total = Amount::ZERO;

    for collateral in &config.collateral {
        let balance = ledger.balance(account, collateral.asset);
        if !balance.is_positive() {
            continue;
        }
        let price = fresh_price(collateral.asset, config, oracle, now)?;
        let value = balance.mul_price(price);
        weighted += value.haircut(collateral.weight);
        total += value;
    }

    if stake.is_positive() {
        let price = fresh_price(config.stake_asset, config, oracle, now)?;
        let value = stake.mul_price(price);
        weighted += value.haircut(config.stake_risk);
        total += value;
    }

    let mut liabilities = Amount::ZERO;
    let mut overdue = false;
    for liability in ledger.liabilities(account) {
        let price = fresh_price(liability.asset, config, oracle, now)?;
        liabilities += liability.outstanding.mul_price(price);
        overdue |= liability.is_overdue(ledger.position_overdue(), now);
    }
    weighted -= liabilities;
    total -= liabilities;

    let state = if overdue {
        PositionState::Overdue
    } else if weighted.is_negative() {
        PositionState::Negative
    } else {
        PositionState::Positive
    };

    Ok(PositionSnapshot {
        weighted_position: weighted,
        total_position: total,
        total_liabilities: liabilities,
        state,
    })
}
