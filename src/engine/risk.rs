//! Position queries and the margin gate applied after debt-increasing calls.

use super::core::Engine;
use super::results::EngineError;
use crate::custody::TokenBridge;
use crate::liability::Liability;
use crate::liquidity::PoolRouter;
use crate::oracle::PriceOracle;
use crate::position::{calculate_position, fresh_price, PositionSnapshot, PositionState};
use crate::signature::SignatureVerifier;
use crate::types::{AccountId, Amount, AssetId, Price};

impl<O, B, P, V> Engine<O, B, P, V>
where
    O: PriceOracle,
    B: TokenBridge,
    P: PoolRouter,
    V: SignatureVerifier,
{
    pub fn calc_position(&self, account: AccountId) -> Result<PositionSnapshot, EngineError> {
        self.position_with_stake(account, self.stake(account))
    }

    /// Position as if `stake` were locked. used before a stake change commits.
    pub(super) fn position_with_stake(&self, account: AccountId, stake: Amount) -> Result<PositionSnapshot, EngineError> {
        let snapshot = calculate_position(
            account,
            &self.ledger,
            stake,
            &self.exchange,
            &self.oracle,
            self.current_time,
        )?;
        Ok(snapshot)
    }

    /// Liability records in slot order. the order is not stable across removals.
    pub fn get_liabilities(&self, account: AccountId) -> Vec<Liability> {
        self.ledger.liabilities(account).copied().collect()
    }

    pub(super) fn fresh_price(&self, asset: AssetId) -> Result<Price, EngineError> {
        Ok(fresh_price(asset, &self.exchange, &self.oracle, self.current_time)?)
    }

    pub(super) fn require_positive(&self, snapshot: PositionSnapshot, account: AccountId) -> Result<(), EngineError> {
        if snapshot.state != PositionState::Positive {
            return Err(EngineError::InsufficientMargin {
                account,
                weighted_position: snapshot.weighted_position,
                state: snapshot.state,
            });
        }
        Ok(())
    }

    /// Every account whose debt grew in the current call must still be POSITIVE.
    pub(super) fn enforce_margin(&self) -> Result<(), EngineError> {
        let mut checked: Vec<AccountId> = Vec::new();
        for p in self.pending.iter().filter(|p| p.change.increases_debt()) {
            if checked.contains(&p.account) {
                continue;
            }
            checked.push(p.account);
            let snapshot = self.calc_position(p.account)?;
            self.require_positive(snapshot, p.account)?;
        }
        Ok(())
    }
}
