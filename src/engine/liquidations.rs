//! Partial liquidation of NEGATIVE or OVERDUE accounts.

use super::core::{Engine, Posting};
use super::results::{EngineError, LiquidationResult};
use crate::custody::TokenBridge;
use crate::events::{EventPayload, LiquidationEvent};
use crate::liquidity::PoolRouter;
use crate::oracle::PriceOracle;
use crate::position::PositionState;
use crate::signature::SignatureVerifier;
use crate::types::{AccountId, Amount, AssetId};
use tracing::info;

impl<O, B, P, V> Engine<O, B, P, V>
where
    O: PriceOracle,
    B: TokenBridge,
    P: PoolRouter,
    V: SignatureVerifier,
{
    /// Repays `amount` of the target's debt in `liability_asset` out of the
    /// caller's balance. the caller is paid the repaid value plus the
    /// liquidation premium in the settlement asset, taken from the target.
    ///
    /// Any account may liquidate any other account whose position is
    /// NEGATIVE or OVERDUE. a liability in the settlement asset cannot be
    /// liquidated, the target has no settlement balance to pay the reward.
    pub fn liquidate(
        &mut self,
        caller: AccountId,
        target: AccountId,
        liability_asset: AssetId,
        amount: Amount,
    ) -> Result<LiquidationResult, EngineError> {
        if caller == target {
            return Err(EngineError::SelfLiquidation(caller));
        }
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(amount));
        }

        let before = self.calc_position(target)?;
        if !before.state.is_liquidatable() {
            return Err(EngineError::NotLiquidatable {
                account: target,
                state: before.state,
            });
        }

        let outstanding = self
            .ledger
            .liability(target, liability_asset)
            .map(|l| l.outstanding)
            .ok_or(EngineError::NoLiability {
                account: target,
                asset: liability_asset,
            })?;
        if amount > outstanding {
            return Err(EngineError::OverLiquidation {
                requested: amount,
                outstanding,
            });
        }

        let price = self.fresh_price(liability_asset)?;
        let value = amount.mul_price(price);
        let premium = value.haircut(self.exchange.liquidation_premium);
        let reward = value + premium;

        // debt in the settlement asset itself is netted with its repayment,
        // which still leaves nothing to pay the reward from: only a deposit heals it
        let collateral_asset = self.exchange.settlement_asset;
        let repaid_here = if liability_asset == collateral_asset { amount } else { Amount::ZERO };
        let collateral = self.balance(target, collateral_asset) + repaid_here;
        if collateral < reward {
            return Err(EngineError::InsufficientCollateral {
                account: target,
                required: reward,
                available: collateral,
            });
        }
        let payer_balance = self.balance(caller, liability_asset);
        if payer_balance < amount {
            return Err(EngineError::InsufficientBalance {
                account: caller,
                asset: liability_asset,
                requested: amount,
                available: payer_balance,
            });
        }

        let ceiling = self.exchange.max_post_liquidation_position;
        let postings = [
            Posting::new(caller, liability_asset, -amount),
            Posting::new(target, liability_asset, amount),
            Posting::new(target, collateral_asset, -reward),
            Posting::new(caller, collateral_asset, reward),
        ];
        let after = self.atomically(|engine| {
            engine.apply_postings(&postings)?;
            let after = engine.calc_position(target)?;
            // an OVERDUE target may legitimately end well funded once its old debt is gone
            let was_negative = before.state == PositionState::Negative;
            if was_negative && after.state == PositionState::Positive && after.weighted_position >= ceiling {
                return Err(EngineError::ExcessiveLiquidation {
                    account: target,
                    weighted_position: after.weighted_position,
                    ceiling,
                });
            }
            Ok(after)
        })?;

        info!(
            %target,
            liquidator = %caller,
            asset = %liability_asset,
            %amount,
            %reward,
            before = ?before.state,
            after = ?after.state,
            "liquidation"
        );
        self.emit_event(EventPayload::Liquidation(LiquidationEvent {
            target,
            liquidator: caller,
            liability_asset,
            amount,
            reward,
            state_before: before.state,
            state_after: after.state,
        }));

        Ok(LiquidationResult {
            target,
            liability_asset,
            amount,
            reward,
            before,
            after,
        })
    }
}
