//! Deposits, withdrawals and stake.

use super::core::Engine;
use super::results::EngineError;
use crate::custody::TokenBridge;
use crate::events::{EventPayload, StakeEvent, TransferEvent};
use crate::liquidity::PoolRouter;
use crate::oracle::PriceOracle;
use crate::signature::SignatureVerifier;
use crate::types::{AccountId, Amount, AssetId, NativeAmount};
use tracing::info;

impl<O, B, P, V> Engine<O, B, P, V>
where
    O: PriceOracle,
    B: TokenBridge,
    P: PoolRouter,
    V: SignatureVerifier,
{
    /// Pulls `amount` native units from the account's wallet and credits the
    /// ledger. deposits only ever heal liabilities, so they work for overdue
    /// accounts too.
    pub fn deposit(&mut self, account: AccountId, asset: AssetId, amount: NativeAmount) -> Result<Amount, EngineError> {
        let credited = self.bridge.to_ledger_units(asset, amount)?;
        if !credited.is_positive() {
            return Err(EngineError::InvalidAmount(credited));
        }

        self.atomically(|engine| {
            engine.credit(account, asset, credited)?;
            engine.bridge.transfer_in(asset, account, amount)?;
            Ok(())
        })?;

        let new_balance = self.balance(account, asset);
        info!(%account, %asset, amount = %credited, %new_balance, "deposit");
        self.emit_event(EventPayload::Deposit(TransferEvent {
            account,
            asset,
            amount: credited,
            new_balance,
        }));
        Ok(credited)
    }

    /// Never lets the balance go negative. an account that still carries
    /// liabilities afterwards must stay POSITIVE.
    pub fn withdraw(&mut self, account: AccountId, asset: AssetId, amount: Amount) -> Result<NativeAmount, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(amount));
        }
        let available = self.balance(account, asset);
        if available < amount {
            return Err(EngineError::InsufficientBalance {
                account,
                asset,
                requested: amount,
                available,
            });
        }
        let native = self.bridge.to_native_units(asset, amount)?;

        self.atomically(|engine| {
            engine.credit(account, asset, -amount)?;
            if engine.ledger.has_liabilities(account) {
                let snapshot = engine.calc_position(account)?;
                engine.require_positive(snapshot, account)?;
            }
            engine.bridge.transfer_out(asset, account, native)?;
            Ok(())
        })?;

        let new_balance = self.balance(account, asset);
        info!(%account, %asset, %amount, %new_balance, "withdrawal");
        self.emit_event(EventPayload::Withdrawal(TransferEvent {
            account,
            asset,
            amount,
            new_balance,
        }));
        Ok(native)
    }

    /// Moves settlement-asset balance into locked stake. stake may weigh less
    /// than the same balance as collateral, so an account with liabilities
    /// must stay POSITIVE afterwards.
    pub fn lock_stake(&mut self, account: AccountId, amount: Amount) -> Result<Amount, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(amount));
        }
        let asset = self.exchange.stake_asset;
        let available = self.balance(account, asset);
        if available < amount {
            return Err(EngineError::InsufficientBalance {
                account,
                asset,
                requested: amount,
                available,
            });
        }

        let locked = self.stake(account) + amount;
        self.atomically(|engine| {
            engine.credit(account, asset, -amount)?;
            if engine.ledger.has_liabilities(account) {
                let snapshot = engine.position_with_stake(account, locked)?;
                engine.require_positive(snapshot, account)?;
            }
            Ok(())
        })?;

        self.stakes.insert(account, locked);
        info!(%account, %amount, %locked, "stake locked");
        self.emit_event(EventPayload::StakeLocked(StakeEvent {
            account,
            amount,
            locked,
        }));
        Ok(locked)
    }

    /// Returns locked stake to the ledger, gated like a withdrawal.
    pub fn release_stake(&mut self, account: AccountId, amount: Amount) -> Result<Amount, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(amount));
        }
        let current = self.stake(account);
        if current < amount {
            return Err(EngineError::InsufficientStake {
                account,
                requested: amount,
                locked: current,
            });
        }
        let asset = self.exchange.stake_asset;
        let locked = current - amount;

        self.atomically(|engine| {
            engine.credit(account, asset, amount)?;
            if engine.ledger.has_liabilities(account) {
                let snapshot = engine.position_with_stake(account, locked)?;
                engine.require_positive(snapshot, account)?;
            }
            Ok(())
        })?;

        if locked.is_zero() {
            self.stakes.remove(&account);
        } else {
            self.stakes.insert(account, locked);
        }
        info!(%account, %amount, %locked, "stake released");
        self.emit_event(EventPayload::StakeReleased(StakeEvent {
            account,
            amount,
            locked,
        }));
        Ok(locked)
    }
}
