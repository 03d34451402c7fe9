// 8.0 engine/core.rs: main engine. holds the ledger, stakes, order fill state and
// the external collaborators. every mutating call runs through `atomically`.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::config::ExchangeConfig;
use crate::custody::{InMemoryBridge, TokenBridge};
use crate::events::{Event, EventId, EventPayload, LiabilityEvent};
use crate::ledger::Ledger;
use crate::liability::LiabilityChange;
use crate::liquidity::{FixedRatePool, PoolRouter};
use crate::oracle::{PriceOracle, StaticOracle};
use crate::order::{OrderFillState, OrderHash};
use crate::signature::{HmacVerifier, SignatureVerifier};
use crate::types::{AccountId, Amount, AssetId, Timestamp};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The outside world the engine reads from and pushes value through.
#[derive(Debug, Clone)]
pub struct Collaborators<O, B, P, V> {
    pub oracle: O,
    pub bridge: B,
    pub pool: P,
    pub verifier: V,
}

/// One leg of a multi-credit operation.
#[derive(Debug, Clone, Copy)]
pub(super) struct Posting {
    pub account: AccountId,
    pub asset: AssetId,
    pub delta: Amount,
}

impl Posting {
    pub fn new(account: AccountId, asset: AssetId, delta: Amount) -> Self {
        Self {
            account,
            asset,
            delta,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct PendingChange {
    pub account: AccountId,
    pub asset: AssetId,
    pub change: LiabilityChange,
}

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine<O = StaticOracle, B = InMemoryBridge, P = FixedRatePool, V = HmacVerifier> {
    pub(super) config: EngineConfig,
    pub(super) exchange: ExchangeConfig,
    pub(super) ledger: Ledger,
    pub(super) stakes: HashMap<AccountId, Amount>,
    pub(super) orders: HashMap<OrderHash, OrderFillState>,
    pub(super) oracle: O,
    pub(super) bridge: B,
    pub(super) pool: P,
    pub(super) verifier: V,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
    pub(super) pending: Vec<PendingChange>,
}

impl<O, B, P, V> Engine<O, B, P, V>
where
    O: PriceOracle,
    B: TokenBridge,
    P: PoolRouter,
    V: SignatureVerifier,
{
    pub fn new(
        config: EngineConfig,
        exchange: ExchangeConfig,
        collaborators: Collaborators<O, B, P, V>,
    ) -> Result<Self, EngineError> {
        exchange.validate()?;
        let ledger = Ledger::new(exchange.position_overdue);
        Ok(Self {
            config,
            exchange,
            ledger,
            stakes: HashMap::new(),
            orders: HashMap::new(),
            oracle: collaborators.oracle,
            bridge: collaborators.bridge,
            pool: collaborators.pool,
            verifier: collaborators.verifier,
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
            pending: Vec::new(),
        })
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, by: Duration) {
        self.current_time = self.current_time.saturating_add(by);
    }

    pub fn exchange_config(&self) -> &ExchangeConfig {
        &self.exchange
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn balance(&self, account: AccountId, asset: AssetId) -> Amount {
        self.ledger.balance(account, asset)
    }

    pub fn stake(&self, account: AccountId) -> Amount {
        self.stakes.get(&account).copied().unwrap_or(Amount::ZERO)
    }

    pub fn order_state(&self, hash: &OrderHash) -> Option<&OrderFillState> {
        self.orders.get(hash)
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut P {
        &mut self.pool
    }

    pub fn verifier_mut(&mut self) -> &mut V {
        &mut self.verifier
    }

    // admin configuration. each change is validated as a whole before it lands.

    pub fn set_collateral_weight(&mut self, asset: AssetId, weight: u8) -> Result<(), EngineError> {
        self.update_config(|c| c.set_collateral_weight(asset, weight))?;
        info!(%asset, weight, "collateral weight set");
        Ok(())
    }

    pub fn remove_collateral_asset(&mut self, asset: AssetId) -> Result<(), EngineError> {
        self.update_config(|c| {
            c.remove_collateral_asset(asset);
        })?;
        info!(%asset, "collateral asset removed");
        Ok(())
    }

    pub fn set_stake_risk(&mut self, stake_risk: u8) -> Result<(), EngineError> {
        self.update_config(|c| c.stake_risk = stake_risk)?;
        info!(stake_risk, "stake risk set");
        Ok(())
    }

    pub fn set_liquidation_premium(&mut self, premium: u8) -> Result<(), EngineError> {
        self.update_config(|c| c.liquidation_premium = premium)?;
        info!(premium, "liquidation premium set");
        Ok(())
    }

    pub fn set_price_overdue(&mut self, window: Duration) -> Result<(), EngineError> {
        self.update_config(|c| c.price_overdue = window)?;
        info!(?window, "price overdue window set");
        Ok(())
    }

    pub fn set_position_overdue(&mut self, window: Duration) -> Result<(), EngineError> {
        self.update_config(|c| c.position_overdue = window)?;
        info!(?window, "position overdue window set");
        Ok(())
    }

    pub fn set_allowed_matcher(&mut self, matcher: Option<AccountId>) -> Result<(), EngineError> {
        self.update_config(|c| c.allowed_matcher = matcher)?;
        info!(?matcher, "allowed matcher set");
        Ok(())
    }

    fn update_config(&mut self, apply: impl FnOnce(&mut ExchangeConfig)) -> Result<(), EngineError> {
        let mut next = self.exchange.clone();
        apply(&mut next);
        next.validate()?;
        self.ledger.set_position_overdue(next.position_overdue);
        self.exchange = next;
        Ok(())
    }

    /// Runs `op` all-or-nothing. ledger writes are journaled and undone on any
    /// error, including a failed margin check for accounts that took on debt.
    /// callers touch order state, stakes and events only after this returns Ok.
    pub(super) fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        self.ledger.begin();
        self.pending.clear();

        let result = match op(self) {
            Ok(value) => self.enforce_margin().map(|_| value),
            Err(err) => Err(err),
        };

        match result {
            Ok(value) => {
                self.ledger.commit();
                self.flush_pending();
                Ok(value)
            }
            Err(err) => {
                self.ledger.rollback();
                self.pending.clear();
                warn!(error = %err, kind = ?err.kind(), "operation rejected");
                Err(err)
            }
        }
    }

    /// The one write path into the ledger from engine code.
    pub(super) fn credit(&mut self, account: AccountId, asset: AssetId, delta: Amount) -> Result<(), EngineError> {
        let change = self.ledger.credit(account, asset, delta, self.current_time)?;
        if change != LiabilityChange::Unchanged {
            self.pending.push(PendingChange {
                account,
                asset,
                change,
            });
        }
        Ok(())
    }

    /// Credits before debits, so a leg that is covered by an incoming leg of
    /// the same call never opens a liability in between.
    pub(super) fn apply_postings(&mut self, postings: &[Posting]) -> Result<(), EngineError> {
        for p in postings.iter().filter(|p| p.delta.is_positive()) {
            self.credit(p.account, p.asset, p.delta)?;
        }
        for p in postings.iter().filter(|p| p.delta.is_negative()) {
            self.credit(p.account, p.asset, p.delta)?;
        }
        Ok(())
    }

    fn flush_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for p in pending {
            let balance = self.ledger.balance(p.account, p.asset);
            match p.change {
                LiabilityChange::Opened => {
                    info!(account = %p.account, asset = %p.asset, %balance, "liability opened")
                }
                LiabilityChange::Cleared => {
                    info!(account = %p.account, asset = %p.asset, "liability cleared")
                }
                _ => debug!(account = %p.account, asset = %p.asset, change = ?p.change, %balance, "liability updated"),
            }
            self.emit_event(EventPayload::Liability(LiabilityEvent {
                account: p.account,
                asset: p.asset,
                change: p.change,
                balance,
            }));
        }
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.trace_events {
            debug!(id = event.id.0, payload = ?event.payload, "event");
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
