// 2.0 ledger.rs: per-account, per-asset balances plus the liability registry.
// `credit` is the only write path. it reconciles liabilities before touching the
// balance, so a negative balance and its liability record can never drift apart.
// 2.1: an optional undo journal makes multi-credit operations all-or-nothing.

use crate::liability::{Liability, LiabilityChange, LiabilityError, LiabilitySlots};
use crate::types::{AccountId, Amount, AssetId, Timestamp};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
enum JournalEntry {
    Balance {
        account: AccountId,
        asset: AssetId,
        prior: Amount,
    },
    Liabilities {
        account: AccountId,
        prior: LiabilitySlots,
    },
}

#[derive(Debug, Clone)]
pub struct Ledger {
    balances: HashMap<(AccountId, AssetId), Amount>,
    liabilities: HashMap<AccountId, LiabilitySlots>,
    position_overdue: Duration,
    journal: Option<Vec<JournalEntry>>,
}

impl Ledger {
    pub fn new(position_overdue: Duration) -> Self {
        Self {
            balances: HashMap::new(),
            liabilities: HashMap::new(),
            position_overdue,
            journal: None,
        }
    }

    pub fn position_overdue(&self) -> Duration {
        self.position_overdue
    }

    pub fn set_position_overdue(&mut self, position_overdue: Duration) {
        self.position_overdue = position_overdue;
    }

    /// Zero for pairs never touched.
    pub fn balance(&self, account: AccountId, asset: AssetId) -> Amount {
        self.balances
            .get(&(account, asset))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub fn liabilities(&self, account: AccountId) -> impl Iterator<Item = &Liability> {
        self.liabilities
            .get(&account)
            .into_iter()
            .flat_map(|slots| slots.iter())
    }

    pub fn liability(&self, account: AccountId, asset: AssetId) -> Option<&Liability> {
        self.liabilities.get(&account).and_then(|slots| slots.get(asset))
    }

    pub fn has_liabilities(&self, account: AccountId) -> bool {
        self.liabilities
            .get(&account)
            .map_or(false, |slots| !slots.is_empty())
    }

    /// Every `(account, asset, balance)` row ever written.
    pub fn balances(&self) -> impl Iterator<Item = (AccountId, AssetId, Amount)> + '_ {
        self.balances
            .iter()
            .map(|(&(account, asset), &amount)| (account, asset, amount))
    }

    /// Sum of one asset across all accounts.
    pub fn total(&self, asset: AssetId) -> Amount {
        self.balances
            .iter()
            .filter(|((_, a), _)| *a == asset)
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Adds `delta` (may be negative) to a balance and reconciles the registry.
    /// On error nothing has been written.
    pub fn credit(
        &mut self,
        account: AccountId,
        asset: AssetId,
        delta: Amount,
        now: Timestamp,
    ) -> Result<LiabilityChange, LiabilityError> {
        if delta.is_zero() {
            return Ok(LiabilityChange::Unchanged);
        }

        let old = self.balance(account, asset);
        let new = old + delta;

        let prior_slots = self.liabilities.get(&account).cloned().unwrap_or_default();
        let mut slots = prior_slots.clone();
        let change = slots.reconcile(asset, old, new, now, self.position_overdue)?;

        if let Some(journal) = self.journal.as_mut() {
            journal.push(JournalEntry::Balance {
                account,
                asset,
                prior: old,
            });
            if change != LiabilityChange::Unchanged {
                journal.push(JournalEntry::Liabilities {
                    account,
                    prior: prior_slots,
                });
            }
        }

        if change != LiabilityChange::Unchanged {
            self.store_slots(account, slots);
        }
        self.balances.insert((account, asset), new);

        Ok(change)
    }

    fn store_slots(&mut self, account: AccountId, slots: LiabilitySlots) {
        if slots.is_empty() {
            self.liabilities.remove(&account);
        } else {
            self.liabilities.insert(account, slots);
        }
    }

    pub fn begin(&mut self) {
        debug_assert!(self.journal.is_none(), "ledger journal already open");
        self.journal = Some(Vec::new());
    }

    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Undoes every credit since `begin`, newest first.
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for entry in journal.into_iter().rev() {
            match entry {
                JournalEntry::Balance {
                    account,
                    asset,
                    prior,
                } => {
                    self.balances.insert((account, asset), prior);
                }
                JournalEntry::Liabilities { account, prior } => {
                    self.store_slots(account, prior);
                }
            }
        }
    }
}
