//! Liability registry.
//!
//! A liability is the bookkeeping twin of a negative balance: it records the
//! asset, how deep the balance is, and when the debt was opened. Each account
//! has at most [`MAX_LIABILITIES`] of them, stored in fixed slots. Removal swaps
//! the last occupied slot into the hole, so record order is not stable.

use crate::types::{Amount, AssetId, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MAX_LIABILITIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liability {
    pub asset: AssetId,
    /// Always `-balance(account, asset)`, strictly positive.
    pub outstanding: Amount,
    /// When the balance last went from non-negative to negative.
    pub timestamp: Timestamp,
}

impl Liability {
    pub fn is_overdue(&self, position_overdue: Duration, now: Timestamp) -> bool {
        self.timestamp.is_older_than(position_overdue, now)
    }
}

/// What a balance update did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiabilityChange {
    Unchanged,
    Opened,
    Deepened,
    Reduced,
    Cleared,
}

impl LiabilityChange {
    /// True when the account owes more than before.
    pub fn increases_debt(&self) -> bool {
        matches!(self, LiabilityChange::Opened | LiabilityChange::Deepened)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiabilityError {
    #[error("liability cap reached: {max} assets already in debt, cannot open {asset}")]
    CapacityExceeded { asset: AssetId, max: usize },

    #[error("liability in {asset} opened at {since} is overdue, no new debt allowed")]
    Overdue { asset: AssetId, since: Timestamp },

    #[error("registry out of sync with balance for {asset}")]
    Desynchronized { asset: AssetId },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiabilitySlots {
    slots: [Option<Liability>; MAX_LIABILITIES],
}

impl LiabilitySlots {
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots[0].is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Liability> {
        self.slots.iter().flatten()
    }

    pub fn get(&self, asset: AssetId) -> Option<&Liability> {
        self.iter().find(|l| l.asset == asset)
    }

    fn index_of(&self, asset: AssetId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.map_or(false, |l| l.asset == asset))
    }

    pub fn oldest_overdue(&self, position_overdue: Duration, now: Timestamp) -> Option<&Liability> {
        self.iter()
            .filter(|l| l.is_overdue(position_overdue, now))
            .min_by_key(|l| l.timestamp)
    }

    fn ensure_not_overdue(&self, position_overdue: Duration, now: Timestamp) -> Result<(), LiabilityError> {
        match self.oldest_overdue(position_overdue, now) {
            Some(l) => Err(LiabilityError::Overdue {
                asset: l.asset,
                since: l.timestamp,
            }),
            None => Ok(()),
        }
    }

    fn insert(&mut self, liability: Liability) -> Result<(), LiabilityError> {
        // slots stay packed, so the first free slot follows the last used one
        let free = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(LiabilityError::CapacityExceeded {
                asset: liability.asset,
                max: MAX_LIABILITIES,
            })?;
        *free = Some(liability);
        Ok(())
    }

    fn remove(&mut self, asset: AssetId) -> Option<Liability> {
        let idx = self.index_of(asset)?;
        let last = self.len() - 1;
        self.slots.swap(idx, last);
        self.slots[last].take()
    }

    /// Brings the registry in line with a balance moving from `old` to `new`.
    ///
    /// Opening or deepening debt is refused while any liability is overdue.
    /// Partial repayment keeps the original timestamp; only a fresh opening
    /// after full clearance gets a new one.
    pub fn reconcile(
        &mut self,
        asset: AssetId,
        old: Amount,
        new: Amount,
        now: Timestamp,
        position_overdue: Duration,
    ) -> Result<LiabilityChange, LiabilityError> {
        match (old.is_negative(), new.is_negative()) {
            (false, false) => Ok(LiabilityChange::Unchanged),
            (false, true) => {
                self.ensure_not_overdue(position_overdue, now)?;
                if self.index_of(asset).is_some() {
                    return Err(LiabilityError::Desynchronized { asset });
                }
                self.insert(Liability {
                    asset,
                    outstanding: -new,
                    timestamp: now,
                })?;
                Ok(LiabilityChange::Opened)
            }
            (true, true) => {
                let idx = self
                    .index_of(asset)
                    .ok_or(LiabilityError::Desynchronized { asset })?;
                if new < old {
                    self.ensure_not_overdue(position_overdue, now)?;
                }
                let Some(record) = self.slots[idx].as_mut() else {
                    return Err(LiabilityError::Desynchronized { asset });
                };
                record.outstanding = -new;
                Ok(match new.cmp(&old) {
                    std::cmp::Ordering::Less => LiabilityChange::Deepened,
                    std::cmp::Ordering::Greater => LiabilityChange::Reduced,
                    std::cmp::Ordering::Equal => LiabilityChange::Unchanged,
                })
            }
            (true, false) => {
                self.remove(asset)
                    .ok_or(LiabilityError::Desynchronized { asset })?;
                Ok(LiabilityChange::Cleared)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const DAY: Duration = Duration::from_secs(86_400);

    fn amt(v: rust_decimal::Decimal) -> Amount {
        Amount::new(v)
    }

    fn open(slots: &mut LiabilitySlots, asset: u32, depth: rust_decimal::Decimal, now: Timestamp) {
        let change = slots
            .reconcile(AssetId(asset), Amount::ZERO, amt(-depth), now, DAY)
            .unwrap();
        assert_eq!(change, LiabilityChange::Opened);
    }

    #[test]
    fn opening_records_depth_and_time() {
        let mut slots = LiabilitySlots::default();
        open(&mut slots, 1, dec!(5), Timestamp::from_secs(10));

        let l = slots.get(AssetId(1)).unwrap();
        assert_eq!(l.outstanding, amt(dec!(5)));
        assert_eq!(l.timestamp, Timestamp::from_secs(10));
    }

    #[test]
    fn deepening_and_healing_keep_timestamp() {
        let mut slots = LiabilitySlots::default();
        open(&mut slots, 1, dec!(5), Timestamp::from_secs(10));

        let change = slots
            .reconcile(AssetId(1), amt(dec!(-5)), amt(dec!(-8)), Timestamp::from_secs(20), DAY)
            .unwrap();
        assert_eq!(change, LiabilityChange::Deepened);

        let change = slots
            .reconcile(AssetId(1), amt(dec!(-8)), amt(dec!(-2)), Timestamp::from_secs(30), DAY)
            .unwrap();
        assert_eq!(change, LiabilityChange::Reduced);

        let l = slots.get(AssetId(1)).unwrap();
        assert_eq!(l.outstanding, amt(dec!(2)));
        assert_eq!(l.timestamp, Timestamp::from_secs(10));
    }

    #[test]
    fn clearing_then_reopening_resets_timestamp() {
        let mut slots = LiabilitySlots::default();
        open(&mut slots, 1, dec!(5), Timestamp::from_secs(10));

        let change = slots
            .reconcile(AssetId(1), amt(dec!(-5)), Amount::ZERO, Timestamp::from_secs(20), DAY)
            .unwrap();
        assert_eq!(change, LiabilityChange::Cleared);
        assert!(slots.is_empty());

        open(&mut slots, 1, dec!(1), Timestamp::from_secs(40));
        assert_eq!(slots.get(AssetId(1)).unwrap().timestamp, Timestamp::from_secs(40));
    }

    #[test]
    fn cap_rejects_fourth_asset() {
        let mut slots = LiabilitySlots::default();
        let now = Timestamp::from_secs(1);
        open(&mut slots, 1, dec!(1), now);
        open(&mut slots, 2, dec!(1), now);
        open(&mut slots, 3, dec!(1), now);

        let result = slots.reconcile(AssetId(4), Amount::ZERO, amt(dec!(-1)), now, DAY);
        assert_eq!(
            result,
            Err(LiabilityError::CapacityExceeded {
                asset: AssetId(4),
                max: MAX_LIABILITIES
            })
        );
        assert_eq!(slots.len(), 3);

        // existing assets can still move
        assert!(slots
            .reconcile(AssetId(2), amt(dec!(-1)), amt(dec!(-3)), now, DAY)
            .is_ok());
    }

    #[test]
    fn removal_frees_slot_and_keeps_others() {
        let mut slots = LiabilitySlots::default();
        let now = Timestamp::from_secs(1);
        open(&mut slots, 1, dec!(1), now);
        open(&mut slots, 2, dec!(2), now);
        open(&mut slots, 3, dec!(3), now);

        slots
            .reconcile(AssetId(1), amt(dec!(-1)), amt(dec!(4)), now, DAY)
            .unwrap();
        assert_eq!(slots.len(), 2);
        assert!(slots.get(AssetId(1)).is_none());
        assert_eq!(slots.get(AssetId(2)).unwrap().outstanding, amt(dec!(2)));
        assert_eq!(slots.get(AssetId(3)).unwrap().outstanding, amt(dec!(3)));

        open(&mut slots, 4, dec!(1), now);
        assert_eq!(slots.len(), 3);
    }

    #[test]
    fn overdue_blocks_new_and_deeper_debt_but_not_repayment() {
        let mut slots = LiabilitySlots::default();
        open(&mut slots, 1, dec!(5), Timestamp::from_secs(0));
        let later = Timestamp::from_secs(86_401);

        let deeper = slots.reconcile(AssetId(1), amt(dec!(-5)), amt(dec!(-6)), later, DAY);
        assert!(matches!(deeper, Err(LiabilityError::Overdue { .. })));

        let other = slots.reconcile(AssetId(2), Amount::ZERO, amt(dec!(-1)), later, DAY);
        assert!(matches!(other, Err(LiabilityError::Overdue { .. })));

        let heal = slots.reconcile(AssetId(1), amt(dec!(-5)), amt(dec!(-1)), later, DAY);
        assert_eq!(heal, Ok(LiabilityChange::Reduced));
        let clear = slots.reconcile(AssetId(1), amt(dec!(-1)), Amount::ZERO, later, DAY);
        assert_eq!(clear, Ok(LiabilityChange::Cleared));
    }

    #[test]
    fn positive_moves_are_noops() {
        let mut slots = LiabilitySlots::default();
        let change = slots
            .reconcile(AssetId(1), amt(dec!(1)), amt(dec!(2)), Timestamp::from_secs(0), DAY)
            .unwrap();
        assert_eq!(change, LiabilityChange::Unchanged);
        assert!(slots.is_empty());
    }
}
