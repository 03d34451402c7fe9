// Price Oracle Integration
//
// The engine never ingests feeds itself. It asks a `PriceOracle` for the latest
// price of an asset in settlement-asset units and decides staleness on its own
// clock. `StaticOracle` is the in-memory source used by tests and the simulator.

use crate::types::{AssetId, Price, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Latest price for one asset, as published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceData {
    pub price: Price,
    pub timestamp: Timestamp,
}

impl PriceData {
    pub fn new(price: Price, timestamp: Timestamp) -> Self {
        Self { price, timestamp }
    }

    pub fn is_stale(&self, price_overdue: Duration, now: Timestamp) -> bool {
        self.timestamp.is_older_than(price_overdue, now)
    }
}

/// Read-only price lookup. `None` means the oracle has never priced the asset.
pub trait PriceOracle {
    fn price_of(&self, asset: AssetId) -> Option<PriceData>;
}

/// Prices pushed by hand. Last write wins.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    prices: HashMap<AssetId, PriceData>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&mut self, asset: AssetId, price: Price, timestamp: Timestamp) {
        self.prices.insert(asset, PriceData::new(price, timestamp));
    }

    pub fn remove_price(&mut self, asset: AssetId) {
        self.prices.remove(&asset);
    }
}

impl PriceOracle for StaticOracle {
    fn price_of(&self, asset: AssetId) -> Option<PriceData> {
        self.prices.get(&asset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn last_write_wins() {
        let mut oracle = StaticOracle::new();
        let asset = AssetId(7);
        oracle.set_price(asset, Price::new_unchecked(dec!(2)), Timestamp::from_secs(1));
        oracle.set_price(asset, Price::new_unchecked(dec!(3)), Timestamp::from_secs(2));

        let data = oracle.price_of(asset).unwrap();
        assert_eq!(data.price.value(), dec!(3));
        assert_eq!(data.timestamp, Timestamp::from_secs(2));
        assert!(oracle.price_of(AssetId(8)).is_none());
    }

    #[test]
    fn staleness_uses_overdue_window() {
        let data = PriceData::new(Price::ONE, Timestamp::from_secs(100));
        let window = Duration::from_secs(60);
        assert!(!data.is_stale(window, Timestamp::from_secs(160)));
        assert!(data.is_stale(window, Timestamp::from_secs(161)));
    }
}
