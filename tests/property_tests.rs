//! Property-based tests for the ledger and engine invariants.
//!
//! These tests verify invariants hold under random sequences of operations.

use margin_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::time::Duration;

const ACCOUNTS: u64 = 3;
const ASSETS: u32 = 6;

// Strategies for generating test data
fn delta_strategy() -> impl Strategy<Value = Amount> {
    (-10_000i64..=10_000i64).prop_map(|x| Amount::new(Decimal::new(x, 2))) // -100 to +100
}

fn credit_strategy() -> impl Strategy<Value = (u64, u32, Amount, u64)> {
    (0..ACCOUNTS, 0..ASSETS, delta_strategy(), 0u64..3_600)
}

fn fill_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=400i64).prop_map(|x| Decimal::new(x, 2)) // 0.01 to 4.00
}

/// Every negative balance has exactly one matching liability and vice versa.
fn assert_synced(ledger: &Ledger) -> Result<(), TestCaseError> {
    for a in 0..ACCOUNTS {
        let account = AccountId(a);
        prop_assert!(ledger.liabilities(account).count() <= MAX_LIABILITIES);
        for x in 0..ASSETS {
            let asset = AssetId(x);
            let balance = ledger.balance(account, asset);
            match ledger.liability(account, asset) {
                Some(l) => prop_assert_eq!(l.outstanding, -balance),
                None => prop_assert!(!balance.is_negative()),
            }
        }
    }
    Ok(())
}

fn timestamps(ledger: &Ledger) -> HashMap<(AccountId, AssetId), Timestamp> {
    (0..ACCOUNTS)
        .flat_map(|a| ledger.liabilities(AccountId(a)).map(move |l| ((AccountId(a), l.asset), l.timestamp)))
        .collect()
}

proptest! {
    /// Balances and liabilities never drift apart, the cap holds, and only a
    /// fresh opening moves a liability's timestamp.
    #[test]
    fn ledger_and_registry_stay_in_sync(
        ops in proptest::collection::vec(credit_strategy(), 1..80),
        overdue_hours in 1u64..48,
    ) {
        let mut ledger = Ledger::new(Duration::from_secs(overdue_hours * 3600));
        let mut now = Timestamp::from_secs(1_000);

        for (account, asset, delta, step) in ops {
            now = now.saturating_add(Duration::from_secs(step));
            let before = timestamps(&ledger);
            let balance_before = ledger.balance(AccountId(account), AssetId(asset));

            match ledger.credit(AccountId(account), AssetId(asset), delta, now) {
                Ok(_) => prop_assert_eq!(
                    ledger.balance(AccountId(account), AssetId(asset)),
                    balance_before + delta
                ),
                Err(_) => prop_assert_eq!(ledger.balance(AccountId(account), AssetId(asset)), balance_before),
            }

            assert_synced(&ledger)?;
            for (key, ts) in timestamps(&ledger) {
                if let Some(prior) = before.get(&key) {
                    prop_assert_eq!(*prior, ts);
                }
            }
        }
    }

    /// Rolling back a journal restores every balance and liability.
    #[test]
    fn rollback_restores_ledger(
        setup in proptest::collection::vec(credit_strategy(), 0..20),
        ops in proptest::collection::vec(credit_strategy(), 1..20),
    ) {
        let mut ledger = Ledger::new(Duration::from_secs(86_400));
        let now = Timestamp::from_secs(1_000);
        for (account, asset, delta, _) in setup {
            let _ = ledger.credit(AccountId(account), AssetId(asset), delta, now);
        }

        let balances: Vec<Amount> = (0..ACCOUNTS)
            .flat_map(|a| (0..ASSETS).map(move |x| (a, x)))
            .map(|(a, x)| ledger.balance(AccountId(a), AssetId(x)))
            .collect();
        let liabilities = timestamps(&ledger);

        ledger.begin();
        for (account, asset, delta, step) in ops {
            let _ = ledger.credit(AccountId(account), AssetId(asset), delta, now.saturating_add(Duration::from_secs(step)));
        }
        ledger.rollback();

        let after: Vec<Amount> = (0..ACCOUNTS)
            .flat_map(|a| (0..ASSETS).map(move |x| (a, x)))
            .map(|(a, x)| ledger.balance(AccountId(a), AssetId(x)))
            .collect();
        prop_assert_eq!(balances, after);
        prop_assert_eq!(liabilities, timestamps(&ledger));
        assert_synced(&ledger)?;
    }

    /// Fills conserve every asset and never overfill an order.
    #[test]
    fn fills_conserve_and_never_overfill(
        sizes in proptest::collection::vec(fill_strategy(), 1..12),
    ) {
        let mut engine = harness::engine();
        harness::fund(&mut engine, harness::ALICE, harness::ORN, dec!(1000000));
        harness::fund(&mut engine, harness::BOB, harness::USDT, dec!(1000000));

        let mut sell = harness::order(harness::ALICE, OrderSide::Sell, dec!(5), dec!(100));
        sell.fee = Amount::new(dec!(0.5));
        let mut buy = harness::order(harness::BOB, OrderSide::Buy, dec!(5), dec!(100));
        buy.fee = Amount::new(dec!(0.25));
        let sell = harness::sign(&mut engine, sell);
        let buy = harness::sign(&mut engine, buy);

        let base_total = engine.ledger().total(harness::WBTC);
        let quote_total = engine.ledger().total(harness::USDT);

        for size in sizes {
            let _ = engine.fill(harness::MATCHER, &buy, &sell, Price::new_unchecked(dec!(100)), Amount::new(size));

            prop_assert_eq!(engine.ledger().total(harness::WBTC), base_total);
            prop_assert_eq!(engine.ledger().total(harness::USDT), quote_total);
            for signed in [&buy, &sell] {
                if let Some(state) = engine.order_state(&signed.order.hash()) {
                    prop_assert!(state.total_filled <= signed.order.amount);
                    prop_assert!(state.total_fees_paid <= signed.order.fee);
                }
            }
        }
        assert_synced(engine.ledger())?;
    }

    /// Liquidation reduces the debt by exactly the repaid amount and never
    /// past zero.
    #[test]
    fn liquidation_is_bounded(units in 1i64..=2_000_000i64) {
        let mut engine = harness::engine();
        harness::fund(&mut engine, harness::ALICE, harness::ORN, dec!(1000));
        harness::fund(&mut engine, harness::BOB, harness::USDT, dec!(1000000));
        harness::fund(&mut engine, harness::CAROL, harness::WBTC, dec!(1));

        let sell = harness::sign(&mut engine, harness::order(harness::ALICE, OrderSide::Sell, dec!(0.01), dec!(60000)));
        let buy = harness::sign(&mut engine, harness::order(harness::BOB, OrderSide::Buy, dec!(0.01), dec!(60000)));
        engine.fill(harness::MATCHER, &buy, &sell, Price::new_unchecked(dec!(60000)), Amount::new(dec!(0.01))).unwrap();
        harness::set_wbtc_price(&mut engine, dec!(200000));

        let outstanding = Amount::new(dec!(0.01));
        let amount = Amount::from_units(units);
        match engine.liquidate(harness::CAROL, harness::ALICE, harness::WBTC, amount) {
            Ok(result) => {
                prop_assert!(amount <= outstanding);
                let left = engine
                    .ledger()
                    .liability(harness::ALICE, harness::WBTC)
                    .map(|l| l.outstanding)
                    .unwrap_or(Amount::ZERO);
                prop_assert_eq!(left, outstanding - result.amount);
                prop_assert!(!left.is_negative());
            }
            Err(err) => {
                prop_assert!(matches!(
                    err,
                    EngineError::OverLiquidation { .. } | EngineError::InsufficientCollateral { .. }
                ), "unexpected liquidation error: {:?}", err);
                prop_assert_eq!(engine.balance(harness::ALICE, harness::WBTC), -outstanding);
            }
        }
        assert_synced(engine.ledger())?;
    }
}

mod harness {
    use margin_core::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    pub const ORN: AssetId = AssetId(1);
    pub const USDT: AssetId = AssetId(2);
    pub const WBTC: AssetId = AssetId(3);

    pub const MATCHER: AccountId = AccountId(100);
    pub const ALICE: AccountId = AccountId(0);
    pub const BOB: AccountId = AccountId(1);
    pub const CAROL: AccountId = AccountId(2);

    pub fn engine() -> Engine {
        let exchange = ExchangeConfig::default()
            .with_collateral(ORN, 255)
            .with_collateral(USDT, 255)
            .with_collateral(WBTC, 204);
        let mut bridge = InMemoryBridge::new(AssetId(10));
        for asset in [ORN, USDT, WBTC] {
            bridge.register_asset(asset, 8);
        }
        let mut verifier = HmacVerifier::new();
        for account in [ALICE, BOB, CAROL] {
            verifier.register_key(account, account.to_string().into_bytes());
        }
        let collaborators = Collaborators {
            oracle: StaticOracle::new(),
            bridge,
            pool: FixedRatePool::new(),
            verifier,
        };
        let mut engine = Engine::new(EngineConfig::default(), exchange, collaborators).unwrap();
        engine.set_time(Timestamp::from_secs(1_000));
        let now = engine.time();
        engine.oracle_mut().set_price(USDT, Price::new_unchecked(dec!(1)), now);
        set_wbtc_price(&mut engine, dec!(60000));
        engine
    }

    pub fn set_wbtc_price(engine: &mut Engine, price: Decimal) {
        let now = engine.time();
        engine.oracle_mut().set_price(WBTC, Price::new_unchecked(price), now);
    }

    pub fn fund(engine: &mut Engine, account: AccountId, asset: AssetId, v: Decimal) {
        let native = engine.bridge().to_native_units(asset, Amount::new(v)).unwrap();
        engine.bridge_mut().fund_wallet(account, asset, native);
        engine.deposit(account, asset, native).unwrap();
    }

    pub fn order(sender: AccountId, side: OrderSide, amount: Decimal, price: Decimal) -> Order {
        Order {
            sender,
            matcher: MATCHER,
            base_asset: WBTC,
            quote_asset: USDT,
            fee_asset: USDT,
            amount: Amount::new(amount),
            price: Price::new_unchecked(price),
            fee: Amount::ZERO,
            nonce: 1,
            expiration: Timestamp::from_secs(1_000_000),
            side,
        }
    }

    pub fn sign(engine: &mut Engine, order: Order) -> SignedOrder {
        let signature = engine.verifier_mut().sign(&order, order.sender).unwrap();
        SignedOrder { order, signature }
    }
}
