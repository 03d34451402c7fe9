//! Margin exchange core simulation.
//!
//! Walks the engine through a margin fill, the liability cap, an overdue
//! liquidation and pool fills. Set `RUST_LOG=debug` to see every ledger
//! transition.

use margin_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const ORN: AssetId = AssetId(1);
const USDT: AssetId = AssetId(2);
const WBTC: AssetId = AssetId(3);
const WETH: AssetId = AssetId(4);
const WXRP: AssetId = AssetId(5);
const DOGE: AssetId = AssetId(6);
const WRAPPED: AssetId = AssetId(10);

const MATCHER: AccountId = AccountId(100);
const ALICE: AccountId = AccountId(1);
const BOB: AccountId = AccountId(2);
const CAROL: AccountId = AccountId(3);
const DAVE: AccountId = AccountId(4);

fn main() -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("Margin Exchange Core Simulation\n");

    let mut engine = setup()?;
    scenario_1_margin_fill(&mut engine)?;
    scenario_2_liability_cap(&mut engine)?;
    scenario_3_overdue_liquidation(&mut engine)?;
    scenario_4_pool_fills(&mut engine)?;

    println!("\nAll simulations completed, {} events recorded.", engine.events().len());
    Ok(())
}

fn setup() -> Result<Engine, EngineError> {
    let exchange = ExchangeConfig::default()
        .with_collateral(ORN, 255)
        .with_collateral(USDT, 242)
        .with_collateral(WBTC, 204)
        .with_collateral(WETH, 204);

    let mut bridge = InMemoryBridge::new(WRAPPED);
    for (asset, decimals) in [(ORN, 8), (USDT, 6), (WBTC, 8), (WETH, 18), (WXRP, 6), (DOGE, 8)] {
        bridge.register_asset(asset, decimals);
    }

    let mut pool = FixedRatePool::new();
    pool.set_rate(ORN, USDT, Price::new_unchecked(dec!(2)));
    pool.set_rate(USDT, ORN, Price::new_unchecked(dec!(0.5)));
    pool.add_liquidity(USDT, Amount::new(dec!(100000)));
    pool.add_liquidity(ORN, Amount::new(dec!(100000)));

    let mut verifier = HmacVerifier::new();
    for account in [ALICE, BOB, CAROL, DAVE] {
        verifier.register_key(account, format!("key-{account}").into_bytes());
    }

    let collaborators = Collaborators {
        oracle: StaticOracle::new(),
        bridge,
        pool,
        verifier,
    };
    let mut engine = Engine::new(EngineConfig::default(), exchange, collaborators)?;
    engine.set_time(Timestamp::now());
    refresh_prices(&mut engine);
    Ok(engine)
}

/// Oracle prices in ORN.
fn refresh_prices(engine: &mut Engine) {
    let now = engine.time();
    let oracle = engine.oracle_mut();
    for (asset, price) in [
        (USDT, dec!(0.5)),
        (WBTC, dec!(60000)),
        (WETH, dec!(4000)),
        (WXRP, dec!(1)),
        (DOGE, dec!(0.2)),
        (WRAPPED, dec!(300)),
    ] {
        oracle.set_price(asset, Price::new_unchecked(price), now);
    }
}

/// Mints into the account's wallet and deposits it.
fn fund(engine: &mut Engine, account: AccountId, asset: AssetId, amount: Decimal) -> Result<Amount, EngineError> {
    let native = engine.bridge().to_native_units(asset, Amount::new(amount))?;
    engine.bridge_mut().fund_wallet(account, asset, native);
    engine.deposit(account, asset, native)
}

/// Unsigned order for `sender`, matched by `MATCHER`, paying 1 unit of quote.
fn order(
    engine: &Engine,
    sender: AccountId,
    (base, quote): (AssetId, AssetId),
    side: OrderSide,
    amount: Decimal,
    price: Decimal,
    nonce: u64,
) -> Order {
    Order {
        sender,
        matcher: MATCHER,
        base_asset: base,
        quote_asset: quote,
        fee_asset: quote,
        amount: Amount::new(amount),
        price: Price::new_unchecked(price),
        fee: Amount::new(dec!(1)),
        nonce,
        expiration: engine.time().saturating_add(Duration::from_secs(86_400 * 365)),
        side,
    }
}

fn sign(engine: &mut Engine, order: Order) -> SignedOrder {
    let sender = order.sender;
    let signature = engine
        .verifier_mut()
        .sign(&order, sender)
        .unwrap_or(Signature { signer: sender, tag: Vec::new() });
    SignedOrder { order, signature }
}

fn signed(
    engine: &mut Engine,
    sender: AccountId,
    pair: (AssetId, AssetId),
    side: OrderSide,
    amount: Decimal,
    price: Decimal,
    nonce: u64,
) -> SignedOrder {
    let order = order(engine, sender, pair, side, amount, price, nonce);
    sign(engine, order)
}

fn print_position(engine: &Engine, name: &str, account: AccountId) -> Result<(), EngineError> {
    let snap = engine.calc_position(account)?;
    println!(
        "  {name}: weighted {} ORN, total {} ORN, liabilities {} ORN, {:?}",
        snap.weighted_position, snap.total_position, snap.total_liabilities, snap.state
    );
    for liability in engine.get_liabilities(account) {
        println!(
            "    owes {} of {} since {}",
            liability.outstanding, liability.asset, liability.timestamp
        );
    }
    Ok(())
}

/// Alice sells WBTC she does not hold, backed by USDT and ORN.
fn scenario_1_margin_fill(engine: &mut Engine) -> Result<(), EngineError> {
    println!("Scenario 1: Margin Fill\n");

    fund(engine, ALICE, USDT, dec!(5000))?;
    fund(engine, ALICE, ORN, dec!(1000))?;
    fund(engine, BOB, USDT, dec!(100000))?;
    println!("  Alice deposits 5,000 USDT and 1,000 ORN, Bob 100,000 USDT");

    let sell = signed(engine, ALICE, (WBTC, USDT), OrderSide::Sell, dec!(0.01), dec!(120000), 1);
    let buy = signed(engine, BOB, (WBTC, USDT), OrderSide::Buy, dec!(0.01), dec!(120000), 1);
    let fill = engine.fill(MATCHER, &buy, &sell, Price::new_unchecked(dec!(120000)), Amount::new(dec!(0.01)))?;

    println!("  Filled {} WBTC for {} USDT, status {:?}", fill.amount, fill.quote_amount, fill.sell_status);
    print_position(engine, "Alice", ALICE)?;
    println!();
    Ok(())
}

/// A fourth distinct liability is refused until one slot clears.
fn scenario_2_liability_cap(engine: &mut Engine) -> Result<(), EngineError> {
    println!("Scenario 2: Liability Cap\n");

    let mut nonce = 10;
    for (asset, amount, price) in [(WETH, dec!(0.1), dec!(8000)), (WXRP, dec!(100), dec!(2))] {
        let sell = signed(engine, ALICE, (asset, USDT), OrderSide::Sell, amount, price, nonce);
        let buy = signed(engine, BOB, (asset, USDT), OrderSide::Buy, amount, price, nonce);
        engine.fill(MATCHER, &buy, &sell, Price::new_unchecked(price), Amount::new(amount))?;
        nonce += 1;
    }
    println!("  Alice now owes WBTC, WETH and WXRP");

    let sell = signed(engine, ALICE, (DOGE, USDT), OrderSide::Sell, dec!(100), dec!(0.4), nonce);
    let buy = signed(engine, BOB, (DOGE, USDT), OrderSide::Buy, dec!(100), dec!(0.4), nonce);
    match engine.fill(MATCHER, &buy, &sell, Price::new_unchecked(dec!(0.4)), Amount::new(dec!(100))) {
        Ok(_) => println!("  Unexpected: fourth liability accepted"),
        Err(err) => println!("  Fourth liability rejected ({:?}): {err}", err.kind()),
    }

    fund(engine, ALICE, WXRP, dec!(100))?;
    println!("  Alice deposits 100 WXRP, clearing that slot");
    let fill = engine.fill(MATCHER, &buy, &sell, Price::new_unchecked(dec!(0.4)), Amount::new(dec!(100)))?;
    println!("  DOGE sell now fills: {} DOGE", fill.amount);
    print_position(engine, "Alice", ALICE)?;
    println!();
    Ok(())
}

/// After the overdue window Alice's debt can no longer grow and Carol repays
/// part of it for a premium.
fn scenario_3_overdue_liquidation(engine: &mut Engine) -> Result<(), EngineError> {
    println!("Scenario 3: Overdue Liquidation\n");

    let window = engine.exchange_config().position_overdue;
    engine.advance_time(window + Duration::from_secs(3600));
    refresh_prices(engine);
    print_position(engine, "Alice", ALICE)?;

    fund(engine, CAROL, WETH, dec!(1))?;
    let result = engine.liquidate(CAROL, ALICE, WETH, Amount::new(dec!(0.05)))?;
    println!(
        "  Carol repays {} WETH, receives {} ORN (before {:?}, after {:?})",
        result.amount, result.reward, result.before.state, result.after.state
    );

    let owed = engine
        .ledger()
        .liability(ALICE, WETH)
        .map(|l| l.outstanding)
        .unwrap_or(Amount::ZERO);
    let result = engine.liquidate(CAROL, ALICE, WETH, owed)?;
    println!("  Carol repays the remaining {} WETH, Alice is {:?}", result.amount, result.after.state);
    print_position(engine, "Alice", ALICE)?;
    println!();
    Ok(())
}

/// Dave sells 17 ORN to the pool holding only 10 on the ledger.
fn scenario_4_pool_fills(engine: &mut Engine) -> Result<(), EngineError> {
    println!("Scenario 4: Pool Fills\n");

    fund(engine, DAVE, ORN, dec!(10))?;
    let native = engine.bridge().to_native_units(ORN, Amount::new(dec!(8)))?;
    engine.bridge_mut().fund_wallet(DAVE, ORN, native);
    println!("  Dave has 10 ORN on the ledger and 8 ORN in the wallet, fees are 1 ORN");

    let path = [ORN, USDT];
    let fee = Amount::new(dec!(1));
    for (limit, nonce) in [(dec!(2.5), 1), (dec!(1.9), 2)] {
        let mut o = order(engine, DAVE, (ORN, USDT), OrderSide::Sell, dec!(17), limit, nonce);
        o.fee_asset = ORN;
        let sell = sign(engine, o);
        let outcome = engine.fill_against_pool(MATCHER, &sell, Amount::new(dec!(17)), fee, &path)?;
        println!("  Sell at {limit} USDT: filled {}", outcome.filled_amount());
    }
    println!(
        "  Dave ledger ORN {}, wallet ORN {}, wallet USDT {}",
        engine.balance(DAVE, ORN),
        engine.bridge().wallet_balance(DAVE, ORN),
        engine.bridge().wallet_balance(DAVE, USDT)
    );
    Ok(())
}
