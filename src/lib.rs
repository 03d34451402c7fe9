// margin-core: accounting and risk core of a margin-trading exchange.
// ledger-first architecture: every balance change goes through one credit
// primitive that also keeps the liability registry in sync.
// all computation is deterministic; external systems sit behind traits.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, AssetId, Amount, Price, Timestamp
//   2.x  ledger.rs: balances + the single credit primitive, undo journal
//   2.1  liability.rs: capped liability slots, reconcile rules
//   2.2  order.rs: signed orders, content hash, fill bookkeeping
//   2.3  signature.rs: order signature verification
//   3.x  position.rs: weighted position and position state
//   7.x  config.rs: collateral weights, premiums, overdue windows, presets
//   8.x  engine/: deposits, fills, pool fills, liquidation, admin
//   9.1  oracle.rs: price oracle boundary (mocked)
//   9.2  custody.rs: wallet <-> ledger transfers, decimals (mocked)
//   9.3  liquidity.rs: AMM pool boundary (mocked)
//   11.x events.rs: state transition events for audit

// core accounting modules
pub mod engine;
pub mod events;
pub mod ledger;
pub mod liability;
pub mod order;
pub mod position;
pub mod types;

// integration modules
pub mod config;
pub mod custody;
pub mod liquidity;
pub mod oracle;
pub mod signature;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use ledger::Ledger;
pub use liability::*;
pub use order::*;
pub use position::*;
pub use types::*;
pub use config::{CollateralAsset, ConfigError, Environment, ExchangeConfig};
pub use custody::{CustodyError, InMemoryBridge, TokenBridge};
pub use liquidity::{FixedRatePool, PoolError, PoolRouter};
pub use oracle::{PriceData, PriceOracle, StaticOracle};
pub use signature::{HmacVerifier, Signature, SignatureVerifier};
