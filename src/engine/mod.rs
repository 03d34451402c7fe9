// 8.0: exchange engine. owns the ledger and runs every mutating call
// (deposit, fill, pool fill, liquidation, admin changes) to completion or not
// at all. single-threaded and deterministic; the outside world is reached only
// through the oracle, bridge, pool and verifier collaborators.

mod config;
mod core;
mod liquidations;
mod orders;
mod pool;
mod results;
mod risk;
mod transfers;

pub use config::EngineConfig;
pub use core::{Collaborators, Engine};
pub use results::{EngineError, ErrorKind, FillResult, LiquidationResult, PoolFillOutcome, SwapResult};
