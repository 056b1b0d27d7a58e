//! otx-strategy
//!
//! Strategy Plugin Framework:
//! - Tier A single-slot host (`host`): strategies output TARGET POSITIONS,
//!   core converts to orders; bounded recent-bars window; no DB/broker
//!   access; shadow mode emits SHADOW intents without trading.
//! - Strategy Engine (C9, `registry`): the multi-strategy lifecycle host,
//!   tracking every deployed strategy's state machine and the
//!   position-to-strategy reverse index used to route fills back to their
//!   owner.
//!
//! Determinism required (event stream + config + seed) for Tier A strategies.

mod host;
pub mod registry;
mod types;

pub use host::*;
pub use registry::{MarketSnapshot, RegisteredStrategy, RegistryError, StrategyRegistry};
pub use types::*;
