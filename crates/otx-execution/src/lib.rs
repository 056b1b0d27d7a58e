//! otx-execution
//!
//! Execution engine: converts strategy target positions into order intents,
//! routes them through the single broker-gateway choke-point, tracks live
//! orders via an explicit OMS state machine, and journals multi-leg groups
//! write-ahead so a crash mid-group is always recoverable.

pub mod engine;
pub mod gateway;
pub mod id_map;
pub mod kill_switch;
pub mod multi_leg;
pub mod oms;
pub mod order_router;
pub mod prices;
pub mod reconcile_guard;
pub mod router;
mod types;

pub use engine::targets_to_order_intents;
pub use gateway::{intent_id_to_client_order_id, BrokerGateway, GateRefusal, GateVerdicts};
pub use id_map::BrokerOrderMap;
pub use kill_switch::{KillSwitch, KillSwitchOpError, KillSwitchResult};
pub use multi_leg::{execute_group, FillAwaitError, JournalSink, LegPlan, MultiLegResult, OrderFillTracker};
pub use oms::state_machine::{OmsEvent, OmsOrder, OrderState, TransitionError};
pub use order_router::{
    BrokerAdapter, BrokerCancelResponse, BrokerReplaceRequest, BrokerReplaceResponse,
    BrokerSubmitRequest, BrokerSubmitResponse, BrokerTransport,
};
pub use prices::{micros_to_price, price_to_micros, PricingError, MICROS_PER_UNIT};
pub use reconcile_guard::ReconcileFreshnessGuard;
pub use router::{OrderRouter, RejectionReason, RoutePriority, RouteResult};
pub use types::{
    ExecutionDecision, ExecutionIntent, OrderIntent, Side, StrategyOutput, TargetPosition,
};

use std::collections::BTreeMap;

/// Canonical type for current positions, keyed by symbol.
/// Signed quantity: +long, -short.
pub type PositionBook = BTreeMap<String, i64>;

/// Helper to build a PositionBook with minimal boilerplate in tests/callers.
pub fn position_book<I, S>(items: I) -> PositionBook
where
    I: IntoIterator<Item = (S, i64)>,
    S: Into<String>,
{
    let mut book = PositionBook::new();
    for (sym, qty) in items {
        book.insert(sym.into(), qty);
    }
    book
}
