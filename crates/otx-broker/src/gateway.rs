//! The opaque Broker Gateway interface (C3).
//!
//! `BrokerGateway` is intentionally narrow: callers (the Order Router, the
//! kill switch) depend only on this trait, never on a concrete broker
//! integration. `getHistoricalData` is a stub per the source spec — no
//! backing implementation is expected to return real data yet.

use std::collections::BTreeMap;

use otx_schemas::fixedpoint::Micros;
use otx_schemas::market::Bar;
use otx_schemas::order::{Order, OrderRequest};
use otx_schemas::position::Position;

/// Cash/margin snapshot returned by `getMargins`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Margins {
    pub cash: Micros,
    pub available: Micros,
    pub used: Micros,
    pub collateral: Micros,
}

/// Why a broker gateway call failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrokerGatewayError {
    UnknownOrder { broker_order_id: String },
    Rejected { reason: String },
}

impl std::fmt::Display for BrokerGatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerGatewayError::UnknownOrder { broker_order_id } => {
                write!(f, "BROKER_UNKNOWN_ORDER: {broker_order_id}")
            }
            BrokerGatewayError::Rejected { reason } => write!(f, "BROKER_REJECTED: {reason}"),
        }
    }
}

impl std::error::Error for BrokerGatewayError {}

/// Parameters for the `getHistoricalData` stub.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoricalDataRequest {
    pub instrument_token: i64,
    pub from_epoch_ms: i64,
    pub to_epoch_ms: i64,
    pub interval_secs: i64,
}

/// Opaque outbound broker interface. Order Router (C5) and Kill Switch (C7)
/// are the only callers; both hold a `&mut dyn BrokerGateway` (or an `Arc`
/// behind a mutex, depending on the composition point) rather than a
/// concrete broker type.
pub trait BrokerGateway: Send {
    fn place_order(&mut self, req: &OrderRequest) -> Result<Order, BrokerGatewayError>;

    fn cancel_order(&mut self, broker_order_id: &str) -> Result<(), BrokerGatewayError>;

    fn get_margins(&self) -> Margins;

    fn get_order_margin(&self, req: &OrderRequest) -> Micros;

    fn get_basket_margin(&self, reqs: &[OrderRequest]) -> Micros;

    /// Keyed `"net"` per the source interface's `map{"net":[Position]}`
    /// shape.
    fn get_positions(&self) -> BTreeMap<String, Vec<Position>>;

    /// Stub: the source interface names this operation but the reference
    /// implementation never backs it with real data.
    fn get_historical_data(&self, _req: &HistoricalDataRequest) -> Vec<Bar> {
        Vec::new()
    }
}
