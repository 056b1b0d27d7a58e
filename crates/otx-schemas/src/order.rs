//! Order lifecycle types: requests, live orders, and fills.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fixedpoint::Micros;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side that closes a position carrying this one (BUY closes a
    /// short, SELL closes a long).
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopLoss,
    StopLossMarket,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Complete,
    Cancelled,
    Rejected,
    PartiallyFilled,
}

/// A desired outgoing order, not yet accepted by the broker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub instrument_token: i64,
    pub trading_symbol: String,
    pub exchange: String,
    pub side: Side,
    pub order_type: OrderType,
    pub product_code: String,
    /// Already multiplied by lot size. Must be strictly positive.
    pub quantity: i64,
    pub price_micros: Option<i64>,
    pub trigger_price_micros: Option<i64>,
    pub strategy_id: Uuid,
    pub correlation_id: String,
    /// Set by the kill switch when it routes a closure directly to the
    /// broker gateway, bypassing the order router's own gate check.
    pub is_kill_switch_order: bool,
}

impl OrderRequest {
    pub fn price(&self) -> Option<Micros> {
        self.price_micros.map(Micros::new)
    }

    /// `true` when `price * quantity` is representable (market orders with
    /// no price always pass; the position-value check is skipped for them).
    pub fn notional(&self) -> Option<Micros> {
        self.price()?.checked_mul_qty(self.quantity)
    }
}

/// A live order after broker acceptance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub broker_order_id: String,
    pub instrument_token: i64,
    pub status: OrderStatus,
    pub filled_quantity: i64,
    pub average_fill_price_micros: i64,
    pub placed_at_epoch_ms: i64,
    pub updated_at_epoch_ms: i64,
}

/// One incremental fill against a live order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFill {
    pub broker_order_id: String,
    pub instrument_token: i64,
    pub quantity: i64,
    pub price_micros: i64,
    pub filled_at_epoch_ms: i64,
}

/// Volume-weighted average fill price across a set of fills, rounded to two
/// decimal places (half-up), per the VWAP invariant in spec §8.
///
/// Returns `None` for an empty fill set (no fills, no average).
pub fn vwap(fills: &[OrderFill]) -> Option<Micros> {
    let total_qty: i64 = fills.iter().map(|f| f.quantity).sum();
    if total_qty == 0 {
        return None;
    }
    let weighted: i128 = fills
        .iter()
        .map(|f| f.price_micros as i128 * f.quantity as i128)
        .sum();
    let avg = (weighted / total_qty as i128) as i64;
    Some(Micros::new(avg).round_half_up(2))
}
