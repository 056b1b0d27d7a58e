//! Concrete event payload types dispatched over an [`crate::EventBus`].
//!
//! All events are immutable once constructed: fields are set at
//! construction and never mutated afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use otx_schemas::{ReconciliationResult, RiskEventLevel};

/// A tick from the broker feed. Dispatch order for `TickEvent` on the bus is
/// fixed: (1) tick processor / cache update, (2) indicator engine,
/// (3) position service, (4) strategy engine — enforced by the priorities
/// each subscriber registers with, not by this type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickEvent {
    pub instrument_token: i64,
    pub last_price_micros: i64,
    pub volume: i64,
    pub timestamp_micros: i64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEventKind {
    Placed,
    Filled,
    PartiallyFilled,
    Rejected,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub kind: OrderEventKind,
    pub previous_status: Option<String>,
    pub instrument_token: i64,
    pub strategy_id: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionEventKind {
    Opened,
    Updated,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionEvent {
    pub position_id: Uuid,
    pub kind: PositionEventKind,
    pub previous_pnl_micros: Option<i64>,
    pub instrument_token: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyEvent {
    pub strategy_id: Uuid,
    pub from_status: String,
    pub to_status: String,
}

/// Risk-level event; `detail` is copied at construction so later mutation of
/// the caller's map cannot retroactively change a published event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskEvent {
    pub level: RiskEventLevel,
    pub code: String,
    pub message: String,
    detail: BTreeMap<String, Value>,
}

impl RiskEvent {
    pub fn new(
        level: RiskEventLevel,
        code: impl Into<String>,
        message: impl Into<String>,
        detail: &BTreeMap<String, Value>,
    ) -> Self {
        Self {
            level,
            code: code.into(),
            message: message.into(),
            detail: detail.clone(),
        }
    }

    pub fn detail(&self) -> &BTreeMap<String, Value> {
        &self.detail
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AdjustmentEventStatus {
    #[default]
    Pending,
    Applied,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentEvent {
    pub strategy_id: Uuid,
    pub status: AdjustmentEventStatus,
    pub description: String,
}

impl AdjustmentEvent {
    /// Status always starts PENDING; a later event marks the resolution.
    pub fn new(strategy_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            strategy_id,
            status: AdjustmentEventStatus::default(),
            description: description.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: Uuid,
    pub description: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    PreOpen,
    Open,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketStatusEvent {
    pub status: MarketStatus,
    pub timestamp_micros: i64,
}

/// Published once per reconciliation run, carrying the full result
/// (every mismatch found) plus whether the run was operator-triggered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationEvent {
    pub result: ReconciliationResult,
    pub manual: bool,
}

impl ReconciliationEvent {
    pub fn new(result: ReconciliationResult) -> Self {
        let manual = result.trigger == otx_schemas::ReconcileTrigger::Manual;
        Self { result, manual }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub component: String,
    pub message: String,
}

/// Audit-only event: never gates behavior, only records it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub category: String,
    pub strategy_id: Option<Uuid>,
    context: BTreeMap<String, Value>,
}

impl DecisionEvent {
    pub fn new(
        category: impl Into<String>,
        strategy_id: Option<Uuid>,
        context: &BTreeMap<String, Value>,
    ) -> Self {
        Self {
            category: category.into(),
            strategy_id,
            context: context.clone(),
        }
    }

    pub fn context(&self) -> &BTreeMap<String, Value> {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_event_defaults_to_pending() {
        let ev = AdjustmentEvent::new(Uuid::nil(), "close leg");
        assert_eq!(ev.status, AdjustmentEventStatus::Pending);
    }

    #[test]
    fn risk_event_detail_is_a_defensive_copy() {
        let mut detail = BTreeMap::new();
        detail.insert("lots".to_string(), Value::from(5));
        let ev = RiskEvent::new(RiskEventLevel::Warning, "X", "msg", &detail);

        detail.insert("lots".to_string(), Value::from(999));

        assert_eq!(ev.detail().get("lots"), Some(&Value::from(5)));
    }

    #[test]
    fn decision_event_context_is_a_defensive_copy() {
        let mut ctx = BTreeMap::new();
        ctx.insert("reason".to_string(), Value::from("manual"));
        let ev = DecisionEvent::new("morph", None, &ctx);

        ctx.insert("reason".to_string(), Value::from("changed"));

        assert_eq!(ev.context().get("reason"), Some(&Value::from("manual")));
    }
}
