//! Order Router (C5): the single authoritative egress for outgoing orders.
//!
//! `Route` is a five-step pipeline — kill-switch check, Risk Gate validate,
//! tag generation, broker submission, KV-store record — and is the only
//! point where a request becomes an order. `ActivateKillSwitch` /
//! `DeactivateKillSwitch` flip the router's own flag; the kill switch (C7)
//! itself lives one layer up and calls these plus the broker gateway
//! directly when it needs to bypass this router entirely.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use otx_broker::BrokerGateway;
use otx_events::{DecisionEvent, EventBus, RiskEvent};
use otx_persistence::kv_store::KvStore;
use otx_risk::RiskGate;
use otx_schemas::order::{Order, OrderRequest};
use otx_schemas::position::Position;
use otx_schemas::risk::{RiskEventLevel, Violation};

/// Why `Route` refused a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    KillSwitchActive,
    RiskViolations(Vec<Violation>),
    BrokerRejected(String),
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::KillSwitchActive => write!(f, "kill switch active"),
            RejectionReason::RiskViolations(vs) => {
                let codes: Vec<&str> = vs.iter().map(|v| v.code()).collect();
                write!(f, "risk gate rejected: {}", codes.join(", "))
            }
            RejectionReason::BrokerRejected(reason) => write!(f, "broker rejected: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteResult {
    pub accepted: bool,
    pub rejection_reason: Option<RejectionReason>,
    pub order_id: Option<Uuid>,
}

impl RouteResult {
    fn accepted(order_id: Uuid) -> Self {
        Self { accepted: true, rejection_reason: None, order_id: Some(order_id) }
    }

    fn rejected(reason: RejectionReason) -> Self {
        Self { accepted: false, rejection_reason: Some(reason), order_id: None }
    }
}

/// Priority tag for a routed request; carried through for future ordering
/// and logging needs, not yet interpreted by this router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePriority {
    Normal,
    High,
}

/// The single authoritative egress for outgoing orders. Serializes its own
/// risk-check-then-place sequence per request via `route_lock`; the
/// kill-switch flag is read/written atomically and independent of that lock,
/// so activation is never blocked behind an in-flight route.
pub struct OrderRouter {
    kill_switch_active: AtomicBool,
    route_lock: Mutex<()>,
    risk_gate: RiskGate,
    broker: Arc<Mutex<Box<dyn BrokerGateway>>>,
    kv_store: Arc<dyn KvStore<Order>>,
    risk_events: Option<std::sync::Arc<EventBus<RiskEvent>>>,
    decisions: Option<std::sync::Arc<EventBus<DecisionEvent>>>,
}

impl OrderRouter {
    /// `broker` and `kv_store` are shared `Arc`s, not owned outright, so the
    /// kill switch (C7) can hold the same handles and bypass this router's
    /// own gate checks when it closes positions directly.
    pub fn new(
        risk_gate: RiskGate,
        broker: Arc<Mutex<Box<dyn BrokerGateway>>>,
        kv_store: Arc<dyn KvStore<Order>>,
    ) -> Self {
        Self {
            kill_switch_active: AtomicBool::new(false),
            route_lock: Mutex::new(()),
            risk_gate,
            broker,
            kv_store,
            risk_events: None,
            decisions: None,
        }
    }

    pub fn with_risk_event_bus(mut self, bus: std::sync::Arc<EventBus<RiskEvent>>) -> Self {
        self.risk_events = Some(bus);
        self
    }

    pub fn with_decision_bus(mut self, bus: std::sync::Arc<EventBus<DecisionEvent>>) -> Self {
        self.decisions = Some(bus);
        self
    }

    pub fn is_kill_switch_active(&self) -> bool {
        self.kill_switch_active.load(Ordering::SeqCst)
    }

    pub fn activate_kill_switch(&self) {
        self.kill_switch_active.store(true, Ordering::SeqCst);
    }

    pub fn deactivate_kill_switch(&self) {
        self.kill_switch_active.store(false, Ordering::SeqCst);
    }

    pub fn risk_gate(&self) -> &RiskGate {
        &self.risk_gate
    }

    /// `Route(req, priority)`: the five-step pipeline. Serializes the
    /// risk-check-then-place sequence per request against other routes on
    /// this router; the kill-switch check happens first and is not held
    /// under `route_lock`, so a concurrent `ActivateKillSwitch` is always
    /// observed promptly.
    pub fn route(
        &self,
        req: OrderRequest,
        _priority: RoutePriority,
        existing_position: Option<&Position>,
        positions_by_underlying: &BTreeMap<String, i64>,
    ) -> RouteResult {
        // Step 1: kill-switch flag, unless this request is itself a
        // kill-switch-issued closure.
        if self.is_kill_switch_active() && !req.is_kill_switch_order {
            return RouteResult::rejected(RejectionReason::KillSwitchActive);
        }

        let _guard = self.route_lock.lock().expect("order router lock poisoned");

        // Step 2: Risk Gate validate — never short-circuits internally;
        // aggregate violations gate the whole request.
        let violations = self.risk_gate.validate(&req, existing_position, positions_by_underlying);
        if !violations.is_empty() {
            self.publish_risk_event(&violations);
            return RouteResult::rejected(RejectionReason::RiskViolations(violations));
        }

        // Step 3: unique correlation tag. `correlation_id` on the request is
        // the caller-supplied tag; routing stamps a router-assigned order id
        // that the KV store keys fills and status updates against.
        let order_id = Uuid::new_v4();

        // Step 4: hand to the broker gateway.
        let placed = {
            let mut broker = self.broker.lock().expect("broker lock poisoned");
            broker.place_order(&req)
        };

        let order = match placed {
            Ok(order) => order,
            Err(err) => {
                return RouteResult::rejected(RejectionReason::BrokerRejected(err.to_string()));
            }
        };

        // Step 5: record to the KV store.
        if let Err(err) = self.kv_store.save(order) {
            return RouteResult::rejected(RejectionReason::BrokerRejected(err.to_string()));
        }

        self.publish_decision("order_routed", &req, order_id);
        RouteResult::accepted(order_id)
    }

    fn publish_risk_event(&self, violations: &[Violation]) {
        let Some(bus) = &self.risk_events else { return };
        let Some(first) = violations.first() else { return };
        let mut detail = BTreeMap::new();
        detail.insert("violation_count".to_string(), Value::from(violations.len()));
        bus.publish(&RiskEvent::new(
            RiskEventLevel::Warning,
            first.code(),
            first.to_string(),
            &detail,
        ));
    }

    fn publish_decision(&self, category: &str, req: &OrderRequest, order_id: Uuid) {
        let Some(bus) = &self.decisions else { return };
        let mut ctx = BTreeMap::new();
        ctx.insert("order_id".to_string(), Value::from(order_id.to_string()));
        ctx.insert("correlation_id".to_string(), Value::from(req.correlation_id.clone()));
        ctx.insert("trading_symbol".to_string(), Value::from(req.trading_symbol.clone()));
        bus.publish(&DecisionEvent::new(category, Some(req.strategy_id), &ctx));
    }
}
