//! Kill Switch (C7): the emergency stop. Idempotent activation pauses every
//! strategy, flips the Order Router's kill-switch flag, cancels every
//! pending broker order, and closes every open position — the closures go
//! straight to the broker gateway, bypassing the Order Router and the Risk
//! Gate entirely, because by definition the gate-enforced path is what's
//! being shut down.
//!
//! Strategy pausing is wired through a caller-supplied callback rather than
//! a direct dependency on `otx-strategy`, since `otx-strategy` already
//! depends on this crate (for its scenario tests) and a crate cycle through
//! normal dependencies is not something Cargo permits.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use otx_broker::BrokerGateway;
use otx_events::{EventBus, RiskEvent};
use otx_persistence::kv_store::KvStore;
use otx_schemas::order::{Order, OrderRequest, OrderType};
use otx_schemas::risk::RiskEventLevel;

use crate::router::OrderRouter;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_GAP: Duration = Duration::from_millis(100);
const FAN_OUT_DEADLINE: Duration = Duration::from_secs(30);

/// Outcome of one cancel or close attempt within a kill-switch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillSwitchOpError {
    pub target: String,
    pub message: String,
}

/// Summary of one activation run. Individual failures are collected here
/// rather than aborting the run — a kill switch that stops partway through
/// because one cancel failed would defeat its own purpose.
#[derive(Debug, Clone, Default)]
pub struct KillSwitchResult {
    pub cancelled_order_ids: Vec<String>,
    pub closed_instrument_tokens: Vec<i64>,
    pub errors: Vec<KillSwitchOpError>,
}

/// Emergency stop: pause, block new orders, unwind.
pub struct KillSwitch {
    active: AtomicBool,
    order_router: Arc<OrderRouter>,
    broker: Arc<Mutex<Box<dyn BrokerGateway>>>,
    kv_store: Arc<dyn KvStore<Order>>,
    pause_all_strategies: Box<dyn Fn() -> Vec<Uuid> + Send + Sync>,
    risk_events: Option<Arc<EventBus<RiskEvent>>>,
}

impl KillSwitch {
    pub fn new(
        order_router: Arc<OrderRouter>,
        broker: Arc<Mutex<Box<dyn BrokerGateway>>>,
        kv_store: Arc<dyn KvStore<Order>>,
        pause_all_strategies: impl Fn() -> Vec<Uuid> + Send + Sync + 'static,
    ) -> Self {
        Self {
            active: AtomicBool::new(false),
            order_router,
            broker,
            kv_store,
            pause_all_strategies: Box::new(pause_all_strategies),
            risk_events: None,
        }
    }

    pub fn with_risk_event_bus(mut self, bus: Arc<EventBus<RiskEvent>>) -> Self {
        self.risk_events = Some(bus);
        self
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// `PauseAllStrategies`: a separate, milder action that only pauses
    /// strategies — it does not touch the kill-switch flag or place any
    /// orders.
    pub fn pause_all_strategies(&self) -> Vec<Uuid> {
        (self.pause_all_strategies)()
    }

    /// Full emergency stop. Idempotent: a second call while already active
    /// is a no-op that returns an empty result.
    pub fn activate(&self) -> KillSwitchResult {
        if self.active.swap(true, Ordering::SeqCst) {
            return KillSwitchResult::default();
        }

        self.pause_all_strategies();
        self.order_router.activate_kill_switch();

        let mut result = KillSwitchResult::default();
        self.cancel_pending_orders(&mut result);
        self.close_open_positions(&mut result);

        self.publish_activation_event();
        result
    }

    /// `Deactivate`: clears both the kill-switch flag here and on the Order
    /// Router. Strategies are NOT automatically resumed.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.order_router.deactivate_kill_switch();
    }

    fn cancel_pending_orders(&self, result: &mut KillSwitchResult) {
        let pending = self.kv_store.find_pending();
        let deadline = Instant::now() + FAN_OUT_DEADLINE;

        let outcomes: Vec<(String, Result<(), String>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = pending
                .iter()
                .filter(|o| !o.broker_order_id.is_empty())
                .map(|order| {
                    let broker_order_id = order.broker_order_id.clone();
                    let broker = &self.broker;
                    scope.spawn(move || {
                        let outcome = retry_with_deadline(deadline, || {
                            let mut broker = broker.lock().expect("broker lock poisoned");
                            broker
                                .cancel_order(&broker_order_id)
                                .map_err(|e| e.to_string())
                        });
                        (broker_order_id, outcome)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("cancel worker panicked")).collect()
        });

        for (broker_order_id, outcome) in outcomes {
            match outcome {
                Ok(()) => result.cancelled_order_ids.push(broker_order_id),
                Err(message) => result.errors.push(KillSwitchOpError { target: broker_order_id, message }),
            }
        }
    }

    fn close_open_positions(&self, result: &mut KillSwitchResult) {
        let positions = {
            let broker = self.broker.lock().expect("broker lock poisoned");
            broker.get_positions()
        };
        let open_positions: Vec<_> = positions
            .values()
            .flatten()
            .filter(|p| p.quantity != 0)
            .cloned()
            .collect();

        let deadline = Instant::now() + FAN_OUT_DEADLINE;

        let outcomes: Vec<(i64, Result<(), String>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = open_positions
                .iter()
                .map(|position| {
                    let broker = &self.broker;
                    let side = position.closing_side().expect("non-zero quantity always has a closing side");
                    let req = OrderRequest {
                        instrument_token: position.instrument_token,
                        trading_symbol: position.trading_symbol.clone(),
                        exchange: position.exchange.clone(),
                        side,
                        order_type: OrderType::Market,
                        product_code: "MIS".to_string(),
                        quantity: position.closing_quantity(),
                        price_micros: None,
                        trigger_price_micros: None,
                        strategy_id: position.strategy_id,
                        correlation_id: format!("KILLSWITCH-{}", position.id),
                        is_kill_switch_order: true,
                    };
                    let token = position.instrument_token;
                    scope.spawn(move || {
                        let outcome = retry_with_deadline(deadline, || {
                            let mut broker = broker.lock().expect("broker lock poisoned");
                            broker.place_order(&req).map(|_| ()).map_err(|e| e.to_string())
                        });
                        (token, outcome)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("close worker panicked")).collect()
        });

        for (token, outcome) in outcomes {
            match outcome {
                Ok(()) => result.closed_instrument_tokens.push(token),
                Err(message) => {
                    result.errors.push(KillSwitchOpError { target: token.to_string(), message })
                }
            }
        }
    }

    fn publish_activation_event(&self) {
        let Some(bus) = &self.risk_events else { return };
        let detail = BTreeMap::new();
        bus.publish(&RiskEvent::new(
            RiskEventLevel::Critical,
            "KILL_SWITCH_ACTIVATED",
            "kill switch activated: strategies paused, new orders blocked, positions unwinding",
            &detail,
        ));
    }
}

/// Retry `op` up to `RETRY_ATTEMPTS` times with a `RETRY_GAP` pause between
/// attempts, abandoning further retries once `deadline` has passed.
fn retry_with_deadline(deadline: Instant, mut op: impl FnMut() -> Result<(), String>) -> Result<(), String> {
    let mut last_err = String::from("no attempts made");
    for attempt in 0..RETRY_ATTEMPTS {
        if Instant::now() >= deadline {
            return Err(format!("{last_err} (deadline exceeded)"));
        }
        match op() {
            Ok(()) => return Ok(()),
            Err(e) => last_err = e,
        }
        if attempt + 1 < RETRY_ATTEMPTS {
            std::thread::sleep(RETRY_GAP);
        }
    }
    Err(last_err)
}
