//! Reconciliation Service (C11): the periodic job that pairs broker
//! positions against the local KV store and resolves whatever drifts.
//!
//! Gated on "is market open" — callers pass a `is_market_open: impl Fn() ->
//! bool` rather than this module reading a clock or calendar itself, the
//! same injected-predicate style the rest of this crate uses for its
//! watermark/gate checks.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use otx_broker::BrokerGateway;
use otx_events::{EventBus, ReconciliationEvent, RiskEvent};
use otx_persistence::kv_store::KvStore;
use otx_schemas::position::Position;
use otx_schemas::reconcile::{
    MismatchResolution, MismatchType, PositionMismatch, ReconcileTrigger, ReconciliationResult,
};

const PRICE_DRIFT_THRESHOLD_PCT: f64 = 2.0;

/// Skipped entirely: the job is gated on market hours and does not run
/// while the market is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    Skipped,
    Ran(ReconciliationResult),
}

pub struct ReconciliationService {
    broker: Arc<Mutex<Box<dyn BrokerGateway>>>,
    local_positions: Arc<dyn KvStore<Position>>,
    events: Option<Arc<EventBus<ReconciliationEvent>>>,
    risk_events: Option<Arc<EventBus<RiskEvent>>>,
}

impl ReconciliationService {
    pub fn new(
        broker: Arc<Mutex<Box<dyn BrokerGateway>>>,
        local_positions: Arc<dyn KvStore<Position>>,
    ) -> Self {
        Self { broker, local_positions, events: None, risk_events: None }
    }

    pub fn with_reconciliation_event_bus(mut self, bus: Arc<EventBus<ReconciliationEvent>>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn with_risk_event_bus(mut self, bus: Arc<EventBus<RiskEvent>>) -> Self {
        self.risk_events = Some(bus);
        self
    }

    /// Run one reconciliation pass, unless the market is closed.
    pub fn run(
        &self,
        trigger: ReconcileTrigger,
        now_epoch_ms: i64,
        is_market_open: impl Fn() -> bool,
    ) -> ReconciliationOutcome {
        if !is_market_open() {
            return ReconciliationOutcome::Skipped;
        }

        let broker_positions: BTreeMap<i64, Position> = {
            let broker = self.broker.lock().expect("broker lock poisoned");
            broker
                .get_positions()
                .into_values()
                .flatten()
                .filter(|p| p.quantity != 0)
                .map(|p| (p.instrument_token, p))
                .collect()
        };
        let local_positions: BTreeMap<i64, Position> = self
            .local_positions
            .find_all()
            .into_iter()
            .map(|p| (p.instrument_token, p))
            .collect();

        let mismatches = classify(&broker_positions, &local_positions);
        for mismatch in &mismatches {
            self.resolve(mismatch, &broker_positions, &local_positions);
        }

        let result = ReconciliationResult { trigger, mismatches, checked_at_epoch_ms: now_epoch_ms };
        self.publish(&result);
        ReconciliationOutcome::Ran(result)
    }

    fn resolve(
        &self,
        mismatch: &PositionMismatch,
        broker_positions: &BTreeMap<i64, Position>,
        local_positions: &BTreeMap<i64, Position>,
    ) {
        if mismatch.resolution != MismatchResolution::AutoSync {
            return;
        }
        match mismatch.mismatch_type {
            MismatchType::MissingBroker => {
                if let Some(local) = local_positions.get(&mismatch.instrument_token) {
                    self.local_positions.delete(local.id);
                }
            }
            MismatchType::QuantityMismatch | MismatchType::MissingLocal => {
                if let Some(local) = local_positions.get(&mismatch.instrument_token) {
                    self.local_positions.delete(local.id);
                }
                if let Some(position) = broker_positions.get(&mismatch.instrument_token) {
                    let _ = self.local_positions.save(position.clone());
                }
            }
            MismatchType::PriceDrift => {}
        }
    }

    fn publish(&self, result: &ReconciliationResult) {
        if let Some(bus) = &self.events {
            bus.publish(&ReconciliationEvent::new(result.clone()));
        }
        let Some(bus) = &self.risk_events else { return };
        for mismatch in &result.mismatches {
            let mut detail = BTreeMap::new();
            detail.insert(
                "instrument_token".to_string(),
                serde_json::Value::from(mismatch.instrument_token),
            );
            bus.publish(&RiskEvent::new(
                mismatch.mismatch_type.severity(),
                mismatch_code(mismatch.mismatch_type),
                format!(
                    "reconciliation mismatch on {}: {:?}",
                    mismatch.trading_symbol, mismatch.mismatch_type
                ),
                &detail,
            ));
        }
    }
}

fn mismatch_code(mismatch_type: MismatchType) -> &'static str {
    match mismatch_type {
        MismatchType::QuantityMismatch => "RECONCILE_QUANTITY_MISMATCH",
        MismatchType::MissingLocal => "RECONCILE_MISSING_LOCAL",
        MismatchType::MissingBroker => "RECONCILE_MISSING_BROKER",
        MismatchType::PriceDrift => "RECONCILE_PRICE_DRIFT",
    }
}

fn classify(
    broker: &BTreeMap<i64, Position>,
    local: &BTreeMap<i64, Position>,
) -> Vec<PositionMismatch> {
    let mut tokens: Vec<i64> = broker.keys().chain(local.keys()).copied().collect();
    tokens.sort_unstable();
    tokens.dedup();

    let mut mismatches = Vec::new();
    for token in tokens {
        match (broker.get(&token), local.get(&token)) {
            (Some(b), Some(l)) => {
                if b.quantity != l.quantity {
                    mismatches.push(mismatch_for(token, &b.trading_symbol, MismatchType::QuantityMismatch, b, l));
                } else if price_drift_pct(b.average_price_micros, l.average_price_micros) > PRICE_DRIFT_THRESHOLD_PCT {
                    mismatches.push(mismatch_for(token, &b.trading_symbol, MismatchType::PriceDrift, b, l));
                }
            }
            (Some(b), None) => {
                mismatches.push(PositionMismatch {
                    instrument_token: token,
                    trading_symbol: b.trading_symbol.clone(),
                    mismatch_type: MismatchType::MissingLocal,
                    resolution: MismatchType::MissingLocal.default_resolution(),
                    broker_quantity: Some(b.quantity),
                    local_quantity: None,
                    broker_avg_price_micros: Some(b.average_price_micros),
                    local_avg_price_micros: None,
                });
            }
            (None, Some(l)) => {
                mismatches.push(PositionMismatch {
                    instrument_token: token,
                    trading_symbol: l.trading_symbol.clone(),
                    mismatch_type: MismatchType::MissingBroker,
                    resolution: MismatchType::MissingBroker.default_resolution(),
                    broker_quantity: None,
                    local_quantity: Some(l.quantity),
                    broker_avg_price_micros: None,
                    local_avg_price_micros: Some(l.average_price_micros),
                });
            }
            (None, None) => unreachable!("token came from one of the two maps"),
        }
    }
    mismatches
}

fn mismatch_for(
    token: i64,
    symbol: &str,
    mismatch_type: MismatchType,
    broker: &Position,
    local: &Position,
) -> PositionMismatch {
    PositionMismatch {
        instrument_token: token,
        trading_symbol: symbol.to_string(),
        mismatch_type,
        resolution: mismatch_type.default_resolution(),
        broker_quantity: Some(broker.quantity),
        local_quantity: Some(local.quantity),
        broker_avg_price_micros: Some(broker.average_price_micros),
        local_avg_price_micros: Some(local.average_price_micros),
    }
}

/// `|broker.avgPrice − local.avgPrice| / local.avgPrice` as a percentage.
/// A `local` average price of zero can't divide; treated as no drift since
/// there is nothing to drift away from.
fn price_drift_pct(broker_avg_price_micros: i64, local_avg_price_micros: i64) -> f64 {
    if local_avg_price_micros == 0 {
        return 0.0;
    }
    let diff = (broker_avg_price_micros - local_avg_price_micros).abs() as f64;
    diff / (local_avg_price_micros as f64) * 100.0
}
