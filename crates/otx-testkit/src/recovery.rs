use serde_json::Value;
use std::collections::HashMap;

/// Minimal fake broker used ONLY for tests.
/// Enforces idempotency by idempotency_key: repeated submit is treated as a no-op.
#[derive(Default)]
pub struct FakeBroker {
    orders: HashMap<String, Value>,
    submits: usize,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit an order. If idempotency_key already exists, this is a no-op.
    pub fn submit(&mut self, idempotency_key: &str, order_json: Value) {
        if self.orders.contains_key(idempotency_key) {
            return;
        }
        self.orders.insert(idempotency_key.to_string(), order_json);
        self.submits += 1;
    }

    pub fn has_order(&self, idempotency_key: &str) -> bool {
        self.orders.contains_key(idempotency_key)
    }

    pub fn submit_count(&self) -> usize {
        self.submits
    }
}

/// A single pending outbox entry awaiting broker acknowledgement.
#[derive(Clone, Debug)]
pub struct OutboxEntry {
    pub idempotency_key: String,
    pub order_json: Value,
}

#[derive(Debug, Clone)]
pub struct RecoveryReport {
    pub inspected: usize,
    pub acked: usize,
    pub resubmitted: usize,
}

/// Recovery logic against a broker snapshot/adapter.
///
/// - If the broker already has the order (by idempotency_key), treat it as
///   already ACKED — do not resubmit.
/// - If the broker does not have it, resubmit exactly once (the broker is
///   idempotent) and mark it ACKED.
///
/// This is a single-shot "restart reconciliation" primitive; it does not
/// implement retries/backoff or polling loops.
pub fn recover_outbox_against_broker(
    unacked: &[OutboxEntry],
    broker: &mut FakeBroker,
) -> RecoveryReport {
    let mut report = RecoveryReport {
        inspected: unacked.len(),
        acked: 0,
        resubmitted: 0,
    };

    for entry in unacked {
        if broker.has_order(&entry.idempotency_key) {
            report.acked += 1;
            continue;
        }

        broker.submit(&entry.idempotency_key, entry.order_json.clone());
        report.resubmitted += 1;
        report.acked += 1;
    }

    report
}
