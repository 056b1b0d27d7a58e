//! Relational audit store (C13, audit half) and the dead-letter sink the
//! write-behind store drains into.
//!
//! Grounded on the append-only, hash-chained JSON-lines audit log pattern:
//! every record carries a monotonic sequence number and a SHA-256 hash
//! chaining it to the previous record, so tampering with or reordering the
//! in-memory log is detectable via [`InMemoryAuditStore::verify_integrity`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use otx_events::DecisionEvent;
use otx_schemas::morph::MorphHistoryEntry;
use otx_schemas::order::OrderFill;
use otx_schemas::risk::RiskLimits;

use crate::error::PersistenceError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadLetterStatus {
    Pending,
}

/// A batch (or single entity) that failed to persist even through the
/// synchronous fallback write.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub event_type: String,
    pub payload: Value,
    pub status: DeadLetterStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error_message: String,
}

impl DeadLetterEntry {
    /// `payload` must already include the triggering sequence number.
    pub fn new(event_type: impl Into<String>, payload: Value, error_message: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            status: DeadLetterStatus::Pending,
            retry_count: 0,
            max_retries: 3,
            error_message: error_message.into(),
        }
    }
}

pub trait AuditStore: Send + Sync {
    fn record_decision(&self, event: &DecisionEvent) -> Result<(), PersistenceError>;
    fn record_risk_limits(&self, limits: &RiskLimits) -> Result<(), PersistenceError>;
    fn record_morph_history(&self, entry: &MorphHistoryEntry) -> Result<(), PersistenceError>;
    fn record_order_fill(&self, fill: &OrderFill) -> Result<(), PersistenceError>;
    fn record_daily_pnl(&self, day_id: u32, pnl_micros: i64) -> Result<(), PersistenceError>;
    fn record_dead_letter(&self, entry: DeadLetterEntry) -> Result<(), PersistenceError>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AuditRecord {
    seq: u64,
    kind: String,
    payload: Value,
    hash_prev: Option<String>,
    hash_self: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { records: usize },
    Broken { index: usize, reason: String },
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

fn canonical_json(record: &AuditRecord) -> String {
    let raw = serde_json::to_value(record).expect("audit record always serializes");
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted).expect("sorted value always serializes")
}

fn compute_hash(record: &AuditRecord) -> String {
    let mut clone = record.clone();
    clone.hash_self = None;
    let canonical = canonical_json(&clone);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash-chained, append-only in-memory audit log.
pub struct InMemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
    last_hash: Mutex<Option<String>>,
    seq: AtomicU64,
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            last_hash: Mutex::new(None),
            seq: AtomicU64::new(0),
        }
    }

    fn append(&self, kind: &str, payload: Value) -> Result<(), PersistenceError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let mut last_hash = self.last_hash.lock().expect("audit store lock poisoned");

        let mut record = AuditRecord {
            seq,
            kind: kind.to_string(),
            payload,
            hash_prev: last_hash.clone(),
            hash_self: None,
        };
        let self_hash = compute_hash(&record);
        record.hash_self = Some(self_hash.clone());
        *last_hash = Some(self_hash);

        self.records
            .lock()
            .expect("audit store lock poisoned")
            .push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("audit store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records_of_kind(&self, kind: &str) -> Vec<Value> {
        let records = self.records.lock().expect("audit store lock poisoned");
        records
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.payload.clone())
            .collect()
    }

    /// Walk the chain, confirming each record's `hash_prev` matches the
    /// previous record's `hash_self` and each `hash_self` is still correct
    /// for its own content.
    pub fn verify_integrity(&self) -> VerifyResult {
        let records = self.records.lock().expect("audit store lock poisoned");
        let mut prev_hash: Option<String> = None;

        for (i, record) in records.iter().enumerate() {
            if record.hash_prev != prev_hash {
                return VerifyResult::Broken {
                    index: i,
                    reason: "hash_prev mismatch".to_string(),
                };
            }
            let recomputed = compute_hash(record);
            if record.hash_self.as_deref() != Some(recomputed.as_str()) {
                return VerifyResult::Broken {
                    index: i,
                    reason: "hash_self mismatch".to_string(),
                };
            }
            prev_hash = record.hash_self.clone();
        }

        VerifyResult::Valid {
            records: records.len(),
        }
    }
}

impl AuditStore for InMemoryAuditStore {
    fn record_decision(&self, event: &DecisionEvent) -> Result<(), PersistenceError> {
        let payload = serde_json::to_value(event).map_err(|e| PersistenceError::WriteFailed {
            reason: e.to_string(),
        })?;
        self.append("decision", payload)
    }

    fn record_risk_limits(&self, limits: &RiskLimits) -> Result<(), PersistenceError> {
        let payload = serde_json::to_value(limits).map_err(|e| PersistenceError::WriteFailed {
            reason: e.to_string(),
        })?;
        self.append("risk_limits", payload)
    }

    fn record_morph_history(&self, entry: &MorphHistoryEntry) -> Result<(), PersistenceError> {
        let payload = serde_json::to_value(entry).map_err(|e| PersistenceError::WriteFailed {
            reason: e.to_string(),
        })?;
        self.append("morph_history", payload)
    }

    fn record_order_fill(&self, fill: &OrderFill) -> Result<(), PersistenceError> {
        let payload = serde_json::to_value(fill).map_err(|e| PersistenceError::WriteFailed {
            reason: e.to_string(),
        })?;
        self.append("order_fill", payload)
    }

    fn record_daily_pnl(&self, day_id: u32, pnl_micros: i64) -> Result<(), PersistenceError> {
        let payload = serde_json::json!({ "day_id": day_id, "pnl_micros": pnl_micros });
        self.append("daily_pnl", payload)
    }

    fn record_dead_letter(&self, entry: DeadLetterEntry) -> Result<(), PersistenceError> {
        let payload = serde_json::to_value(&entry).map_err(|e| PersistenceError::WriteFailed {
            reason: e.to_string(),
        })?;
        self.append("dead_letter", payload)
    }
}
