//! KV store for positions and orders (C13, KV half).
//!
//! Generic over any record that can report its own id and whether it's
//! still "pending" in the domain sense (e.g. an `Order` in `OPEN` or
//! `PARTIALLY_FILLED` status).

use std::collections::BTreeMap;
use std::sync::Mutex;

use otx_schemas::order::{Order, OrderStatus};
use otx_schemas::position::Position;
use uuid::Uuid;

use crate::error::PersistenceError;

pub trait KvRecord {
    fn record_id(&self) -> Uuid;
    fn is_pending(&self) -> bool;
}

impl KvRecord for Order {
    fn record_id(&self) -> Uuid {
        // Orders are keyed by broker_order_id in the domain; derive a
        // stable UUID so this type can share the generic KV store.
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.broker_order_id.as_bytes())
    }

    fn is_pending(&self) -> bool {
        matches!(self.status, OrderStatus::Open | OrderStatus::PartiallyFilled)
    }
}

impl KvRecord for Position {
    fn record_id(&self) -> Uuid {
        self.id
    }

    /// Positions have no pending/settled distinction; every saved position
    /// is always "live" for `find_pending`'s purposes.
    fn is_pending(&self) -> bool {
        true
    }
}

pub trait KvStore<T: Clone>: Send + Sync {
    fn save(&self, value: T) -> Result<(), PersistenceError>;
    fn delete(&self, id: Uuid) -> Option<T>;
    fn find_all(&self) -> Vec<T>;
    fn find_pending(&self) -> Vec<T>;
    fn count_pending(&self) -> usize;
}

#[derive(Default)]
pub struct InMemoryKvStore<T: Clone> {
    records: Mutex<BTreeMap<Uuid, T>>,
}

impl<T: Clone> InMemoryKvStore<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<T: KvRecord + Clone + Send + Sync> KvStore<T> for InMemoryKvStore<T> {
    fn save(&self, value: T) -> Result<(), PersistenceError> {
        let mut records = self.records.lock().expect("kv store lock poisoned");
        records.insert(value.record_id(), value);
        Ok(())
    }

    fn delete(&self, id: Uuid) -> Option<T> {
        let mut records = self.records.lock().expect("kv store lock poisoned");
        records.remove(&id)
    }

    fn find_all(&self) -> Vec<T> {
        let records = self.records.lock().expect("kv store lock poisoned");
        records.values().cloned().collect()
    }

    fn find_pending(&self) -> Vec<T> {
        let records = self.records.lock().expect("kv store lock poisoned");
        records.values().filter(|v| v.is_pending()).cloned().collect()
    }

    fn count_pending(&self) -> usize {
        self.find_pending().len()
    }
}
