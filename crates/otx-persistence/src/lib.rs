//! Storage interfaces used across the engine: a write-ahead journal for
//! multi-leg execution, a KV store for orders/positions, an append-only
//! hash-chained audit log, a time-series store for metrics, and the
//! write-behind queue that sits in front of all of them on the hot path.

pub mod audit_store;
pub mod error;
pub mod journal_store;
pub mod kv_store;
pub mod time_series;
pub mod write_behind;

pub use audit_store::{AuditStore, DeadLetterEntry, DeadLetterStatus, InMemoryAuditStore, VerifyResult};
pub use error::PersistenceError;
pub use journal_store::{InMemoryJournalStore, JournalStore};
pub use kv_store::{InMemoryKvStore, KvRecord, KvStore};
pub use time_series::{ts_key, Aggregator, InMemoryTimeSeriesStore, TimeSeriesStore};
pub use write_behind::{BulkSave, WriteBehindStore};

