//! Write-behind store (C13): decouples the hot path from the backing
//! store's latency. `enqueue` is non-blocking; a full queue falls back to
//! a synchronous save, and a synchronous save that also fails is diverted
//! to the audit store's dead-letter table rather than dropped silently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::audit_store::{AuditStore, DeadLetterEntry};
use crate::error::PersistenceError;

/// The backing store a write-behind queue eventually flushes into.
pub trait BulkSave<T>: Send + Sync {
    fn save_one(&self, item: &T) -> Result<(), PersistenceError>;

    fn bulk_save(&self, items: &[T]) -> Result<(), PersistenceError> {
        for item in items {
            self.save_one(item)?;
        }
        Ok(())
    }
}

pub struct WriteBehindStore<T> {
    sender: SyncSender<(u64, T)>,
    receiver: Mutex<Receiver<(u64, T)>>,
    backing: Arc<dyn BulkSave<T>>,
    audit: Arc<dyn AuditStore>,
    seq: AtomicU64,
    event_type: String,
}

impl<T: Clone + Serialize + Send + 'static> WriteBehindStore<T> {
    pub fn new(
        capacity: usize,
        event_type: impl Into<String>,
        backing: Arc<dyn BulkSave<T>>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        let (sender, receiver) = sync_channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            backing,
            audit,
            seq: AtomicU64::new(0),
            event_type: event_type.into(),
        }
    }

    /// Never blocks. Tries the bounded queue first, falls back to a
    /// synchronous save on a full (or disconnected) queue, and as a last
    /// resort records a dead-letter entry if even that fails.
    pub fn enqueue(&self, item: T) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        match self.sender.try_send((seq, item.clone())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                if let Err(e) = self.backing.save_one(&item) {
                    self.dead_letter(seq, &item, &e.to_string());
                }
            }
        }
    }

    fn dead_letter(&self, seq: u64, item: &T, error_message: &str) {
        let item_json = serde_json::to_value(item).unwrap_or(serde_json::Value::Null);
        let payload = serde_json::json!({ "sequence": seq, "item": item_json });
        let entry = DeadLetterEntry::new(self.event_type.clone(), payload, error_message);
        if let Err(e) = self.audit.record_dead_letter(entry) {
            tracing::error!(error = %e, "failed to persist dead-letter entry; item lost");
        }
    }

    /// Drains everything currently queued and bulk-saves it in one call.
    /// On bulk-save failure every drained item is diverted to the dead
    /// letter table individually, still carrying its own sequence number.
    /// Returns the number of items drained.
    pub fn flush(&self) -> usize {
        let batch: Vec<(u64, T)> = {
            let receiver = self.receiver.lock().expect("write-behind lock poisoned");
            let mut batch = Vec::new();
            while let Ok(item) = receiver.try_recv() {
                batch.push(item);
            }
            batch
        };

        if batch.is_empty() {
            return 0;
        }

        let items: Vec<T> = batch.iter().map(|(_, item)| item.clone()).collect();
        let drained = batch.len();
        if let Err(e) = self.backing.bulk_save(&items) {
            for (seq, item) in &batch {
                self.dead_letter(*seq, item, &e.to_string());
            }
        }
        drained
    }

    /// Drains the queue repeatedly until empty. For use on shutdown.
    pub fn flush_all(&self) {
        while self.flush() > 0 {}
    }
}
