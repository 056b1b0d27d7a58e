//! Write-ahead journal store (C13, journal half).
//!
//! `save` must be durable before it returns — the multi-leg executor writes
//! every leg's PENDING entry here before any leg is routed.

use std::sync::Mutex;

use otx_schemas::journal::{ExecutionJournalEntry, LegStatus};
use uuid::Uuid;

use crate::error::PersistenceError;

pub trait JournalStore: Send + Sync {
    fn save(&self, entry: ExecutionJournalEntry) -> Result<(), PersistenceError>;
    fn find_by_status(&self, status: LegStatus) -> Vec<ExecutionJournalEntry>;
    fn find_by_group_id(&self, group_id: Uuid) -> Vec<ExecutionJournalEntry>;
}

/// In-memory reference implementation; durability is "visible to every
/// subsequent call on this process" rather than disk-backed.
#[derive(Default)]
pub struct InMemoryJournalStore {
    entries: Mutex<Vec<ExecutionJournalEntry>>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JournalStore for InMemoryJournalStore {
    fn save(&self, entry: ExecutionJournalEntry) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().expect("journal store lock poisoned");
        match entries.iter_mut().find(|e| {
            e.execution_group_id == entry.execution_group_id && e.leg_index == entry.leg_index
        }) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    fn find_by_status(&self, status: LegStatus) -> Vec<ExecutionJournalEntry> {
        let entries = self.entries.lock().expect("journal store lock poisoned");
        entries.iter().filter(|e| e.status == status).cloned().collect()
    }

    fn find_by_group_id(&self, group_id: Uuid) -> Vec<ExecutionJournalEntry> {
        let entries = self.entries.lock().expect("journal store lock poisoned");
        let mut out: Vec<_> = entries
            .iter()
            .filter(|e| e.execution_group_id == group_id)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.leg_index);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otx_schemas::journal::ExecutionOperation;
    use otx_schemas::order::Side;

    fn entry(group: Uuid, leg: u32, status: LegStatus) -> ExecutionJournalEntry {
        let mut e = ExecutionJournalEntry::new_pending(
            Uuid::nil(),
            group,
            ExecutionOperation::Sequential,
            leg,
            3,
            256265,
            Side::Sell,
            75,
            0,
        );
        e.status = status;
        e
    }

    #[test]
    fn save_upserts_by_group_and_leg_index() {
        let store = InMemoryJournalStore::new();
        let group = Uuid::new_v4();
        store.save(entry(group, 0, LegStatus::Pending)).unwrap();
        store.save(entry(group, 0, LegStatus::Completed)).unwrap();

        let found = store.find_by_group_id(group);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].status, LegStatus::Completed);
    }

    #[test]
    fn find_by_group_id_returns_legs_in_index_order() {
        let store = InMemoryJournalStore::new();
        let group = Uuid::new_v4();
        store.save(entry(group, 2, LegStatus::Pending)).unwrap();
        store.save(entry(group, 0, LegStatus::Pending)).unwrap();
        store.save(entry(group, 1, LegStatus::Pending)).unwrap();

        let found = store.find_by_group_id(group);
        let indices: Vec<u32> = found.iter().map(|e| e.leg_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn find_by_status_filters_across_groups() {
        let store = InMemoryJournalStore::new();
        store
            .save(entry(Uuid::new_v4(), 0, LegStatus::InProgress))
            .unwrap();
        store
            .save(entry(Uuid::new_v4(), 0, LegStatus::Failed))
            .unwrap();

        assert_eq!(store.find_by_status(LegStatus::InProgress).len(), 1);
        assert_eq!(store.find_by_status(LegStatus::Failed).len(), 1);
        assert_eq!(store.find_by_status(LegStatus::Completed).len(), 0);
    }
}
