//! Durable journals. One append-only event list per instance.

pub mod fs;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::error::StoreError;
use crate::workflow::HistoryEvent;

pub use fs::FileStore;

pub trait HistoryStore: Send + Sync {
    /// Creates the journal of `instance` holding exactly `first`.
    fn create(&self, instance: &str, first: &HistoryEvent) -> Result<(), StoreError>;

    /// Appends to an existing journal. Events become durable in order.
    fn append(&self, instance: &str, events: &[HistoryEvent]) -> Result<(), StoreError>;

    fn read(&self, instance: &str) -> Result<Vec<HistoryEvent>, StoreError>;

    /// All instance ids with a journal, sorted.
    fn instances(&self) -> Result<Vec<String>, StoreError>;
}

/// Volatile store for tests and one-shot runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    journals: Arc<Mutex<BTreeMap<String, Vec<HistoryEvent>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryStore {
    fn create(&self, instance: &str, first: &HistoryEvent) -> Result<(), StoreError> {
        let mut journals = self.journals.lock().map_err(|_| StoreError::Poisoned)?;
        if journals.contains_key(instance) {
            return Err(StoreError::AlreadyExists(instance.to_string()));
        }
        journals.insert(instance.to_string(), vec![first.clone()]);
        Ok(())
    }

    fn append(&self, instance: &str, events: &[HistoryEvent]) -> Result<(), StoreError> {
        let mut journals = self.journals.lock().map_err(|_| StoreError::Poisoned)?;
        let journal = journals
            .get_mut(instance)
            .ok_or_else(|| StoreError::UnknownInstance(instance.to_string()))?;
        journal.extend_from_slice(events);
        Ok(())
    }

    fn read(&self, instance: &str) -> Result<Vec<HistoryEvent>, StoreError> {
        let journals = self.journals.lock().map_err(|_| StoreError::Poisoned)?;
        journals
            .get(instance)
            .cloned()
            .ok_or_else(|| StoreError::UnknownInstance(instance.to_string()))
    }

    fn instances(&self) -> Result<Vec<String>, StoreError> {
        let journals = self.journals.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(journals.keys().cloned().collect())
    }
}

/// Append handle bound to one instance.
#[derive(Clone)]
pub struct Journal {
    store: Arc<dyn HistoryStore>,
    instance: String,
}

impl Journal {
    pub fn new(store: Arc<dyn HistoryStore>, instance: impl Into<String>) -> Self {
        Self {
            store,
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn append(&self, event: &HistoryEvent) -> Result<(), StoreError> {
        self.store.append(&self.instance, std::slice::from_ref(event))
    }

    pub fn read(&self) -> Result<Vec<HistoryEvent>, StoreError> {
        self.store.read(&self.instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ApplicationRecord;

    fn started() -> HistoryEvent {
        HistoryEvent::Started {
            record: ApplicationRecord::new("Acme", "Dev", "", "", "a@b.c", 1),
            at: chrono::Utc::now(),
        }
    }

    #[test]
    fn create_twice_fails() {
        let store = MemoryStore::new();
        store.create("a", &started()).unwrap();
        let err = store.create("a", &started()).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn append_requires_existing_journal() {
        let store = MemoryStore::new();
        let err = store.append("missing", &[HistoryEvent::Archived]).unwrap_err();
        assert!(matches!(err, StoreError::UnknownInstance(_)));
    }

    #[test]
    fn journal_appends_in_order() {
        let store: Arc<dyn HistoryStore> = Arc::new(MemoryStore::new());
        store.create("b", &started()).unwrap();
        store.create("a", &started()).unwrap();
        let journal = Journal::new(store.clone(), "a");
        journal.append(&HistoryEvent::ReminderDispatched).unwrap();
        journal.append(&HistoryEvent::Archived).unwrap();

        let events = journal.read().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], HistoryEvent::Archived);
        assert_eq!(store.instances().unwrap(), ["a", "b"]);
    }
}
