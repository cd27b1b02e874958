//! smk-testkit
//!
//! Deterministic collaborators for scenario tests:
//! - [`MemoryBackend`]: in-memory bookkeeping table with real transaction
//!   staging, call counters and failure injection.
//! - [`RecordingSink`]: captures migration notifications in order.
//! - [`FailingCatalog`] and catalog builders.

mod backend;

pub use backend::{Faults, MemoryBackend, MemoryLock, MemoryTx};

use anyhow::{anyhow, Result};
use smk_core::{Catalog, ChangeEntry, EventSink, MigrationEvent};
use std::sync::{Arc, Mutex};

/// Entry with both bodies present. Bodies name the identifier so executed
/// SQL can be traced back.
pub fn entry(id: &str) -> ChangeEntry {
    ChangeEntry::new(id, format!("-- up {id}")).with_reverse(format!("-- down {id}"))
}

pub fn catalog(ids: &[&str]) -> Vec<ChangeEntry> {
    ids.iter().map(|id| entry(id)).collect()
}

/// Catalog reader that always fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingCatalog;

impl Catalog for FailingCatalog {
    fn entries(&self) -> Result<Vec<ChangeEntry>> {
        Err(anyhow!("catalog unavailable"))
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MigrationEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// `"<event-name> <identifier>"` per event, e.g. `"applied 001"`.
    pub fn lines(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| match e.identifier() {
                Some(id) => format!("{} {}", e.event_name(), id),
                None => e.event_name().to_string(),
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.events.lock() {
            e.clear();
        }
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: &MigrationEvent) {
        if let Ok(mut e) = self.events.lock() {
            e.push(event.clone());
        }
    }
}
