use crate::types::{Direction, Operation};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Progress notification emitted once per executed (or, in preview, planned)
/// operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum MigrationEvent {
    Applied { identifier: String },
    Reverted { identifier: String },
    WouldApply { identifier: String },
    WouldRevert { identifier: String },
    NothingToRevert,
}

impl MigrationEvent {
    /// Event for `op`: `applied`/`reverted`, or `would-*` when previewing.
    pub fn for_operation(op: &Operation, preview: bool) -> Self {
        let identifier = op.id().to_string();
        match (op.direction, preview) {
            (Direction::Forward, false) => MigrationEvent::Applied { identifier },
            (Direction::Reverse, false) => MigrationEvent::Reverted { identifier },
            (Direction::Forward, true) => MigrationEvent::WouldApply { identifier },
            (Direction::Reverse, true) => MigrationEvent::WouldRevert { identifier },
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            MigrationEvent::Applied { .. } => "applied",
            MigrationEvent::Reverted { .. } => "reverted",
            MigrationEvent::WouldApply { .. } => "would-apply",
            MigrationEvent::WouldRevert { .. } => "would-revert",
            MigrationEvent::NothingToRevert => "nothing-to-revert",
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            MigrationEvent::Applied { identifier }
            | MigrationEvent::Reverted { identifier }
            | MigrationEvent::WouldApply { identifier }
            | MigrationEvent::WouldRevert { identifier } => Some(identifier),
            MigrationEvent::NothingToRevert => None,
        }
    }
}

/// Receiver of migration notifications.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &MigrationEvent);
}

/// Default sink: one `tracing` INFO line per event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, event: &MigrationEvent) {
        match event.identifier() {
            Some(id) => info!(identifier = id, "{}", event.event_name()),
            None => info!("{}", event.event_name()),
        }
    }
}
