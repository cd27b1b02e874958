use serde::{Deserialize, Serialize};
use std::fmt;

/// One schema change: a unique, sortable identifier plus its SQL bodies.
///
/// Produced by a catalog reader; immutable afterwards. A missing `reverse`
/// body makes the change forward-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEntry {
    pub id: String,
    pub forward: Vec<u8>,
    pub reverse: Option<Vec<u8>>,
}

impl ChangeEntry {
    pub fn new(id: impl Into<String>, forward: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            forward: forward.into(),
            reverse: None,
        }
    }

    pub fn with_reverse(mut self, reverse: impl Into<Vec<u8>>) -> Self {
        self.reverse = Some(reverse.into());
        self
    }

    /// Body to run for `direction`. Absent reverse content reads as empty.
    pub fn body(&self, direction: Direction) -> &[u8] {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => self.reverse.as_deref().unwrap_or_default(),
        }
    }

    pub fn is_reversible(&self) -> bool {
        !self.body(Direction::Reverse).is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A computed unit of work. Transient: never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub direction: Direction,
    pub entry: ChangeEntry,
}

impl Operation {
    pub fn forward(entry: ChangeEntry) -> Self {
        Self {
            direction: Direction::Forward,
            entry,
        }
    }

    pub fn reverse(entry: ChangeEntry) -> Self {
        Self {
            direction: Direction::Reverse,
            entry,
        }
    }

    pub fn id(&self) -> &str {
        &self.entry.id
    }

    pub fn body(&self) -> &[u8] {
        self.entry.body(self.direction)
    }
}

/// Per-invocation options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Compute and report operations without executing them. No lock is
    /// taken and the bookkeeping table is never written.
    pub preview: bool,
}

impl RunOptions {
    pub fn preview() -> Self {
        Self { preview: true }
    }
}

/// Ordered operations produced by reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Plan {
    pub operations: Vec<Operation>,
    /// Set when a revert was requested but there is nothing to revert.
    pub nothing_to_revert: bool,
}

impl Plan {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self {
            operations,
            nothing_to_revert: false,
        }
    }

    pub fn nothing_to_revert() -> Self {
        Self {
            operations: Vec::new(),
            nothing_to_revert: true,
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.operations.iter().map(Operation::id).collect()
    }
}

/// One catalog entry as seen by `status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub id: String,
    pub applied: bool,
    pub reversible: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Catalog order.
    pub entries: Vec<MigrationStatus>,
    /// Applied identifiers with no catalog entry, in application order.
    pub unknown_applied: Vec<String>,
}

impl StatusReport {
    pub fn pending(&self) -> impl Iterator<Item = &MigrationStatus> {
        self.entries.iter().filter(|e| !e.applied)
    }

    /// Highest applied identifier in catalog order.
    pub fn current(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.applied)
            .map(|e| e.id.as_str())
    }
}
