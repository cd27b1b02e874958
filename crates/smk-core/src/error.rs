use crate::types::Direction;
use std::fmt;
use thiserror::Error;

pub type MigrateResult<T> = Result<T, MigrateError>;

/// Step of the execution driver that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecStage {
    Begin,
    Execute,
    Record,
    Commit,
}

impl fmt::Display for ExecStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecStage::Begin => "begin transaction",
            ExecStage::Execute => "execute body",
            ExecStage::Record => "record bookkeeping row",
            ExecStage::Commit => "commit",
        };
        f.write_str(s)
    }
}

/// Every way an invocation can fail. None are retried.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Catalog reader failed. Raised before any lock or write.
    #[error("failed to read migration catalog")]
    CatalogRead(#[source] anyhow::Error),

    #[error("failed to create migrations table")]
    TableCreate(#[source] anyhow::Error),

    #[error("failed to read applied migrations")]
    AppliedSetRead(#[source] anyhow::Error),

    /// Advisory lock not acquired. Raised before reconciliation.
    #[error("failed to lock database")]
    Lock(#[source] anyhow::Error),

    #[error("migration not found in catalog: {id}")]
    MigrationNotFound { id: String },

    /// Catalog order contradicts the recorded application order.
    #[error("applied migrations and catalog are not in the same order at {id}: {detail}")]
    InconsistentOrder { id: String, detail: String },

    #[error("no {direction} content to run for migration {id}")]
    EmptyMigrationBody { id: String, direction: Direction },

    /// Statement, bookkeeping write or commit failed; the transaction was
    /// rolled back. Earlier operations of the invocation stay committed.
    #[error("failed to run {direction} migration {id} ({stage})")]
    ExecutionFailure {
        id: String,
        direction: Direction,
        stage: ExecStage,
        #[source]
        source: anyhow::Error,
    },
}

impl MigrateError {
    /// Identifier of the offending migration, when there is one.
    pub fn migration_id(&self) -> Option<&str> {
        match self {
            MigrateError::MigrationNotFound { id }
            | MigrateError::InconsistentOrder { id, .. }
            | MigrateError::EmptyMigrationBody { id, .. }
            | MigrateError::ExecutionFailure { id, .. } => Some(id),
            _ => None,
        }
    }
}
