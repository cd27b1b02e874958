use crate::backend::{Backend, Transaction};
use crate::error::{ExecStage, MigrateError, MigrateResult};
use crate::events::{EventSink, MigrationEvent};
use crate::types::{Direction, Operation};
use std::time::Instant;
use tracing::{info, warn};

/// Executes one operation per transaction.
///
/// The change body and the bookkeeping insert/delete commit together or not
/// at all. A failure rolls back and is returned; the caller stops there.
pub struct Driver<'a, B: Backend> {
    backend: &'a B,
    sink: &'a dyn EventSink,
}

impl<'a, B: Backend> Driver<'a, B> {
    pub fn new(backend: &'a B, sink: &'a dyn EventSink) -> Self {
        Self { backend, sink }
    }

    pub async fn execute(&self, op: &Operation) -> MigrateResult<()> {
        let sql = runnable_body(op)?;

        let started = Instant::now();
        let mut tx = self
            .backend
            .begin()
            .await
            .map_err(|e| failure(op, ExecStage::Begin, e))?;

        if let Err(err) = self.run_in_tx(&mut tx, op, sql).await {
            if let Err(rb) = tx.rollback().await {
                warn!(identifier = op.id(), error = %rb, "rollback failed");
            }
            return Err(err);
        }

        tx.commit()
            .await
            .map_err(|e| failure(op, ExecStage::Commit, e))?;

        info!(
            identifier = op.id(),
            direction = op.direction.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "migration committed"
        );
        self.sink.notify(&MigrationEvent::for_operation(op, false));
        Ok(())
    }

    async fn run_in_tx(&self, tx: &mut B::Tx, op: &Operation, sql: &str) -> MigrateResult<()> {
        tx.execute(sql)
            .await
            .map_err(|e| failure(op, ExecStage::Execute, e))?;

        let recorded = match op.direction {
            Direction::Forward => self.backend.store_applied(tx, op.id()).await,
            Direction::Reverse => self.backend.delete_applied(tx, op.id()).await,
        };
        recorded.map_err(|e| failure(op, ExecStage::Record, e))
    }
}

/// SQL text `op` would run, or the error execution would stop with before
/// opening a transaction. Preview uses it to stop where a real run would.
pub fn runnable_body(op: &Operation) -> MigrateResult<&str> {
    let body = op.body();
    if body.is_empty() {
        return Err(MigrateError::EmptyMigrationBody {
            id: op.id().to_string(),
            direction: op.direction,
        });
    }
    std::str::from_utf8(body).map_err(|e| {
        failure(
            op,
            ExecStage::Execute,
            anyhow::Error::new(e).context("migration body is not valid UTF-8"),
        )
    })
}

fn failure(op: &Operation, stage: ExecStage, source: anyhow::Error) -> MigrateError {
    MigrateError::ExecutionFailure {
        id: op.id().to_string(),
        direction: op.direction,
        stage,
        source,
    }
}
