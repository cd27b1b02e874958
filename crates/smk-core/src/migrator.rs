use crate::backend::Backend;
use crate::catalog::Catalog;
use crate::driver::{runnable_body, Driver};
use crate::error::{MigrateError, MigrateResult};
use crate::events::{EventSink, MigrationEvent, TracingSink};
use crate::plan::{plan_down, plan_status, plan_to, plan_up};
use crate::types::{ChangeEntry, Plan, RunOptions, StatusReport};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sequences catalog read, locking, reconciliation and execution for one
/// invocation.
///
/// A real run goes:
/// read catalog -> create table -> lock -> read applied -> plan -> execute
/// one by one -> unlock (on every exit path).
///
/// Preview takes no lock and writes nothing: read catalog -> read applied
/// (empty when the table is missing) -> plan -> notify.
pub struct Migrator<C, B> {
    catalog: C,
    backend: B,
    sink: Arc<dyn EventSink>,
}

impl<C: Catalog, B: Backend> Migrator<C, B> {
    pub fn new(catalog: C, backend: B) -> Self {
        Self {
            catalog,
            backend,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Apply every pending migration.
    pub async fn up(&self, opts: &RunOptions) -> MigrateResult<Plan> {
        self.run(opts, |catalog, applied| plan_up(catalog, applied, 0))
            .await
    }

    /// Revert the `steps` most recently applied migrations (`steps < 0` => all).
    pub async fn down(&self, steps: i64, opts: &RunOptions) -> MigrateResult<Plan> {
        self.run(opts, move |catalog, applied| {
            plan_down(catalog, applied, steps)
        })
        .await
    }

    /// Apply or revert until `target` is the current version.
    pub async fn to(&self, target: &str, opts: &RunOptions) -> MigrateResult<Plan> {
        self.run(opts, |catalog, applied| plan_to(catalog, applied, target))
            .await
    }

    /// Catalog entries with their applied flag. Takes no lock and writes
    /// nothing; a missing bookkeeping table reads as nothing applied.
    pub async fn status(&self) -> MigrateResult<StatusReport> {
        let catalog = self.catalog.entries().map_err(MigrateError::CatalogRead)?;
        let applied = self.read_applied_if_present().await?;
        Ok(plan_status(&catalog, &applied))
    }

    async fn run<F>(&self, opts: &RunOptions, planner: F) -> MigrateResult<Plan>
    where
        F: FnOnce(&[ChangeEntry], &[String]) -> MigrateResult<Plan>,
    {
        let catalog = self.catalog.entries().map_err(MigrateError::CatalogRead)?;

        if opts.preview {
            let applied = self.read_applied_if_present().await?;
            let plan = planner(&catalog, &applied)?;
            return self.preview(plan);
        }

        self.backend
            .create_table()
            .await
            .map_err(MigrateError::TableCreate)?;

        // The guard releases on drop too, so a cancelled invocation frees it.
        let lock = self.backend.lock().await.map_err(MigrateError::Lock)?;
        debug!("migration lock acquired");

        let result = self.reconcile_and_execute(&catalog, planner).await;

        match self.backend.unlock(lock).await {
            Ok(()) => debug!("migration lock released"),
            Err(err) => warn!(error = %err, "failed to release migration lock"),
        }

        result
    }

    async fn read_applied_if_present(&self) -> MigrateResult<Vec<String>> {
        let exists = self
            .backend
            .has_table()
            .await
            .map_err(MigrateError::AppliedSetRead)?;
        if !exists {
            return Ok(Vec::new());
        }
        self.backend
            .read_applied()
            .await
            .map_err(MigrateError::AppliedSetRead)
    }

    /// Report what a real run would do, stopping at the first operation a
    /// real run would refuse to execute.
    fn preview(&self, plan: Plan) -> MigrateResult<Plan> {
        debug!(operations = plan.len(), preview = true, "reconciled");
        if plan.nothing_to_revert {
            self.sink.notify(&MigrationEvent::NothingToRevert);
            return Ok(plan);
        }
        for op in &plan.operations {
            runnable_body(op)?;
            self.sink.notify(&MigrationEvent::for_operation(op, true));
        }
        Ok(plan)
    }

    async fn reconcile_and_execute<F>(
        &self,
        catalog: &[ChangeEntry],
        planner: F,
    ) -> MigrateResult<Plan>
    where
        F: FnOnce(&[ChangeEntry], &[String]) -> MigrateResult<Plan>,
    {
        let applied = self
            .backend
            .read_applied()
            .await
            .map_err(MigrateError::AppliedSetRead)?;

        let plan = planner(catalog, &applied)?;
        debug!(
            operations = plan.len(),
            applied = applied.len(),
            preview = false,
            "reconciled"
        );

        if plan.nothing_to_revert {
            self.sink.notify(&MigrationEvent::NothingToRevert);
            return Ok(plan);
        }

        let driver = Driver::new(&self.backend, self.sink.as_ref());
        for op in &plan.operations {
            driver.execute(op).await?;
        }

        if !plan.is_empty() {
            info!(operations = plan.len(), "migrations complete");
        }
        Ok(plan)
    }
}
