use anyhow::{Context, Result};
use smk_catalog::DirCatalog;
use smk_config::SmkConfig;
use smk_core::{
    Backend, Catalog, EventSink, MigrationEvent, Migrator, Plan, RunOptions, TracingSink,
};
use smk_db::{DatabaseKind, PgBackend, SqliteBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Database-facing subcommands, resolved from CLI arguments.
#[derive(Debug)]
pub enum Action {
    Up { dry_run: bool },
    Down { steps: i64, dry_run: bool },
    To { version: String, dry_run: bool },
    Status,
}

/// Open the backend named by the URL scheme and run `action` against the
/// directory catalog at `dir`.
pub async fn dispatch(url: &str, dir: PathBuf, config: &SmkConfig, action: Action) -> Result<()> {
    let backend_config = config.backend_config()?;
    let kind = DatabaseKind::from_url(url)?;
    debug!(backend = ?kind, dir = %dir.display(), table = %backend_config.table, "dispatch");
    let catalog = DirCatalog::new(dir);

    match kind {
        DatabaseKind::Postgres => {
            let pool = smk_db::connect_postgres(url).await?;
            run(Migrator::new(catalog, PgBackend::new(pool, backend_config)), action).await
        }
        DatabaseKind::Sqlite => {
            let pool = smk_db::connect_sqlite(url).await?;
            run(
                Migrator::new(catalog, SqliteBackend::new(pool, backend_config)),
                action,
            )
            .await
        }
    }
}

async fn run<C: Catalog, B: Backend>(migrator: Migrator<C, B>, action: Action) -> Result<()> {
    let migrator = migrator.with_sink(Arc::new(StdoutSink));

    match action {
        Action::Up { dry_run } => {
            let plan = migrator
                .up(&options(dry_run))
                .await
                .context("migrate up failed")?;
            print_summary(&plan, dry_run);
        }
        Action::Down { steps, dry_run } => {
            let plan = migrator
                .down(steps, &options(dry_run))
                .await
                .context("migrate down failed")?;
            print_summary(&plan, dry_run);
        }
        Action::To { version, dry_run } => {
            let plan = migrator
                .to(&version, &options(dry_run))
                .await
                .with_context(|| format!("migrate to {version} failed"))?;
            print_summary(&plan, dry_run);
        }
        Action::Status => {
            let report = migrator.status().await.context("status failed")?;
            for e in &report.entries {
                println!(
                    "migration={} applied={} reversible={}",
                    e.id, e.applied, e.reversible
                );
            }
            for id in &report.unknown_applied {
                println!("unknown_applied={id}");
            }
            println!(
                "current={} pending={}",
                report.current().unwrap_or("none"),
                report.pending().count()
            );
        }
    }
    Ok(())
}

fn options(dry_run: bool) -> RunOptions {
    RunOptions { preview: dry_run }
}

fn print_summary(plan: &Plan, dry_run: bool) {
    if !plan.nothing_to_revert {
        println!("operations={} dry_run={}", plan.len(), dry_run);
    }
}

/// Prints one `key=value` line per event and forwards it to tracing.
struct StdoutSink;

impl EventSink for StdoutSink {
    fn notify(&self, event: &MigrationEvent) {
        let key = event.event_name().replace('-', "_");
        match event.identifier() {
            Some(id) => println!("{key}={id}"),
            None => println!("{key}=true"),
        }
        TracingSink.notify(event);
    }
}
