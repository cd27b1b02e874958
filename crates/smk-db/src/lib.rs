//! smk-db
//!
//! `sqlx` backend adapters for the migration engine.
//!
//! - [`PgBackend`]: PostgreSQL, session-level advisory lock held on one
//!   dedicated pooled connection for the whole lock bracket.
//! - [`SqliteBackend`]: SQLite, no native locking (lock/unlock are no-ops,
//!   so there is no cross-process mutual exclusion).

mod pg;
mod sql;
mod sqlite;

pub use pg::{PgBackend, PgLock, PgTx};
pub use sql::BookkeepingSql;
pub use sqlite::{SqliteBackend, SqliteTx};

use anyhow::{bail, Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Default env var holding the database URL.
pub const ENV_DB_URL: &str = "SMK_DATABASE_URL";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatabaseKind {
    Postgres,
    Sqlite,
}

impl DatabaseKind {
    /// Pick the backend from the URL scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DatabaseKind::Postgres),
            "sqlite" => Ok(DatabaseKind::Sqlite),
            other => bail!(
                "unsupported database url scheme '{}'. expected one of: postgres | postgresql | sqlite",
                other
            ),
        }
    }
}

/// Read the database URL from `env_var`.
pub fn url_from_env(env_var: &str) -> Result<String> {
    std::env::var(env_var).with_context(|| format!("missing env var {env_var}"))
}

pub async fn connect_postgres(url: &str) -> Result<PgPool> {
    // One connection for statements/transactions plus one pinned by the
    // advisory lock.
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Single-connection pool: every transaction and read goes through the same
/// connection (required for `sqlite::memory:`), and the file is created if
/// missing.
pub async fn connect_sqlite(url: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid sqlite url: {url}"))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .context("failed to open SQLite database")?;
    Ok(pool)
}
