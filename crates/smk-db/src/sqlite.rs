use crate::sql::BookkeepingSql;
use anyhow::{Context, Result};
use async_trait::async_trait;
use smk_core::{Backend, BackendConfig, Transaction};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

/// SQLite has no advisory locking: `lock`/`unlock` always succeed and two
/// processes migrating the same file are not serialized.
pub struct SqliteBackend {
    pool: SqlitePool,
    config: BackendConfig,
    sql: BookkeepingSql,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool, config: BackendConfig) -> Self {
        let sql = BookkeepingSql::sqlite(&config.table);
        Self { pool, config, sql }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub struct SqliteTx(sqlx::Transaction<'static, Sqlite>);

#[async_trait]
impl Transaction for SqliteTx {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        (&mut *self.0)
            .execute(sql)
            .await
            .context("migration statement batch failed")?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.0.commit().await.context("commit failed")
    }

    async fn rollback(self) -> Result<()> {
        self.0.rollback().await.context("rollback failed")
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    type Tx = SqliteTx;
    type Lock = ();

    async fn create_table(&self) -> Result<()> {
        sqlx::query(&self.sql.create_table)
            .execute(&self.pool)
            .await
            .with_context(|| format!("create table {} failed", self.config.table))?;
        Ok(())
    }

    async fn read_applied(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar::<_, String>(&self.sql.select_applied)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("select from {} failed", self.config.table))?;
        Ok(rows)
    }

    async fn begin(&self) -> Result<SqliteTx> {
        let tx = self.pool.begin().await.context("begin transaction failed")?;
        Ok(SqliteTx(tx))
    }

    async fn store_applied(&self, tx: &mut SqliteTx, id: &str) -> Result<()> {
        sqlx::query(&self.sql.insert)
            .bind(id)
            .execute(&mut *tx.0)
            .await
            .with_context(|| format!("insert applied version {id} failed"))?;
        Ok(())
    }

    async fn delete_applied(&self, tx: &mut SqliteTx, id: &str) -> Result<()> {
        sqlx::query(&self.sql.delete)
            .bind(id)
            .execute(&mut *tx.0)
            .await
            .with_context(|| format!("delete applied version {id} failed"))?;
        Ok(())
    }

    async fn has_table(&self) -> Result<bool> {
        // `schema.table` looks in that attached schema's catalog.
        let (catalog, name) = match self.config.table.split_once('.') {
            Some((schema, name)) => (format!("{schema}.sqlite_master"), name),
            None => ("sqlite_master".to_string(), self.config.table.as_str()),
        };
        let (n,): (i64,) = sqlx::query_as(&format!(
            "select count(*) from {catalog} where type = 'table' and name = ?"
        ))
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("lookup of table {} failed", self.config.table))?;
        Ok(n > 0)
    }

    async fn lock(&self) -> Result<()> {
        debug!("sqlite backend has no advisory lock; continuing unlocked");
        Ok(())
    }

    async fn unlock(&self, _lock: ()) -> Result<()> {
        Ok(())
    }
}
