use crate::sql::BookkeepingSql;
use anyhow::{Context, Result};
use async_trait::async_trait;
use smk_core::{Backend, BackendConfig, Transaction};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, Executor, PgPool, Postgres};
use tracing::{info, warn};

pub struct PgBackend {
    pool: PgPool,
    config: BackendConfig,
    sql: BookkeepingSql,
}

impl PgBackend {
    pub fn new(pool: PgPool, config: BackendConfig) -> Self {
        let sql = BookkeepingSql::postgres(&config.table);
        Self {
            pool,
            config,
            sql,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}

pub struct PgTx(sqlx::Transaction<'static, Postgres>);

/// Held `pg_advisory_lock`.
///
/// Advisory locks are session scoped, so the connection that took the lock
/// stays checked out of the pool until release. Dropped without
/// [`Backend::unlock`], the connection is detached from the pool and closed,
/// which ends the session and with it the lock.
pub struct PgLock {
    conn: Option<PoolConnection<Postgres>>,
    key: i64,
}

impl Drop for PgLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!(lock_key = self.key, "advisory lock dropped without unlock; closing its session");
            drop(conn.detach());
        }
    }
}

#[async_trait]
impl Transaction for PgTx {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        // Unprepared simple-query protocol: multi-statement bodies are fine.
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
impl Backend for PgBackend {
    type Tx = PgTx;
    type Lock = PgLock;

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

    async fn begin(&self) -> Result<PgTx> {
        let tx = self.pool.begin().await.context("begin transaction failed")?;
        Ok(PgTx(tx))
    }

    async fn store_applied(&self, tx: &mut PgTx, id: &str) -> Result<()> {
        sqlx::query(&self.sql.insert)
            .bind(id)
            .execute(&mut *tx.0)
            .await
            .with_context(|| format!("insert applied version {id} failed"))?;
        Ok(())
    }

    async fn delete_applied(&self, tx: &mut PgTx, id: &str) -> Result<()> {
        sqlx::query(&self.sql.delete)
            .bind(id)
            .execute(&mut *tx.0)
            .await
            .with_context(|| format!("delete applied version {id} failed"))?;
        Ok(())
    }

    async fn has_table(&self) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("select to_regclass($1) is not null")
            .bind(&self.config.table)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("lookup of table {} failed", self.config.table))?;
        Ok(exists)
    }

    /// Blocks until `pg_advisory_lock` is granted. Each call takes its own
    /// session, so concurrent callers in one process serialize as well.
    async fn lock(&self) -> Result<PgLock> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("acquire lock connection failed")?;
        sqlx::query("select pg_advisory_lock($1)")
            .bind(self.config.lock_key)
            .execute(&mut *conn)
            .await
            .context("pg_advisory_lock failed")?;

        info!(lock_key = self.config.lock_key, "advisory lock acquired");
        Ok(PgLock {
            conn: Some(conn),
            key: self.config.lock_key,
        })
    }

    async fn unlock(&self, mut lock: PgLock) -> Result<()> {
        let Some(mut conn) = lock.conn.take() else {
            return Ok(());
        };

        let released = sqlx::query("select pg_advisory_unlock($1)")
            .bind(lock.key)
            .execute(&mut *conn)
            .await;
        if let Err(err) = released {
            // Ending the session drops every advisory lock it holds.
            let _ = conn.detach().close().await;
            return Err(anyhow::Error::new(err).context("pg_advisory_unlock failed"));
        }

        info!(lock_key = lock.key, "advisory lock released");
        Ok(())
    }
}
