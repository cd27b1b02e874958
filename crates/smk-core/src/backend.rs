use anyhow::{bail, Result};
use async_trait::async_trait;

pub const DEFAULT_TABLE: &str = "schema_migrations";

/// Advisory lock key used when none is configured.
pub const DEFAULT_LOCK_KEY: i64 = 6_492_640_049_987_603_658;

/// Constructor parameters shared by every backend adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    /// Bookkeeping table name, optionally schema-qualified (`ops.schema_migrations`).
    pub table: String,
    /// Key for backends with native advisory locking. Ignored elsewhere.
    pub lock_key: i64,
}

impl BackendConfig {
    pub fn new(table: impl Into<String>, lock_key: i64) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { table, lock_key })
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            lock_key: DEFAULT_LOCK_KEY,
        }
    }
}

/// The table name is spliced into SQL text, so only plain identifiers pass:
/// `[A-Za-z_][A-Za-z0-9_]*`, at most one `schema.` qualifier.
pub fn validate_table_name(table: &str) -> Result<()> {
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 {
        bail!("invalid table name '{}': at most one schema qualifier", table);
    }
    for part in parts {
        let mut chars = part.chars();
        let head_ok = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!(
                "invalid table name '{}': expected [A-Za-z_][A-Za-z0-9_]* segments",
                table
            );
        }
    }
    Ok(())
}

/// One open transaction on the target database.
#[async_trait]
pub trait Transaction: Send {
    /// Run a statement batch (one or more `;`-separated statements).
    async fn execute(&mut self, sql: &str) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Storage backend capability set.
///
/// Backends without native locking use `()` as their lock and provide no
/// cross-process mutual exclusion.
#[async_trait]
pub trait Backend: Send + Sync {
    type Tx: Transaction;

    /// Proof that the migration lock is held. Dropping it without
    /// [`Backend::unlock`] must still release the lock.
    type Lock: Send;

    /// Idempotent.
    async fn create_table(&self) -> Result<()>;

    /// Whether the bookkeeping table exists. Never writes.
    async fn has_table(&self) -> Result<bool>;

    /// Applied identifiers in application order.
    async fn read_applied(&self) -> Result<Vec<String>>;

    async fn begin(&self) -> Result<Self::Tx>;

    async fn store_applied(&self, tx: &mut Self::Tx, id: &str) -> Result<()>;

    async fn delete_applied(&self, tx: &mut Self::Tx, id: &str) -> Result<()>;

    /// Waits until the lock is granted. Not reentrant: a second call waits
    /// for the first lock to be released, even from the same process.
    async fn lock(&self) -> Result<Self::Lock>;

    async fn unlock(&self, lock: Self::Lock) -> Result<()>;
}
