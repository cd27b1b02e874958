use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use smk_core::{Backend, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

/// Failure injection switches for [`MemoryBackend`].
#[derive(Clone, Debug, Default)]
pub struct Faults {
    pub fail_create_table: bool,
    pub fail_read_applied: bool,
    pub fail_lock: bool,
    pub fail_unlock: bool,
    pub fail_begin: bool,
    pub fail_commit: bool,
    /// Fail `execute` for the body containing this marker.
    pub fail_execute_on: Option<String>,
    /// Never complete `execute` for the body containing this marker.
    pub stall_execute_on: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    applied: Vec<String>,
    executed: Vec<String>,
    table_created: bool,
    locked: bool,
    lock_calls: usize,
    unlock_calls: usize,
    read_applied_calls: usize,
    commits: usize,
    rollbacks: usize,
    faults: Faults,
}

/// In-memory bookkeeping table. Clones share state.
///
/// Writes made through a [`MemoryTx`] only become visible on commit. The
/// lock is a real mutex: a second `lock` waits for the first guard.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the applied set (in application order).
    pub fn with_applied(self, ids: &[&str]) -> Self {
        {
            let mut st = self.state();
            st.applied = ids.iter().map(|s| s.to_string()).collect();
            st.table_created = true;
        }
        self
    }

    pub fn with_faults(self, faults: Faults) -> Self {
        self.state().faults = faults;
        self
    }

    pub fn set_faults(&self, faults: Faults) {
        self.state().faults = faults;
    }

    pub fn applied(&self) -> Vec<String> {
        self.state().applied.clone()
    }

    /// Committed statement batches, in commit order.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn table_created(&self) -> bool {
        self.state().table_created
    }

    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    pub fn lock_calls(&self) -> usize {
        self.state().lock_calls
    }

    pub fn unlock_calls(&self) -> usize {
        self.state().unlock_calls
    }

    pub fn read_applied_calls(&self) -> usize {
        self.state().read_applied_calls
    }

    pub fn commits(&self) -> usize {
        self.state().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state().rollbacks
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|p| p.into_inner())
}

/// Held migration lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct MemoryLock {
    state: Arc<Mutex<State>>,
    _gate: OwnedMutexGuard<()>,
}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        lock_state(&self.state).locked = false;
    }
}

#[derive(Debug)]
enum Staged {
    Execute(String),
    Insert(String),
    Delete(String),
}

/// Staged writes against a [`MemoryBackend`].
#[derive(Debug)]
pub struct MemoryTx {
    state: Arc<Mutex<State>>,
    staged: Vec<Staged>,
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        let (fail_on, stall_on) = {
            let st = lock_state(&self.state);
            (st.faults.fail_execute_on.clone(), st.faults.stall_execute_on.clone())
        };
        if let Some(marker) = fail_on {
            if sql.contains(&marker) {
                bail!("injected execute failure on '{}'", marker);
            }
        }
        if stall_on.is_some_and(|marker| sql.contains(&marker)) {
            std::future::pending::<()>().await;
        }
        self.staged.push(Staged::Execute(sql.to_string()));
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let mut st = lock_state(&self.state);
        if st.faults.fail_commit {
            st.rollbacks += 1;
            bail!("injected commit failure");
        }

        // Validate before mutating so a failed commit leaves nothing behind.
        let mut applied = st.applied.clone();
        for op in &self.staged {
            match op {
                Staged::Insert(id) => {
                    if applied.contains(id) {
                        bail!("duplicate key: version '{}' already recorded", id);
                    }
                    applied.push(id.clone());
                }
                Staged::Delete(id) => applied.retain(|a| a != id),
                Staged::Execute(_) => {}
            }
        }

        st.applied = applied;
        for op in self.staged {
            if let Staged::Execute(sql) = op {
                st.executed.push(sql);
            }
        }
        st.commits += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        lock_state(&self.state).rollbacks += 1;
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Tx = MemoryTx;
    type Lock = MemoryLock;

    async fn create_table(&self) -> Result<()> {
        let mut st = self.state();
        if st.faults.fail_create_table {
            bail!("injected create table failure");
        }
        st.table_created = true;
        Ok(())
    }

    async fn has_table(&self) -> Result<bool> {
        let st = self.state();
        if st.faults.fail_read_applied {
            bail!("injected read failure");
        }
        Ok(st.table_created)
    }

    async fn read_applied(&self) -> Result<Vec<String>> {
        let mut st = self.state();
        st.read_applied_calls += 1;
        if st.faults.fail_read_applied {
            bail!("injected read failure");
        }
        Ok(st.applied.clone())
    }

    async fn begin(&self) -> Result<MemoryTx> {
        if self.state().faults.fail_begin {
            bail!("injected begin failure");
        }
        Ok(MemoryTx {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
        })
    }

    async fn store_applied(&self, tx: &mut MemoryTx, id: &str) -> Result<()> {
        tx.staged.push(Staged::Insert(id.to_string()));
        Ok(())
    }

    async fn delete_applied(&self, tx: &mut MemoryTx, id: &str) -> Result<()> {
        tx.staged.push(Staged::Delete(id.to_string()));
        Ok(())
    }

    async fn lock(&self) -> Result<MemoryLock> {
        {
            let mut st = self.state();
            st.lock_calls += 1;
            if st.faults.fail_lock {
                return Err(anyhow!("injected lock failure"));
            }
        }
        let gate = Arc::clone(&self.gate).lock_owned().await;
        self.state().locked = true;
        Ok(MemoryLock {
            state: Arc::clone(&self.state),
            _gate: gate,
        })
    }

    async fn unlock(&self, lock: MemoryLock) -> Result<()> {
        drop(lock);
        let mut st = self.state();
        st.unlock_calls += 1;
        if st.faults.fail_unlock {
            bail!("injected unlock failure");
        }
        Ok(())
    }
}
