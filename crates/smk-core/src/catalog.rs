use crate::types::ChangeEntry;
use anyhow::{bail, Result};

/// Source of migration definitions.
///
/// Implementations return entries sorted ascending by identifier, one entry
/// per identifier. Read fresh on every invocation.
pub trait Catalog: Send + Sync {
    fn entries(&self) -> Result<Vec<ChangeEntry>>;
}

/// In-memory catalog.
impl Catalog for Vec<ChangeEntry> {
    fn entries(&self) -> Result<Vec<ChangeEntry>> {
        let mut out = self.clone();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        for w in out.windows(2) {
            if w[0].id == w[1].id {
                bail!("duplicate migration identifier in catalog: {}", w[0].id);
            }
        }
        Ok(out)
    }
}
