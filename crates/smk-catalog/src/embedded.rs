use crate::pairing::{classify, Pairing};
use anyhow::Result;
use smk_core::{Catalog, ChangeEntry};

/// Migration artifacts compiled into the binary.
///
/// ```ignore
/// static MIGRATIONS: &[(&str, &str)] = &[
///     ("001_users.up.sql", include_str!("../migrations/001_users.up.sql")),
///     ("001_users.down.sql", include_str!("../migrations/001_users.down.sql")),
/// ];
/// let catalog = EmbeddedCatalog::new(MIGRATIONS);
/// ```
///
/// Names may carry a directory prefix; only the last `/` segment is
/// classified.
#[derive(Clone, Copy, Debug)]
pub struct EmbeddedCatalog {
    files: &'static [(&'static str, &'static str)],
}

impl EmbeddedCatalog {
    pub const fn new(files: &'static [(&'static str, &'static str)]) -> Self {
        Self { files }
    }
}

impl Catalog for EmbeddedCatalog {
    fn entries(&self) -> Result<Vec<ChangeEntry>> {
        let mut pairing = Pairing::new();
        for (name, contents) in self.files {
            let base = name.rsplit('/').next().unwrap_or(*name);
            if let Some((id, kind)) = classify(base) {
                pairing.add(name, id, kind, contents.as_bytes().to_vec())?;
            }
        }
        Ok(pairing.finish())
    }
}
