use crate::pairing::{classify, Pairing};
use anyhow::{Context, Result};
use smk_core::{Catalog, ChangeEntry};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Migration artifacts read from a directory tree (walked recursively).
///
/// A missing directory is an empty catalog, not an error.
#[derive(Clone, Debug)]
pub struct DirCatalog {
    root: PathBuf,
}

impl DirCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Catalog for DirCatalog {
    fn entries(&self) -> Result<Vec<ChangeEntry>> {
        if !self.root.exists() {
            debug!(dir = %self.root.display(), "migrations directory missing; empty catalog");
            return Ok(Vec::new());
        }

        let mut pairing = Pairing::new();
        walk(&self.root, &mut pairing)?;
        let entries = pairing.finish();
        debug!(dir = %self.root.display(), entries = entries.len(), "catalog read");
        Ok(entries)
    }
}

fn walk(dir: &Path, pairing: &mut Pairing) -> Result<()> {
    let mut children: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read migrations dir: {}", dir.display()))?
        .map(|res| res.map(|e| e.path()))
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("failed to list migrations dir: {}", dir.display()))?;
    // Stable traversal keeps duplicate-artifact errors deterministic.
    children.sort();

    for path in children {
        if path.is_dir() {
            walk(&path, pairing)?;
            continue;
        }

        let Some((id, kind)) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(classify)
        else {
            continue;
        };

        let content = fs::read(&path)
            .with_context(|| format!("failed to read migration file: {}", path.display()))?;
        pairing.add(&path.display().to_string(), id, kind, content)?;
    }
    Ok(())
}
