use anyhow::{bail, Result};
use smk_core::ChangeEntry;
use std::collections::BTreeMap;

const DOWN_SUFFIX: &str = ".down.sql";
const UP_SUFFIX: &str = ".up";
const SQL_SUFFIX: &str = ".sql";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    Forward,
    Reverse,
}

/// Map a file name to `(identifier, kind)`. `None` for files that are not
/// migration artifacts.
pub fn classify(file_name: &str) -> Option<(String, ArtifactKind)> {
    let (id, kind) = match file_name.strip_suffix(DOWN_SUFFIX) {
        Some(id) => (id, ArtifactKind::Reverse),
        None => {
            let stem = file_name.strip_suffix(SQL_SUFFIX)?;
            (stem.strip_suffix(UP_SUFFIX).unwrap_or(stem), ArtifactKind::Forward)
        }
    };
    if id.is_empty() {
        return None;
    }
    Some((id.to_string(), kind))
}

#[derive(Default)]
struct Slots {
    forward: Option<(String, Vec<u8>)>,
    reverse: Option<(String, Vec<u8>)>,
}

/// Accumulates artifacts and merges them per identifier.
///
/// BTreeMap keeps identifiers in byte-wise ascending order, which is the
/// catalog order.
#[derive(Default)]
pub struct Pairing {
    by_id: BTreeMap<String, Slots>,
}

impl Pairing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one artifact. `origin` names it in error messages (usually a path).
    pub fn add(
        &mut self,
        origin: &str,
        id: String,
        kind: ArtifactKind,
        content: Vec<u8>,
    ) -> Result<()> {
        let slots = self.by_id.entry(id).or_default();
        let slot = match kind {
            ArtifactKind::Forward => &mut slots.forward,
            ArtifactKind::Reverse => &mut slots.reverse,
        };
        if let Some((first, _)) = slot {
            bail!(
                "duplicate {} artifact for the same migration: {} and {}",
                match kind {
                    ArtifactKind::Forward => "forward",
                    ArtifactKind::Reverse => "reverse",
                },
                first,
                origin
            );
        }
        *slot = Some((origin.to_string(), content));
        Ok(())
    }

    /// Entries sorted ascending by identifier. A reverse-only identifier gets
    /// an empty forward body, which the driver refuses to run.
    pub fn finish(self) -> Vec<ChangeEntry> {
        self.by_id
            .into_iter()
            .map(|(id, slots)| ChangeEntry {
                id,
                forward: slots.forward.map(|(_, c)| c).unwrap_or_default(),
                reverse: slots.reverse.map(|(_, c)| c),
            })
            .collect()
    }
}
