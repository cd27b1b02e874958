use smk_core::{ChangeEntry, Migrator};
use smk_testkit::{entry, MemoryBackend};

#[tokio::test]
async fn status_marks_applied_pending_and_unknown() -> anyhow::Result<()> {
    let backend = MemoryBackend::new().with_applied(&["001", "000_legacy"]);
    let entries = vec![entry("001"), ChangeEntry::new("002", "create"), entry("003")];
    let migrator = Migrator::new(entries, backend.clone());

    let report = migrator.status().await?;
    let rows: Vec<(&str, bool, bool)> = report
        .entries
        .iter()
        .map(|e| (e.id.as_str(), e.applied, e.reversible))
        .collect();
    assert_eq!(
        rows,
        vec![("001", true, true), ("002", false, false), ("003", false, true)]
    );
    assert_eq!(report.unknown_applied, vec!["000_legacy"]);
    assert_eq!(report.current(), Some("001"));
    assert_eq!(report.pending().count(), 2);

    // Read-only: no lock, no writes.
    assert_eq!(backend.lock_calls(), 0);
    assert_eq!(backend.commits(), 0);
    Ok(())
}
