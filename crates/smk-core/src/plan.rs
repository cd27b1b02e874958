use crate::error::{MigrateError, MigrateResult};
use crate::types::{ChangeEntry, MigrationStatus, Operation, Plan, StatusReport};
use std::collections::{HashMap, HashSet};

fn applied_set(applied: &[String]) -> HashSet<&str> {
    applied.iter().map(String::as_str).collect()
}

fn catalog_positions(catalog: &[ChangeEntry]) -> HashMap<&str, usize> {
    catalog
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id.as_str(), i))
        .collect()
}

fn not_found(id: &str) -> MigrateError {
    MigrateError::MigrationNotFound { id: id.to_string() }
}

/// Every applied identifier must still have a catalog entry, whatever the
/// mode. The first unknown one in application order is reported.
fn check_applied_known(catalog: &[ChangeEntry], applied: &[String]) -> MigrateResult<()> {
    let known: HashSet<&str> = catalog.iter().map(|e| e.id.as_str()).collect();
    match applied.iter().find(|id| !known.contains(id.as_str())) {
        Some(id) => Err(not_found(id)),
        None => Ok(()),
    }
}

/// Forward operations for pending entries, catalog order.
///
/// `steps <= 0` or `steps` beyond the pending count => every pending entry.
/// Already-applied entries are skipped without looking at their content.
pub fn plan_up(catalog: &[ChangeEntry], applied: &[String], steps: i64) -> MigrateResult<Plan> {
    check_applied_known(catalog, applied)?;
    let done = applied_set(applied);
    let pending = catalog.iter().filter(|e| !done.contains(e.id.as_str()));

    let operations = match usize::try_from(steps) {
        Ok(n) if n > 0 => pending.take(n).cloned().map(Operation::forward).collect(),
        _ => pending.cloned().map(Operation::forward).collect(),
    };

    Ok(Plan::new(operations))
}

/// Reverse operations for the trailing `steps` applied identifiers, most
/// recently applied first.
///
/// `steps < 0` or beyond the applied count => everything applied.
/// Zero resolved steps => "nothing to revert". Every applied identifier must
/// have a catalog entry; otherwise nothing is planned at all.
pub fn plan_down(catalog: &[ChangeEntry], applied: &[String], steps: i64) -> MigrateResult<Plan> {
    check_applied_known(catalog, applied)?;
    let n = match usize::try_from(steps) {
        Ok(n) if n <= applied.len() => n,
        _ => applied.len(),
    };
    if n == 0 {
        return Ok(Plan::nothing_to_revert());
    }

    let by_id: HashMap<&str, &ChangeEntry> =
        catalog.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut operations = Vec::with_capacity(n);
    for id in applied[applied.len() - n..].iter().rev() {
        let entry = by_id.get(id.as_str()).ok_or_else(|| not_found(id))?;
        operations.push(Operation::reverse((*entry).clone()));
    }

    Ok(Plan::new(operations))
}

/// Operations that leave exactly `target` as the current version.
///
/// Expressed through [`plan_down`] / [`plan_up`] so the ordering rules live
/// in one place:
/// - `target` already applied => revert everything applied after it.
/// - `target` pending => apply pending entries after the current version up
///   to and including `target`, once the catalog order is shown to agree
///   with the recorded application order.
pub fn plan_to(catalog: &[ChangeEntry], applied: &[String], target: &str) -> MigrateResult<Plan> {
    check_applied_known(catalog, applied)?;
    let current = applied.last().map(String::as_str).unwrap_or("");
    if current == target {
        return Ok(Plan::default());
    }

    if let Some(idx) = applied.iter().position(|id| id == target) {
        let depth = applied.len() - idx - 1;
        return plan_down(catalog, applied, depth as i64);
    }

    let positions = catalog_positions(catalog);
    let target_pos = *positions.get(target).ok_or_else(|| not_found(target))?;
    let current_pos = check_applied_order(&positions, applied)?;
    let done = applied_set(applied);

    let start = match current_pos {
        Some(cur) => {
            if target_pos < cur {
                return Err(MigrateError::InconsistentOrder {
                    id: target.to_string(),
                    detail: format!("not applied, but sorts before current version {current}"),
                });
            }
            if let Some(gap) = catalog[..cur]
                .iter()
                .find(|e| !done.contains(e.id.as_str()))
            {
                return Err(MigrateError::InconsistentOrder {
                    id: gap.id.clone(),
                    detail: format!("pending, but sorts before current version {current}"),
                });
            }
            cur + 1
        }
        None => 0,
    };

    let up_steps = catalog[start..=target_pos]
        .iter()
        .filter(|e| !done.contains(e.id.as_str()))
        .count();

    plan_up(catalog, applied, up_steps as i64)
}

/// Catalog positions of the applied identifiers must increase in application
/// order. Returns the position of the current (last applied) version.
fn check_applied_order(
    positions: &HashMap<&str, usize>,
    applied: &[String],
) -> MigrateResult<Option<usize>> {
    let mut prev: Option<(usize, &str)> = None;
    for id in applied {
        let pos = *positions.get(id.as_str()).ok_or_else(|| not_found(id))?;
        if let Some((prev_pos, prev_id)) = prev {
            if pos < prev_pos {
                return Err(MigrateError::InconsistentOrder {
                    id: id.clone(),
                    detail: format!("applied after {prev_id}, but sorts before it"),
                });
            }
        }
        prev = Some((pos, id));
    }
    Ok(prev.map(|(pos, _)| pos))
}

/// Read-only view of catalog vs applied set.
pub fn plan_status(catalog: &[ChangeEntry], applied: &[String]) -> StatusReport {
    let done = applied_set(applied);
    let known: HashSet<&str> = catalog.iter().map(|e| e.id.as_str()).collect();

    StatusReport {
        entries: catalog
            .iter()
            .map(|e| MigrationStatus {
                id: e.id.clone(),
                applied: done.contains(e.id.as_str()),
                reversible: e.is_reversible(),
            })
            .collect(),
        unknown_applied: applied
            .iter()
            .filter(|id| !known.contains(id.as_str()))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn entry(id: &str) -> ChangeEntry {
        ChangeEntry::new(id, format!("-- up {id}")).with_reverse(format!("-- down {id}"))
    }

    fn catalog(ids: &[&str]) -> Vec<ChangeEntry> {
        ids.iter().map(|id| entry(id)).collect()
    }

    fn applied(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn directions(plan: &Plan) -> Vec<Direction> {
        plan.operations.iter().map(|op| op.direction).collect()
    }

    // --- up ---

    #[test]
    fn up_emits_every_pending_entry_in_catalog_order() {
        let plan = plan_up(&catalog(&["A", "B", "C", "D"]), &applied(&[]), 0).unwrap();
        assert_eq!(plan.ids(), vec!["A", "B", "C", "D"]);
        assert!(directions(&plan).iter().all(|d| *d == Direction::Forward));
    }

    #[test]
    fn up_skips_applied_entries_even_out_of_order() {
        let plan = plan_up(&catalog(&["A", "B", "C", "D"]), &applied(&["C", "A"]), 0).unwrap();
        assert_eq!(plan.ids(), vec!["B", "D"]);
    }

    #[test]
    fn up_is_bounded_by_steps() {
        let cat = catalog(&["A", "B", "C", "D"]);
        let done = applied(&["A"]);
        assert_eq!(plan_up(&cat, &done, 2).unwrap().ids(), vec!["B", "C"]);
        assert_eq!(plan_up(&cat, &done, 99).unwrap().ids(), vec!["B", "C", "D"]);
        assert_eq!(plan_up(&cat, &done, -3).unwrap().ids(), vec!["B", "C", "D"]);
    }

    #[test]
    fn up_with_everything_applied_is_empty() {
        let plan = plan_up(&catalog(&["A", "B"]), &applied(&["A", "B"]), 0).unwrap();
        assert!(plan.is_empty());
        assert!(!plan.nothing_to_revert);
    }

    // --- down ---

    #[test]
    fn down_reverts_most_recent_first() {
        let plan = plan_down(&catalog(&["A", "B", "C", "D"]), &applied(&["A", "B", "C", "D"]), 2)
            .unwrap();
        assert_eq!(plan.ids(), vec!["D", "C"]);
        assert!(directions(&plan).iter().all(|d| *d == Direction::Reverse));
    }

    #[test]
    fn down_follows_application_order_not_catalog_order() {
        let plan = plan_down(&catalog(&["A", "B", "C"]), &applied(&["B", "A", "C"]), 2).unwrap();
        assert_eq!(plan.ids(), vec!["C", "A"]);
    }

    #[test]
    fn down_zero_reports_nothing_to_revert() {
        let plan = plan_down(&catalog(&["A"]), &applied(&["A"]), 0).unwrap();
        assert!(plan.is_empty());
        assert!(plan.nothing_to_revert);

        let plan = plan_down(&catalog(&["A"]), &applied(&[]), -1).unwrap();
        assert!(plan.nothing_to_revert);
    }

    #[test]
    fn down_negative_or_oversized_reverts_all() {
        let cat = catalog(&["A", "B", "C"]);
        let done = applied(&["A", "B", "C"]);
        assert_eq!(plan_down(&cat, &done, -1).unwrap().ids(), vec!["C", "B", "A"]);
        assert_eq!(plan_down(&cat, &done, 10).unwrap().ids(), vec!["C", "B", "A"]);
    }

    #[test]
    fn down_fails_when_reverted_entry_left_the_catalog() {
        let err = plan_down(&catalog(&["A", "C"]), &applied(&["A", "B", "C"]), 2).unwrap_err();
        assert!(matches!(err, MigrateError::MigrationNotFound { ref id } if id == "B"));
    }

    #[test]
    fn down_fails_on_missing_entry_outside_the_window() {
        let err = plan_down(&catalog(&["B", "C"]), &applied(&["A", "B", "C"]), 1).unwrap_err();
        assert!(matches!(err, MigrateError::MigrationNotFound { ref id } if id == "A"));
    }

    #[test]
    fn up_fails_when_applied_entry_left_the_catalog() {
        let err = plan_up(&catalog(&["B"]), &applied(&["A"]), 0).unwrap_err();
        assert!(matches!(err, MigrateError::MigrationNotFound { ref id } if id == "A"));
    }

    #[test]
    fn to_current_with_unknown_history_is_not_found() {
        let err = plan_to(&catalog(&["B"]), &applied(&["A", "B"]), "B").unwrap_err();
        assert!(matches!(err, MigrateError::MigrationNotFound { ref id } if id == "A"));
    }

    // --- to ---

    #[test]
    fn to_current_version_is_a_noop() {
        let plan = plan_to(&catalog(&["A", "B"]), &applied(&["A", "B"]), "B").unwrap();
        assert!(plan.is_empty());
        assert!(!plan.nothing_to_revert);
    }

    #[test]
    fn to_pending_target_applies_up_to_and_including_it() {
        let plan = plan_to(&catalog(&["A", "B", "C", "D"]), &applied(&["A"]), "C").unwrap();
        assert_eq!(plan.ids(), vec!["B", "C"]);
        assert!(directions(&plan).iter().all(|d| *d == Direction::Forward));
    }

    #[test]
    fn to_from_empty_applies_from_the_start() {
        let plan = plan_to(&catalog(&["A", "B", "C"]), &applied(&[]), "B").unwrap();
        assert_eq!(plan.ids(), vec!["A", "B"]);
    }

    #[test]
    fn to_applied_target_reverts_later_entries() {
        let plan = plan_to(&catalog(&["A", "B", "C", "D"]), &applied(&["A", "B", "C", "D"]), "B")
            .unwrap();
        assert_eq!(plan.ids(), vec!["D", "C"]);
        assert!(directions(&plan).iter().all(|d| *d == Direction::Reverse));
    }

    #[test]
    fn to_unknown_target_is_not_found() {
        let err = plan_to(&catalog(&["A", "B"]), &applied(&["A"]), "X").unwrap_err();
        assert!(matches!(err, MigrateError::MigrationNotFound { ref id } if id == "X"));
    }

    #[test]
    fn to_target_sorting_before_current_is_inconsistent() {
        // B was added to the catalog after C had already been applied.
        let err = plan_to(&catalog(&["A", "B", "C"]), &applied(&["A", "C"]), "B").unwrap_err();
        assert!(matches!(err, MigrateError::InconsistentOrder { ref id, .. } if id == "B"));
    }

    #[test]
    fn to_with_pending_gap_behind_current_is_inconsistent() {
        let err = plan_to(&catalog(&["A", "B", "C", "D"]), &applied(&["A", "C"]), "D").unwrap_err();
        assert!(matches!(err, MigrateError::InconsistentOrder { ref id, .. } if id == "B"));
    }

    #[test]
    fn to_with_reordered_application_history_is_inconsistent() {
        let err = plan_to(&catalog(&["A", "B", "C"]), &applied(&["B", "A"]), "C").unwrap_err();
        assert!(matches!(err, MigrateError::InconsistentOrder { ref id, .. } if id == "A"));
    }

    #[test]
    fn to_with_applied_entry_missing_from_catalog_is_not_found() {
        let err = plan_to(&catalog(&["B", "C"]), &applied(&["A"]), "C").unwrap_err();
        assert!(matches!(err, MigrateError::MigrationNotFound { ref id } if id == "A"));
    }

    // --- status ---

    #[test]
    fn status_marks_applied_pending_and_unknown() {
        let mut cat = catalog(&["A", "B"]);
        cat.push(ChangeEntry::new("C", "create table c (id int)"));
        let report = plan_status(&cat, &applied(&["A", "Z"]));

        let applied_flags: Vec<bool> = report.entries.iter().map(|e| e.applied).collect();
        assert_eq!(applied_flags, vec![true, false, false]);
        assert!(!report.entries[2].reversible);
        assert_eq!(report.unknown_applied, vec!["Z".to_string()]);
        assert_eq!(report.current(), Some("A"));
        assert_eq!(report.pending().count(), 2);
    }
}
