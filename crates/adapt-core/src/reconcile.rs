//! Reconciliation of the local migration set against the applied history.
//!
//! Both inputs are id-sorted: the local list by the source merge, the
//! applied history by the driver contract.

use crate::error::{CoreError, CoreResult};
use crate::migration::{AvailableMigration, Migration};

/// Applied migrations with no local counterpart.
///
/// Walks the applied history once. Known records are hash-checked against
/// their local counterpart when `hash_check` is set; a record without a
/// local match is unknown. Unknown records must form a contiguous suffix of
/// the history — a known record after an unknown one means a later
/// migration may depend on schema the rollback would remove.
pub(crate) fn unknown_applied_migrations(
    applied: &[Migration],
    available: &[AvailableMigration],
    hash_check: bool,
) -> CoreResult<Vec<Migration>> {
    // a missing hash on either side compares equal, so history written
    // before hashing was introduced stays accepted
    fn hash_equal(stored: Option<&String>, local: Option<&String>) -> bool {
        match (stored, local) {
            (Some(stored), Some(local)) => stored == local,
            _ => true,
        }
    }

    let mut unknown: Vec<Migration> = Vec::new();

    for record in applied {
        let local = available.iter().find(|a| a.id == record.id);

        let Some(local) = local else {
            unknown.push(record.clone());
            continue;
        };

        if hash_check && !hash_equal(record.hash.as_ref(), local.hash.as_ref()) {
            return Err(CoreError::IntegrityProtection(format!(
                "hash of migration {:?} changed after it was applied (stored {:?}, local {:?}); \
                 applied scripts must not be edited",
                record.id, record.hash, local.hash
            )));
        }

        if !unknown.is_empty() {
            return Err(CoreError::IntegrityProtection(format!(
                "known migration {:?} follows an unknown one; unknown migrations must form a \
                 suffix of the applied history",
                record.id
            )));
        }
    }

    Ok(unknown)
}

/// Local migrations that still have to be applied, in id order.
///
/// A merge walk rather than a set difference: a local id falling between
/// two applied ids (a hole left by a merged branch) is collected while the
/// applied cursor waits on its next match.
pub(crate) fn find_needed_migrations<'a>(
    applied: &[Migration],
    available: &'a [AvailableMigration],
) -> Vec<&'a AvailableMigration> {
    if applied.is_empty() {
        return available.iter().collect();
    }

    let mut needed = Vec::new();
    let mut db_idx = 0;

    for mem_idx in 0..available.len() {
        if applied[db_idx].id == available[mem_idx].id {
            db_idx += 1;

            // history exhausted: everything after this point is new
            if db_idx == applied.len() {
                needed.extend(available[mem_idx + 1..].iter());
                break;
            }

            continue;
        }

        log::info!(
            "found migration hole, adding {:?} until the hole is closed",
            available[mem_idx].id
        );
        needed.push(&available[mem_idx]);
    }

    needed
}

/// Every applied record must carry a finished timestamp; a missing one
/// means an earlier run died between starting and finishing a migration.
pub(crate) fn health_check_applied(applied: &[Migration]) -> CoreResult<()> {
    for record in applied {
        if record.finished.is_none() {
            return Err(CoreError::IntegrityProtection(format!(
                "migration {:?} was started {} but never finished; check the store manually",
                record.id, record.started
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
