//! Rollback of unknown applied migrations.
//!
//! Walks the unknown suffix in reverse id order, executes each record's
//! stored down-form, and deletes its meta row in the same transaction as
//! the down-statements, so either both persist or neither does.

use super::Exec;
use crate::driver::SqlTarget;
use crate::error::{CoreError, CoreResult};
use crate::migration::Migration;
use crate::parser::ParsedMigration;

impl Exec {
    pub(super) fn stage_rollback(&mut self) -> CoreResult<()> {
        log::debug!("rollback");

        // every unknown record must be reversible before anything executes
        if let Some(missing) = self.unknown_applied.iter().find(|m| m.down.is_none()) {
            return Err(CoreError::IntegrityProtection(format!(
                "unknown applied migration {:?} has no stored down migration",
                missing.id
            )));
        }

        log::info!(
            "rolling back {} unknown applied migrations",
            self.unknown_applied.len()
        );

        let mut reversed: Vec<Migration> = self.unknown_applied.clone();
        reversed.reverse();

        for unknown in &reversed {
            let down_json = unknown.down.as_ref().ok_or_else(|| {
                CoreError::IntegrityProtection(format!(
                    "unknown applied migration {:?} has no stored down migration",
                    unknown.id
                ))
            })?;
            let down: ParsedMigration = serde_json::from_str(down_json)?;

            log::info!("rolling back migration {:?}", unknown.id);

            let Some(db) = self.driver.database() else {
                return Err(CoreError::InvalidSource(
                    "driver has no database capability, cannot roll back SQL migrations"
                        .to_string(),
                ));
            };
            let (delete_query, delete_args) = db.delete_migration(&unknown.id);

            let mut delete_meta = |target: &mut dyn SqlTarget| -> CoreResult<()> {
                target.execute(&delete_query, &delete_args)?;
                log::debug!("deleted meta entry within the down transaction");
                Ok(())
            };

            self.migrate_with_sql_statements(&down, Some(&mut delete_meta))?;

            // rebuild instead of splicing by index
            self.applied.retain(|m| m.id != unknown.id);

            log::info!("rollback of {:?} successful", unknown.id);
        }

        log::info!("rollback successful");
        Ok(())
    }
}
