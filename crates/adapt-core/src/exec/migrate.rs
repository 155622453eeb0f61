//! Forward application of needed migrations.

use chrono::Utc;
use rand::RngCore;

use super::Exec;
use crate::driver::{BeforeFinish, DbHandle};
use crate::error::{CoreError, CoreResult};
use crate::migration::{AvailableMigration, Migration, VERSION};
use crate::parser::ParsedMigration;
use crate::reconcile::find_needed_migrations;

impl Exec {
    pub(super) fn stage_migrate(&mut self) -> CoreResult<()> {
        log::debug!("migrate");

        let deployment = gen_deployment_id();

        let needed: Vec<AvailableMigration> = find_needed_migrations(&self.applied, &self.available)
            .into_iter()
            .cloned()
            .collect();
        if needed.is_empty() {
            log::info!("all migrations already applied, everything up to date");
            return Ok(());
        }

        for (deployment_order, migration) in needed.iter().enumerate() {
            let meta = self.build_meta(migration, &deployment, deployment_order as i64)?;
            self.apply_one(migration, &meta)?;
        }

        log::info!("migrate successful");
        Ok(())
    }

    /// Assemble the meta record written to the driver before a migration
    /// executes. The down-form is resolved here, at forward-time, so a later
    /// rollback works even after the source disappeared.
    fn build_meta(
        &self,
        available: &AvailableMigration,
        deployment: &str,
        deployment_order: i64,
    ) -> CoreResult<Migration> {
        let mut meta = Migration {
            id: available.id.clone(),
            executor: self.executor.clone(),
            started: Utc::now(),
            finished: None,
            hash: available.hash.clone(),
            adapt_version: VERSION.to_string(),
            deployment: deployment.to_string(),
            deployment_order,
            down: None,
        };

        let source = &self.sources[available.source];
        let down = if let Some(sql) = source.as_sql() {
            sql.parsed_down(&meta.id)?
        } else if let Some(hooks) = source.as_hook() {
            match hooks.hook(&meta.id).and_then(|h| h.migrate_down.as_ref()) {
                Some(migrate_down) => migrate_down(),
                None => None,
            }
        } else {
            None
        };

        match down {
            Some(parsed) => meta.down = Some(serde_json::to_string(&parsed)?),
            None => log::debug!("no down migration available for {:?}", meta.id),
        }

        Ok(meta)
    }

    fn apply_one(&mut self, available: &AvailableMigration, meta: &Migration) -> CoreResult<()> {
        log::info!(
            "applying migration {:?} (deployment {}, order {})",
            meta.id,
            meta.deployment,
            meta.deployment_order
        );

        self.driver.add_migration(meta)?;

        let is_sql = self.sources[available.source].as_sql().is_some();
        if is_sql {
            let parsed = available.parsed_up.as_ref().ok_or_else(|| {
                CoreError::InvalidSource(format!(
                    "migration {:?} has no parsed up script",
                    meta.id
                ))
            })?;
            self.migrate_with_sql_statements(parsed, None)?;
        } else {
            self.migrate_with_hook(&meta.id, available.source)?;
        }

        self.driver.set_migration_to_finished(&meta.id)
    }

    /// Execute a parsed SQL migration, honoring the driver's transaction
    /// capabilities and the script's own transaction flag.
    pub(super) fn migrate_with_sql_statements(
        &mut self,
        parsed: &ParsedMigration,
        before_finish: Option<BeforeFinish<'_>>,
    ) -> CoreResult<()> {
        let Some(db) = self.driver.database() else {
            return Err(CoreError::InvalidSource(
                "driver has no database capability, cannot apply an SQL migration".to_string(),
            ));
        };

        log::debug!("parsed migration has {} statements", parsed.statements.len());

        if let Some(custom) = db.custom() {
            log::debug!("driver executes the migration itself");
            return custom.migrate(parsed, before_finish);
        }

        if !db.supports_tx() {
            log::debug!("executing without transaction, driver does not support transactions");
            return exec_statements(db.handle(), parsed, before_finish);
        }
        if !parsed.use_tx {
            log::debug!("executing without transaction, disabled for this migration");
            return exec_statements(db.handle(), parsed, before_finish);
        }

        let opts = db.tx_options();
        let handle = db.handle();

        handle.begin(&opts)?;
        match exec_statements(handle, parsed, before_finish) {
            Ok(()) => {
                log::debug!("committing transaction");
                handle.commit()
            }
            Err(err) => finish_failed_tx(handle, err),
        }
    }

    fn migrate_with_hook(&mut self, migration_id: &str, source_idx: usize) -> CoreResult<()> {
        let hooks = self.sources[source_idx].as_hook().ok_or_else(|| {
            CoreError::InvalidSource(format!(
                "migration {migration_id:?} expected a hook source"
            ))
        })?;
        let hook = hooks.hook(migration_id).ok_or_else(|| {
            CoreError::InvalidSource(format!(
                "no hook registered for migration {migration_id:?}"
            ))
        })?;

        if let Some(migrate_up) = &hook.migrate_up {
            log::debug!("executing migration through its plain hook");
            return migrate_up();
        }

        if let Some(with_handle) = &hook.migrate_up_with_handle {
            let Some(db) = self.driver.database() else {
                return Err(CoreError::InvalidSource(format!(
                    "hook for {migration_id:?} wants a database handle, but the driver has no \
                     database capability"
                )));
            };
            log::debug!("executing migration through its handle hook");
            return with_handle(db.handle());
        }

        if let Some(with_tx) = &hook.migrate_up_with_tx {
            let Some(db) = self.driver.database() else {
                return Err(CoreError::InvalidSource(format!(
                    "hook for {migration_id:?} wants a transaction, but the driver has no \
                     database capability"
                )));
            };

            let opts = db.tx_options();
            let handle = db.handle();

            handle.begin(&opts)?;
            log::debug!("executing migration through its transaction hook");
            return match with_tx(&mut *handle) {
                Ok(()) => {
                    log::debug!("committing transaction");
                    handle.commit()
                }
                Err(err) => finish_failed_tx(handle, err),
            };
        }

        Err(CoreError::InvalidSource(format!(
            "hook for {migration_id:?} declares no forward callback"
        )))
    }
}

/// Run every statement against `target`, then the `before_finish` callback,
/// so cleanup writes land in the same transaction when one is open.
fn exec_statements(
    target: &mut dyn DbHandle,
    parsed: &ParsedMigration,
    before_finish: Option<BeforeFinish<'_>>,
) -> CoreResult<()> {
    for statement in &parsed.statements {
        log::debug!("executing statement {statement:?}");
        target.execute(statement, &[])?;
    }

    if let Some(callback) = before_finish {
        log::debug!("running before-finish callback inside the migration's transaction scope");
        callback(&mut *target)?;
    }

    Ok(())
}

/// Roll back after a failed in-transaction body and report the combined
/// outcome. The original error always wins; a rollback failure is attached.
fn finish_failed_tx(handle: &mut dyn DbHandle, original: CoreError) -> CoreResult<()> {
    log::warn!("execution failed, rolling back transaction: {original}");

    match handle.rollback() {
        Ok(()) => Err(CoreError::DriverOperation(format!(
            "execution failed but the transaction was rolled back, manual cleanup may still be \
             necessary: {original}"
        ))),
        Err(rollback_err) => {
            log::error!("rollback failed as well: {rollback_err}");
            Err(CoreError::DriverOperation(format!(
                "execution failed ({original}) and the rollback failed too ({rollback_err})"
            )))
        }
    }
}

/// Generate the deployment group id: `ADAPT-` plus 24 hex chars from 12
/// random bytes, split into four groups of six.
fn gen_deployment_id() -> String {
    let mut buf = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut buf);

    let hex: String = buf.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "ADAPT-{}-{}-{}-{}",
        &hex[..6],
        &hex[6..12],
        &hex[12..18],
        &hex[18..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_id_has_the_documented_shape() {
        let id = gen_deployment_id();

        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "ADAPT");
        for group in &parts[1..] {
            assert_eq!(group.len(), 6);
            assert!(group
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn deployment_ids_are_unique_per_call() {
        assert_ne!(gen_deployment_id(), gen_deployment_id());
    }
}
