//! The executor: owns all state of one pipeline run and sequences its
//! stages.
//!
//! Stages run in a fixed order — init, health-check, prepare-local,
//! acquire-lock, prepare-remote, reconcile (rollback when needed), migrate —
//! and the first error short-circuits the rest. Lock release and driver
//! close are teardown: they always run, and their errors are only reported
//! when no earlier stage failed.

mod migrate;
mod rollback;

use crate::driver::Driver;
use crate::error::{CoreError, CoreResult};
use crate::migration::{AvailableMigration, Migration};
use crate::options::Options;
use crate::reconcile::{health_check_applied, unknown_applied_migrations};
use crate::source::{merge_sources, SourceCollection};

/// One migration run. Created and driven by [`crate::migrate`].
pub(crate) struct Exec {
    executor: String,
    driver: Box<dyn Driver>,
    sources: SourceCollection,
    opts: Options,

    available: Vec<AvailableMigration>,
    applied: Vec<Migration>,
    unknown_applied: Vec<Migration>,
    driver_lock_acquired: bool,
}

impl Exec {
    pub(crate) fn new(
        executor: &str,
        driver: Box<dyn Driver>,
        sources: SourceCollection,
        opts: Options,
    ) -> Self {
        Self {
            executor: executor.to_string(),
            driver,
            sources,
            opts,
            available: Vec::new(),
            applied: Vec::new(),
            unknown_applied: Vec::new(),
            driver_lock_acquired: false,
        }
    }

    pub(crate) fn run(&mut self) -> CoreResult<()> {
        let result = self.run_stages();

        let unlock = self.release_driver_lock();
        let close = self.stage_close();

        // teardown errors only surface when the stages themselves succeeded
        result.and(unlock).and(close)
    }

    fn run_stages(&mut self) -> CoreResult<()> {
        self.stage_init()?;
        self.stage_health_check()?;
        self.stage_prepare_local()?;
        self.acquire_driver_lock()?;
        self.stage_prepare_remote()?;
        self.stage_start()
    }

    fn stage_init(&mut self) -> CoreResult<()> {
        log::debug!("init");

        self.driver.init()?;

        for (idx, source) in self.sources.iter_mut().enumerate() {
            source.init()?;

            match (source.as_sql().is_some(), source.as_hook().is_some()) {
                (true, false) | (false, true) => {}
                _ => {
                    return Err(CoreError::InvalidSource(format!(
                        "source {idx} must provide exactly one of SQL statements or hooks"
                    )))
                }
            }
        }

        log::info!("init successful");
        Ok(())
    }

    fn stage_health_check(&mut self) -> CoreResult<()> {
        log::debug!("health check");
        self.driver.healthy()?;
        log::info!("health check successful");
        Ok(())
    }

    fn stage_prepare_local(&mut self) -> CoreResult<()> {
        log::debug!("prepare local");
        self.available = merge_sources(&self.sources)?;
        log::info!(
            "prepare local successful, {} available migrations",
            self.available.len()
        );
        Ok(())
    }

    fn acquire_driver_lock(&mut self) -> CoreResult<()> {
        if self.opts.disable_driver_locks {
            log::debug!("locking disabled by option");
            return Ok(());
        }
        if !self.driver.supports_locks() {
            log::debug!("locking not supported by driver");
            return Ok(());
        }

        self.driver.acquire_lock()?;
        self.driver_lock_acquired = true;
        log::info!("acquired exclusive driver lock");
        Ok(())
    }

    fn release_driver_lock(&mut self) -> CoreResult<()> {
        if !self.driver_lock_acquired {
            return Ok(());
        }

        self.driver.release_lock()?;
        self.driver_lock_acquired = false;
        log::info!("released driver lock");
        Ok(())
    }

    fn stage_prepare_remote(&mut self) -> CoreResult<()> {
        log::debug!("prepare remote");

        let applied = self.driver.list_migrations()?;
        log::info!("loaded {} applied migrations from driver", applied.len());

        health_check_applied(&applied)?;
        self.applied = applied;

        log::info!("prepare remote successful");
        Ok(())
    }

    /// Reconcile the applied history against the local set, roll back what
    /// the local set no longer knows, then apply what is missing.
    fn stage_start(&mut self) -> CoreResult<()> {
        self.unknown_applied = unknown_applied_migrations(
            &self.applied,
            &self.available,
            !self.opts.disable_hash_integrity_checks,
        )?;

        if self.unknown_applied.is_empty() {
            log::debug!("all stored migrations are known, continuing with migration");
        } else {
            log::debug!(
                "{} unknown applied migrations, starting rollback",
                self.unknown_applied.len()
            );
            self.stage_rollback()?;
        }

        self.stage_migrate()
    }

    fn stage_close(&mut self) -> CoreResult<()> {
        log::debug!("close");
        self.driver.close()
    }
}
