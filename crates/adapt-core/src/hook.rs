//! Code-valued migrations.

use crate::driver::{DbHandle, SqlTarget};
use crate::error::CoreResult;
use crate::parser::ParsedMigration;

/// Callback bundle for a hook migration.
///
/// Exactly one of the three forward callbacks must be set. `migrate_up` is
/// the only choice when the driver has no database capability;
/// `migrate_up_with_handle` receives the driver's connection handle;
/// `migrate_up_with_tx` receives a target inside a transaction the pipeline
/// manages, so the callback must not (and, by type, cannot) commit or roll
/// back itself.
#[derive(Default)]
pub struct Hook {
    /// Runs without any database access.
    pub migrate_up: Option<Box<dyn Fn() -> CoreResult<()>>>,

    /// Receives the driver's connection handle.
    pub migrate_up_with_handle: Option<Box<dyn Fn(&mut dyn DbHandle) -> CoreResult<()>>>,

    /// Receives a target inside a pipeline-managed transaction.
    pub migrate_up_with_tx: Option<Box<dyn Fn(&mut dyn SqlTarget) -> CoreResult<()>>>,

    /// Produces the down-form stored with the meta record, making the
    /// migration reversible later even if this hook disappears.
    pub migrate_down: Option<Box<dyn Fn() -> Option<ParsedMigration>>>,
}

impl Hook {
    /// Number of forward callbacks that are set.
    pub(crate) fn forward_count(&self) -> usize {
        [
            self.migrate_up.is_some(),
            self.migrate_up_with_handle.is_some(),
            self.migrate_up_with_tx.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("migrate_up", &self.migrate_up.is_some())
            .field("migrate_up_with_handle", &self.migrate_up_with_handle.is_some())
            .field("migrate_up_with_tx", &self.migrate_up_with_tx.is_some())
            .field("migrate_down", &self.migrate_down.is_some())
            .finish()
    }
}
