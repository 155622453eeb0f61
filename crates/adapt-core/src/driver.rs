//! Driver contract: the meta-store abstraction migrations are recorded in,
//! plus the SQL execution seam used by database-backed drivers.
//!
//! Capabilities are discovered through explicit queries ([`Driver::database`],
//! [`DatabaseDriver::custom`]) rather than downcasting, so a driver is always
//! handled through one value and the pipeline only calls what the driver
//! advertises.

use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::migration::Migration;
use crate::parser::ParsedMigration;

pub mod file;

/// A single SQL parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// Execution target for SQL statements.
///
/// Represents a connection that may or may not have an open transaction.
/// Code handed a plain `&mut dyn SqlTarget` (migration hooks, the
/// before-finish callback) cannot commit or roll back; only a [`DbHandle`]
/// can end a transaction.
pub trait SqlTarget {
    /// Execute one statement, returning the affected row count when the
    /// backend reports one.
    fn execute(&mut self, query: &str, args: &[SqlValue]) -> CoreResult<usize>;

    /// Run a query and collect every row.
    fn query(&mut self, query: &str, args: &[SqlValue]) -> CoreResult<Vec<Vec<SqlValue>>>;
}

/// How a transaction takes its locks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TxBehavior {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

/// Options applied when the pipeline begins a transaction on a driver's
/// handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub behavior: TxBehavior,
}

/// A connection handle that can manage transactions.
///
/// `begin`/`commit`/`rollback` operate on the connection's single
/// transaction slot; nesting is the backend's problem and not used by the
/// pipeline.
pub trait DbHandle: SqlTarget {
    fn begin(&mut self, opts: &TxOptions) -> CoreResult<()>;
    fn commit(&mut self) -> CoreResult<()>;
    fn rollback(&mut self) -> CoreResult<()>;
}

/// The meta store the pipeline records applied migrations in.
///
/// Lifecycle: `init` (configuration only), `healthy` (connectivity plus
/// creation of the meta structures), the migration operations, then `close`.
/// `close` is always called once `init` ran, even after errors;
/// `release_lock` is always called once `acquire_lock` succeeded.
pub trait Driver {
    /// Driver name used in log output.
    fn name(&self) -> &str;

    /// Validate configuration and prepare internal state. Connection work
    /// belongs in [`Driver::healthy`].
    fn init(&mut self) -> CoreResult<()>;

    /// Verify the store is reachable and create the meta structures needed
    /// to record migrations.
    fn healthy(&mut self) -> CoreResult<()>;

    /// Whether [`Driver::acquire_lock`] / [`Driver::release_lock`] may be
    /// called. A driver returning `false` here never sees either call.
    fn supports_locks(&self) -> bool;

    /// Take the exclusive lock serializing concurrent pipeline runs.
    fn acquire_lock(&mut self) -> CoreResult<()>;

    /// Release the previously acquired lock.
    fn release_lock(&mut self) -> CoreResult<()>;

    /// All applied migrations, sorted by id.
    fn list_migrations(&mut self) -> CoreResult<Vec<Migration>>;

    /// Record a migration that is about to execute (`finished` unset).
    fn add_migration(&mut self, migration: &Migration) -> CoreResult<()>;

    /// Stamp the finished time of a recorded migration.
    fn set_migration_to_finished(&mut self, migration_id: &str) -> CoreResult<()>;

    /// Release underlying resources. Always called, even after errors.
    fn close(&mut self) -> CoreResult<()>;

    /// Database capability; `None` for meta stores that are not SQL
    /// databases. Required whenever SQL-statements migrations or rollbacks
    /// have to be executed.
    fn database(&mut self) -> Option<&mut dyn DatabaseDriver> {
        None
    }
}

/// Capability of drivers whose meta store is an SQL database.
pub trait DatabaseDriver {
    /// The connection statements are executed on.
    fn handle(&mut self) -> &mut dyn DbHandle;

    /// Whether migrations may run inside transactions.
    fn supports_tx(&self) -> bool;

    /// Options for the transactions the pipeline begins.
    fn tx_options(&self) -> TxOptions;

    /// The dialect's statement deleting migration `migration_id` from the
    /// meta table. The pipeline executes it against an explicit target, so
    /// the delete can join the transaction of a down-migration.
    fn delete_migration(&self, migration_id: &str) -> (String, Vec<SqlValue>);

    /// Fine-grained migration capability. Drivers that must control the
    /// statement execution and transaction lifecycle themselves return
    /// `Some`; the pipeline then delegates whole migrations to
    /// [`CustomMigration::migrate`].
    fn custom(&mut self) -> Option<&mut dyn CustomMigration> {
        None
    }
}

/// Callback executed inside the same transaction as a migration's
/// statements, immediately before that transaction is committed.
pub type BeforeFinish<'a> = &'a mut dyn FnMut(&mut dyn SqlTarget) -> CoreResult<()>;

/// Drivers that take full control over executing one parsed migration.
pub trait CustomMigration {
    /// Execute every statement of `migration`. When the driver runs its own
    /// transaction it must call `before_finish` (if given) before
    /// committing, so cleanup writes participate in that transaction.
    fn migrate(
        &mut self,
        migration: &ParsedMigration,
        before_finish: Option<BeforeFinish<'_>>,
    ) -> CoreResult<()>;
}
