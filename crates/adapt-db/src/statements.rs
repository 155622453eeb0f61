//! Dialect contract and the adapter lifting it into a full driver.
//!
//! A [`SqlStatementsDriver`] reduces a dialect to its capability flags and
//! `(query, args)` pairs for the meta operations; [`StatementsAdapter`]
//! supplies everything else — global-transaction lifecycle, rollback
//! tracking, row decoding — so dialects stay free of boilerplate.

use adapt_core::{
    BeforeFinish, CoreError, CoreResult, CustomMigration, DatabaseDriver, DbHandle, Driver,
    Migration, ParsedMigration, SqlValue, TxOptions,
};
use chrono::{DateTime, NaiveDateTime, Utc};

/// A SQL dialect, described by its feature flags and per-operation
/// statements. The dialect owns the connection handle it runs against.
pub trait SqlStatementsDriver {
    /// Dialect name used in log output.
    fn name(&self) -> &str;

    /// Validate configuration; connection work belongs in `healthy`.
    fn init(&mut self) -> CoreResult<()>;

    /// Verify connectivity and create the meta table (and, where the
    /// dialect needs one, the meta database).
    fn healthy(&mut self) -> CoreResult<()>;

    /// Whether the dialect can take an exclusive lock.
    fn supports_locks(&self) -> bool;

    /// Statement acquiring the lock; an empty string is a no-op.
    fn acquire_lock(&self) -> String;

    /// Statement releasing the lock; an empty string is a no-op.
    fn release_lock(&self) -> String;

    /// Query selecting all meta rows in the column order `id, executor,
    /// started, finished, hash, adapt, deployment, deployment_order, down`,
    /// ordered by id.
    fn list_migrations(&self) -> String;

    /// Insert for a started migration (`finished` stays NULL).
    fn add_migration(&self, migration: &Migration) -> (String, Vec<SqlValue>);

    /// Update stamping a migration's finished time.
    fn set_migration_to_finished(&self, migration_id: &str) -> (String, Vec<SqlValue>);

    /// Delete of one meta row.
    fn delete_migration(&self, migration_id: &str) -> (String, Vec<SqlValue>);

    /// Whether migrations may run inside transactions.
    fn supports_tx(&self) -> bool;

    /// Options for transactions begun on this dialect's handle.
    fn tx_options(&self) -> TxOptions;

    /// Run every operation of the whole run inside one transaction, begun
    /// at adapter init and committed or rolled back at close. Requires a
    /// dedicated connection.
    fn use_global_tx(&self) -> bool;

    /// The connection handle operations execute on.
    fn handle(&mut self) -> &mut dyn DbHandle;

    /// Release dialect resources; the handle itself closes on drop.
    fn close(&mut self) -> CoreResult<()>;
}

/// Adapter implementing the full driver contract on top of a
/// [`SqlStatementsDriver`].
///
/// With `use_global_tx` the adapter also takes over statement execution for
/// whole migrations (the [`CustomMigration`] capability), because every
/// statement of the run has to land in the one global transaction. Without
/// it, per-migration transactions stay with the pipeline.
pub struct StatementsAdapter<D> {
    dialect: D,
    global_tx: bool,
    rollback: bool,
}

impl<D: SqlStatementsDriver> StatementsAdapter<D> {
    pub fn new(dialect: D) -> Self {
        Self {
            dialect,
            global_tx: false,
            rollback: false,
        }
    }

    fn exec_tracked(&mut self, query: &str, args: &[SqlValue]) -> CoreResult<()> {
        let result = self.dialect.handle().execute(query, args);
        if result.is_err() {
            self.rollback = true;
        }
        result.map(|_| ())
    }
}

impl<D: SqlStatementsDriver> Driver for StatementsAdapter<D> {
    fn name(&self) -> &str {
        self.dialect.name()
    }

    fn init(&mut self) -> CoreResult<()> {
        self.dialect.init()?;

        if self.dialect.supports_tx() && self.dialect.use_global_tx() {
            let opts = self.dialect.tx_options();
            self.dialect.handle().begin(&opts)?;
            self.global_tx = true;
            log::info!("using one global transaction for the whole run");
        }

        Ok(())
    }

    fn healthy(&mut self) -> CoreResult<()> {
        self.dialect.healthy()
    }

    fn supports_locks(&self) -> bool {
        self.dialect.supports_locks()
    }

    fn acquire_lock(&mut self) -> CoreResult<()> {
        let query = self.dialect.acquire_lock();
        if query.is_empty() {
            return Ok(());
        }
        self.exec_tracked(&query, &[])
    }

    fn release_lock(&mut self) -> CoreResult<()> {
        let query = self.dialect.release_lock();
        if query.is_empty() {
            return Ok(());
        }
        self.exec_tracked(&query, &[])
    }

    fn list_migrations(&mut self) -> CoreResult<Vec<Migration>> {
        let query = self.dialect.list_migrations();
        let rows = match self.dialect.handle().query(&query, &[]) {
            Ok(rows) => rows,
            Err(err) => {
                self.rollback = true;
                return Err(err);
            }
        };

        rows.iter().map(|row| decode_migration_row(row)).collect()
    }

    fn add_migration(&mut self, migration: &Migration) -> CoreResult<()> {
        let (query, args) = self.dialect.add_migration(migration);
        self.exec_tracked(&query, &args)
    }

    fn set_migration_to_finished(&mut self, migration_id: &str) -> CoreResult<()> {
        let (query, args) = self.dialect.set_migration_to_finished(migration_id);
        self.exec_tracked(&query, &args)
    }

    fn close(&mut self) -> CoreResult<()> {
        if self.global_tx {
            self.global_tx = false;
            if self.rollback {
                log::info!("rolling back global transaction");
                self.dialect.handle().rollback()?;
            } else {
                log::info!("committing global transaction");
                self.dialect.handle().commit()?;
            }
        }

        self.dialect.close()
    }

    fn database(&mut self) -> Option<&mut dyn DatabaseDriver> {
        Some(self)
    }
}

impl<D: SqlStatementsDriver> DatabaseDriver for StatementsAdapter<D> {
    fn handle(&mut self) -> &mut dyn DbHandle {
        self.dialect.handle()
    }

    fn supports_tx(&self) -> bool {
        self.dialect.supports_tx()
    }

    fn tx_options(&self) -> TxOptions {
        self.dialect.tx_options()
    }

    fn delete_migration(&self, migration_id: &str) -> (String, Vec<SqlValue>) {
        self.dialect.delete_migration(migration_id)
    }

    fn custom(&mut self) -> Option<&mut dyn CustomMigration> {
        if self.global_tx {
            Some(self)
        } else {
            None
        }
    }
}

impl<D: SqlStatementsDriver> CustomMigration for StatementsAdapter<D> {
    fn migrate(
        &mut self,
        migration: &ParsedMigration,
        before_finish: Option<BeforeFinish<'_>>,
    ) -> CoreResult<()> {
        for statement in &migration.statements {
            log::debug!("executing statement {statement:?}");
            if let Err(err) = self.dialect.handle().execute(statement, &[]) {
                self.rollback = true;
                return Err(err);
            }
        }

        if let Some(callback) = before_finish {
            if let Err(err) = callback(self.dialect.handle()) {
                self.rollback = true;
                return Err(err);
            }
        }

        Ok(())
    }
}

// ── Row decoding ───────────────────────────────────────────────────────
//
// Backends are loose about column types (SQLite hands timestamps back as
// TEXT, embedder handles may produce native timestamps), so every reader
// tries the reasonable encodings before giving up.

/// Decode one meta row in the fixed column order of
/// [`SqlStatementsDriver::list_migrations`].
pub(crate) fn decode_migration_row(row: &[SqlValue]) -> CoreResult<Migration> {
    if row.len() != 9 {
        return Err(CoreError::DriverOperation(format!(
            "meta row has {} columns, expected 9",
            row.len()
        )));
    }

    Ok(Migration {
        id: text(&row[0], "id")?,
        executor: text(&row[1], "executor")?,
        started: timestamp(&row[2], "started")?,
        finished: opt_timestamp(&row[3], "finished")?,
        hash: opt_text(&row[4], "hash")?,
        adapt_version: text(&row[5], "adapt")?,
        deployment: text(&row[6], "deployment")?,
        deployment_order: integer(&row[7], "deployment_order")?,
        down: opt_text(&row[8], "down")?,
    })
}

fn unexpected(column: &str, value: &SqlValue) -> CoreError {
    CoreError::DriverOperation(format!("column {column} has unexpected value {value:?}"))
}

fn text(value: &SqlValue, column: &str) -> CoreResult<String> {
    match value {
        SqlValue::Text(s) => Ok(s.clone()),
        SqlValue::Bytes(b) => {
            String::from_utf8(b.clone()).map_err(|_| unexpected(column, value))
        }
        other => Err(unexpected(column, other)),
    }
}

fn opt_text(value: &SqlValue, column: &str) -> CoreResult<Option<String>> {
    match value {
        SqlValue::Null => Ok(None),
        other => text(other, column).map(Some),
    }
}

fn integer(value: &SqlValue, column: &str) -> CoreResult<i64> {
    match value {
        SqlValue::Integer(n) => Ok(*n),
        SqlValue::Text(s) => s.parse().map_err(|_| unexpected(column, value)),
        other => Err(unexpected(column, other)),
    }
}

fn timestamp(value: &SqlValue, column: &str) -> CoreResult<DateTime<Utc>> {
    match value {
        SqlValue::Timestamp(t) => Ok(*t),
        SqlValue::Text(s) => parse_timestamp(s).ok_or_else(|| unexpected(column, value)),
        other => Err(unexpected(column, other)),
    }
}

fn opt_timestamp(value: &SqlValue, column: &str) -> CoreResult<Option<DateTime<Utc>>> {
    match value {
        SqlValue::Null => Ok(None),
        other => timestamp(other, column).map(Some),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    // timestamp columns without zone information are taken as UTC
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
#[path = "statements_test.rs"]
mod tests;
