//! SQLite dialect and backend.
//!
//! [`SqliteBackend`] adapts a rusqlite [`Connection`] to the engine's
//! handle contract; [`SqliteDriver`] is the dialect policy on top of it.
//! SQLite has no cross-process advisory lock here, so concurrent runs are
//! only serialized by the meta table's primary key.

use std::path::Path;

use adapt_core::{CoreError, CoreResult, DbHandle, Migration, SqlTarget, SqlValue, TxBehavior, TxOptions};
use rusqlite::Connection;

use crate::statements::{SqlStatementsDriver, StatementsAdapter};

/// Extension trait for converting `rusqlite::Error` into `CoreResult`.
trait SqliteResultExt<T> {
    fn to_driver_err(self) -> CoreResult<T>;
}

impl<T> SqliteResultExt<T> for Result<T, rusqlite::Error> {
    fn to_driver_err(self) -> CoreResult<T> {
        self.map_err(|e| CoreError::DriverOperation(e.to_string()))
    }
}

/// Handle over a rusqlite [`Connection`].
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Wrap an existing connection.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Ok(Self {
            conn: Connection::open(path).to_driver_err()?,
        })
    }

    /// In-memory database, mainly for tests.
    pub fn in_memory() -> CoreResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory().to_driver_err()?,
        })
    }

    /// Borrow the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn bind_value(value: &SqlValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;

    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(n) => Value::Integer(*n),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bytes(b) => Value::Blob(b.clone()),
        // timestamps are stored as RFC 3339 text
        SqlValue::Timestamp(t) => Value::Text(t.to_rfc3339()),
    }
}

fn read_value(value: rusqlite::types::ValueRef<'_>) -> SqlValue {
    use rusqlite::types::ValueRef;

    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(n) => SqlValue::Integer(n),
        ValueRef::Real(f) => SqlValue::Text(f.to_string()),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Bytes(b.to_vec()),
    }
}

impl SqlTarget for SqliteBackend {
    fn execute(&mut self, query: &str, args: &[SqlValue]) -> CoreResult<usize> {
        if args.is_empty() {
            // the batch form tolerates scripts whose single logical
            // statement spans embedded semicolons (triggers, procedures)
            self.conn.execute_batch(query).to_driver_err()?;
            return Ok(0);
        }

        let params = rusqlite::params_from_iter(args.iter().map(bind_value));
        self.conn.execute(query, params).to_driver_err()
    }

    fn query(&mut self, query: &str, args: &[SqlValue]) -> CoreResult<Vec<Vec<SqlValue>>> {
        let mut stmt = self.conn.prepare(query).to_driver_err()?;
        let column_count = stmt.column_count();
        let params = rusqlite::params_from_iter(args.iter().map(bind_value));

        let rows = stmt
            .query_map(params, |row| {
                let mut values = Vec::with_capacity(column_count);
                for idx in 0..column_count {
                    values.push(read_value(row.get_ref(idx)?));
                }
                Ok(values)
            })
            .to_driver_err()?
            .collect::<Result<Vec<_>, _>>()
            .to_driver_err()?;

        Ok(rows)
    }
}

impl DbHandle for SqliteBackend {
    fn begin(&mut self, opts: &TxOptions) -> CoreResult<()> {
        let query = match opts.behavior {
            TxBehavior::Deferred => "BEGIN DEFERRED",
            TxBehavior::Immediate => "BEGIN IMMEDIATE",
            TxBehavior::Exclusive => "BEGIN EXCLUSIVE",
        };
        self.conn.execute_batch(query).to_driver_err()
    }

    fn commit(&mut self) -> CoreResult<()> {
        self.conn.execute_batch("COMMIT").to_driver_err()
    }

    fn rollback(&mut self) -> CoreResult<()> {
        self.conn.execute_batch("ROLLBACK").to_driver_err()
    }
}

/// SQLite dialect policy.
pub struct SqliteDriver {
    handle: SqliteBackend,
    table_name: String,
    tx_options: TxOptions,
    tx_disabled: bool,
}

impl SqliteDriver {
    pub fn new(backend: SqliteBackend) -> Self {
        Self {
            handle: backend,
            table_name: "_adapt_migrations".to_string(),
            tx_options: TxOptions::default(),
            tx_disabled: false,
        }
    }

    /// Meta table name (default `_adapt_migrations`).
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Never run migrations inside a transaction, regardless of what the
    /// scripts request.
    pub fn without_tx(mut self) -> Self {
        self.tx_disabled = true;
        self
    }

    /// Options for the transactions the engine begins.
    pub fn with_tx_options(mut self, opts: TxOptions) -> Self {
        self.tx_options = opts;
        self
    }

    /// The full driver for this dialect.
    pub fn into_driver(self) -> StatementsAdapter<SqliteDriver> {
        StatementsAdapter::new(self)
    }
}

impl SqlStatementsDriver for SqliteDriver {
    fn name(&self) -> &str {
        "driver_sqlite"
    }

    fn init(&mut self) -> CoreResult<()> {
        if self.table_name.trim().is_empty() {
            return Err(CoreError::DriverOperation(
                "sqlite driver: table name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn healthy(&mut self) -> CoreResult<()> {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {}\n\
             (\n\
                 id               TEXT     NOT NULL,\n\
                 executor         TEXT     NOT NULL,\n\
                 started          DATETIME NOT NULL,\n\
                 finished         DATETIME,\n\
                 hash             TEXT,\n\
                 adapt            TEXT     NOT NULL,\n\
                 deployment       TEXT     NOT NULL,\n\
                 deployment_order INT      NOT NULL,\n\
                 down             BLOB,\n\
                 PRIMARY KEY (id),\n\
                 UNIQUE (deployment, deployment_order)\n\
             )",
            self.table_name
        );
        self.handle.execute(&create, &[])?;
        Ok(())
    }

    fn supports_locks(&self) -> bool {
        false
    }

    fn acquire_lock(&self) -> String {
        String::new()
    }

    fn release_lock(&self) -> String {
        String::new()
    }

    fn list_migrations(&self) -> String {
        format!(
            "SELECT id, executor, started, finished, hash, adapt, deployment, deployment_order, \
             down FROM {} ORDER BY id",
            self.table_name
        )
    }

    fn add_migration(&self, migration: &Migration) -> (String, Vec<SqlValue>) {
        (
            format!(
                "INSERT INTO {} (id, executor, started, hash, adapt, deployment, \
                 deployment_order, down) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                self.table_name
            ),
            migration_args(migration),
        )
    }

    fn set_migration_to_finished(&self, migration_id: &str) -> (String, Vec<SqlValue>) {
        (
            format!("UPDATE {} SET finished=? WHERE id=?", self.table_name),
            vec![
                SqlValue::Timestamp(chrono::Utc::now()),
                SqlValue::from(migration_id),
            ],
        )
    }

    fn delete_migration(&self, migration_id: &str) -> (String, Vec<SqlValue>) {
        (
            format!("DELETE FROM {} WHERE id=?", self.table_name),
            vec![SqlValue::from(migration_id)],
        )
    }

    fn supports_tx(&self) -> bool {
        !self.tx_disabled
    }

    fn tx_options(&self) -> TxOptions {
        self.tx_options
    }

    fn use_global_tx(&self) -> bool {
        false
    }

    fn handle(&mut self) -> &mut dyn DbHandle {
        &mut self.handle
    }

    fn close(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

/// Insert arguments shared by all shipped dialects, in the column order
/// `id, executor, started, hash, adapt, deployment, deployment_order, down`.
pub(crate) fn migration_args(migration: &Migration) -> Vec<SqlValue> {
    vec![
        SqlValue::from(migration.id.as_str()),
        SqlValue::from(migration.executor.as_str()),
        SqlValue::Timestamp(migration.started),
        SqlValue::from(migration.hash.clone()),
        SqlValue::from(migration.adapt_version.as_str()),
        SqlValue::from(migration.deployment.as_str()),
        SqlValue::Integer(migration.deployment_order),
        SqlValue::from(migration.down.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_executes_and_queries() {
        let mut backend = SqliteBackend::in_memory().unwrap();

        backend
            .execute("CREATE TABLE t (id INTEGER, name TEXT)", &[])
            .unwrap();
        backend
            .execute(
                "INSERT INTO t (id, name) VALUES (?, ?)",
                &[SqlValue::Integer(1), SqlValue::from("one")],
            )
            .unwrap();

        let rows = backend.query("SELECT id, name FROM t", &[]).unwrap();
        assert_eq!(
            rows,
            vec![vec![SqlValue::Integer(1), SqlValue::from("one")]]
        );
    }

    #[test]
    fn backend_null_round_trip() {
        let mut backend = SqliteBackend::in_memory().unwrap();

        backend.execute("CREATE TABLE t (v TEXT)", &[]).unwrap();
        backend
            .execute("INSERT INTO t (v) VALUES (?)", &[SqlValue::Null])
            .unwrap();

        let rows = backend.query("SELECT v FROM t", &[]).unwrap();
        assert_eq!(rows, vec![vec![SqlValue::Null]]);
    }

    #[test]
    fn transactions_commit_and_roll_back() {
        let mut backend = SqliteBackend::in_memory().unwrap();
        backend.execute("CREATE TABLE t (id INTEGER)", &[]).unwrap();

        backend.begin(&TxOptions::default()).unwrap();
        backend.execute("INSERT INTO t (id) VALUES (1)", &[]).unwrap();
        backend.commit().unwrap();

        backend.begin(&TxOptions::default()).unwrap();
        backend.execute("INSERT INTO t (id) VALUES (2)", &[]).unwrap();
        backend.rollback().unwrap();

        let rows = backend.query("SELECT id FROM t", &[]).unwrap();
        assert_eq!(rows, vec![vec![SqlValue::Integer(1)]]);
    }

    #[test]
    fn healthy_creates_the_meta_table() {
        let mut dialect = SqliteDriver::new(SqliteBackend::in_memory().unwrap());
        dialect.init().unwrap();
        dialect.healthy().unwrap();
        // idempotent
        dialect.healthy().unwrap();

        let rows = dialect
            .handle()
            .query(
                "SELECT name FROM sqlite_master WHERE type='table' AND name='_adapt_migrations'",
                &[],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn empty_table_name_fails_init() {
        let mut dialect =
            SqliteDriver::new(SqliteBackend::in_memory().unwrap()).with_table_name("  ");
        assert!(dialect.init().is_err());
    }
}
