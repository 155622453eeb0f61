//! PostgreSQL dialect policy.
//!
//! PostgreSQL serializes runs through one global transaction: the schema
//! lock is taken inside it and released implicitly on commit, which is why
//! the release statement is empty.

use adapt_core::{CoreError, CoreResult, DbHandle, Migration, SqlValue, TxOptions};
use chrono::Utc;

use crate::sqlite::migration_args;
use crate::statements::{SqlStatementsDriver, StatementsAdapter};

/// PostgreSQL dialect: global transaction, `LOCK TABLE … IN ACCESS
/// EXCLUSIVE MODE` for serialization.
pub struct PostgresDriver {
    handle: Box<dyn DbHandle>,
    schema: String,
    table_name: String,
    qualified_table: String,
    tx_options: TxOptions,
    tx_disabled: bool,
}

impl PostgresDriver {
    pub fn new(handle: Box<dyn DbHandle>) -> Self {
        Self {
            handle,
            schema: "public".to_string(),
            table_name: "_migrations".to_string(),
            qualified_table: String::new(),
            tx_options: TxOptions::default(),
            tx_disabled: false,
        }
    }

    /// Schema holding the meta table (default `public`).
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Meta table name (default `_migrations`).
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Never run migrations inside a transaction, regardless of what the
    /// scripts request. This also disables the global run transaction.
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
    pub fn into_driver(self) -> StatementsAdapter<PostgresDriver> {
        StatementsAdapter::new(self)
    }
}

impl SqlStatementsDriver for PostgresDriver {
    fn name(&self) -> &str {
        "driver_postgres"
    }

    fn init(&mut self) -> CoreResult<()> {
        if self.schema.trim().is_empty() {
            return Err(CoreError::DriverOperation(
                "postgres driver: schema cannot be empty".to_string(),
            ));
        }
        if self.table_name.trim().is_empty() {
            return Err(CoreError::DriverOperation(
                "postgres driver: table name cannot be empty".to_string(),
            ));
        }

        self.qualified_table = format!("{}.{}", self.schema, self.table_name);
        Ok(())
    }

    fn healthy(&mut self) -> CoreResult<()> {
        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS {}\n\
             (\n\
                 id               TEXT         NOT NULL,\n\
                 executor         TEXT         NOT NULL,\n\
                 started          TIMESTAMP(6) NOT NULL,\n\
                 finished         TIMESTAMP(6),\n\
                 hash             TEXT,\n\
                 adapt            TEXT         NOT NULL,\n\
                 deployment       TEXT         NOT NULL,\n\
                 deployment_order INTEGER      NOT NULL,\n\
                 down             BYTEA,\n\
                 PRIMARY KEY (id),\n\
                 UNIQUE (deployment, deployment_order)\n\
             )",
            self.qualified_table
        );
        self.handle.execute(&create_table, &[])?;
        Ok(())
    }

    fn supports_locks(&self) -> bool {
        true
    }

    fn acquire_lock(&self) -> String {
        format!(
            "LOCK TABLE {} IN ACCESS EXCLUSIVE MODE",
            self.qualified_table
        )
    }

    fn release_lock(&self) -> String {
        // released implicitly when the global transaction commits
        String::new()
    }

    fn list_migrations(&self) -> String {
        format!(
            "SELECT id, executor, started, finished, hash, adapt, deployment, deployment_order, \
             down FROM {} ORDER BY id",
            self.qualified_table
        )
    }

    fn add_migration(&self, migration: &Migration) -> (String, Vec<SqlValue>) {
        (
            format!(
                "INSERT INTO {} (id, executor, started, hash, adapt, deployment, \
                 deployment_order, down) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                self.qualified_table
            ),
            migration_args(migration),
        )
    }

    fn set_migration_to_finished(&self, migration_id: &str) -> (String, Vec<SqlValue>) {
        (
            format!(
                "UPDATE {} SET finished=$1 WHERE id=$2",
                self.qualified_table
            ),
            vec![SqlValue::Timestamp(Utc::now()), SqlValue::from(migration_id)],
        )
    }

    fn delete_migration(&self, migration_id: &str) -> (String, Vec<SqlValue>) {
        (
            format!("DELETE FROM {} WHERE id=$1", self.qualified_table),
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
        true
    }

    fn handle(&mut self) -> &mut dyn DbHandle {
        self.handle.as_mut()
    }

    fn close(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
