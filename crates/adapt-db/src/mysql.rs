//! MySQL dialect policy.
//!
//! Only the policy lives here — queries, lock statements, DDL. The
//! connection handle comes from the embedder, since driving a MySQL server
//! is the application's concern.

use adapt_core::{CoreError, CoreResult, DbHandle, Migration, SqlValue, TxOptions};
use chrono::Utc;

use crate::sqlite::migration_args;
use crate::statements::{SqlStatementsDriver, StatementsAdapter};

/// MySQL dialect: table lock for serialization, per-migration transactions.
pub struct MySqlDriver {
    handle: Box<dyn DbHandle>,
    db_name: String,
    db_create_stmt: String,
    table_name: String,
    qualified_table: String,
    tx_options: TxOptions,
    tx_disabled: bool,
}

impl MySqlDriver {
    pub fn new(handle: Box<dyn DbHandle>) -> Self {
        Self {
            handle,
            db_name: "_adapt".to_string(),
            db_create_stmt: "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET utf8mb4 \
                             COLLATE utf8mb4_unicode_ci"
                .to_string(),
            table_name: "_migrations".to_string(),
            qualified_table: String::new(),
            tx_options: TxOptions::default(),
            tx_disabled: false,
        }
    }

    /// Database holding the meta table (default `_adapt`).
    pub fn with_db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = name.into();
        self
    }

    /// Statement creating the meta database; must contain one `{}`
    /// placeholder for the database name.
    pub fn with_db_create_statement(mut self, stmt: impl Into<String>) -> Self {
        self.db_create_stmt = stmt.into();
        self
    }

    /// Meta table name (default `_migrations`).
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
    pub fn into_driver(self) -> StatementsAdapter<MySqlDriver> {
        StatementsAdapter::new(self)
    }
}

impl SqlStatementsDriver for MySqlDriver {
    fn name(&self) -> &str {
        "driver_mysql"
    }

    fn init(&mut self) -> CoreResult<()> {
        if self.db_name.trim().is_empty() {
            return Err(CoreError::DriverOperation(
                "mysql driver: database name cannot be empty".to_string(),
            ));
        }
        if self.table_name.trim().is_empty() {
            return Err(CoreError::DriverOperation(
                "mysql driver: table name cannot be empty".to_string(),
            ));
        }
        if !self.db_create_stmt.contains("{}") {
            return Err(CoreError::DriverOperation(
                "mysql driver: create statement needs a {} placeholder".to_string(),
            ));
        }

        self.qualified_table = format!("{}.{}", self.db_name, self.table_name);
        Ok(())
    }

    fn healthy(&mut self) -> CoreResult<()> {
        let create_db = self.db_create_stmt.replacen("{}", &self.db_name, 1);
        self.handle.execute(&create_db, &[])?;

        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS {}\n\
             (\n\
                 id               VARCHAR(255) NOT NULL,\n\
                 executor         VARCHAR(255) NOT NULL,\n\
                 started          TIMESTAMP(6) NOT NULL,\n\
                 finished         TIMESTAMP(6),\n\
                 hash             VARCHAR(255),\n\
                 adapt            VARCHAR(32)  NOT NULL,\n\
                 deployment       VARCHAR(255) NOT NULL,\n\
                 deployment_order INT          NOT NULL,\n\
                 down             MEDIUMBLOB,\n\
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
        format!("LOCK TABLE {} WRITE", self.qualified_table)
    }

    fn release_lock(&self) -> String {
        "UNLOCK TABLES".to_string()
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
                 deployment_order, down) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                self.qualified_table
            ),
            migration_args(migration),
        )
    }

    fn set_migration_to_finished(&self, migration_id: &str) -> (String, Vec<SqlValue>) {
        (
            format!("UPDATE {} SET finished=? WHERE id=?", self.qualified_table),
            vec![SqlValue::Timestamp(Utc::now()), SqlValue::from(migration_id)],
        )
    }

    fn delete_migration(&self, migration_id: &str) -> (String, Vec<SqlValue>) {
        (
            format!("DELETE FROM {} WHERE id=?", self.qualified_table),
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
        self.handle.as_mut()
    }

    fn close(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "mysql_test.rs"]
mod tests;
