use super::*;
use crate::sqlite::{SqliteBackend, SqliteDriver};
use adapt_core::Driver;
use adapt_core::SqlTarget;
use chrono::{Duration, TimeZone};
use tempfile::TempDir;

// ── Row decoding ───────────────────────────────────────────────────────

fn full_row() -> Vec<SqlValue> {
    vec![
        SqlValue::Text("20240102_0304_init".to_string()),
        SqlValue::Text("svc@v1.0.0".to_string()),
        SqlValue::Text("2024-01-02T03:04:05+00:00".to_string()),
        SqlValue::Text("2024-01-02 03:04:06.123456".to_string()),
        SqlValue::Text("deadbeef".to_string()),
        SqlValue::Text("adapt@v0.1.0".to_string()),
        SqlValue::Text("ADAPT-00aa11-bb22cc-dd33ee-ff4455".to_string()),
        SqlValue::Integer(3),
        SqlValue::Null,
    ]
}

#[test]
fn decodes_a_complete_row() {
    let migration = decode_migration_row(&full_row()).unwrap();

    assert_eq!(migration.id, "20240102_0304_init");
    assert_eq!(migration.executor, "svc@v1.0.0");
    assert_eq!(
        migration.started,
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    );
    assert_eq!(
        migration.finished.unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 6).unwrap() + Duration::microseconds(123_456)
    );
    assert_eq!(migration.hash.as_deref(), Some("deadbeef"));
    assert_eq!(migration.adapt_version, "adapt@v0.1.0");
    assert_eq!(migration.deployment_order, 3);
    assert!(migration.down.is_none());
}

#[test]
fn nullable_columns_decode_to_none() {
    let mut row = full_row();
    row[3] = SqlValue::Null;
    row[4] = SqlValue::Null;
    row[8] = SqlValue::Null;

    let migration = decode_migration_row(&row).unwrap();
    assert!(migration.finished.is_none());
    assert!(migration.hash.is_none());
    assert!(migration.down.is_none());
}

#[test]
fn native_timestamps_are_accepted() {
    let mut row = full_row();
    let started = Utc.with_ymd_and_hms(2023, 6, 7, 8, 9, 10).unwrap();
    row[2] = SqlValue::Timestamp(started);

    let migration = decode_migration_row(&row).unwrap();
    assert_eq!(migration.started, started);
}

#[test]
fn blob_down_column_decodes_as_text() {
    let mut row = full_row();
    row[8] = SqlValue::Bytes(b"{\"UseTransaction\":true,\"Statements\":[]}".to_vec());

    let migration = decode_migration_row(&row).unwrap();
    assert_eq!(
        migration.down.as_deref(),
        Some("{\"UseTransaction\":true,\"Statements\":[]}")
    );
}

#[test]
fn wrong_column_count_is_an_error() {
    let err = decode_migration_row(&full_row()[..5]).unwrap_err();
    assert!(matches!(err, CoreError::DriverOperation(_)));
}

#[test]
fn garbage_timestamp_is_an_error() {
    let mut row = full_row();
    row[2] = SqlValue::Text("not a timestamp".to_string());
    assert!(decode_migration_row(&row).is_err());
}

// ── Global transaction lifecycle ───────────────────────────────────────

/// SQLite-backed dialect that opts into the global run transaction, the way
/// the PostgreSQL policy does. The lock statements are empty: the
/// transaction itself is the serialization.
struct GlobalTxDialect {
    backend: SqliteBackend,
}

impl GlobalTxDialect {
    fn open(dir: &TempDir) -> Self {
        Self {
            backend: SqliteBackend::open(dir.path().join("meta.db")).unwrap(),
        }
    }
}

impl SqlStatementsDriver for GlobalTxDialect {
    fn name(&self) -> &str {
        "test_global_tx"
    }

    fn init(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn healthy(&mut self) -> CoreResult<()> {
        self.backend.execute(
            "CREATE TABLE IF NOT EXISTS meta (id TEXT PRIMARY KEY, executor TEXT, \
             started TEXT, finished TEXT, hash TEXT, adapt TEXT, deployment TEXT, \
             deployment_order INT, down TEXT, UNIQUE (deployment, deployment_order))",
            &[],
        )?;
        Ok(())
    }

    fn supports_locks(&self) -> bool {
        true
    }

    fn acquire_lock(&self) -> String {
        String::new()
    }

    fn release_lock(&self) -> String {
        String::new()
    }

    fn list_migrations(&self) -> String {
        "SELECT id, executor, started, finished, hash, adapt, deployment, deployment_order, \
         down FROM meta ORDER BY id"
            .to_string()
    }

    fn add_migration(&self, migration: &Migration) -> (String, Vec<SqlValue>) {
        (
            "INSERT INTO meta (id, executor, started, hash, adapt, deployment, \
             deployment_order, down) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
                .to_string(),
            crate::sqlite::migration_args(migration),
        )
    }

    fn set_migration_to_finished(&self, migration_id: &str) -> (String, Vec<SqlValue>) {
        (
            "UPDATE meta SET finished=? WHERE id=?".to_string(),
            vec![
                SqlValue::Timestamp(Utc::now()),
                SqlValue::from(migration_id),
            ],
        )
    }

    fn delete_migration(&self, migration_id: &str) -> (String, Vec<SqlValue>) {
        (
            "DELETE FROM meta WHERE id=?".to_string(),
            vec![SqlValue::from(migration_id)],
        )
    }

    fn supports_tx(&self) -> bool {
        true
    }

    fn tx_options(&self) -> TxOptions {
        TxOptions::default()
    }

    fn use_global_tx(&self) -> bool {
        true
    }

    fn handle(&mut self) -> &mut dyn DbHandle {
        &mut self.backend
    }

    fn close(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

fn sample_migration(id: &str) -> Migration {
    Migration {
        id: id.to_string(),
        executor: "tester@v0.0.1".to_string(),
        started: Utc::now(),
        finished: None,
        hash: None,
        adapt_version: "adapt@v0.1.0".to_string(),
        deployment: "ADAPT-000000-000000-000000-000000".to_string(),
        deployment_order: 0,
        down: None,
    }
}

/// Rows visible to a second connection, 0 when the table is not there yet.
fn observed_rows(dir: &TempDir) -> usize {
    let mut observer = SqliteBackend::open(dir.path().join("meta.db")).unwrap();
    observer
        .query("SELECT id FROM meta", &[])
        .map(|rows| rows.len())
        .unwrap_or(0)
}

#[test]
fn global_tx_commits_at_close() {
    let dir = TempDir::new().unwrap();
    let mut adapter = StatementsAdapter::new(GlobalTxDialect::open(&dir));

    adapter.init().unwrap();
    adapter.healthy().unwrap();
    adapter.acquire_lock().unwrap();
    adapter.add_migration(&sample_migration("a")).unwrap();
    adapter.set_migration_to_finished("a").unwrap();
    adapter.release_lock().unwrap();

    // nothing visible outside the run transaction yet
    assert_eq!(observed_rows(&dir), 0);

    adapter.close().unwrap();
    assert_eq!(observed_rows(&dir), 1);
}

#[test]
fn failed_operation_rolls_the_global_tx_back() {
    let dir = TempDir::new().unwrap();
    let mut adapter = StatementsAdapter::new(GlobalTxDialect::open(&dir));

    adapter.init().unwrap();
    adapter.healthy().unwrap();
    adapter.add_migration(&sample_migration("a")).unwrap();

    // primary-key collision flips the rollback flag
    assert!(adapter.add_migration(&sample_migration("a")).is_err());

    adapter.close().unwrap();
    assert_eq!(observed_rows(&dir), 0);
}

#[test]
fn custom_migration_capability_follows_the_global_tx() {
    let dir = TempDir::new().unwrap();
    let mut adapter = StatementsAdapter::new(GlobalTxDialect::open(&dir));
    adapter.init().unwrap();
    assert!(adapter.database().unwrap().custom().is_some());

    let mut plain = SqliteDriver::new(SqliteBackend::in_memory().unwrap()).into_driver();
    plain.init().unwrap();
    assert!(plain.database().unwrap().custom().is_none());
}

#[test]
fn custom_migration_runs_statements_and_before_finish_in_the_run_tx() {
    let dir = TempDir::new().unwrap();
    let mut adapter = StatementsAdapter::new(GlobalTxDialect::open(&dir));

    adapter.init().unwrap();
    adapter.healthy().unwrap();
    adapter.add_migration(&sample_migration("a")).unwrap();

    let parsed = ParsedMigration {
        use_tx: true,
        statements: vec!["CREATE TABLE payload (id INTEGER)".to_string()],
    };
    let mut delete_meta = |target: &mut dyn adapt_core::SqlTarget| -> CoreResult<()> {
        target.execute("DELETE FROM meta WHERE id=?", &[SqlValue::from("a")])?;
        Ok(())
    };

    let custom = adapter.database().unwrap().custom().unwrap();
    custom.migrate(&parsed, Some(&mut delete_meta)).unwrap();

    adapter.close().unwrap();
    assert_eq!(observed_rows(&dir), 0);

    let mut observer = SqliteBackend::open(dir.path().join("meta.db")).unwrap();
    let tables = observer
        .query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='payload'",
            &[],
        )
        .unwrap();
    assert_eq!(tables.len(), 1);
}
