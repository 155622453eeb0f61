use super::*;
use crate::sqlite::SqliteBackend;

fn dialect() -> PostgresDriver {
    let mut dialect = PostgresDriver::new(Box::new(SqliteBackend::in_memory().unwrap()));
    dialect.init().unwrap();
    dialect
}

#[test]
fn default_policy() {
    let dialect = dialect();

    assert_eq!(dialect.name(), "driver_postgres");
    assert!(dialect.supports_locks());
    assert!(dialect.supports_tx());
    assert!(dialect.use_global_tx());
}

#[test]
fn lock_is_taken_inside_the_global_tx_and_released_by_commit() {
    let dialect = dialect();

    assert_eq!(
        dialect.acquire_lock(),
        "LOCK TABLE public._migrations IN ACCESS EXCLUSIVE MODE"
    );
    assert_eq!(dialect.release_lock(), "");
}

#[test]
fn queries_use_dollar_placeholders() {
    let dialect = dialect();

    let (insert, args) = dialect.add_migration(&sample());
    assert!(insert.contains("VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"));
    assert_eq!(args.len(), 8);

    let (update, _) = dialect.set_migration_to_finished("a");
    assert_eq!(
        update,
        "UPDATE public._migrations SET finished=$1 WHERE id=$2"
    );

    let (delete, args) = dialect.delete_migration("a");
    assert_eq!(delete, "DELETE FROM public._migrations WHERE id=$1");
    assert_eq!(args, vec![SqlValue::from("a")]);
}

#[test]
fn custom_schema_flows_into_the_queries() {
    let mut dialect = PostgresDriver::new(Box::new(SqliteBackend::in_memory().unwrap()))
        .with_schema("auth")
        .with_table_name("schema_history");
    dialect.init().unwrap();

    assert_eq!(
        dialect.acquire_lock(),
        "LOCK TABLE auth.schema_history IN ACCESS EXCLUSIVE MODE"
    );
}

#[test]
fn without_tx_also_disables_the_global_tx_path() {
    let dialect = PostgresDriver::new(Box::new(SqliteBackend::in_memory().unwrap())).without_tx();
    // the adapter only begins the run transaction when supports_tx holds
    assert!(!dialect.supports_tx());
    assert!(dialect.use_global_tx());
}

#[test]
fn init_rejects_bad_configuration() {
    let mut empty_schema =
        PostgresDriver::new(Box::new(SqliteBackend::in_memory().unwrap())).with_schema("");
    assert!(empty_schema.init().is_err());

    let mut empty_table =
        PostgresDriver::new(Box::new(SqliteBackend::in_memory().unwrap())).with_table_name("  ");
    assert!(empty_table.init().is_err());
}

fn sample() -> Migration {
    Migration {
        id: "a".to_string(),
        executor: "tester@v0.0.1".to_string(),
        started: Utc::now(),
        finished: None,
        hash: None,
        adapt_version: "adapt@v0.1.0".to_string(),
        deployment: "ADAPT-000000-000000-000000-000000".to_string(),
        deployment_order: 0,
        down: Some("{\"UseTransaction\":true,\"Statements\":[]}".to_string()),
    }
}
