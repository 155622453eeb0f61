use super::*;
use crate::migration::VERSION;
use tempfile::TempDir;

fn meta_path(dir: &TempDir) -> PathBuf {
    dir.path().join("migrations.json")
}

fn record(id: &str) -> Migration {
    Migration {
        id: id.to_string(),
        executor: "tester@v0.0.1".to_string(),
        started: Utc::now(),
        finished: None,
        hash: None,
        adapt_version: VERSION.to_string(),
        deployment: "ADAPT-000000-000000-000000-000000".to_string(),
        deployment_order: 0,
        down: None,
    }
}

#[test]
fn missing_file_is_empty_history() {
    let dir = TempDir::new().unwrap();
    let mut driver = FileDriver::new(meta_path(&dir));

    driver.healthy().unwrap();
    assert!(driver.list_migrations().unwrap().is_empty());
    assert!(!meta_path(&dir).exists());
}

#[test]
fn add_and_list_sorted() {
    let dir = TempDir::new().unwrap();
    let mut driver = FileDriver::new(meta_path(&dir));

    driver.add_migration(&record("b")).unwrap();
    driver.add_migration(&record("a")).unwrap();
    driver.add_migration(&record("c")).unwrap();

    let listed = driver.list_migrations().unwrap();
    let ids: Vec<&str> = listed.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn duplicate_id_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut driver = FileDriver::new(meta_path(&dir));

    driver.add_migration(&record("a")).unwrap();
    let err = driver.add_migration(&record("a")).unwrap_err();
    assert!(matches!(err, CoreError::DuplicateMigration(_)));
}

#[test]
fn set_finished_stamps_the_record() {
    let dir = TempDir::new().unwrap();
    let mut driver = FileDriver::new(meta_path(&dir));

    driver.add_migration(&record("a")).unwrap();
    assert!(driver.list_migrations().unwrap()[0].finished.is_none());

    driver.set_migration_to_finished("a").unwrap();
    assert!(driver.list_migrations().unwrap()[0].finished.is_some());
}

#[test]
fn set_finished_on_unknown_id_fails() {
    let dir = TempDir::new().unwrap();
    let mut driver = FileDriver::new(meta_path(&dir));

    let err = driver.set_migration_to_finished("missing").unwrap_err();
    assert!(matches!(err, CoreError::DriverOperation(_)));
}

#[test]
fn corrupt_file_fails_health_check() {
    let dir = TempDir::new().unwrap();
    let path = meta_path(&dir);
    fs::write(&path, "this is not json").unwrap();

    let mut driver = FileDriver::new(path);
    assert!(driver.healthy().is_err());
}

#[test]
fn document_uses_shared_key_spelling() {
    let dir = TempDir::new().unwrap();
    let path = meta_path(&dir);
    let mut driver = FileDriver::new(path.clone());

    let mut migration = record("a");
    migration.hash = Some("abc".to_string());
    driver.add_migration(&migration).unwrap();
    driver.set_migration_to_finished("a").unwrap();

    let content = fs::read_to_string(&path).unwrap();
    for key in [
        "\"Migrations\"",
        "\"ID\"",
        "\"Executor\"",
        "\"Started\"",
        "\"Finished\"",
        "\"Hash\"",
        "\"Adapt\"",
        "\"Deployment\"",
        "\"DeploymentOrder\"",
    ] {
        assert!(content.contains(key), "missing key {key} in {content}");
    }
}

#[cfg(unix)]
#[test]
fn file_mode_defaults_to_0600() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = meta_path(&dir);
    let mut driver = FileDriver::new(path.clone());

    driver.add_migration(&record("a")).unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
