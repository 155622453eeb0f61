//! File-backed meta driver.
//!
//! Stores the applied-migration history as a single JSON document
//! `{ "Migrations": [...] }` next to the application. A missing file means
//! an empty history and is created on first write. The driver supports no
//! locking; concurrent runs are only guarded by the duplicate-id check on
//! insert.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::driver::Driver;
use crate::error::{CoreError, CoreResult};
use crate::migration::Migration;

/// On-disk document wrapping the migration list.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileStorage {
    #[serde(rename = "Migrations")]
    migrations: Vec<Migration>,
}

/// Driver keeping meta information in a local JSON file.
pub struct FileDriver {
    path: PathBuf,
    permission: u32,
}

impl FileDriver {
    /// Driver for the meta file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            permission: 0o600,
        }
    }

    /// Override the file mode applied after writes (default `0o600`).
    pub fn with_permission(mut self, mode: u32) -> Self {
        self.permission = mode;
        self
    }

    fn read_storage(&self) -> CoreResult<FileStorage> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(FileStorage::default())
            }
            Err(err) => return Err(CoreError::Io(err)),
        };

        let mut storage: FileStorage = serde_json::from_str(&content)?;
        storage.migrations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(storage)
    }

    fn write_storage(&self, storage: &FileStorage) -> CoreResult<()> {
        let buf = serde_json::to_string_pretty(storage)?;
        fs::write(&self.path, buf)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(self.permission))?;
        }

        Ok(())
    }
}

impl Driver for FileDriver {
    fn name(&self) -> &str {
        "driver_file"
    }

    fn init(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn healthy(&mut self) -> CoreResult<()> {
        if self.path.exists() {
            // whatever is there must at least decode
            self.read_storage()?;
        } else {
            log::debug!(
                "meta file {} does not exist yet, will be created on first write",
                self.path.display()
            );
        }
        Ok(())
    }

    fn supports_locks(&self) -> bool {
        false
    }

    fn acquire_lock(&mut self) -> CoreResult<()> {
        Err(CoreError::DriverOperation(
            "file driver does not support locks".to_string(),
        ))
    }

    fn release_lock(&mut self) -> CoreResult<()> {
        Err(CoreError::DriverOperation(
            "file driver does not support locks".to_string(),
        ))
    }

    fn list_migrations(&mut self) -> CoreResult<Vec<Migration>> {
        Ok(self.read_storage()?.migrations)
    }

    fn add_migration(&mut self, migration: &Migration) -> CoreResult<()> {
        let mut storage = self.read_storage()?;

        if storage.migrations.iter().any(|m| m.id == migration.id) {
            return Err(CoreError::DuplicateMigration(format!(
                "migration {:?} is already recorded in {}",
                migration.id,
                self.path.display()
            )));
        }

        storage.migrations.push(migration.clone());
        self.write_storage(&storage)
    }

    fn set_migration_to_finished(&mut self, migration_id: &str) -> CoreResult<()> {
        let mut storage = self.read_storage()?;

        let entry = storage
            .migrations
            .iter_mut()
            .find(|m| m.id == migration_id)
            .ok_or_else(|| {
                CoreError::DriverOperation(format!(
                    "migration {migration_id:?} not found in meta file"
                ))
            })?;
        entry.finished = Some(Utc::now());

        self.write_storage(&storage)
    }

    fn close(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_test.rs"]
mod tests;
