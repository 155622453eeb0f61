//! On-disk migration directory.

use std::fs;
use std::path::PathBuf;

use super::adapter::{AdapterSource, FilesystemAdapter};
use crate::error::CoreResult;

/// Directory adapter over `std::fs`.
pub struct DirAdapter {
    directory: PathBuf,
}

impl FilesystemAdapter for DirAdapter {
    fn list_files(&self) -> CoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn read_file(&self, name: &str) -> CoreResult<String> {
        Ok(fs::read_to_string(self.directory.join(name))?)
    }
}

/// Source reading `<id>.up.sql` / `<id>.down.sql` files from a directory.
pub type FilesystemSource = AdapterSource<DirAdapter>;

impl FilesystemSource {
    /// Source over the migration scripts in `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        AdapterSource::from_adapter(DirAdapter {
            directory: directory.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;
    use tempfile::TempDir;

    #[test]
    fn lists_and_parses_scripts_from_disk() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.up.sql"), "CREATE TABLE a (id INTEGER);").unwrap();
        fs::write(dir.path().join("a.down.sql"), "DROP TABLE a;").unwrap();
        fs::write(dir.path().join("b.up.sql"), "CREATE TABLE b (id INTEGER);").unwrap();
        fs::create_dir(dir.path().join("ignored_subdir")).unwrap();

        let mut source = FilesystemSource::new(dir.path());
        source.init().unwrap();

        assert_eq!(source.list_migrations().unwrap(), vec!["a", "b"]);

        let sql = source.as_sql().unwrap();
        let up = sql.parsed_up("a").unwrap();
        assert_eq!(up.statements, vec!["CREATE TABLE a (id INTEGER);"]);
        let down = sql.parsed_down("a").unwrap().unwrap();
        assert_eq!(down.statements, vec!["DROP TABLE a;"]);
        assert!(sql.parsed_down("b").unwrap().is_none());
    }

    #[test]
    fn unexpected_suffix_fails_init() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "not a migration").unwrap();

        let mut source = FilesystemSource::new(dir.path());
        assert!(source.init().is_err());
    }
}
