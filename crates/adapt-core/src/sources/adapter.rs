//! Directory-shaped sources.
//!
//! [`FilesystemAdapter`] is the minimal filesystem view shared by the
//! on-disk and in-memory sources; [`AdapterSource`] lifts any adapter into a
//! full SQL-statements source enforcing the `.up`/`.down` filename rules.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, CoreResult};
use crate::parser::{parse, ParsedMigration};
use crate::source::{Source, SqlStatementsSource};

/// Minimal filesystem view: list the entries, read one of them.
pub trait FilesystemAdapter {
    /// Names of all non-directory entries.
    fn list_files(&self) -> CoreResult<Vec<String>>;

    /// Full content of an entry previously returned by `list_files`.
    fn read_file(&self, name: &str) -> CoreResult<String>;
}

/// SQL-statements source over any [`FilesystemAdapter`].
///
/// File names must be `<id>.up[.sql]` or `<id>.down[.sql]`; anything else
/// fails initialization.
pub struct AdapterSource<A> {
    adapter: A,
    /// `<id>.up` / `<id>.down` key to the adapter's entry name.
    files: BTreeMap<String, String>,
    ids: Vec<String>,
}

impl<A: FilesystemAdapter> AdapterSource<A> {
    /// Lift a filesystem adapter into a full SQL-statements source.
    pub fn from_adapter(adapter: A) -> Self {
        Self {
            adapter,
            files: BTreeMap::new(),
            ids: Vec::new(),
        }
    }

    fn read_parsed(&self, key: &str) -> CoreResult<ParsedMigration> {
        // keys are only built from validated entries, so the lookup holds
        let name = self.files.get(key).ok_or_else(|| {
            CoreError::InvalidSource(format!("no migration file registered for {key:?}"))
        })?;
        Ok(parse(&self.adapter.read_file(name)?)?)
    }
}

impl<A: FilesystemAdapter> Source for AdapterSource<A> {
    fn init(&mut self) -> CoreResult<()> {
        let mut ids = BTreeSet::new();

        for name in self.adapter.list_files()? {
            let key = name.strip_suffix(".sql").unwrap_or(&name).to_string();

            if let Some(id) = key.strip_suffix(".up") {
                ids.insert(id.to_string());
            } else if let Some(id) = key.strip_suffix(".down") {
                ids.insert(id.to_string());
            } else {
                return Err(CoreError::InvalidSource(format!(
                    "migration file {name:?} must end in .up[.sql] or .down[.sql]"
                )));
            }

            self.files.insert(key, name);
        }

        self.ids = ids.into_iter().collect();
        Ok(())
    }

    fn list_migrations(&self) -> CoreResult<Vec<String>> {
        Ok(self.ids.clone())
    }

    fn as_sql(&self) -> Option<&dyn SqlStatementsSource> {
        Some(self)
    }
}

impl<A: FilesystemAdapter> SqlStatementsSource for AdapterSource<A> {
    fn parsed_up(&self, id: &str) -> CoreResult<ParsedMigration> {
        if !self.files.contains_key(&format!("{id}.up")) {
            return Err(CoreError::InvalidSource(format!(
                "no up migration found for id {id:?}"
            )));
        }
        self.read_parsed(&format!("{id}.up"))
    }

    fn parsed_down(&self, id: &str) -> CoreResult<Option<ParsedMigration>> {
        if !self.files.contains_key(&format!("{id}.down")) {
            return Ok(None);
        }
        self.read_parsed(&format!("{id}.down")).map(Some)
    }
}
