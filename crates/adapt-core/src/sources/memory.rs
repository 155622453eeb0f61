//! In-memory migration source.
//!
//! Backs unit tests and embedded migrations: pair it with `include_str!` to
//! compile the scripts into the binary.

use std::collections::BTreeMap;

use super::adapter::{AdapterSource, FilesystemAdapter};
use crate::error::{CoreError, CoreResult};

/// Name → content map behaving like a flat directory.
pub struct MapAdapter {
    files: BTreeMap<String, String>,
}

impl FilesystemAdapter for MapAdapter {
    fn list_files(&self) -> CoreResult<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read_file(&self, name: &str) -> CoreResult<String> {
        self.files.get(name).cloned().ok_or_else(|| {
            CoreError::InvalidSource(format!("unknown migration file {name:?}"))
        })
    }
}

/// Source over an in-memory `name → script` map.
pub type MemorySource = AdapterSource<MapAdapter>;

impl MemorySource {
    pub fn new<N, C>(files: impl IntoIterator<Item = (N, C)>) -> Self
    where
        N: Into<String>,
        C: Into<String>,
    {
        let files = files
            .into_iter()
            .map(|(name, content)| (name.into(), content.into()))
            .collect();
        AdapterSource::from_adapter(MapAdapter { files })
    }
}
