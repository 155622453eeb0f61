//! Hook-backed source.

use std::collections::BTreeMap;

use crate::error::CoreResult;
use crate::hook::Hook;
use crate::source::{HookSource, Source};

/// Source providing migrations as code hooks.
pub struct CodeSource {
    hooks: BTreeMap<String, Hook>,
}

impl CodeSource {
    /// Source for a single id/hook pair.
    pub fn new(id: impl Into<String>, hook: Hook) -> Self {
        Self::package([(id.into(), hook)])
    }

    /// Source for a package of id/hook pairs.
    pub fn package(hooks: impl IntoIterator<Item = (String, Hook)>) -> Self {
        Self {
            hooks: hooks.into_iter().collect(),
        }
    }
}

impl Source for CodeSource {
    fn init(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn list_migrations(&self) -> CoreResult<Vec<String>> {
        Ok(self.hooks.keys().cloned().collect())
    }

    fn as_hook(&self) -> Option<&dyn HookSource> {
        Some(self)
    }
}

impl HookSource for CodeSource {
    fn hook(&self, id: &str) -> Option<&Hook> {
        self.hooks.get(id)
    }
}
