//! Migration sources and the merge building the local migration set.

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::hook::Hook;
use crate::migration::AvailableMigration;
use crate::parser::ParsedMigration;

/// Provider of locally declared migrations.
///
/// Every source must expose exactly one of the two capabilities: SQL
/// statements ([`Source::as_sql`]) or code hooks ([`Source::as_hook`]). The
/// category is checked once during the init stage.
pub trait Source {
    /// Initialize internal state; called once before any listing.
    fn init(&mut self) -> CoreResult<()>;

    /// Unique ids of all migrations this source provides, in any order.
    /// A migration with up and down variants is listed once.
    fn list_migrations(&self) -> CoreResult<Vec<String>>;

    /// SQL-statements capability.
    fn as_sql(&self) -> Option<&dyn SqlStatementsSource> {
        None
    }

    /// Hook capability.
    fn as_hook(&self) -> Option<&dyn HookSource> {
        None
    }
}

/// Source yielding parsed SQL scripts.
pub trait SqlStatementsSource {
    /// The up-script for `id`; `id` is always one of the listed ids.
    fn parsed_up(&self, id: &str) -> CoreResult<ParsedMigration>;

    /// The down-script for `id`, when one exists.
    fn parsed_down(&self, id: &str) -> CoreResult<Option<ParsedMigration>>;
}

/// Source yielding code hooks.
pub trait HookSource {
    /// The hook registered for `id`, when one exists.
    fn hook(&self, id: &str) -> Option<&Hook>;
}

/// The set of sources merged into one local migration list.
pub type SourceCollection = Vec<Box<dyn Source>>;

/// Merge all sources into the id-sorted list of available migrations.
///
/// Walks the sources in declaration order; the same id arriving from two
/// sources is fatal. Each entry is enriched on the way in: SQL sources get
/// their up-script parsed and hashed, hook entries are checked to declare
/// exactly one forward callback.
pub(crate) fn merge_sources(sources: &SourceCollection) -> CoreResult<Vec<AvailableMigration>> {
    let mut merged: BTreeMap<String, AvailableMigration> = BTreeMap::new();

    for (source_idx, source) in sources.iter().enumerate() {
        for id in source.list_migrations()? {
            if merged.contains_key(&id) {
                return Err(CoreError::DuplicateMigration(format!(
                    "migration {id:?} was provided by multiple sources"
                )));
            }

            let mut available = AvailableMigration {
                id: id.clone(),
                source: source_idx,
                parsed_up: None,
                hash: None,
            };

            if let Some(sql) = source.as_sql() {
                let parsed = sql.parsed_up(&available.id)?;
                available.hash = Some(parsed.hash());
                available.parsed_up = Some(parsed);
            } else if let Some(hooks) = source.as_hook() {
                let hook = hooks.hook(&available.id).ok_or_else(|| {
                    CoreError::InvalidSource(format!("no hook registered for migration {id:?}"))
                })?;
                if hook.forward_count() != 1 {
                    return Err(CoreError::InvalidSource(format!(
                        "hook for migration {id:?} must declare exactly one forward callback"
                    )));
                }
            }

            merged.insert(id, available);
        }
    }

    log::info!(
        "merged {} sources into {} available migrations",
        sources.len(),
        merged.len()
    );
    Ok(merged.into_values().collect())
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
