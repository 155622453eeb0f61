//! Migration meta records and the locally available migration set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parser::ParsedMigration;

/// Library version string recorded in every meta row for forensic
/// traceability.
pub const VERSION: &str = "adapt@v0.1.0";

/// Meta-information of an applied migration as persisted by a driver.
///
/// The serialized field names are shared with other implementations of the
/// same meta format, hence the PascalCase keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Migration {
    /// Unique identifier; lexicographic id order is the execution order.
    #[serde(rename = "ID")]
    pub id: String,

    /// Name and version of the program that ran this migration, usually
    /// something like `my-service@v1.17.0`.
    #[serde(rename = "Executor")]
    pub executor: String,

    /// When this migration was started, UTC.
    #[serde(rename = "Started")]
    pub started: DateTime<Utc>,

    /// When this migration finished, UTC. `None` means it never completed.
    #[serde(rename = "Finished", skip_serializing_if = "Option::is_none", default)]
    pub finished: Option<DateTime<Utc>>,

    /// Content hash of the script, when the source provides one.
    #[serde(rename = "Hash", skip_serializing_if = "Option::is_none", default)]
    pub hash: Option<String>,

    /// Version of the library that wrote this row (see [`VERSION`]).
    #[serde(rename = "Adapt")]
    pub adapt_version: String,

    /// Identifier grouping the migrations executed within one pipeline run.
    #[serde(rename = "Deployment")]
    pub deployment: String,

    /// 0-based position of this migration within its deployment group.
    #[serde(rename = "DeploymentOrder")]
    pub deployment_order: i64,

    /// JSON-encoded [`ParsedMigration`] that can roll this migration back.
    /// Stored at forward-time so the information survives removal of the
    /// source.
    #[serde(rename = "Down", skip_serializing_if = "Option::is_none", default)]
    pub down: Option<String>,
}

/// A locally declared migration that could be applied during this run.
///
/// Starts as an id plus the index of its providing source; enrichment during
/// the merge adds the parsed up-script and content hash for SQL-statements
/// sources (hook sources leave both empty).
#[derive(Debug, Clone)]
pub struct AvailableMigration {
    /// Unique identifier.
    pub id: String,

    /// Index of the providing source within the source collection.
    pub source: usize,

    /// Parsed up-script, set during enrichment for SQL-statements sources.
    pub parsed_up: Option<ParsedMigration>,

    /// Content hash of the up-script, set together with `parsed_up`.
    pub hash: Option<String>,
}
