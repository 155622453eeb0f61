//! Error types for adapt-core.

use thiserror::Error;

/// Errors surfaced by the migration pipeline.
///
/// Every error is terminal for the run: the first one propagates up the
/// stage sequence, remaining stages are skipped, and only teardown
/// (lock release, driver close) still executes.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A history or reconciliation rule was violated (A001).
    #[error("[A001] integrity protection: {0}")]
    IntegrityProtection(String),

    /// A source violated a precondition (A002).
    #[error("[A002] invalid source: {0}")]
    InvalidSource(String),

    /// The same migration id was declared or stored more than once (A003).
    #[error("[A003] duplicate migration: {0}")]
    DuplicateMigration(String),

    /// Underlying driver, database, or storage failure (A004).
    #[error("[A004] driver operation failed: {0}")]
    DriverOperation(String),

    /// A migration script could not be parsed (A005).
    #[error("[A005] {0}")]
    Parse(#[from] ParseError),

    /// JSON encoding or decoding of stored migration data failed (A006).
    #[error("[A006] serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// Filesystem failure (A007).
    #[error("[A007] io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;

/// Script parse errors reported by [`crate::parser::parse`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// `NoTransaction` appeared after statement content had started.
    #[error("parse error: NoTransaction must appear before the first statement")]
    MisplacedNoTransaction,

    /// A directive line carried an unrecognized name.
    #[error("parse error: unknown directive {0:?}")]
    UnknownDirective(String),
}
