//! adapt-core — embeddable schema-migration engine.
//!
//! On application startup, [`migrate`] brings a persistent store from its
//! recorded migration history to the set of migrations the application
//! declares. The engine reconciles the two sides (including out-of-order
//! arrivals from merged branches and rollback of migrations the local set no
//! longer knows), refuses to continue when integrity rules are violated, and
//! drives forward and reverse migrations through a pluggable [`Driver`].
//!
//! Migrations come from [`Source`] implementations — directories of SQL
//! scripts, in-memory maps (also the vehicle for `include_str!`-embedded
//! scripts), or code hooks — merged into one id-ordered list. The store side
//! is a [`Driver`]: the [`FileDriver`] JSON store ships here, SQL dialects
//! live in the companion adapt-db crate.
//!
//! All diagnostics go through the `log` facade, so the embedder's logger
//! configuration decides routing and verbosity.
//!
//! ```no_run
//! use adapt_core::{migrate, FileDriver, MemorySource, Options, Source};
//!
//! let source = MemorySource::new([(
//!     "20240101_0900_init.up.sql",
//!     "CREATE TABLE accounts (id INTEGER PRIMARY KEY);",
//! )]);
//! let sources: Vec<Box<dyn Source>> = vec![Box::new(source)];
//!
//! migrate(
//!     "my-service@v1.2.0",
//!     Box::new(FileDriver::new("migrations.json")),
//!     sources,
//!     Options::new(),
//! )?;
//! # Ok::<(), adapt_core::CoreError>(())
//! ```

pub mod driver;
pub mod error;
pub mod hook;
pub mod migration;
pub mod options;
pub mod parser;
pub mod source;
pub mod sources;

mod exec;
mod reconcile;

pub use driver::file::FileDriver;
pub use driver::{
    BeforeFinish, CustomMigration, DatabaseDriver, DbHandle, Driver, SqlTarget, SqlValue,
    TxBehavior, TxOptions,
};
pub use error::{CoreError, CoreResult, ParseError};
pub use hook::Hook;
pub use migration::{AvailableMigration, Migration, VERSION};
pub use options::Options;
pub use parser::{parse, ParsedMigration};
pub use source::{HookSource, Source, SourceCollection, SqlStatementsSource};
pub use sources::{CodeSource, FilesystemSource, MemorySource};

/// Apply every declared migration that is not yet recorded in the driver's
/// history, rolling back applied migrations the local set no longer
/// declares.
///
/// `executor` names the running program (typically `name@version`) and is
/// recorded with every migration. The run is synchronous and serial; the
/// driver and sources are consumed for its duration.
pub fn migrate(
    executor: &str,
    driver: Box<dyn Driver>,
    sources: SourceCollection,
    options: Options,
) -> CoreResult<()> {
    let mut exec = exec::Exec::new(executor, driver, sources, options);
    exec.run()
}
