//! adapt-db — SQL dialects and backends for the adapt migration engine.
//!
//! [`SqlStatementsDriver`] reduces a dialect to its capability flags and
//! `(query, args)` pairs; [`StatementsAdapter`] lifts any dialect into a
//! full [`adapt_core::Driver`]. Shipped dialects: SQLite (complete, over a
//! rusqlite-backed [`SqliteBackend`]) plus MySQL and PostgreSQL policies
//! over an embedder-supplied connection handle.
//!
//! ```no_run
//! use adapt_core::{migrate, MemorySource, Options, Source};
//! use adapt_db::{SqliteBackend, SqliteDriver};
//!
//! let backend = SqliteBackend::open("app.db")?;
//! let source = MemorySource::new([(
//!     "20240101_0900_init.up.sql",
//!     "CREATE TABLE accounts (id INTEGER PRIMARY KEY);",
//! )]);
//! let sources: Vec<Box<dyn Source>> = vec![Box::new(source)];
//!
//! migrate(
//!     "my-service@v1.2.0",
//!     Box::new(SqliteDriver::new(backend).into_driver()),
//!     sources,
//!     Options::new(),
//! )?;
//! # Ok::<(), adapt_core::CoreError>(())
//! ```

pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod statements;

pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;
pub use sqlite::{SqliteBackend, SqliteDriver};
pub use statements::{SqlStatementsDriver, StatementsAdapter};
