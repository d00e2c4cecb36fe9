#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! pgmig - A minimal PostgreSQL schema-migration runner
//!
//! pgmig tracks which SQL migration files have been applied to a database
//! and applies the remaining ones in order, each inside its own
//! transaction. Applied migrations are recorded in a ledger table
//! (`migrations` by default), so every migration commits exactly once and a
//! failed migration leaves the database untouched and eligible for retry.
//!
//! Discovering migration files, parsing configuration files, and formatting
//! output are the caller's job; pgmig consumes an ordered list of
//! ([`Migration`]) name/SQL pairs, a [`ConfigSource`] with five connection
//! parameters, and an [`OutputSink`] for progress lines.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── config      # ConfigSource trait, ConnectionConfig value + loader
//! ├── migration   # Migration (name + SQL body)
//! ├── output      # OutputSink trait, StdoutSink
//! ├── error       # MigrationError taxonomy
//! ├── database/
//! │   ├── connection  # lazy single-connection wrapper
//! │   ├── ledger      # applied-migrations bookkeeping table
//! │   └── executor    # transactional apply + bulk-load guard
//! └── manager     # SchemaManager façade
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use pgmig::{ConnectionConfig, Migration, SchemaManager, StdoutSink};
//!
//! let config = ConnectionConfig::load(None)?;
//! let manager = SchemaManager::new(&config)?;
//!
//! // Ordered migration set, e.g. read from a directory by the caller
//! let migrations = vec![
//!     Migration::new("001-init.sql", "CREATE TABLE users (id serial PRIMARY KEY);"),
//!     Migration::new("002-email.sql", "ALTER TABLE users ADD COLUMN email text;"),
//! ];
//!
//! let mut sink = StdoutSink;
//! let committed = manager.apply_pending(&migrations, &mut sink)?;
//! println!("{committed} migration(s) applied");
//! ```
//!
//! # Guarantees
//!
//! - **Exactly-once**: a ledger row is inserted in the same transaction as
//!   the migration's SQL; it exists if and only if the migration committed.
//! - **Atomicity**: any failure between begin and commit rolls back both
//!   the SQL's effects and the ledger row.
//! - **Ordering**: migrations run strictly in the order presented; the next
//!   one does not start until the previous one is committed or rolled back.
//! - **Refusal over surprise**: blank migrations and streaming
//!   `COPY ... FROM stdin` bulk loads are rejected before any transaction
//!   is opened.
//!
//! Execution is single-threaded and synchronous over one connection per
//! [`SchemaManager`]; parallel migrator processes must coordinate
//! externally.

pub mod config;
pub mod database;
pub mod error;
pub mod manager;
pub mod migration;
pub mod output;

pub use config::{ConfigSource, ConnectionConfig};
pub use database::{
    has_copy_from_stdin, DatabaseConn, MigrationExecutor, MigrationLedger, MigrationRecord,
};
pub use error::{MigrationError, Result};
pub use manager::{SchemaManager, DEFAULT_MIGRATION_TABLE};
pub use migration::Migration;
pub use output::{OutputSink, StdoutSink};
