//! Error types for migration operations
//!
//! Every fallible operation in this crate returns [`MigrationError`], a
//! tagged enum so callers can branch on the failure kind without matching
//! on message text.

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T, E = MigrationError> = std::result::Result<T, E>;

/// Failure kinds surfaced by the migration engine
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The database connection could not be established. Fatal to any
    /// subsequent operation on the same manager instance.
    #[error("cannot connect to database: {0}")]
    Connection(String),

    /// A query (DDL/DML/read) failed at the engine level, outside of a
    /// migration's own transaction. Carries the engine's error text.
    #[error("database query failed: {0}")]
    Database(String),

    /// The migration's SQL body is empty or blank. Raised before any
    /// transaction is opened.
    #[error("migration \"{0}\" has no content")]
    EmptyMigration(String),

    /// The migration contains a streaming `COPY ... FROM stdin` clause,
    /// which this executor cannot run. Raised before any transaction is
    /// opened.
    #[error(
        "migration \"{0}\" uses COPY ... FROM stdin, which is not supported; \
         rewrite the data load as plain INSERT statements (pg_dump --inserts)"
    )]
    UnsupportedBulkLoad(String),

    /// The migration's SQL failed mid-transaction, or the ledger insert
    /// after it did. A rollback has already been issued; the database and
    /// ledger are as they were before the migration started.
    #[error("migration \"{name}\" failed and was rolled back: {detail}")]
    Execution { name: String, detail: String },
}
