//! Database layer
//!
//! Everything that talks to PostgreSQL lives here, organized into:
//!
//! - **connection**: lazily-established single-connection wrapper and
//!   connection-string assembly
//! - **ledger**: the bookkeeping table recording applied migrations
//! - **executor**: transactional execution of one migration at a time
//!
//! The [`SchemaManager`](crate::SchemaManager) façade composes these three
//! against one connection.

pub mod connection;
pub mod executor;
pub mod ledger;

pub use connection::DatabaseConn;
pub use executor::{has_copy_from_stdin, MigrationExecutor};
pub use ledger::{MigrationLedger, MigrationRecord};
