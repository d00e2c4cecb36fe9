//! Database connection management
//!
//! One lazily-established PostgreSQL connection per [`DatabaseConn`]. The
//! connection is opened on first use, reused for every subsequent operation,
//! and never pooled or shared across instances.

use std::cell::RefCell;

use postgres::{Client, NoTls};
use tracing::debug;

use crate::config::ConfigSource;
use crate::error::{MigrationError, Result};

/// Owned, lazily-connected handle to the target database
///
/// The libpq-style connection string is assembled up front from the config;
/// the actual TCP connection happens on the first query. The handle is not
/// thread-safe and is meant to live inside a single
/// [`SchemaManager`](crate::SchemaManager).
pub struct DatabaseConn {
    conn_string: String,
    client: RefCell<Option<Client>>,
}

impl DatabaseConn {
    /// Build a handle from connection parameters; does not connect yet
    pub fn new(config: &dyn ConfigSource) -> Self {
        Self {
            conn_string: connection_string(config),
            client: RefCell::new(None),
        }
    }

    /// Run `f` against the live client, connecting first if needed
    ///
    /// Connection failure surfaces as [`MigrationError::Connection`] and
    /// leaves the handle unconnected, so a later call retries.
    pub(crate) fn with_client<T>(
        &self,
        f: impl FnOnce(&mut Client) -> Result<T>,
    ) -> Result<T> {
        let mut slot = self.client.borrow_mut();
        if slot.is_none() {
            debug!("establishing database connection");
            let client = Client::connect(&self.conn_string, NoTls)
                .map_err(|e| MigrationError::Connection(e.to_string()))?;
            *slot = Some(client);
        }
        let Some(client) = slot.as_mut() else {
            return Err(MigrationError::Connection(
                "connection was not established".to_string(),
            ));
        };
        f(client)
    }
}

/// Assemble the libpq-style connection string
///
/// Each value gets backslash and single-quote escaping so that unusual
/// passwords cannot break the string apart. This is not a SQL-injection
/// defense; data-carrying queries are parameterized separately.
fn connection_string(config: &dyn ConfigSource) -> String {
    format!(
        "host={} port={} dbname={} user={} password={}",
        escape_parameter(config.host()),
        escape_parameter(config.port()),
        escape_parameter(config.database()),
        escape_parameter(config.username()),
        escape_parameter(config.password()),
    )
}

fn escape_parameter(parameter: &str) -> String {
    parameter.replace('\\', "\\\\").replace('\'', "\\'")
}
