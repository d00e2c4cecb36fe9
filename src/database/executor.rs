//! Transactional migration execution
//!
//! One migration at a time: guard checks first, then a single transaction
//! around the SQL batch and the ledger insert. A failure anywhere between
//! begin and commit rolls the whole migration back, ledger row included.

use postgres::Transaction;
use regex::Regex;
use std::sync::LazyLock;

use crate::database::connection::DatabaseConn;
use crate::database::ledger::MigrationLedger;
use crate::error::{MigrationError, Result};
use crate::output::OutputSink;

/// Precise check for a streaming bulk-load clause. Only evaluated after the
/// cheap substring screen in [`has_copy_from_stdin`] has hit.
static COPY_FROM_STDIN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    let pattern =
        Regex::new(r"(?i)COPY .* FROM stdin;").expect("copy-from-stdin pattern is valid");
    pattern
});

/// Applies one migration atomically and keeps the ledger consistent
#[derive(Clone, Copy)]
pub struct MigrationExecutor<'a> {
    conn: &'a DatabaseConn,
    ledger: MigrationLedger<'a>,
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(conn: &'a DatabaseConn, ledger: MigrationLedger<'a>) -> Self {
        Self { conn, ledger }
    }

    /// Run one migration inside its own transaction
    ///
    /// Guard failures (`EmptyMigration`, `UnsupportedBulkLoad`) are raised
    /// before any transaction is opened and leave no trace, not even a sink
    /// line. Otherwise the SQL runs verbatim as one statement batch; on
    /// success the ledger row is inserted in the same transaction and the
    /// whole thing commits. On any failure a rollback is issued and
    /// [`MigrationError::Execution`] carries the engine's error text.
    pub fn execute(&self, name: &str, sql: &str, sink: &mut dyn OutputSink) -> Result<()> {
        if sql.trim().is_empty() {
            return Err(MigrationError::EmptyMigration(name.to_string()));
        }
        if has_copy_from_stdin(sql) {
            return Err(MigrationError::UnsupportedBulkLoad(name.to_string()));
        }

        sink.writeln(&format!("Starting {name}"));

        let outcome = self.conn.with_client(|client| {
            let mut tx = client
                .transaction()
                .map_err(|e| MigrationError::Database(e.to_string()))?;

            match apply_and_mark(&mut tx, &self.ledger, name, sql) {
                Ok(()) => tx.commit().map_err(|e| MigrationError::Execution {
                    name: name.to_string(),
                    detail: e.to_string(),
                }),
                Err(e) => {
                    let detail = match e {
                        MigrationError::Database(text) => text,
                        other => other.to_string(),
                    };
                    // Dropping the transaction would also roll back, but an
                    // explicit rollback keeps the connection state obvious.
                    let _ = tx.rollback();
                    Err(MigrationError::Execution {
                        name: name.to_string(),
                        detail,
                    })
                }
            }
        });

        match &outcome {
            Ok(()) => sink.writeln(&format!("{name} is committed")),
            Err(e) => sink.writeln(&format!("Failed: {e}")),
        }

        outcome
    }
}

fn apply_and_mark(
    tx: &mut Transaction<'_>,
    ledger: &MigrationLedger<'_>,
    name: &str,
    sql: &str,
) -> Result<()> {
    tx.batch_execute(sql)
        .map_err(|e| MigrationError::Database(e.to_string()))?;
    ledger.mark_applied(tx, name)
}

/// Detect a `COPY <target> FROM stdin;` clause
///
/// Two stages: a case-insensitive substring screen for "copy" so typical
/// migrations never pay for the regex, then the precise pattern. This is
/// capability detection, not SQL parsing; a migration mixing a bulk-load
/// clause with otherwise valid statements is rejected wholesale.
pub fn has_copy_from_stdin(sql: &str) -> bool {
    if !sql.to_ascii_lowercase().contains("copy") {
        return false;
    }
    COPY_FROM_STDIN.is_match(sql)
}
