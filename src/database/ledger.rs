//! Migration ledger
//!
//! The ledger table is the single source of truth for which migrations have
//! been applied. A title present in the table means that migration's SQL
//! committed exactly once; an absent title means not yet attempted or
//! attempted-and-rolled-back. Rows are inserted only inside a migration's
//! own transaction and are never updated or deleted by this crate.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use postgres::Transaction;
use tracing::debug;

use crate::database::connection::DatabaseConn;
use crate::error::{MigrationError, Result};
use crate::migration::Migration;

/// One row of the ledger table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Migration name, unique in the ledger
    pub title: String,

    /// Server-side timestamp taken when the row was inserted
    pub applied_at: NaiveDateTime,
}

/// Bookkeeping for applied migrations, bound to one connection
#[derive(Clone, Copy)]
pub struct MigrationLedger<'a> {
    conn: &'a DatabaseConn,
    table_name: &'a str,
}

impl<'a> MigrationLedger<'a> {
    pub fn new(conn: &'a DatabaseConn, table_name: &'a str) -> Self {
        Self { conn, table_name }
    }

    /// Check the catalog for the ledger table. Side-effect free.
    pub fn table_exists(&self) -> Result<bool> {
        self.conn.with_client(|client| {
            let row = client
                .query_one(
                    "SELECT count(relname) FROM pg_class WHERE relname = $1",
                    &[&self.table_name],
                )
                .map_err(|e| MigrationError::Database(e.to_string()))?;
            let count: i64 = row
                .try_get(0)
                .map_err(|e| MigrationError::Database(e.to_string()))?;
            Ok(count > 0)
        })
    }

    /// Create the ledger table if it is missing
    ///
    /// Creation runs in its own transaction. Calling this when the table
    /// already exists is a no-op; racing concurrent creators on first run
    /// is out of scope (single migrator process assumed).
    pub fn ensure_exists(&self) -> Result<()> {
        if self.table_exists()? {
            return Ok(());
        }

        debug!(table = self.table_name, "creating migrations ledger table");
        let sql = create_table_sql(self.table_name);
        self.conn.with_client(|client| {
            let mut tx = client
                .transaction()
                .map_err(|e| MigrationError::Database(e.to_string()))?;
            tx.batch_execute(&sql)
                .map_err(|e| MigrationError::Database(e.to_string()))?;
            tx.commit()
                .map_err(|e| MigrationError::Database(e.to_string()))
        })
    }

    /// Return the candidates whose name is not recorded in the ledger
    ///
    /// The input is left untouched; the result preserves its order.
    pub fn unapplied_of(&self, candidates: &[Migration]) -> Result<Vec<Migration>> {
        let applied = self.applied_titles()?;
        Ok(filter_unapplied(candidates, &applied))
    }

    /// Read all ledger rows, oldest application first
    pub fn applied(&self) -> Result<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT mig_title, mig_applied FROM {} ORDER BY mig_applied, mig_title",
            self.table_name
        );
        self.conn.with_client(|client| {
            let rows = client
                .query(sql.as_str(), &[])
                .map_err(|e| MigrationError::Database(e.to_string()))?;
            rows.iter()
                .map(|row| {
                    Ok(MigrationRecord {
                        title: row
                            .try_get(0)
                            .map_err(|e| MigrationError::Database(e.to_string()))?,
                        applied_at: row
                            .try_get(1)
                            .map_err(|e| MigrationError::Database(e.to_string()))?,
                    })
                })
                .collect()
        })
    }

    /// Record one migration as applied, inside the caller's open transaction
    ///
    /// Taking the transaction by reference ties the ledger row to the
    /// migration's own commit or rollback: a rolled-back migration leaves
    /// no row behind. Duplicate titles fail on the primary key.
    pub fn mark_applied(&self, tx: &mut Transaction<'_>, title: &str) -> Result<()> {
        let insert = format!("INSERT INTO {} (mig_title) VALUES ($1)", self.table_name);
        tx.execute(insert.as_str(), &[&title])
            .map(|_| ())
            .map_err(|e| MigrationError::Database(e.to_string()))
    }

    fn applied_titles(&self) -> Result<HashSet<String>> {
        let sql = format!("SELECT mig_title FROM {}", self.table_name);
        self.conn.with_client(|client| {
            let rows = client
                .query(sql.as_str(), &[])
                .map_err(|e| MigrationError::Database(e.to_string()))?;
            rows.iter()
                .map(|row| {
                    row.try_get(0)
                        .map_err(|e| MigrationError::Database(e.to_string()))
                })
                .collect()
        })
    }
}

/// DDL for the ledger table, comment included
fn create_table_sql(table_name: &str) -> String {
    format!(
        "CREATE TABLE {table_name} (\n\
         \x20   mig_title   text NOT NULL PRIMARY KEY,\n\
         \x20   mig_applied timestamp NOT NULL DEFAULT NOW()\n\
         );\n\
         COMMENT ON TABLE {table_name} IS 'Database migration information';"
    )
}

fn filter_unapplied(candidates: &[Migration], applied: &HashSet<String>) -> Vec<Migration> {
    candidates
        .iter()
        .filter(|migration| !applied.contains(&migration.name))
        .cloned()
        .collect()
}
