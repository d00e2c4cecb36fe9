//! Migration value type
//!
//! A migration is a named unit of SQL intended to be applied exactly once.
//! Discovery and ordering of migration files is the caller's job; this crate
//! only consumes an already-ordered list.

/// One migration: a unique name (typically the filename) and its SQL body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Unique name identifying this migration in the ledger
    pub name: String,

    /// Full SQL text, executed verbatim inside one transaction
    pub sql: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}
