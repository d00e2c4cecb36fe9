//! Schema manager façade
//!
//! Ties one connection, the ledger, and the executor together behind the
//! small API callers actually use.

use crate::config::ConfigSource;
use crate::database::{DatabaseConn, MigrationExecutor, MigrationLedger, MigrationRecord};
use crate::error::Result;
use crate::migration::Migration;
use crate::output::OutputSink;

/// Name of the ledger table unless overridden
pub const DEFAULT_MIGRATION_TABLE: &str = "migrations";

/// Top-level entry point for running migrations against one database
///
/// Construction guarantees a usable ledger table: the constructor connects
/// (on first query) and runs the create-if-missing check synchronously, so
/// a `SchemaManager` value always has somewhere to record applied
/// migrations. Exactly one connection is held per instance; it is not
/// shared across instances or threads.
pub struct SchemaManager {
    conn: DatabaseConn,
    migration_table_name: String,
}

impl SchemaManager {
    /// Build a manager with the default ledger table name
    pub fn new(config: &dyn ConfigSource) -> Result<Self> {
        Self::with_table_name(config, DEFAULT_MIGRATION_TABLE)
    }

    /// Build a manager recording migrations in `table_name`
    pub fn with_table_name(config: &dyn ConfigSource, table_name: &str) -> Result<Self> {
        let manager = Self {
            conn: DatabaseConn::new(config),
            migration_table_name: table_name.to_string(),
        };
        manager.ledger().ensure_exists()?;
        Ok(manager)
    }

    pub fn migration_table_name(&self) -> &str {
        &self.migration_table_name
    }

    /// Ledger accessor, bound to this manager's connection
    pub fn ledger(&self) -> MigrationLedger<'_> {
        MigrationLedger::new(&self.conn, &self.migration_table_name)
    }

    fn executor(&self) -> MigrationExecutor<'_> {
        MigrationExecutor::new(&self.conn, self.ledger())
    }

    /// Return the subset of `candidates` not yet recorded in the ledger,
    /// in the order they were given
    pub fn not_applied_migrations(&self, candidates: &[Migration]) -> Result<Vec<Migration>> {
        self.ledger().unapplied_of(candidates)
    }

    /// All ledger rows, oldest application first
    pub fn applied_migrations(&self) -> Result<Vec<MigrationRecord>> {
        self.ledger().applied()
    }

    /// Apply one migration atomically; see
    /// [`MigrationExecutor::execute`](crate::database::MigrationExecutor::execute)
    /// for the exact contract
    pub fn execute_migration(
        &self,
        name: &str,
        sql: &str,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        self.executor().execute(name, sql, sink)
    }

    /// Apply every not-yet-applied migration in presented order
    ///
    /// Stops at the first failure, leaving that migration rolled back and
    /// the ones after it untouched. Returns how many migrations committed.
    pub fn apply_pending(
        &self,
        migrations: &[Migration],
        sink: &mut dyn OutputSink,
    ) -> Result<usize> {
        let pending = self.not_applied_migrations(migrations)?;
        let mut committed = 0;
        for migration in &pending {
            self.execute_migration(&migration.name, &migration.sql, sink)?;
            committed += 1;
        }
        Ok(committed)
    }
}

// Live-database tests. They need a local PostgreSQL and are ignored by
// default; run them with
//
//     PGMIG_TEST_DBNAME=pgmig_test cargo test -- --ignored
//
// against a scratch database this suite may freely create and drop tables
// in. Connection parameters come from PGMIG_TEST_{HOST,PORT,DBNAME,USER,PASSWORD}.
#[cfg(test)]
mod live_tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::error::MigrationError;
    use postgres::{Client, NoTls};

    fn test_config() -> ConnectionConfig {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        ConnectionConfig::new(
            var("PGMIG_TEST_HOST", "127.0.0.1"),
            var("PGMIG_TEST_PORT", "5432"),
            var("PGMIG_TEST_DBNAME", "pgmig_test"),
            var("PGMIG_TEST_USER", "postgres"),
            var("PGMIG_TEST_PASSWORD", ""),
        )
    }

    /// Separate raw connection for inspecting state and cleaning up
    fn raw_client(config: &ConnectionConfig) -> Client {
        let conn_string = format!(
            "host={} port={} dbname={} user={} password={}",
            config.host, config.port, config.database, config.username, config.password
        );
        Client::connect(&conn_string, NoTls).unwrap()
    }

    fn drop_tables(client: &mut Client, tables: &[&str]) {
        for table in tables {
            client
                .batch_execute(&format!("DROP TABLE IF EXISTS {table}"))
                .unwrap();
        }
    }

    fn table_exists(client: &mut Client, name: &str) -> bool {
        let row = client
            .query_one(
                "SELECT count(relname) FROM pg_class WHERE relname = $1",
                &[&name],
            )
            .unwrap();
        row.get::<_, i64>(0) > 0
    }

    fn ledger_titles(client: &mut Client) -> Vec<String> {
        client
            .query("SELECT mig_title FROM migrations ORDER BY mig_title", &[])
            .unwrap()
            .iter()
            .map(|row| row.get(0))
            .collect()
    }

    #[test]
    #[ignore = "requires a local PostgreSQL server"]
    fn construction_creates_the_ledger_table() {
        let config = test_config();
        let mut raw = raw_client(&config);
        drop_tables(&mut raw, &["migrations"]);

        let manager = SchemaManager::new(&config).unwrap();
        assert!(table_exists(&mut raw, manager.migration_table_name()));

        // Constructing a second manager against the existing table is a no-op.
        let again = SchemaManager::new(&config).unwrap();
        assert!(again.ledger().table_exists().unwrap());
    }

    #[test]
    #[ignore = "requires a local PostgreSQL server"]
    fn unapplied_subset_respects_the_ledger() {
        let config = test_config();
        let mut raw = raw_client(&config);
        drop_tables(&mut raw, &["migrations"]);

        let manager = SchemaManager::new(&config).unwrap();

        // Empty ledger, empty candidates.
        assert!(manager.not_applied_migrations(&[]).unwrap().is_empty());

        raw.execute("INSERT INTO migrations (mig_title) VALUES ($1)", &[&"1.sql"])
            .unwrap();

        let candidates = vec![
            Migration::new("1.sql", "SELECT 1;"),
            Migration::new("4.sql", "SELECT 1;"),
        ];
        let remaining = manager.not_applied_migrations(&candidates).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "4.sql");
    }

    #[test]
    #[ignore = "requires a local PostgreSQL server"]
    fn committed_migration_is_visible_and_recorded_once() {
        let config = test_config();
        let mut raw = raw_client(&config);
        drop_tables(&mut raw, &["migrations", "test"]);

        let manager = SchemaManager::new(&config).unwrap();
        let mut sink: Vec<String> = Vec::new();

        manager
            .execute_migration("simple.sql", "CREATE TABLE test (id int);", &mut sink)
            .unwrap();

        assert!(table_exists(&mut raw, "test"));
        assert_eq!(ledger_titles(&mut raw), vec!["simple.sql"]);
        assert_eq!(sink, vec!["Starting simple.sql", "simple.sql is committed"]);

        let records = manager.applied_migrations().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "simple.sql");

        drop_tables(&mut raw, &["migrations", "test"]);
    }

    #[test]
    #[ignore = "requires a local PostgreSQL server"]
    fn failed_migration_is_fully_rolled_back() {
        let config = test_config();
        let mut raw = raw_client(&config);
        drop_tables(&mut raw, &["migrations", "test"]);

        let manager = SchemaManager::new(&config).unwrap();
        let mut sink: Vec<String> = Vec::new();

        // Invalid DDL: CREATE TABLE without a column list.
        let result = manager.execute_migration("simple.sql", "CREATE TABLE test;", &mut sink);
        assert!(matches!(result, Err(MigrationError::Execution { .. })));

        assert!(!table_exists(&mut raw, "test"));
        assert!(ledger_titles(&mut raw).is_empty());
        assert_eq!(sink[0], "Starting simple.sql");
        assert!(sink[1].starts_with("Failed: "));

        // Embedded transaction control fares no better.
        let result = manager.execute_migration(
            "simple.sql",
            "BEGIN; CREATE TABLE test; COMMIT;",
            &mut sink,
        );
        assert!(matches!(result, Err(MigrationError::Execution { .. })));
        assert!(!table_exists(&mut raw, "test"));
        assert!(ledger_titles(&mut raw).is_empty());

        drop_tables(&mut raw, &["migrations"]);
    }

    #[test]
    #[ignore = "requires a local PostgreSQL server"]
    fn partial_failure_leaves_no_partial_state() {
        let config = test_config();
        let mut raw = raw_client(&config);
        drop_tables(&mut raw, &["migrations", "first_half"]);

        let manager = SchemaManager::new(&config).unwrap();
        let mut sink: Vec<String> = Vec::new();

        // First statement is valid, second is not.
        let sql = "CREATE TABLE first_half (id int); CREATE TABLE second_half;";
        let result = manager.execute_migration("partial.sql", sql, &mut sink);
        assert!(matches!(result, Err(MigrationError::Execution { .. })));

        assert!(!table_exists(&mut raw, "first_half"));
        assert!(ledger_titles(&mut raw).is_empty());

        // A retry from scratch is allowed and starts clean.
        let result = manager.execute_migration(
            "partial.sql",
            "CREATE TABLE first_half (id int);",
            &mut sink,
        );
        assert!(result.is_ok());
        assert_eq!(ledger_titles(&mut raw), vec!["partial.sql"]);

        drop_tables(&mut raw, &["migrations", "first_half"]);
    }

    #[test]
    #[ignore = "requires a local PostgreSQL server"]
    fn apply_pending_runs_in_order_and_skips_applied() {
        let config = test_config();
        let mut raw = raw_client(&config);
        drop_tables(&mut raw, &["migrations", "a", "b"]);

        let manager = SchemaManager::new(&config).unwrap();
        let migrations = vec![
            Migration::new("001-a.sql", "CREATE TABLE a (id int PRIMARY KEY);"),
            Migration::new("002-b.sql", "CREATE TABLE b (a_id int REFERENCES a (id));"),
        ];

        let mut sink: Vec<String> = Vec::new();
        let committed = manager.apply_pending(&migrations, &mut sink).unwrap();
        assert_eq!(committed, 2);

        // Second run has nothing to do.
        let mut sink: Vec<String> = Vec::new();
        let committed = manager.apply_pending(&migrations, &mut sink).unwrap();
        assert_eq!(committed, 0);
        assert!(sink.is_empty());

        drop_tables(&mut raw, &["migrations", "b", "a"]);
    }
}
