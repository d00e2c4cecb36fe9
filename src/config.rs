//! Connection configuration
//!
//! The migration engine only ever reads five connection parameters. They can
//! come from any source implementing [`ConfigSource`]; a ready-made
//! [`ConnectionConfig`] value type is provided, along with a loader that
//! follows the usual TOML-file-plus-environment layering.

use std::collections::HashMap;
use std::path::Path;

use config::Config;
use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, Result};

/// Read-only capability exposing the connection parameters
///
/// The engine consumes only these getters; mutation (if any) is the
/// implementor's business.
pub trait ConfigSource {
    fn host(&self) -> &str;
    fn port(&self) -> &str;
    fn database(&self) -> &str;
    fn username(&self) -> &str;
    fn password(&self) -> &str;
}

/// Plain connection parameters for the target database
///
/// Immutable once handed to a [`SchemaManager`](crate::SchemaManager); the
/// `with_*` builder methods exist for test fixtures and alternate sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        port: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Copy the parameters out of any [`ConfigSource`]
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        Self::new(
            source.host(),
            source.port(),
            source.database(),
            source.username(),
            source.password(),
        )
    }

    /// Load connection parameters from a TOML file and the environment
    ///
    /// Sources, later ones overriding earlier ones:
    ///
    /// 1. The TOML file at `path`, or `$HOME/.pgmig.toml` when `path` is
    ///    `None` and that file exists (a missing file is not an error).
    /// 2. Environment variables prefixed with `PGMIG` (e.g. `PGMIG_HOST`,
    ///    `PGMIG_DBNAME`). A `.env` file in the working directory is
    ///    honored.
    ///
    /// Recognized keys: `host`, `port`, `dbname`, `user`, `password`.
    /// Defaults: `localhost`, `5432`, and empty strings.
    pub fn load(path: Option<&str>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();

        match path {
            Some(p) => {
                builder = builder.add_source(config::File::with_name(p));
            }
            None => {
                if let Some(home) = dirs::home_dir() {
                    let default_path = home.join(".pgmig.toml");
                    if default_path.exists() {
                        if let Some(p) = default_path.to_str() {
                            builder = builder.add_source(config::File::with_name(p));
                        }
                    }
                }
            }
        }

        builder = builder.add_source(config::Environment::with_prefix("PGMIG"));

        let settings = builder
            .build()
            .map_err(|e| MigrationError::Connection(format!("failed to build configuration: {e}")))?;

        let values = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| {
                MigrationError::Connection(format!("failed to read configuration values: {e}"))
            })?;

        let get = |key: &str, default: &str| -> String {
            values.get(key).cloned().unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            host: get("host", "localhost"),
            port: get("port", "5432"),
            database: get("dbname", ""),
            username: get("user", ""),
            password: get("password", ""),
        })
    }

    /// Load from an explicit TOML file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let p = path
            .to_str()
            .ok_or_else(|| MigrationError::Connection("config path is not valid UTF-8".into()))?;
        Self::load(Some(p))
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }
}

impl ConfigSource for ConnectionConfig {
    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> &str {
        &self.port
    }

    fn database(&self) -> &str {
        &self.database
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn password(&self) -> &str {
        &self.password
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn builder_sets_each_parameter() {
        let config = ConnectionConfig::default()
            .with_host("db.internal")
            .with_port("5433")
            .with_database("app")
            .with_username("migrator")
            .with_password("s3cret");

        assert_eq!(config.host(), "db.internal");
        assert_eq!(config.port(), "5433");
        assert_eq!(config.database(), "app");
        assert_eq!(config.username(), "migrator");
        assert_eq!(config.password(), "s3cret");
    }

    #[test]
    fn from_source_copies_values() {
        let original = ConnectionConfig::new("h", "5432", "d", "u", "p");
        let copy = ConnectionConfig::from_source(&original);
        assert_eq!(copy, original);
    }

    #[test]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pgmig.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "host = \"db.example.org\"\nport = \"6432\"\ndbname = \"orders\"\nuser = \"deploy\"\npassword = \"pw\""
        )
        .unwrap();

        let config = ConnectionConfig::from_file(&path).unwrap();
        assert_eq!(config.host, "db.example.org");
        assert_eq!(config.port, "6432");
        assert_eq!(config.database, "orders");
        assert_eq!(config.username, "deploy");
        assert_eq!(config.password, "pw");
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "dbname = \"app\"\n").unwrap();

        let config = ConnectionConfig::from_file(&path).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, "5432");
        assert_eq!(config.database, "app");
        assert_eq!(config.username, "");
    }
}
