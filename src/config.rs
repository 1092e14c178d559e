//! Configuration file parsing
//!
//! Reads sql-migrator.toml configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumString};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Supported backing-store kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DatabaseKind {
    Postgres,
    MySql,
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Connection parameters for the target database
    pub database: DatabaseConfig,

    /// Directory holding the migration unit files
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,

    /// Name of the ledger table tracking applied migrations
    #[serde(default = "default_table_name")]
    pub table_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Backing-store kind: "postgres" or "mysql"
    #[serde(rename = "type")]
    pub kind: DatabaseKind,

    #[serde(default = "default_host")]
    pub host: String,

    /// Port; defaults to the kind's standard port when omitted
    pub port: Option<u16>,

    pub user: String,

    #[serde(default)]
    pub password: String,

    pub database: String,
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_table_name() -> String {
    "migrations".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

impl DatabaseConfig {
    /// Resolved port: explicit configuration, or the kind's standard port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(match self.kind {
            DatabaseKind::Postgres => 5432,
            DatabaseKind::MySql => 3306,
        })
    }

    /// Connection URL in the form the sqlx drivers accept.
    pub fn connection_url(&self) -> String {
        let scheme = match self.kind {
            DatabaseKind::Postgres => "postgres",
            DatabaseKind::MySql => "mysql",
        };
        format!(
            "{}://{}:{}@{}:{}/{}",
            scheme,
            self.user,
            self.password,
            self.host,
            self.port(),
            self.database
        )
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values. Runs before any connection is
    /// opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_table_name(&self.table_name) {
            return Err(ConfigError::Validation(format!(
                "invalid table_name '{}'. Must start with a letter or underscore and contain only letters, digits, and underscores",
                self.table_name
            )));
        }
        if self.database.user.is_empty() {
            return Err(ConfigError::Validation(
                "database.user must not be empty".to_string(),
            ));
        }
        if self.database.database.is_empty() {
            return Err(ConfigError::Validation(
                "database.database must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Check a ledger table name against `^[A-Za-z_][A-Za-z0-9_]*$`.
///
/// The table name is interpolated into SQL rather than bound as a
/// parameter, so anything outside this grammar is rejected outright.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
