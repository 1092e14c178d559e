//! Backing-store adapters
//!
//! A single [`Adapter`] capability covers raw statement execution and the
//! four ledger primitives; the PostgreSQL and MySQL implementations differ
//! only in SQL text and parameter placeholder style. Migration unit bodies
//! reach the database exclusively through [`Adapter::execute`], so units
//! stay portable SQL-issuing procedures with no reconciler state.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DatabaseConfig, DatabaseKind};

pub mod mysql;
pub mod postgres;

pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("connection failed: {0}")]
    Connection(sqlx::Error),

    #[error("statement execution failed: {0}")]
    Execution(sqlx::Error),

    #[error("duplicate ledger entry")]
    DuplicateEntry,
}

/// Polymorphic backing-store handle.
///
/// One adapter is acquired per command invocation and explicitly released
/// with [`Adapter::close`]; statements run strictly sequentially over it.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Execute one raw statement issued by a migration unit.
    async fn execute(&self, statement: &str) -> Result<(), AdapterError>;

    /// Create the ledger table if absent. Idempotent.
    async fn create_ledger_table(&self, table: &str) -> Result<(), AdapterError>;

    /// Ledger entry identifiers in application order.
    async fn ledger_entries(&self, table: &str) -> Result<Vec<String>, AdapterError>;

    /// Append one ledger entry. Fails with [`AdapterError::DuplicateEntry`]
    /// when the identifier is already recorded.
    async fn insert_ledger_entry(
        &self,
        table: &str,
        identifier: &str,
    ) -> Result<(), AdapterError>;

    /// Delete the entry for `identifier`. Deleting an absent entry is not
    /// an error.
    async fn delete_ledger_entry(
        &self,
        table: &str,
        identifier: &str,
    ) -> Result<(), AdapterError>;

    /// Release the underlying pool.
    async fn close(&self);
}

/// Connect the adapter variant selected by the configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<Box<dyn Adapter>, AdapterError> {
    match config.kind {
        DatabaseKind::Postgres => Ok(Box::new(PostgresAdapter::connect(config).await?)),
        DatabaseKind::MySql => Ok(Box::new(MySqlAdapter::connect(config).await?)),
    }
}

/// Map an sqlx execution failure, surfacing unique violations on the ledger
/// name column as [`AdapterError::DuplicateEntry`].
pub(crate) fn execution_error(err: sqlx::Error) -> AdapterError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return AdapterError::DuplicateEntry;
        }
    }
    AdapterError::Execution(err)
}
