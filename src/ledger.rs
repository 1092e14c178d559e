//! Migration ledger
//!
//! The persisted record of which units have been applied, in application
//! order. Stored in a single table on the target database itself, reached
//! through the [`Adapter`] ledger primitives.

use thiserror::Error;

use crate::adapter::{Adapter, AdapterError};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The identifier is already recorded. Signals a race between two
    /// migrator processes, or a re-run of an already-applied unit.
    #[error("unit '{identifier}' is already recorded in the ledger")]
    Duplicate { identifier: String },

    #[error(transparent)]
    Backend(#[from] AdapterError),
}

/// Handle to the ledger table. Carries the already-validated table name;
/// see [`crate::config::is_valid_table_name`].
pub struct Ledger<'a> {
    adapter: &'a dyn Adapter,
    table: &'a str,
}

impl<'a> Ledger<'a> {
    pub fn new(adapter: &'a dyn Adapter, table: &'a str) -> Self {
        Self { adapter, table }
    }

    /// Create the ledger table if absent. Safe to call on every `init`.
    pub async fn ensure_table(&self) -> Result<(), LedgerError> {
        self.adapter.create_ledger_table(self.table).await?;
        Ok(())
    }

    /// Unit identifiers in application order: ascending by application
    /// timestamp, insertion order as the tie-break. Empty when nothing has
    /// been applied.
    pub async fn list(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.adapter.ledger_entries(self.table).await?)
    }

    /// Append one entry for a unit whose forward operation just succeeded.
    pub async fn record(&self, identifier: &str) -> Result<(), LedgerError> {
        self.adapter
            .insert_ledger_entry(self.table, identifier)
            .await
            .map_err(|err| match err {
                AdapterError::DuplicateEntry => LedgerError::Duplicate {
                    identifier: identifier.to_string(),
                },
                other => LedgerError::Backend(other),
            })
    }

    /// Delete the entry for `identifier`. Removing an absent entry is a
    /// no-op; callers only pass identifiers just returned by [`Self::list`].
    pub async fn remove(&self, identifier: &str) -> Result<(), LedgerError> {
        self.adapter
            .delete_ledger_entry(self.table, identifier)
            .await?;
        Ok(())
    }
}
