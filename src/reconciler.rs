//! Migration reconciler
//!
//! Computes the delta between the units available on disk and the ledger,
//! then drives the adapter to apply pending units forward or revert the
//! most recently applied one. Units are always handled one at a time,
//! strictly sequentially: one ledger entry is recorded before the next
//! unit is even loaded.

use std::collections::HashSet;

use thiserror::Error;

use crate::adapter::{self, Adapter, AdapterError};
use crate::config::{Config, ConfigError, is_valid_table_name};
use crate::ledger::{Ledger, LedgerError};
use crate::source::{SourceError, UnitSource};

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// A statement of the unit's forward operation failed. The unit is not
    /// recorded; nothing after it was attempted.
    #[error("unit '{id}' failed: {source}")]
    Unit {
        id: String,
        #[source]
        source: AdapterError,
    },

    /// The unit's statements all ran but the ledger insert failed. The
    /// database holds the unit's effects without a matching entry; a re-run
    /// of `up` would attempt the unit again. Not repaired automatically.
    #[error(
        "unit '{id}' was applied but recording it in the ledger failed; \
         inspect the database before re-running `up`: {source}"
    )]
    Record {
        id: String,
        #[source]
        source: LedgerError,
    },

    /// A statement of the unit's backward operation failed. The ledger
    /// entry remains.
    #[error("revert of unit '{id}' failed: {source}")]
    Revert {
        id: String,
        #[source]
        source: AdapterError,
    },
}

/// Result of a forward run.
#[derive(Debug, Default)]
pub struct UpReport {
    /// Identifiers applied this run, in application order.
    pub applied: Vec<String>,
    /// Number of units that were already in the ledger.
    pub skipped: usize,
}

/// Result of a backward run.
#[derive(Debug)]
pub struct DownReport {
    /// The identifier reverted, or `None` when the ledger was empty.
    pub reverted: Option<String>,
}

/// Pure read of ledger vs. disk.
#[derive(Debug)]
pub struct StatusReport {
    /// Ledger entries in application order.
    pub executed: Vec<String>,
    /// Available units not yet applied, ascending by identifier.
    pub pending: Vec<String>,
}

/// Drives migrations against one adapter for the duration of one command
/// invocation.
pub struct Reconciler {
    adapter: Box<dyn Adapter>,
    source: UnitSource,
    table: String,
}

impl Reconciler {
    /// Build a reconciler over an already-connected adapter.
    ///
    /// The table name is validated here as well as in [`Config::validate`];
    /// programmatic construction goes through the same check as the config
    /// file path.
    pub fn new(
        adapter: Box<dyn Adapter>,
        source: UnitSource,
        table_name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let table = table_name.into();
        if !is_valid_table_name(&table) {
            return Err(ConfigError::Validation(format!(
                "invalid table_name '{}'. Must start with a letter or underscore and contain only letters, digits, and underscores",
                table
            )));
        }
        Ok(Self {
            adapter,
            source,
            table,
        })
    }

    /// Validate the configuration and connect the configured adapter.
    pub async fn connect(config: &Config) -> Result<Self, MigrateError> {
        config.validate()?;
        let adapter = adapter::connect(&config.database).await?;
        let source = UnitSource::new(config.migrations_dir.clone());
        Ok(Self::new(adapter, source, config.table_name.clone())?)
    }

    fn ledger(&self) -> Ledger<'_> {
        Ledger::new(self.adapter.as_ref(), &self.table)
    }

    /// Create the migrations directory and the ledger table. Idempotent.
    pub async fn init(&self) -> Result<(), MigrateError> {
        let dir = self.source.dir();
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| SourceError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        self.ledger().ensure_table().await?;
        Ok(())
    }

    /// Apply every pending unit, in ascending identifier order.
    ///
    /// Each unit is recorded in the ledger immediately after its statements
    /// succeed. The first failure aborts the run; nothing after the failing
    /// unit is attempted and the failing unit is not recorded.
    pub async fn up(&self) -> Result<UpReport, MigrateError> {
        let ledger = self.ledger();
        ledger.ensure_table().await?;

        let applied = ledger.list().await?;
        let available = self.source.all_identifiers()?;
        let pending = pending_of(&available, &applied);

        if pending.is_empty() {
            tracing::info!("nothing to do, ledger is up to date");
            return Ok(UpReport {
                applied: Vec::new(),
                skipped: applied.len(),
            });
        }

        let mut done = Vec::new();
        for id in &pending {
            let unit = self.source.load(id)?;
            tracing::info!(unit = %id, "applying");

            for statement in unit.up_statements() {
                self.adapter
                    .execute(&statement)
                    .await
                    .map_err(|e| MigrateError::Unit {
                        id: id.clone(),
                        source: e,
                    })?;
            }

            ledger.record(id).await.map_err(|e| MigrateError::Record {
                id: id.clone(),
                source: e,
            })?;
            done.push(id.clone());
        }

        Ok(UpReport {
            applied: done,
            skipped: applied.len(),
        })
    }

    /// Revert the most recently applied unit.
    ///
    /// "Most recently applied" is the ledger's own ordering, not the
    /// highest identifier. The entry is removed only after the backward
    /// operation succeeds; a unit whose file is gone fails before anything
    /// executes and leaves the ledger untouched.
    pub async fn down(&self) -> Result<DownReport, MigrateError> {
        let ledger = self.ledger();
        let applied = ledger.list().await?;

        let Some(last) = applied.last() else {
            tracing::info!("nothing to rollback, ledger is empty");
            return Ok(DownReport { reverted: None });
        };

        let unit = self.source.load(last)?;
        tracing::info!(unit = %last, "reverting");

        for statement in unit.down_statements() {
            self.adapter
                .execute(&statement)
                .await
                .map_err(|e| MigrateError::Revert {
                    id: last.clone(),
                    source: e,
                })?;
        }

        ledger.remove(last).await?;
        Ok(DownReport {
            reverted: Some(last.clone()),
        })
    }

    /// Executed and pending sequences. Reads the ledger, writes nothing.
    pub async fn status(&self) -> Result<StatusReport, MigrateError> {
        let executed = self.ledger().list().await?;
        let available = self.source.all_identifiers()?;
        let pending = pending_of(&available, &executed);
        Ok(StatusReport { executed, pending })
    }

    /// Release the adapter. Call on every path out of a command.
    pub async fn close(self) {
        self.adapter.close().await;
    }
}

/// `available \ executed`, preserving `available`'s order.
///
/// Pending units always apply in ascending identifier order regardless of
/// the ledger's insertion order.
fn pending_of(available: &[String], executed: &[String]) -> Vec<String> {
    let executed: HashSet<&str> = executed.iter().map(String::as_str).collect();
    available
        .iter()
        .filter(|id| !executed.contains(id.as_str()))
        .cloned()
        .collect()
}
