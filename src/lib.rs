//! sql-migrator: migration ledger and reconciliation engine
//!
//! Tracks which ordered, timestamped schema-change units have been applied
//! to a PostgreSQL or MySQL database, computes the pending delta against
//! the unit files on disk, and applies or reverts exactly one unit at a
//! time with a recorded, queryable history.

pub mod adapter;
pub mod config;
pub mod ledger;
pub mod reconciler;
pub mod scaffold;
pub mod source;

// Re-export commonly used types
pub use adapter::{Adapter, AdapterError};
pub use config::{Config, ConfigError, DatabaseKind};
pub use ledger::{Ledger, LedgerError};
pub use reconciler::{DownReport, MigrateError, Reconciler, StatusReport, UpReport};
pub use scaffold::ScaffoldError;
pub use source::{MigrationUnit, SourceError, UnitSource};
