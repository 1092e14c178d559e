//! Migration scaffolding
//!
//! Creates new timestamped unit files with the `-- up` / `-- down`
//! template. The timestamp is second precision; identifiers created in the
//! same second collide on the filesystem rather than silently reordering.

use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("invalid migration name '{name}': only letters, digits, and underscores are allowed")]
    InvalidName { name: String },

    #[error("migration file already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Create a new unit file under `dir` and return its identifier.
///
/// The directory is created when missing. An existing file for the same
/// identifier is never overwritten.
pub fn create_unit(dir: &Path, name: &str) -> Result<String, ScaffoldError> {
    if !is_valid_name(name) {
        return Err(ScaffoldError::InvalidName {
            name: name.to_string(),
        });
    }

    std::fs::create_dir_all(dir).map_err(|e| ScaffoldError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let now = Utc::now();
    let identifier = format!("{}_{}", now.format("%Y%m%d%H%M%S"), name);
    let path = dir.join(format!("{}.sql", identifier));
    if path.exists() {
        return Err(ScaffoldError::AlreadyExists { path });
    }

    let template = format!(
        "-- Migration: {}\n\
         -- Created: {}\n\n\
         -- up\n\n\n\
         -- down\n\n",
        name,
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    std::fs::write(&path, template).map_err(|e| ScaffoldError::Io {
        path: path.clone(),
        source: e,
    })?;

    Ok(identifier)
}

/// Unit names are restricted to `[A-Za-z0-9_]+`.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
