//! Migration unit loading
//!
//! Reads `.sql` unit files from the migrations directory. A unit file is
//! named `{14-digit-timestamp}_{name}.sql` and holds an up section and a
//! down section introduced by `-- up` and `-- down` marker comments. The
//! identifier (the file stem) sorts lexicographically in creation order,
//! which is what the reconciler's ordering invariant rests on.

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "invalid unit filename {path}: expected {{14-digit-timestamp}}_{{name}}.sql with name in [A-Za-z0-9_]"
    )]
    InvalidUnitName { path: PathBuf },

    #[error("unit '{identifier}' not found in {dir}")]
    UnitNotFound { identifier: String, dir: PathBuf },
}

/// One migration unit, loaded from disk.
///
/// `up_sql` and `down_sql` are the raw section bodies; [`Self::up_statements`]
/// and [`Self::down_statements`] split them for execution.
#[derive(Debug, Clone)]
pub struct MigrationUnit {
    /// Identifier: the file stem, `{timestamp}_{name}`.
    pub id: String,

    /// Forward section body.
    pub up_sql: String,

    /// Backward section body. Empty when the author declared nothing to
    /// undo.
    pub down_sql: String,

    /// The file this unit was loaded from.
    pub path: PathBuf,
}

impl MigrationUnit {
    pub fn up_statements(&self) -> Vec<String> {
        split_statements(&self.up_sql)
    }

    pub fn down_statements(&self) -> Vec<String> {
        split_statements(&self.down_sql)
    }
}

/// Produces the ordered identifier sequence of units available on disk and
/// resolves identifiers to loadable units.
pub struct UnitSource {
    dir: PathBuf,
}

impl UnitSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All unit identifiers, ascending by identifier string.
    ///
    /// A `.sql` file whose stem does not match the identifier grammar is an
    /// error rather than skipped: silently ignoring it would make `status`
    /// lie about what `up` will do.
    pub fn all_identifiers(&self) -> Result<Vec<String>, SourceError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| SourceError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut identifiers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SourceError::Io {
                path: self.dir.clone(),
                source: e,
            })?;

            let path = entry.path();
            if !path.is_file() || !is_sql_file(&path) {
                continue;
            }

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            if !is_valid_identifier(&stem) {
                return Err(SourceError::InvalidUnitName { path });
            }
            identifiers.push(stem);
        }

        identifiers.sort();
        Ok(identifiers)
    }

    /// Load one unit by identifier.
    ///
    /// Fails with [`SourceError::UnitNotFound`] when the file is gone,
    /// the dangling-ledger-entry case during rollback.
    pub fn load(&self, identifier: &str) -> Result<MigrationUnit, SourceError> {
        let path = self.dir.join(format!("{}.sql", identifier));
        if !path.is_file() {
            return Err(SourceError::UnitNotFound {
                identifier: identifier.to_string(),
                dir: self.dir.clone(),
            });
        }

        let content = std::fs::read_to_string(&path).map_err(|e| SourceError::Io {
            path: path.clone(),
            source: e,
        })?;

        let (up_sql, down_sql) = parse_sections(&content);

        Ok(MigrationUnit {
            id: identifier.to_string(),
            up_sql,
            down_sql,
            path,
        })
    }
}

/// Check if a path has a `.sql` extension.
fn is_sql_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("sql"))
        .unwrap_or(false)
}

/// Check a unit identifier against `{14 digits}_{[A-Za-z0-9_]+}`.
///
/// The fixed-width numeric timestamp makes string order equal creation
/// order.
pub fn is_valid_identifier(identifier: &str) -> bool {
    let bytes = identifier.as_bytes();
    if bytes.len() < 16 {
        return false;
    }
    if !bytes[..14].iter().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if bytes[14] != b'_' {
        return false;
    }
    bytes[15..]
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'_')
}

/// Split a unit file body into its up and down sections.
///
/// Section markers are `-- up` and `-- down` comment lines (case
/// insensitive, trailing text after a space allowed). Other comment lines
/// and blank lines are dropped; everything else belongs to the section
/// opened last. Text before the first marker belongs to neither.
fn parse_sections(content: &str) -> (String, String) {
    enum Section {
        None,
        Up,
        Down,
    }

    let mut section = Section::None;
    let mut up_lines: Vec<&str> = Vec::new();
    let mut down_lines: Vec<&str> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        let lowered = trimmed.to_lowercase();

        // Marker must be the whole comment or followed by a space, so that
        // "-- update the rows" does not switch sections.
        if lowered == "-- up" || lowered.starts_with("-- up ") {
            section = Section::Up;
            continue;
        }
        if lowered == "-- down" || lowered.starts_with("-- down ") {
            section = Section::Down;
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }

        match section {
            Section::Up => up_lines.push(line),
            Section::Down => down_lines.push(line),
            Section::None => {}
        }
    }

    (
        up_lines.join("\n").trim().to_string(),
        down_lines.join("\n").trim().to_string(),
    )
}

/// Split a section body into individual statements.
///
/// Uses the SQL parser so that semicolons inside literals and bodies don't
/// split a statement. When the dialect parser rejects the input, falls back
/// to naive semicolon splitting so dialect-specific DDL still executes.
pub fn split_statements(sql: &str) -> Vec<String> {
    if sql.trim().is_empty() {
        return Vec::new();
    }

    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed) => parsed.into_iter().map(|stmt| format!("{};", stmt)).collect(),
        Err(e) => {
            tracing::warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| format!("{};", s))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("20250101120000_create_users"));
        assert!(is_valid_identifier("20250101120000_a"));
        assert!(is_valid_identifier("20250101120000_Add2Columns"));
        assert!(!is_valid_identifier("20250101120000_")); // empty name
        assert!(!is_valid_identifier("2025_create_users")); // short timestamp
        assert!(!is_valid_identifier("20250101120000create")); // no separator
        assert!(!is_valid_identifier("20250101120000_bad-name"));
        assert!(!is_valid_identifier("V001__create_users"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_is_sql_file() {
        assert!(is_sql_file(Path::new("20250101120000_a.sql")));
        assert!(is_sql_file(Path::new("20250101120000_a.SQL")));
        assert!(!is_sql_file(Path::new("README.md")));
        assert!(!is_sql_file(Path::new("noext")));
    }

    #[test]
    fn test_parse_sections_both() {
        let content = "-- up\nCREATE TABLE users (id INT);\n\n-- down\nDROP TABLE users;\n";
        let (up, down) = parse_sections(content);
        assert_eq!(up, "CREATE TABLE users (id INT);");
        assert_eq!(down, "DROP TABLE users;");
    }

    #[test]
    fn test_parse_sections_missing_down() {
        let content = "-- up\nCREATE TABLE users (id INT);\n";
        let (up, down) = parse_sections(content);
        assert_eq!(up, "CREATE TABLE users (id INT);");
        assert_eq!(down, "");
    }

    #[test]
    fn test_parse_sections_skips_comments_and_preamble() {
        let content = "-- Migration: create_users\nSELECT 'ignored';\n\n-- up\n-- add the table\nCREATE TABLE users (id INT);\n-- down\nDROP TABLE users;";
        let (up, down) = parse_sections(content);
        assert_eq!(up, "CREATE TABLE users (id INT);");
        assert_eq!(down, "DROP TABLE users;");
    }

    #[test]
    fn test_parse_sections_update_comment_is_not_a_marker() {
        let content = "-- up\nCREATE TABLE a (id INT);\n-- update the rows next\nINSERT INTO a VALUES (1);\n-- down\nDROP TABLE a;";
        let (up, down) = parse_sections(content);
        assert!(up.contains("CREATE TABLE a"));
        assert!(up.contains("INSERT INTO a"));
        assert_eq!(down, "DROP TABLE a;");
    }

    #[test]
    fn test_parse_sections_marker_case_insensitive() {
        let content = "-- UP\nCREATE TABLE a (id INT);\n-- Down migration\nDROP TABLE a;";
        let (up, down) = parse_sections(content);
        assert_eq!(up, "CREATE TABLE a (id INT);");
        assert_eq!(down, "DROP TABLE a;");
    }

    #[test]
    fn test_split_statements_multi() {
        let stmts = split_statements("CREATE TABLE a (id INT); INSERT INTO a VALUES (1);");
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("CREATE TABLE"));
        assert!(stmts[1].starts_with("INSERT INTO"));
    }

    #[test]
    fn test_split_statements_empty() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("   \n  ").is_empty());
    }

    #[test]
    fn test_split_statements_falls_back_on_parse_failure() {
        // Not parseable as generic SQL; the naive splitter takes over.
        let stmts = split_statements("FLUSH PRIVILEGES WEIRDLY; SELECT 1;");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1], "SELECT 1;");
    }

    #[test]
    fn test_all_identifiers_sorted() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(dir.path().join("20250102000000_b.sql"), "-- up\nSELECT 2;").expect("write");
        fs::write(dir.path().join("20250101000000_a.sql"), "-- up\nSELECT 1;").expect("write");
        fs::write(dir.path().join("20250103000000_c.sql"), "-- up\nSELECT 3;").expect("write");
        fs::write(dir.path().join("README.md"), "# notes").expect("write");

        let source = UnitSource::new(dir.path());
        let ids = source.all_identifiers().expect("Failed to scan");
        assert_eq!(
            ids,
            vec![
                "20250101000000_a",
                "20250102000000_b",
                "20250103000000_c",
            ]
        );
    }

    #[test]
    fn test_all_identifiers_rejects_bad_stem() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(dir.path().join("create_users.sql"), "-- up\nSELECT 1;").expect("write");

        let source = UnitSource::new(dir.path());
        let result = source.all_identifiers();
        assert!(matches!(result, Err(SourceError::InvalidUnitName { .. })));
    }

    #[test]
    fn test_all_identifiers_missing_dir() {
        let source = UnitSource::new("/nonexistent/migrations");
        assert!(matches!(
            source.all_identifiers(),
            Err(SourceError::Io { .. })
        ));
    }

    #[test]
    fn test_load_unit() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let id = "20250101000000_create_users";
        fs::write(
            dir.path().join(format!("{}.sql", id)),
            "-- up\nCREATE TABLE users (id INT);\n-- down\nDROP TABLE users;",
        )
        .expect("write");

        let unit = UnitSource::new(dir.path()).load(id).expect("Failed to load");
        assert_eq!(unit.id, id);
        assert_eq!(unit.up_statements(), vec!["CREATE TABLE users (id INT);"]);
        assert_eq!(unit.down_statements(), vec!["DROP TABLE users;"]);
    }

    #[test]
    fn test_load_missing_unit() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = UnitSource::new(dir.path()).load("20250101000000_gone");
        match result {
            Err(SourceError::UnitNotFound { identifier, .. }) => {
                assert_eq!(identifier, "20250101000000_gone");
            }
            other => panic!("Expected UnitNotFound, got: {:?}", other),
        }
    }
}
