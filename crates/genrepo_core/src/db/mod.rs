//! SQLite storage bootstrap, options and schema checks.
//!
//! # Responsibility
//! - Open and configure SQLite connections for a persistence context.
//! - Apply caller-supplied schema migrations in deterministic order.
//! - Verify a connection exposes the table/columns an entity maps to.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No entity data is read or written before migrations succeed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub mod migrations;
mod open;
mod schema;

pub use migrations::Migration;
pub use open::{open_db, open_db_in_memory, open_with_options};
pub use schema::{ensure_identifier, ensure_table};

pub type DbResult<T> = Result<T, DbError>;

/// Storage-level failures raised while opening or inspecting a database.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error("required table `{0}` does not exist")]
    MissingRequiredTable(&'static str),
    #[error("required column `{column}` does not exist in table `{table}`")]
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    #[error("migration versions must be strictly increasing and start above 0: {previous} then {next}")]
    MigrationOrder { previous: u32, next: u32 },
    #[error("`{0}` is not a valid SQL identifier")]
    InvalidIdentifier(String),
}

impl DbError {
    /// Returns whether the store rejected a write because of a constraint
    /// (`NOT NULL`, `UNIQUE`, `CHECK`, foreign key).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Connection options for one persistence context.
///
/// Deserializable so host applications can keep them in their own config
/// files; missing fields fall back to [`ContextOptions::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Enforce `FOREIGN KEY` constraints on the connection.
    pub foreign_keys: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
            foreign_keys: true,
        }
    }
}

impl ContextOptions {
    /// Options for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Options for a database file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    fn mode(&self) -> &'static str {
        if self.path.is_some() {
            "file"
        } else {
            "memory"
        }
    }
}
