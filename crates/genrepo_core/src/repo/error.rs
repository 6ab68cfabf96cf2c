use crate::db::DbError;
use crate::model::{EntityState, ValidationErrors};
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository and persistence-context error.
///
/// Store failures are wrapped without rewriting, so constraint errors keep
/// their original SQLite code and message.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("{table} not found: {key}")]
    NotFound { table: &'static str, key: String },
    #[error("{table} {key} is already tracked as {state}")]
    AlreadyTracked {
        table: &'static str,
        key: String,
        state: EntityState,
    },
    #[error("{operation} of {table} {key} affected no rows")]
    ConcurrencyConflict {
        table: &'static str,
        key: String,
        operation: &'static str,
    },
    #[error("{table} has no navigation `{path}`")]
    UnknownInclude { table: &'static str, path: String },
    #[error("{table} has no column `{column}`")]
    UnknownColumn { table: &'static str, column: String },
    #[error("repository context has been disposed")]
    Disposed,
    #[error("background store task failed: {0}")]
    BackgroundTask(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl RepoError {
    /// Returns whether the store rejected the write on a constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_constraint_violation())
    }
}
