//! Persistence context: one SQLite session plus its change tracker.
//!
//! # Responsibility
//! - Own the connection for the lifetime of a unit of work.
//! - Track entity states and commit pending changes atomically.
//! - Hand out typed [`EntitySet`] views per entity type.
//!
//! # Invariants
//! - `save_changes` either commits every pending statement or none.
//! - Validation runs before any statement is issued.
//! - A context is single-session; it is `Send` but never shared.

mod set;
mod tracker;

pub use set::EntitySet;
pub use tracker::ChangeCounts;

use crate::db::{open_with_options, ContextOptions, DbError, DbResult, Migration};
use crate::model::{Entity, EntityState};
use crate::repo::RepoResult;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::time::Instant;
use tracker::ChangeTracker;

/// Session-scoped handle to the backing store.
pub struct DbContext {
    conn: Connection,
    tracker: ChangeTracker,
}

impl DbContext {
    /// Opens the database described by `options` and applies `migrations`.
    pub fn open(options: &ContextOptions, migrations: &[Migration]) -> DbResult<Self> {
        Ok(Self::from_connection(open_with_options(options, migrations)?))
    }

    pub fn open_in_memory(migrations: &[Migration]) -> DbResult<Self> {
        Self::open(&ContextOptions::in_memory(), migrations)
    }

    /// Wraps an already configured connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            tracker: ChangeTracker::default(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Typed view over entities of `E`.
    pub fn set<E: Entity>(&mut self) -> EntitySet<'_, E> {
        EntitySet::new(&self.conn, &mut self.tracker)
    }

    pub fn entry_state<E: Entity>(&self, entity: &E) -> EntityState {
        self.tracker
            .entries::<E>()
            .map_or(EntityState::Detached, |entries| entries.state(&entity.key()))
    }

    pub fn pending_changes(&self) -> ChangeCounts {
        self.tracker.counts()
    }

    pub fn has_changes(&self) -> bool {
        self.pending_changes().total() > 0
    }

    /// Stops tracking every entity, dropping unsaved changes.
    pub fn discard_changes(&mut self) {
        self.tracker.clear();
    }

    /// Commits every pending insert, update and delete in one transaction.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// - `RepoError::Validation` when any pending entity fails
    ///   `Entity::validate`; nothing is written.
    /// - `RepoError::ConcurrencyConflict` when an update/delete matches no
    ///   row; the transaction is rolled back.
    /// - `RepoError::Db` for store failures, including constraint violations.
    ///   Foreign keys are checked once, at commit.
    pub fn save_changes(&mut self) -> RepoResult<usize> {
        let started_at = Instant::now();
        let counts = self.tracker.counts();
        if counts.total() == 0 {
            debug!("event=save_changes module=context status=skip reason=no_changes");
            return Ok(0);
        }

        let errors = self.tracker.validate();
        if !errors.is_empty() {
            warn!(
                "event=save_changes module=context status=error error_code=validation_failed entities={}",
                errors.len()
            );
            return Err(errors.into());
        }

        let affected = match write_and_commit(&mut self.conn, &self.tracker) {
            Ok(affected) => affected,
            Err(err) => {
                error!(
                    "event=save_changes module=context status=error error_code=write_failed duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };
        self.tracker.accept_changes();

        info!(
            "event=save_changes module=context status=ok added={} modified={} deleted={} rows={} duration_ms={}",
            counts.added,
            counts.modified,
            counts.deleted,
            affected,
            started_at.elapsed().as_millis()
        );
        Ok(affected)
    }

    /// Closes the underlying connection, reporting close failures.
    pub fn close(self) -> DbResult<()> {
        self.conn.close().map_err(|(_, err)| DbError::Sqlite(err))?;
        info!("event=context_close module=context status=ok");
        Ok(())
    }
}

// Foreign keys are checked at commit, against the final state only.
// A failed write or commit rolls back when `tx` drops.
fn write_and_commit(conn: &mut Connection, tracker: &ChangeTracker) -> RepoResult<usize> {
    let tx = conn.transaction()?;
    tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;
    let affected = tracker.write(&tx)?;
    tx.commit()?;
    Ok(affected)
}

/// Builds the context a repository owns.
///
/// Implemented by a marker type per database, so the repository's context
/// source is fixed at the type level.
pub trait ContextFactory: 'static {
    fn create_context() -> DbResult<DbContext>;

    /// Releases a context handed back by a repository being disposed.
    ///
    /// Also runs on a blocking-pool thread when an async repository call
    /// loses its context to a panic or a dropped future.
    fn release_context(context: DbContext) -> DbResult<()> {
        context.close()
    }
}
