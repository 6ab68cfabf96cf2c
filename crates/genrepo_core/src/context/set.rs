//! Typed collection view over one entity type of a context.

use crate::context::tracker::{ChangeTracker, TypedEntries};
use crate::model::{Entity, EntityState};
use crate::query::table::TableMap;
use crate::query::Query;
use crate::repo::{RepoError, RepoResult};
use log::debug;
use rusqlite::{Connection, OptionalExtension};
use std::marker::PhantomData;

/// Borrow of a [`DbContext`](crate::context::DbContext) scoped to `E`.
///
/// State transitions follow the usual unit-of-work rules:
///
/// | operation | detached | unchanged / modified | added | deleted |
/// |-----------|----------|----------------------|-------|---------|
/// | `add`     | added    | error                | error | modified |
/// | `attach`  | unchanged| no-op                | no-op | no-op   |
/// | `update`  | modified | modified             | added | modified |
/// | `remove`  | deleted  | deleted              | detached | deleted |
pub struct EntitySet<'a, E: Entity> {
    conn: &'a Connection,
    tracker: &'a mut ChangeTracker,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> EntitySet<'a, E> {
    pub(crate) fn new(conn: &'a Connection, tracker: &'a mut ChangeTracker) -> Self {
        Self {
            conn,
            tracker,
            _entity: PhantomData,
        }
    }

    fn entries(&self) -> Option<&TypedEntries<E>> {
        self.tracker.entries::<E>()
    }

    fn entries_mut(&mut self) -> &mut TypedEntries<E> {
        self.tracker.entries_mut::<E>()
    }

    pub fn state_of(&self, entity: &E) -> EntityState {
        self.state_of_key(&entity.key())
    }

    pub fn state_of_key(&self, key: &E::Key) -> EntityState {
        self.entries()
            .map_or(EntityState::Detached, |entries| entries.state(key))
    }

    /// Marks `entity` for insertion on the next save.
    ///
    /// Re-adding a key that is pending deletion turns the delete into a
    /// full-row update.
    pub fn add(&mut self, entity: E) -> RepoResult<()> {
        match self.state_of(&entity) {
            EntityState::Detached => self.entries_mut().upsert(entity, EntityState::Added),
            EntityState::Deleted => self.entries_mut().upsert(entity, EntityState::Modified),
            state => {
                return Err(RepoError::AlreadyTracked {
                    table: E::TABLE,
                    key: entity.key().to_string(),
                    state,
                })
            }
        }
        Ok(())
    }

    /// Starts tracking `entity` as matching the store. Already-tracked keys
    /// keep their entry.
    pub fn attach(&mut self, entity: E) {
        if self.state_of(&entity) == EntityState::Detached {
            self.entries_mut().upsert(entity, EntityState::Unchanged);
        }
    }

    /// Replaces the tracked value and marks every column dirty.
    pub fn update(&mut self, entity: E) {
        let state = match self.state_of(&entity) {
            EntityState::Added => EntityState::Added,
            _ => EntityState::Modified,
        };
        self.entries_mut().upsert(entity, state);
    }

    /// Marks `entity` for deletion, attaching it first when detached.
    ///
    /// A pending insert is dropped instead, so the store never sees it.
    pub fn remove(&mut self, entity: E) {
        let key = entity.key();
        match self.state_of_key(&key) {
            EntityState::Added => self.entries_mut().set_state(&key, EntityState::Detached),
            EntityState::Detached => self.entries_mut().upsert(entity, EntityState::Deleted),
            _ => self.entries_mut().set_state(&key, EntityState::Deleted),
        }
    }

    /// Sets the tracked state of `entity` directly.
    ///
    /// Detached entities become tracked in the requested state with the
    /// supplied value; `Detached` stops tracking.
    pub fn set_state(&mut self, entity: E, state: EntityState) {
        self.entries_mut().upsert(entity, state);
    }

    /// Looks up `key` among tracked entities, then in the store.
    ///
    /// A key pending deletion resolves to `None`. A store hit is attached as
    /// `Unchanged`.
    pub fn find(&mut self, key: &E::Key) -> RepoResult<Option<E>> {
        if let Some(tracked) = self.entries().and_then(|entries| entries.get(key)) {
            debug!(
                "event=find module=context status=ok table={} source=tracked state={}",
                E::TABLE,
                tracked.state
            );
            return Ok(match tracked.state {
                EntityState::Deleted => None,
                _ => Some(tracked.entity.clone()),
            });
        }

        let conn = self.conn;
        let found = {
            let mut stmt = conn.prepare_cached(&TableMap::of::<E>().find_sql())?;
            stmt.query_row([key], |row| E::from_row(row)).optional()?
        };
        debug!(
            "event=find module=context status=ok table={} source=store hit={}",
            E::TABLE,
            found.is_some()
        );

        if let Some(entity) = &found {
            self.entries_mut()
                .upsert(entity.clone(), EntityState::Unchanged);
        }
        Ok(found)
    }

    /// Tracked entities that are not pending deletion, in tracking order.
    pub fn local(&self) -> Vec<E> {
        self.entries().map_or_else(Vec::new, |entries| {
            entries
                .ordered()
                .into_iter()
                .filter(|(_, tracked)| tracked.state != EntityState::Deleted)
                .map(|(_, tracked)| tracked.entity.clone())
                .collect()
        })
    }

    /// Lazy query over the store rows of `E`. Pending changes are not
    /// visible until saved.
    pub fn query(&self) -> Query<'a, E> {
        Query::new(self.conn)
    }
}
