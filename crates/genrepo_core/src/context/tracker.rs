//! Per-context change tracking.
//!
//! # Invariants
//! - At most one tracked entry exists per `(entity type, key)`.
//! - `Detached` is never stored; detaching removes the entry.
//! - Writes run per entity type in first-tracked order: inserts for every
//!   type, then updates, then deletes in reverse type order. Foreign-key
//!   checks are deferred to commit.
//! - Tracker state only changes after a successful commit
//!   (`accept_changes`), never on a failed write.

use crate::model::{Entity, EntityState, EntityValidationError, ValidationErrors};
use crate::query::table::TableMap;
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::ToSql;
use rusqlite::Connection;
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Pending write totals of a context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
}

impl ChangeCounts {
    pub fn total(&self) -> usize {
        self.added + self.modified + self.deleted
    }
}

pub(crate) struct Tracked<E: Entity> {
    pub(crate) entity: E,
    pub(crate) state: EntityState,
    seq: u64,
}

pub(crate) struct TypedEntries<E: Entity> {
    entries: HashMap<E::Key, Tracked<E>>,
    next_seq: u64,
}

impl<E: Entity> Default for TypedEntries<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<E: Entity> TypedEntries<E> {
    pub(crate) fn get(&self, key: &E::Key) -> Option<&Tracked<E>> {
        self.entries.get(key)
    }

    pub(crate) fn state(&self, key: &E::Key) -> EntityState {
        self.entries
            .get(key)
            .map_or(EntityState::Detached, |tracked| tracked.state)
    }

    /// Tracks `entity` under `state`, keeping its original position when the
    /// key was already tracked.
    pub(crate) fn upsert(&mut self, entity: E, state: EntityState) {
        let key = entity.key();
        if state == EntityState::Detached {
            self.entries.remove(&key);
            return;
        }
        if let Some(tracked) = self.entries.get_mut(&key) {
            tracked.entity = entity;
            tracked.state = state;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, Tracked { entity, state, seq });
    }

    pub(crate) fn set_state(&mut self, key: &E::Key, state: EntityState) {
        if state == EntityState::Detached {
            self.entries.remove(key);
        } else if let Some(tracked) = self.entries.get_mut(key) {
            tracked.state = state;
        }
    }

    /// Tracked entries in first-tracked order.
    pub(crate) fn ordered(&self) -> Vec<(&E::Key, &Tracked<E>)> {
        let mut entries = self.entries.iter().collect::<Vec<_>>();
        entries.sort_by_key(|(_, tracked)| tracked.seq);
        entries
    }

    fn with_state(&self, state: EntityState) -> impl Iterator<Item = (&E::Key, &Tracked<E>)> {
        self.ordered()
            .into_iter()
            .filter(move |(_, tracked)| tracked.state == state)
    }
}

/// Type-erased view of one entity type's tracked entries.
pub(crate) trait PendingSet: Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn counts(&self) -> ChangeCounts;
    fn validate(&self, errors: &mut ValidationErrors);
    fn write_inserts(&self, conn: &Connection) -> RepoResult<usize>;
    fn write_updates(&self, conn: &Connection) -> RepoResult<usize>;
    fn write_deletes(&self, conn: &Connection) -> RepoResult<usize>;
    fn accept_changes(&mut self);
}

impl<E: Entity> PendingSet for TypedEntries<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn counts(&self) -> ChangeCounts {
        let mut counts = ChangeCounts::default();
        for tracked in self.entries.values() {
            match tracked.state {
                EntityState::Added => counts.added += 1,
                EntityState::Modified => counts.modified += 1,
                EntityState::Deleted => counts.deleted += 1,
                EntityState::Unchanged | EntityState::Detached => {}
            }
        }
        counts
    }

    fn validate(&self, errors: &mut ValidationErrors) {
        for (key, tracked) in self.ordered() {
            if !matches!(tracked.state, EntityState::Added | EntityState::Modified) {
                continue;
            }
            if let Err(field_errors) = tracked.entity.validate() {
                errors.push(EntityValidationError {
                    table: E::TABLE,
                    key: key.to_string(),
                    errors: field_errors,
                });
            }
        }
    }

    fn write_inserts(&self, conn: &Connection) -> RepoResult<usize> {
        let table = TableMap::of::<E>();
        let mut stmt = conn.prepare_cached(&table.insert_sql())?;
        let mut affected = 0;
        for (key, tracked) in self.with_state(EntityState::Added) {
            let values = tracked.entity.values();
            let mut params: Vec<&dyn ToSql> = Vec::with_capacity(values.len() + 1);
            params.push(key);
            params.extend(values.iter().map(|value| value as &dyn ToSql));
            affected += stmt.execute(params.as_slice())?;
        }
        Ok(affected)
    }

    fn write_updates(&self, conn: &Connection) -> RepoResult<usize> {
        let table = TableMap::of::<E>();
        let mut stmt = conn.prepare_cached(&table.update_sql())?;
        let mut affected = 0;
        for (key, tracked) in self.with_state(EntityState::Modified) {
            let values = tracked.entity.values();
            let mut params: Vec<&dyn ToSql> = values
                .iter()
                .map(|value| value as &dyn ToSql)
                .collect();
            params.push(key);
            let changed = stmt.execute(params.as_slice())?;
            if changed == 0 {
                return Err(conflict::<E>(key, "update"));
            }
            affected += changed;
        }
        Ok(affected)
    }

    fn write_deletes(&self, conn: &Connection) -> RepoResult<usize> {
        let table = TableMap::of::<E>();
        let mut stmt = conn.prepare_cached(&table.delete_sql())?;
        let mut affected = 0;
        for (key, _) in self.with_state(EntityState::Deleted) {
            let changed = stmt.execute([key])?;
            if changed == 0 {
                return Err(conflict::<E>(key, "delete"));
            }
            affected += changed;
        }
        Ok(affected)
    }

    fn accept_changes(&mut self) {
        self.entries
            .retain(|_, tracked| tracked.state != EntityState::Deleted);
        for tracked in self.entries.values_mut() {
            tracked.state = EntityState::Unchanged;
        }
    }
}

fn conflict<E: Entity>(key: &E::Key, operation: &'static str) -> RepoError {
    RepoError::ConcurrencyConflict {
        table: E::TABLE,
        key: key.to_string(),
        operation,
    }
}

/// All tracked entity types of one context, in first-tracked order.
#[derive(Default)]
pub(crate) struct ChangeTracker {
    sets: Vec<(TypeId, Box<dyn PendingSet>)>,
}

impl ChangeTracker {
    pub(crate) fn entries<E: Entity>(&self) -> Option<&TypedEntries<E>> {
        self.sets
            .iter()
            .find(|(type_id, _)| *type_id == TypeId::of::<E>())
            .and_then(|(_, set)| set.as_any().downcast_ref::<TypedEntries<E>>())
    }

    pub(crate) fn entries_mut<E: Entity>(&mut self) -> &mut TypedEntries<E> {
        let type_id = TypeId::of::<E>();
        let index = match self.sets.iter().position(|(id, _)| *id == type_id) {
            Some(index) => index,
            None => {
                self.sets
                    .push((type_id, Box::new(TypedEntries::<E>::default())));
                self.sets.len() - 1
            }
        };
        self.sets[index]
            .1
            .as_any_mut()
            .downcast_mut::<TypedEntries<E>>()
            .expect("tracked set is registered under its own TypeId")
    }

    pub(crate) fn counts(&self) -> ChangeCounts {
        self.sets
            .iter()
            .fold(ChangeCounts::default(), |mut total, (_, set)| {
                let counts = set.counts();
                total.added += counts.added;
                total.modified += counts.modified;
                total.deleted += counts.deleted;
                total
            })
    }

    pub(crate) fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::default();
        for (_, set) in &self.sets {
            set.validate(&mut errors);
        }
        errors
    }

    /// Issues every pending statement on `conn`; returns affected rows.
    pub(crate) fn write(&self, conn: &Connection) -> RepoResult<usize> {
        let mut affected = 0;
        for (_, set) in &self.sets {
            affected += set.write_inserts(conn)?;
        }
        for (_, set) in &self.sets {
            affected += set.write_updates(conn)?;
        }
        for (_, set) in self.sets.iter().rev() {
            affected += set.write_deletes(conn)?;
        }
        Ok(affected)
    }

    pub(crate) fn accept_changes(&mut self) {
        for (_, set) in &mut self.sets {
            set.accept_changes();
        }
    }

    /// Forgets every tracked entity and the type order.
    pub(crate) fn clear(&mut self) {
        self.sets.clear();
    }
}
