//! Entity mapping trait and tracked-state model.
//!
//! # Invariants
//! - `Entity::values` yields exactly one value per `Entity::COLUMNS` entry,
//!   in the same order.
//! - `Entity::from_row` receives rows selecting `KEY_COLUMN` followed by
//!   `COLUMNS`, so decoding by column name is always valid.

use crate::model::validation::FieldError;
use crate::repo::RepoResult;
use rusqlite::types::{FromSql, ToSql, Value};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

/// A record type persisted in one SQLite table.
///
/// Implementations are plain data mappings. The repository treats the
/// record as opaque beyond these hooks.
pub trait Entity: Clone + Send + Sized + 'static {
    /// Primary-key value type.
    type Key: Clone + Eq + Hash + Debug + Display + ToSql + FromSql + Send + Sync + 'static;

    /// Backing table name.
    const TABLE: &'static str;
    /// Primary-key column name.
    const KEY_COLUMN: &'static str;
    /// Non-key column names, in `values()` order.
    const COLUMNS: &'static [&'static str];

    fn key(&self) -> Self::Key;

    /// Column values for `COLUMNS`, used for full-row inserts and updates.
    fn values(&self) -> Vec<Value>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Checks field-level rules before a save writes this record.
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Ok(())
    }

    /// Related-data loaders addressable by include path.
    fn navigations() -> &'static [Navigation<Self>] {
        &[]
    }
}

/// Eager loader for one named relation of `E`.
///
/// `load` receives every record of one materialized query at once, so a
/// loader can fetch the related rows with a single `IN (...)` query.
pub struct Navigation<E: Entity> {
    pub name: &'static str,
    pub load: fn(&Connection, &mut [E]) -> RepoResult<()>,
}

impl<E: Entity> Debug for Navigation<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigation")
            .field("entity", &E::TABLE)
            .field("name", &self.name)
            .finish()
    }
}

/// Lookup for an include path among `E`'s declared navigations.
pub(crate) fn find_navigation<E: Entity>(name: &str) -> Option<&'static Navigation<E>> {
    E::navigations().iter().find(|navigation| navigation.name == name)
}

/// Change-tracking state of one entity within a persistence context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Not tracked by the context.
    Detached,
    /// Tracked and matching the store.
    Unchanged,
    /// Pending insert.
    Added,
    /// Pending full-row update.
    Modified,
    /// Pending delete.
    Deleted,
}

impl EntityState {
    /// Whether saving the context writes something for this state.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Added | Self::Modified | Self::Deleted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detached => "detached",
            Self::Unchanged => "unchanged",
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl Display for EntityState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
