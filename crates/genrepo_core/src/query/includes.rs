use crate::model::entity::find_navigation;
use crate::model::Entity;
use crate::repo::{RepoError, RepoResult};
use rusqlite::Connection;

/// Navigation names to eager-load after a query materializes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Includes {
    paths: Vec<String>,
}

impl Includes {
    /// Parses a comma-separated path list.
    ///
    /// Segments are trimmed, empty segments dropped and repeats collapsed,
    /// so `"albums,, tracks,albums"` yields `["albums", "tracks"]`.
    pub fn parse(paths: &str) -> Self {
        let mut includes = Self::default();
        includes.extend_from_str(paths);
        includes
    }

    pub fn extend_from_str(&mut self, paths: &str) {
        for path in paths.split(',') {
            self.push(path);
        }
    }

    pub fn push(&mut self, path: &str) {
        let path = path.trim();
        if path.is_empty() || self.paths.iter().any(|known| known == path) {
            return;
        }
        self.paths.push(path.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Fails on the first path `E` does not declare.
    pub(crate) fn check<E: Entity>(&self) -> RepoResult<()> {
        for path in self.iter() {
            if find_navigation::<E>(path).is_none() {
                return Err(RepoError::UnknownInclude {
                    table: E::TABLE,
                    path: path.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Runs each path's loader once over the whole result set.
    pub(crate) fn load<E: Entity>(&self, conn: &Connection, entities: &mut [E]) -> RepoResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        for path in self.iter() {
            let navigation =
                find_navigation::<E>(path).ok_or_else(|| RepoError::UnknownInclude {
                    table: E::TABLE,
                    path: path.to_string(),
                })?;
            (navigation.load)(conn, entities)?;
        }
        Ok(())
    }
}

impl From<&str> for Includes {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
