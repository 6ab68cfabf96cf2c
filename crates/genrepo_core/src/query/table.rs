//! Column bookkeeping for SQL generated against one entity table.

use crate::model::Entity;
use crate::repo::{RepoError, RepoResult};

#[derive(Debug, Clone, Copy)]
pub(crate) struct TableMap {
    pub(crate) table: &'static str,
    pub(crate) key: &'static str,
    pub(crate) columns: &'static [&'static str],
}

impl TableMap {
    pub(crate) fn of<E: Entity>() -> Self {
        Self {
            table: E::TABLE,
            key: E::KEY_COLUMN,
            columns: E::COLUMNS,
        }
    }

    /// Rejects names outside this table, which also keeps arbitrary text
    /// out of generated SQL.
    pub(crate) fn check(&self, column: &str) -> RepoResult<()> {
        if column == self.key || self.columns.iter().any(|known| *known == column) {
            Ok(())
        } else {
            Err(RepoError::UnknownColumn {
                table: self.table,
                column: column.to_string(),
            })
        }
    }

    /// `"key", "col_a", "col_b"`
    pub(crate) fn select_list(&self) -> String {
        std::iter::once(self.key)
            .chain(self.columns.iter().copied())
            .map(|column| format!("\"{column}\""))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn insert_sql(&self) -> String {
        let placeholders = vec!["?"; self.columns.len() + 1].join(", ");
        format!(
            "INSERT INTO \"{}\" ({}) VALUES ({placeholders});",
            self.table,
            self.select_list()
        )
    }

    /// Writes every non-key column; the key is the last parameter.
    pub(crate) fn update_sql(&self) -> String {
        let assignments = self
            .columns
            .iter()
            .map(|column| format!("\"{column}\" = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE \"{}\" SET {assignments} WHERE \"{}\" = ?;",
            self.table, self.key
        )
    }

    pub(crate) fn delete_sql(&self) -> String {
        format!("DELETE FROM \"{}\" WHERE \"{}\" = ?;", self.table, self.key)
    }

    pub(crate) fn find_sql(&self) -> String {
        format!(
            "SELECT {} FROM \"{}\" WHERE \"{}\" = ?;",
            self.select_list(),
            self.table,
            self.key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::TableMap;
    use crate::repo::RepoError;

    const ALBUMS: TableMap = TableMap {
        table: "albums",
        key: "id",
        columns: &["artist_id", "title"],
    };

    #[test]
    fn generated_statements_list_key_first() {
        assert_eq!(ALBUMS.select_list(), "\"id\", \"artist_id\", \"title\"");
        assert_eq!(
            ALBUMS.insert_sql(),
            "INSERT INTO \"albums\" (\"id\", \"artist_id\", \"title\") VALUES (?, ?, ?);"
        );
        assert_eq!(
            ALBUMS.update_sql(),
            "UPDATE \"albums\" SET \"artist_id\" = ?, \"title\" = ? WHERE \"id\" = ?;"
        );
        assert_eq!(
            ALBUMS.delete_sql(),
            "DELETE FROM \"albums\" WHERE \"id\" = ?;"
        );
    }

    #[test]
    fn check_accepts_key_and_columns_only() {
        assert!(ALBUMS.check("id").is_ok());
        assert!(ALBUMS.check("title").is_ok());
        assert!(matches!(
            ALBUMS.check("year"),
            Err(RepoError::UnknownColumn { table: "albums", .. })
        ));
    }
}
