//! Schema inspection used when binding an entity type to a connection.
//!
//! # Invariants
//! - Every name interpolated into generated SQL has passed
//!   [`ensure_identifier`].

use super::{DbError, DbResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use std::collections::HashSet;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Rejects names that cannot be safely spliced into SQL text.
pub fn ensure_identifier(name: &str) -> DbResult<()> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Verifies that `table` exists and carries every column in `columns`.
pub fn ensure_table(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> DbResult<()> {
    ensure_identifier(table)?;

    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(DbError::MissingRequiredTable(table));
    }

    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\");"))?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<HashSet<_>, _>>()?;

    for &column in columns {
        ensure_identifier(column)?;
        if !present.contains(column) {
            return Err(DbError::MissingRequiredColumn { table, column });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ensure_identifier, ensure_table};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn identifiers_reject_quotes_and_spaces() {
        assert!(ensure_identifier("album_id").is_ok());
        assert!(ensure_identifier("_x1").is_ok());
        assert!(ensure_identifier("1col").is_err());
        assert!(ensure_identifier("name; DROP TABLE t").is_err());
        assert!(ensure_identifier("a\"b").is_err());
    }

    #[test]
    fn ensure_table_reports_missing_table_then_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            ensure_table(&conn, "artists", &["id"]),
            Err(DbError::MissingRequiredTable("artists"))
        ));

        conn.execute_batch("CREATE TABLE artists (id INTEGER PRIMARY KEY);")
            .unwrap();
        assert!(ensure_table(&conn, "artists", &["id"]).is_ok());
        assert!(matches!(
            ensure_table(&conn, "artists", &["id", "name"]),
            Err(DbError::MissingRequiredColumn {
                table: "artists",
                column: "name"
            })
        ));
    }
}
