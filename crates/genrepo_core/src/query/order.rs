use crate::query::table::TableMap;
use crate::repo::RepoResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Ordered sort keys. Empty means the store's natural order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    keys: Vec<(String, SortDirection)>,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self::default().then_asc(column)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::default().then_desc(column)
    }

    pub fn then_asc(mut self, column: impl Into<String>) -> Self {
        self.keys.push((column.into(), SortDirection::Ascending));
        self
    }

    pub fn then_desc(mut self, column: impl Into<String>) -> Self {
        self.keys.push((column.into(), SortDirection::Descending));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.keys
    }

    pub(crate) fn render(&self, table: &TableMap, sql: &mut String) -> RepoResult<()> {
        if self.keys.is_empty() {
            return Ok(());
        }

        let mut terms = Vec::with_capacity(self.keys.len());
        for (column, direction) in &self.keys {
            table.check(column)?;
            terms.push(format!("\"{column}\" {}", direction.as_sql()));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::OrderBy;
    use crate::query::table::TableMap;

    const ALBUMS: TableMap = TableMap {
        table: "albums",
        key: "id",
        columns: &["title", "year"],
    };

    #[test]
    fn renders_keys_in_declaration_order() {
        let mut sql = String::new();
        OrderBy::desc("year")
            .then_asc("title")
            .render(&ALBUMS, &mut sql)
            .unwrap();
        assert_eq!(sql, " ORDER BY \"year\" DESC, \"title\" ASC");
    }

    #[test]
    fn empty_order_renders_nothing() {
        let mut sql = String::new();
        OrderBy::default().render(&ALBUMS, &mut sql).unwrap();
        assert!(sql.is_empty());
    }
}
