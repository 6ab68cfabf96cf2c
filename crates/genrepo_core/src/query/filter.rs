//! Composable predicates rendered to parameterized `WHERE` fragments.
//!
//! # Invariants
//! - Column names are checked against the entity table before rendering.
//! - Values always travel as bound parameters, never as SQL text.
//! - Raw fragments must use anonymous `?` placeholders only, since
//!   parameters are bound in rendering order.

use crate::query::table::TableMap;
use crate::repo::RepoResult;
use rusqlite::types::Value;
use std::ops::Not;

/// Predicate over the rows of one entity table.
///
/// Text values must be passed as `String`; `rusqlite` has no `From<&str>`
/// conversion into [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    Null {
        column: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    Like {
        column: String,
        pattern: String,
    },
    Raw {
        sql: String,
        params: Vec<Value>,
    },
    All(Vec<Expr>),
    Any(Vec<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

impl Filter {
    fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            expr: Expr::Compare {
                column: column.into(),
                op,
                value: value.into(),
            },
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self {
            expr: Expr::Null {
                column: column.into(),
                negated: false,
            },
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self {
            expr: Expr::Null {
                column: column.into(),
                negated: true,
            },
        }
    }

    /// Membership test. An empty value list matches nothing.
    pub fn in_list<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            expr: Expr::In {
                column: column.into(),
                values: values.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// SQLite `LIKE` (case-insensitive for ASCII).
    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            expr: Expr::Like {
                column: column.into(),
                pattern: pattern.into(),
            },
        }
    }

    /// Caller-authored SQL fragment with `?` placeholders.
    pub fn raw(sql: impl Into<String>, params: impl IntoIterator<Item = Value>) -> Self {
        Self {
            expr: Expr::Raw {
                sql: sql.into(),
                params: params.into_iter().collect(),
            },
        }
    }

    /// Conjunction of all `filters`. Empty input matches every row.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self {
            expr: Expr::All(filters.into_iter().map(|filter| filter.expr).collect()),
        }
    }

    /// Disjunction of all `filters`. Empty input matches nothing.
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self {
            expr: Expr::Any(filters.into_iter().map(|filter| filter.expr).collect()),
        }
    }

    pub fn and(self, other: Filter) -> Self {
        match self.expr {
            Expr::All(mut parts) => {
                parts.push(other.expr);
                Self {
                    expr: Expr::All(parts),
                }
            }
            expr => Self {
                expr: Expr::All(vec![expr, other.expr]),
            },
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self.expr {
            Expr::Any(mut parts) => {
                parts.push(other.expr);
                Self {
                    expr: Expr::Any(parts),
                }
            }
            expr => Self {
                expr: Expr::Any(vec![expr, other.expr]),
            },
        }
    }

    pub(crate) fn render(
        &self,
        table: &TableMap,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> RepoResult<()> {
        render_expr(&self.expr, table, sql, params)
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Self::Output {
        Self {
            expr: Expr::Not(Box::new(self.expr)),
        }
    }
}

fn render_expr(
    expr: &Expr,
    table: &TableMap,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> RepoResult<()> {
    match expr {
        Expr::Compare { column, op, value } => {
            table.check(column)?;
            sql.push_str(&format!("\"{column}\" {} ?", op.as_sql()));
            params.push(value.clone());
        }
        Expr::Null { column, negated } => {
            table.check(column)?;
            let test = if *negated { "IS NOT NULL" } else { "IS NULL" };
            sql.push_str(&format!("\"{column}\" {test}"));
        }
        Expr::In { column, values } => {
            table.check(column)?;
            if values.is_empty() {
                sql.push_str("0 = 1");
            } else {
                let placeholders = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!("\"{column}\" IN ({placeholders})"));
                params.extend(values.iter().cloned());
            }
        }
        Expr::Like { column, pattern } => {
            table.check(column)?;
            sql.push_str(&format!("\"{column}\" LIKE ?"));
            params.push(Value::Text(pattern.clone()));
        }
        Expr::Raw { sql: fragment, params: bound } => {
            sql.push('(');
            sql.push_str(fragment);
            sql.push(')');
            params.extend(bound.iter().cloned());
        }
        Expr::All(parts) => render_group(parts, " AND ", "1 = 1", table, sql, params)?,
        Expr::Any(parts) => render_group(parts, " OR ", "0 = 1", table, sql, params)?,
        Expr::Not(inner) => {
            sql.push_str("NOT (");
            render_expr(inner, table, sql, params)?;
            sql.push(')');
        }
    }
    Ok(())
}

fn render_group(
    parts: &[Expr],
    joiner: &str,
    empty: &str,
    table: &TableMap,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> RepoResult<()> {
    if parts.is_empty() {
        sql.push_str(empty);
        return Ok(());
    }

    sql.push('(');
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            sql.push_str(joiner);
        }
        render_expr(part, table, sql, params)?;
    }
    sql.push(')');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Filter;
    use crate::query::table::TableMap;
    use crate::repo::RepoError;
    use rusqlite::types::Value;

    const TRACKS: TableMap = TableMap {
        table: "tracks",
        key: "id",
        columns: &["album_id", "title", "seconds"],
    };

    fn render(filter: &Filter) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        filter.render(&TRACKS, &mut sql, &mut params).unwrap();
        (sql, params)
    }

    #[test]
    fn comparison_binds_value_as_parameter() {
        let (sql, params) = render(&Filter::gt("seconds", 180_i64));
        assert_eq!(sql, "\"seconds\" > ?");
        assert_eq!(params, vec![Value::Integer(180)]);
    }

    #[test]
    fn conjunction_flattens_and_keeps_parameter_order() {
        let filter = Filter::eq("album_id", 3_i64)
            .and(Filter::like("title", "%love%"))
            .and(Filter::is_not_null("seconds"));
        let (sql, params) = render(&filter);

        assert_eq!(
            sql,
            "(\"album_id\" = ? AND \"title\" LIKE ? AND \"seconds\" IS NOT NULL)"
        );
        assert_eq!(
            params,
            vec![Value::Integer(3), Value::Text("%love%".to_string())]
        );
    }

    #[test]
    fn negated_disjunction_and_raw_fragment() {
        let filter = !(Filter::lt("seconds", 60_i64).or(Filter::raw(
            "length(title) > ?",
            [Value::Integer(40)],
        )));
        let (sql, params) = render(&filter);

        assert_eq!(sql, "NOT ((\"seconds\" < ? OR (length(title) > ?)))");
        assert_eq!(params, vec![Value::Integer(60), Value::Integer(40)]);
    }

    #[test]
    fn empty_groups_render_constant_predicates() {
        assert_eq!(render(&Filter::all([])).0, "1 = 1");
        assert_eq!(render(&Filter::any([])).0, "0 = 1");
        assert_eq!(render(&Filter::in_list("id", Vec::<i64>::new())).0, "0 = 1");
        assert_eq!(
            render(&Filter::in_list("id", [1_i64, 2])).0,
            "\"id\" IN (?, ?)"
        );
    }

    #[test]
    fn unknown_column_is_rejected() {
        let mut sql = String::new();
        let mut params = Vec::new();
        let err = Filter::eq("artist\" OR 1=1 --", 1_i64)
            .render(&TRACKS, &mut sql, &mut params)
            .unwrap_err();
        assert!(matches!(err, RepoError::UnknownColumn { table: "tracks", .. }));
    }
}
