//! Lazy, composable entity query.
//!
//! # Invariants
//! - Nothing touches the store until `to_list`, `first` or `count`.
//! - Unknown include paths and columns fail before any SQL runs.
//! - Every call to a terminal method re-executes against the store.

use crate::model::Entity;
use crate::query::filter::Filter;
use crate::query::includes::Includes;
use crate::query::options::QueryOptions;
use crate::query::order::OrderBy;
use crate::query::table::TableMap;
use crate::repo::RepoResult;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::marker::PhantomData;
use std::time::Instant;

/// Query over the table of `E` that has not run yet.
pub struct Query<'c, E: Entity> {
    conn: &'c Connection,
    filters: Vec<Filter>,
    order_by: OrderBy,
    includes: Includes,
    limit: Option<u32>,
    offset: u32,
    _entity: PhantomData<fn() -> E>,
}

impl<'c, E: Entity> Query<'c, E> {
    /// Starts from every row of `E`'s table.
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            filters: Vec::new(),
            order_by: OrderBy::default(),
            includes: Includes::default(),
            limit: None,
            offset: 0,
            _entity: PhantomData,
        }
    }

    pub fn with_options(conn: &'c Connection, options: QueryOptions) -> Self {
        let mut query = Self::new(conn);
        if let Some(filter) = options.filter {
            query.filters.push(filter);
        }
        if let Some(order_by) = options.order_by {
            query.order_by = order_by;
        }
        query.includes = options.includes;
        query
    }

    /// Narrows the query; combined with earlier filters by `AND`.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Replaces the current ordering.
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn include(mut self, paths: &str) -> Self {
        self.includes.extend_from_str(paths);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// SQL text and bound parameters `to_list` would execute.
    pub fn to_sql(&self) -> RepoResult<(String, Vec<Value>)> {
        let table = TableMap::of::<E>();
        self.render_select(&table, &table.select_list(), true, self.limit)
    }

    /// Executes the query and eager-loads the requested includes.
    pub fn to_list(&self) -> RepoResult<Vec<E>> {
        self.fetch(self.limit)
    }

    pub fn first(&self) -> RepoResult<Option<E>> {
        let limit = Some(self.limit.map_or(1, |limit| limit.min(1)));
        Ok(self.fetch(limit)?.into_iter().next())
    }

    /// Row count of the query, honoring limit/offset. Includes are checked
    /// but never loaded.
    pub fn count(&self) -> RepoResult<usize> {
        self.includes.check::<E>()?;
        let table = TableMap::of::<E>();
        let projection = format!("\"{}\"", table.key);
        let (inner, params) = self.render_select(&table, &projection, false, self.limit)?;
        let sql = format!("SELECT COUNT(*) FROM ({inner})");

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        debug!(
            "event=query module=query status=ok op=count table={} rows={count}",
            table.table
        );
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn fetch(&self, limit: Option<u32>) -> RepoResult<Vec<E>> {
        let started_at = Instant::now();
        self.includes.check::<E>()?;

        let table = TableMap::of::<E>();
        let (sql, params) = self.render_select(&table, &table.select_list(), true, limit)?;

        let mut stmt = self.conn.prepare(&sql)?;
        let mut entities = stmt
            .query_map(params_from_iter(params.iter()), |row| E::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        self.includes.load(self.conn, &mut entities)?;

        debug!(
            "event=query module=query status=ok op=list table={} rows={} includes={} duration_ms={}",
            table.table,
            entities.len(),
            self.includes.iter().count(),
            started_at.elapsed().as_millis()
        );
        Ok(entities)
    }

    fn render_select(
        &self,
        table: &TableMap,
        projection: &str,
        ordered: bool,
        limit: Option<u32>,
    ) -> RepoResult<(String, Vec<Value>)> {
        let mut sql = format!("SELECT {projection} FROM \"{}\"", table.table);
        let mut params = Vec::new();

        for (index, filter) in self.filters.iter().enumerate() {
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            filter.render(table, &mut sql, &mut params)?;
        }

        if ordered {
            self.order_by.render(table, &mut sql)?;
        }

        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(i64::from(limit)));
            if self.offset > 0 {
                sql.push_str(" OFFSET ?");
                params.push(Value::Integer(i64::from(self.offset)));
            }
        } else if self.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(Value::Integer(i64::from(self.offset)));
        }

        Ok((sql, params))
    }
}
