use crate::query::filter::Filter;
use crate::query::includes::Includes;
use crate::query::order::OrderBy;

/// Optional filter, ordering and include paths for one repository read.
///
/// `QueryOptions::default()` selects every row in natural order with no
/// related data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub filter: Option<Filter>,
    pub order_by: Option<OrderBy>,
    pub includes: Includes,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `filter`, combining with any filter already set by `AND`.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    /// Adds comma-separated include paths.
    pub fn include(mut self, paths: &str) -> Self {
        self.includes.extend_from_str(paths);
        self
    }
}
