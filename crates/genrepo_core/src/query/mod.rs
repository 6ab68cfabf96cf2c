//! Query composition over entity tables.
//!
//! # Responsibility
//! - Build filter, ordering and include-path descriptions.
//! - Render them to parameterized SQL and materialize entities.
//!
//! # Invariants
//! - Generated SQL only names the entity's own table and columns.
//! - Caller values are bound as parameters.

pub mod builder;
pub mod filter;
pub mod includes;
pub mod options;
pub mod order;
pub(crate) mod table;

pub use builder::Query;
pub use filter::Filter;
pub use includes::Includes;
pub use options::QueryOptions;
pub use order::{OrderBy, SortDirection};
