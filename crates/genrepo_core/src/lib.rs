//! Generic data-access layer over SQLite.
//! One repository type provides CRUD, filtered/ordered queries and include
//! paths for any type implementing [`Entity`].

pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;

pub use context::{ChangeCounts, ContextFactory, DbContext, EntitySet};
pub use db::{ContextOptions, DbError, DbResult, Migration};
pub use logging::{default_log_level, init_logging, logging_status, LogOptions, LoggingError};
pub use model::{
    Entity, EntityState, EntityValidationError, FieldError, Navigation, ValidationErrors,
};
pub use query::{Filter, Includes, OrderBy, Query, QueryOptions, SortDirection};
pub use repo::{GenericRepository, RepoError, RepoResult, Repository};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
