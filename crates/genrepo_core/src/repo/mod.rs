//! Repository layer: capability contract and generic implementation.
//!
//! # Responsibility
//! - Define the CRUD/query contract callers consume (`Repository`).
//! - Forward each operation to the owned persistence context.
//!
//! # Invariants
//! - A repository owns exactly one context and releases it exactly once.
//! - Lookups by key return `Ok(None)` when absent; delete-by-key on an
//!   absent key is `NotFound`.

mod error;
pub mod generic_repo;

pub use error::{RepoError, RepoResult};
pub use generic_repo::{GenericRepository, Repository};
