//! Mapping contracts between caller record types and SQLite tables.
//!
//! # Responsibility
//! - Define how an opaque record type maps to one table (`Entity`).
//! - Describe related-data loaders addressable by include path.
//! - Define tracked state and validation reporting types.
//!
//! # Invariants
//! - Identity is decided by `Entity::key`; nothing in this crate derives or
//!   generates keys.

pub mod entity;
pub mod validation;

pub use entity::{Entity, EntityState, Navigation};
pub use validation::{EntityValidationError, FieldError, ValidationErrors};
