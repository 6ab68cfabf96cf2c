//! Validation failure reporting for pending saves.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// One rule violation on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// All rule violations of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityValidationError {
    pub table: &'static str,
    /// Display form of the entity key.
    pub key: String,
    pub errors: Vec<FieldError>,
}

/// Every entity that failed validation during one save attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub entities: Vec<EntityValidationError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn push(&mut self, error: EntityValidationError) {
        self.entities.push(error);
    }

    /// Iterates `(table, key, field error)` for every violation.
    pub fn field_errors(&self) -> impl Iterator<Item = (&'static str, &str, &FieldError)> {
        self.entities.iter().flat_map(|entity| {
            entity
                .errors
                .iter()
                .map(move |error| (entity.table, entity.key.as_str(), error))
        })
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed for {} entities", self.entities.len())?;
        for (index, (table, key, error)) in self.field_errors().enumerate() {
            let separator = if index == 0 { ": " } else { "; " };
            write!(f, "{separator}{table}[{key}].{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::{EntityValidationError, FieldError, ValidationErrors};

    #[test]
    fn display_lists_every_field_error() {
        let mut errors = ValidationErrors::default();
        errors.push(EntityValidationError {
            table: "artists",
            key: "7".to_string(),
            errors: vec![
                FieldError::new("name", "must not be empty"),
                FieldError::new("country", "must be two letters"),
            ],
        });

        assert_eq!(
            errors.to_string(),
            "validation failed for 1 entities: artists[7].name: must not be empty; artists[7].country: must be two letters"
        );
        assert_eq!(errors.field_errors().count(), 2);
    }
}
