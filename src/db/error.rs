//! Repository error taxonomy
//!
//! Input errors (`UnsupportedType`, `UnknownField`, `TypeMismatch`,
//! `InvalidOrderingField`) are raised by the query builders before any SQL
//! text is produced. `Backend` wraps whatever sqlx reports and is passed
//! through untouched. A missing entity is `Ok(None)`, never an error.

use thiserror::Error;

use super::query::TypeTag;

pub type Result<T> = std::result::Result<T, RepositoryError>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A value whose kind has no database type tag (null, float, array, object)
    #[error("Type not supported for field value: {kind}")]
    UnsupportedType { kind: &'static str },

    /// A filter or shape field the resource does not declare
    #[error("Field '{0}' not allowed.")]
    UnknownField(String),

    /// A declared field given a value of the wrong kind
    #[error("Field '{field}' expects {expected} but got {found}.")]
    TypeMismatch {
        field: String,
        expected: TypeTag,
        found: TypeTag,
    },

    /// An ordering token outside the resource's sortable fields
    #[error("Ordering field '{0}' not allowed.")]
    InvalidOrderingField(String),

    /// The password hashing primitive failed
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// Opaque failure reported by the database layer
    #[error(transparent)]
    Backend(#[from] sqlx::Error),
}

impl RepositoryError {
    /// True for errors caused by caller input rather than the backend
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RepositoryError::UnsupportedType { .. }
                | RepositoryError::UnknownField(_)
                | RepositoryError::TypeMismatch { .. }
                | RepositoryError::InvalidOrderingField(_)
        )
    }
}
