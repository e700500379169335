//! Error type for entity, field and registry operations.

use std::fmt;

/// Error type for entity operations
#[derive(Debug, Clone, PartialEq)]
pub enum EntityError {
    /// A value of the wrong kind was handed to a typed field.
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
    /// The value has the right kind but breaks a constraint of the field.
    ValidationError {
        field: String,
        reason: String,
    },
    /// The wire name is not part of the variant's field table.
    UnknownField(String),
    /// No variant is registered under the type name.
    UnknownType(String),
    /// A stored wire string cannot be decoded by the field's kind.
    DecodeFormat {
        field: String,
        value: String,
        reason: String,
    },
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::TypeMismatch { field, expected, actual } => {
                write!(f, "Field '{}' expected an instance of {} (got {} instead)", field, expected, actual)
            }
            EntityError::ValidationError { field, reason } => {
                write!(f, "Invalid value for field '{}': {}", field, reason)
            }
            EntityError::UnknownField(name) => write!(f, "No such field: '{}'", name),
            EntityError::UnknownType(name) => write!(
                f,
                "Error looking up entity type: '{}'. No entity variant has been registered \
                 with that type name or alias",
                name
            ),
            EntityError::DecodeFormat { field, value, reason } => {
                write!(f, "Cannot decode {:?} stored in field '{}': {}", value, field, reason)
            }
        }
    }
}

impl std::error::Error for EntityError {}
