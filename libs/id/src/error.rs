//! Error types for identifier parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The identifier string is empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The identifier contains characters outside `[\w\-\.]`.
    #[error("invalid {field} '{value}'")]
    InvalidIdentifier { field: &'static str, value: String },

    /// The job path does not have exactly four components.
    #[error("invalid path '{0}': expected CLUSTER/ROLE/ENV/NAME")]
    InvalidPath(String),

    /// The instance ID is not a non-negative integer.
    #[error("invalid instance ID '{0}'")]
    InvalidInstance(String),

    /// An instance range has its bounds reversed.
    #[error("invalid instance range {first}-{last}")]
    InvalidRange { first: u32, last: u32 },

    /// An instance range spans more instances than allowed.
    #[error("instance range {first}-{last} exceeds {max} instances")]
    RangeTooLarge { first: u32, last: u32, max: u32 },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty { .. })
    }

    /// Returns true if this error came from parsing a job path.
    pub fn is_path_error(&self) -> bool {
        matches!(
            self,
            IdError::InvalidPath(_) | IdError::InvalidIdentifier { .. } | IdError::Empty { .. }
        )
    }
}
