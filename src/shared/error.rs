//! Payload errors
//!
//! A `SharedError` means a mutation was refused before it reached the queue:
//! the payload itself is malformed, so retrying it can never succeed. Store
//! and transport failures live in `client::error`.
use thiserror::Error;

/// Mutation payload rejected by validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Validation error in field '{field}': {message}")]
    ValidationError { field: String, message: String },
}

impl SharedError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}
