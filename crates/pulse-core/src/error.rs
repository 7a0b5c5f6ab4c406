//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone)]
pub enum DomainError {
    /// A configuration field is unusable.
    #[error("Invalid config {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// A reported duration is outside the allowed range.
    #[error("Active seconds out of range: {active_seconds} (ceiling {ceiling})")]
    OutOfRange { active_seconds: i64, ceiling: u32 },

    /// A required field is missing or empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
