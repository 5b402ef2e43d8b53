//! # DomainError
//!
//! Centralized error handling for the listing lifecycle ecosystem.
//! Maps store and data failures to actionable error types.

use thiserror::Error;

/// The primary error type for all domain and port operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Resource not found (e.g., Listing, User)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// A stored timestamp could not be converted to an instant
    #[error("malformed timestamp: {0}")]
    MalformedTimestamp(String),

    /// Request cannot be honoured in the current state (e.g., retention window over)
    #[error("validation error: {0}")]
    Validation(String),

    /// A stored document exists but cannot be decoded at all
    #[error("malformed data: {0}")]
    MalformedData(String),

    /// Infrastructure failure (e.g., DB down, Redis timeout)
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// An atomic read-modify-write could not commit
    #[error("transaction conflict: {0}")]
    TransactionConflict(String),
}

impl DomainError {
    pub fn not_found(kind: &str, id: impl Into<String>) -> Self {
        Self::NotFound(kind.to_string(), id.into())
    }

    pub fn store(message: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(message.to_string())
    }
}

/// A specialized Result type for lifecycle logic.
pub type Result<T> = std::result::Result<T, DomainError>;
