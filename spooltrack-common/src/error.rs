//! Common error types for Spooltrack

use thiserror::Error;

/// Common result type for Spooltrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared across the Spooltrack crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input (negative quantity, missing required field, ...)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Delete blocked by existing references
    #[error("Blocked by existing references: {0}")]
    ReferentialIntegrity(String),

    /// Transient network failure at the remote backup boundary
    #[error("Network error: {0}")]
    Network(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a retry at the backup boundary may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}
