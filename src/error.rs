//! Error types for kvhash
//!
//! Provides a unified error type for all table and codec operations.

use thiserror::Error;

/// Result type alias using HashError
pub type Result<T> = std::result::Result<T, HashError>;

/// Unified error type for kvhash operations
#[derive(Debug, Error)]
pub enum HashError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Table Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    NotFound,

    #[error("Key already exists")]
    AlreadyExists,

    #[error("Operation not supported by {0} tables")]
    Unsupported(&'static str),

    #[error("Table is read-only")]
    ReadOnly,

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    #[error("Corrupt data: {0}")]
    Corrupt(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HashError {
    /// True for the two "expected" lookup outcomes callers routinely branch on.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HashError::NotFound)
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, HashError::AlreadyExists)
    }
}
