use thiserror::Error;

/// Errors raised while validating domain values.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid expiration date: {0}")]
    InvalidExpiration(String),
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Errors returned by link store backends.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// A conditional put found the key already taken.
    #[error("key already exists: {0}")]
    Conflict(String),
    /// A conditional update or replace found the key absent.
    #[error("key does not exist: {0}")]
    Missing(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage initialization failed: {0}")]
    Initialization(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}
