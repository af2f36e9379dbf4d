use portal_core::{CoreError, StorageError};
use thiserror::Error;
use tonic::{Code, Status};

pub type Result<T> = std::result::Result<T, WriterError>;

#[derive(Debug, Clone, Error)]
pub enum WriterError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("link not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("storage operation failed: {0}")]
    Storage(
        #[from]
        #[source]
        StorageError,
    ),
}

impl From<CoreError> for WriterError {
    fn from(value: CoreError) -> Self {
        WriterError::InvalidArgument(value.to_string())
    }
}

impl From<WriterError> for Status {
    fn from(error: WriterError) -> Self {
        match error {
            WriterError::InvalidArgument(message) => Status::new(Code::InvalidArgument, message),
            WriterError::NotFound(message) => Status::new(Code::NotFound, message),
            WriterError::AlreadyExists(message) => Status::new(Code::AlreadyExists, message),
            WriterError::PermissionDenied(message) => {
                Status::new(Code::PermissionDenied, message)
            }
            WriterError::Storage(source) => Status::new(Code::Internal, source.to_string()),
        }
    }
}
