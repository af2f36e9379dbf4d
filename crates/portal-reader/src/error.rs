use portal_core::{CoreError, StorageError};
use thiserror::Error;
use tonic::{Code, Status};

pub type Result<T> = std::result::Result<T, ReaderError>;

#[derive(Debug, Clone, Error)]
pub enum ReaderError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("link not found")]
    NotFound,
    #[error("link has expired")]
    Expired,
    #[error("storage operation failed: {0}")]
    Storage(
        #[from]
        #[source]
        StorageError,
    ),
}

impl From<CoreError> for ReaderError {
    fn from(value: CoreError) -> Self {
        ReaderError::InvalidArgument(value.to_string())
    }
}

impl From<ReaderError> for Status {
    fn from(error: ReaderError) -> Self {
        match error {
            ReaderError::InvalidArgument(message) => Status::new(Code::InvalidArgument, message),
            ReaderError::NotFound => Status::new(Code::NotFound, "link not found"),
            ReaderError::Expired => Status::new(Code::FailedPrecondition, "link has expired"),
            ReaderError::Storage(source) => Status::new(Code::Internal, source.to_string()),
        }
    }
}
