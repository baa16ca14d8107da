use thiserror::Error;

use crate::errors::internal::InternalError;

/// Classified failure of a document operation on the tasks collection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// The active session may not read or write this record
    #[error("Permission denied")]
    PermissionDenied,

    /// No record with this id
    #[error("Task not found: {0}")]
    NotFound(String),

    /// Backend could not be reached or failed to answer
    #[error("Data service unavailable: {0}")]
    Unavailable(String),
}

impl From<InternalError> for DataError {
    fn from(error: InternalError) -> Self {
        DataError::Unavailable(error.to_string())
    }
}
