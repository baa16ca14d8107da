use thiserror::Error;

use crate::errors::data::DataError;

/// Failure of a task mutation issued through the coordinator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Mutation attempted with no authenticated session
    #[error("No authenticated user")]
    Unauthenticated,

    #[error(transparent)]
    Data(#[from] DataError),
}
