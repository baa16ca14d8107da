// Errors layer - Error type definitions
pub mod auth;
pub mod data;
pub mod internal;
pub mod task;

// Re-exports for convenience
pub use auth::AuthError;
pub use data::DataError;
pub use internal::{CredentialError, InternalError};
pub use task::TaskError;
