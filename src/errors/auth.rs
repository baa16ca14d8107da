use thiserror::Error;

use crate::errors::internal::{CredentialError, InternalError};

/// Classified failure of an authentication operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// An account already exists for this email
    #[error("Email address is already in use")]
    EmailAlreadyInUse,

    /// Password rejected by the password policy
    #[error("Password is too weak: {0}")]
    WeakPassword(String),

    /// Email address is not syntactically valid
    #[error("Invalid email address")]
    InvalidEmail,

    /// No account exists for this email
    #[error("No account exists for this email address")]
    UserNotFound,

    /// Reset token unknown or already used
    #[error("Invalid password reset token")]
    InvalidResetToken,

    /// Reset token past its expiry
    #[error("Password reset token has expired")]
    ExpiredResetToken,

    /// Backend could not be reached or failed to answer
    #[error("Authentication service unavailable: {0}")]
    Unavailable(String),

    /// Unexpected failure inside the backend
    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::EmailAlreadyInUse => "email_already_in_use",
            AuthError::WeakPassword(_) => "weak_password",
            AuthError::InvalidEmail => "invalid_email",
            AuthError::UserNotFound => "user_not_found",
            AuthError::InvalidResetToken => "invalid_reset_token",
            AuthError::ExpiredResetToken => "expired_reset_token",
            AuthError::Unavailable(_) => "unavailable",
            AuthError::Internal(_) => "internal_error",
        }
    }
}

impl From<InternalError> for AuthError {
    fn from(error: InternalError) -> Self {
        match error {
            InternalError::Credential(e) => e.into(),
            InternalError::Database { .. } | InternalError::Transaction { .. } => {
                AuthError::Unavailable(error.to_string())
            }
            InternalError::Delivery { .. } => AuthError::Unavailable(error.to_string()),
            InternalError::Parse { .. } | InternalError::Crypto { .. } => {
                AuthError::Internal(error.to_string())
            }
        }
    }
}

impl From<CredentialError> for AuthError {
    fn from(error: CredentialError) -> Self {
        match error {
            CredentialError::InvalidCredentials => AuthError::InvalidCredentials,
            CredentialError::DuplicateEmail(_) => AuthError::EmailAlreadyInUse,
            CredentialError::UserNotFound(_) => AuthError::UserNotFound,
            CredentialError::InvalidResetToken => AuthError::InvalidResetToken,
            CredentialError::ExpiredResetToken => AuthError::ExpiredResetToken,
        }
    }
}
