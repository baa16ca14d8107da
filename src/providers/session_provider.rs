use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::AuthError;
use crate::types::{Credentials, Session, UserId};

/// Infinite stream of session states, starting with the current one
pub type SessionStream = BoxStream<'static, Session>;

/// Authentication backend as seen by the rest of the application
///
/// Implementations own the session lifecycle. Every operation fails with a
/// classified [`AuthError`] instead of returning an empty result.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Session at the time of the call
    fn current_session(&self) -> Session;

    /// Stream of session transitions; yields the current session first
    fn observe_session(&self) -> SessionStream;

    /// Create an account and sign it in
    async fn register(&self, credentials: Credentials) -> Result<UserId, AuthError>;

    async fn login(&self, credentials: Credentials) -> Result<UserId, AuthError>;

    async fn logout(&self) -> Result<(), AuthError>;

    /// Start the password reset flow for the account registered under `email`
    async fn reset_password(&self, email: &str) -> Result<(), AuthError>;
}
