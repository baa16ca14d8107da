use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::StreamExt;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::errors::{AuthError, InternalError};
use crate::providers::{SessionProvider, SessionStream};
use crate::services::crypto::{generate_reset_token, sha256_hex};
use crate::services::{PasswordValidator, ResetNotifier};
use crate::stores::{normalize_email, CredentialStore};
use crate::types::{Credentials, ResetToken, Session, UserId};

/// Local email/password authentication backend
///
/// Holds the current [`Session`] in a watch channel. Registration and login sign
/// the account in; logout returns to `Anonymous`. Every observer of
/// [`SessionProvider::observe_session`] sees the current session first and then
/// each later transition.
pub struct AuthService {
    credential_store: Arc<CredentialStore>,
    password_validator: PasswordValidator,
    reset_notifier: Arc<dyn ResetNotifier>,
    reset_token_ttl_minutes: i64,
    session: watch::Sender<Session>,
}

impl AuthService {
    pub fn new(
        credential_store: Arc<CredentialStore>,
        password_validator: PasswordValidator,
        reset_notifier: Arc<dyn ResetNotifier>,
        reset_token_ttl_minutes: i64,
    ) -> Self {
        let (session, _) = watch::channel(Session::Anonymous);
        Self {
            credential_store,
            password_validator,
            reset_notifier,
            reset_token_ttl_minutes,
            session,
        }
    }

    fn set_session(&self, next: Session) {
        let changed = self.session.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });

        if changed {
            tracing::info!(session = %next, "Session changed");
        }
    }

    /// Unix timestamp at which a token issued now expires
    fn reset_token_expiry(&self) -> Result<i64, AuthError> {
        Duration::try_minutes(self.reset_token_ttl_minutes)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .map(|expires_at| expires_at.timestamp())
            .ok_or_else(|| {
                InternalError::parse(
                    "reset_token_ttl",
                    format!("{} minutes is out of range", self.reset_token_ttl_minutes),
                )
                .into()
            })
    }

    /// Complete a password reset started by [`SessionProvider::reset_password`]
    ///
    /// The token is consumed even when the new password is stored successfully,
    /// so it cannot be replayed. The session is left untouched.
    pub async fn confirm_password_reset(
        &self,
        token: &ResetToken,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.password_validator
            .validate(new_password, None)
            .map_err(|e| AuthError::WeakPassword(e.to_string()))?;

        let user_id = self
            .credential_store
            .consume_reset_token(&sha256_hex(token.as_str()))
            .await?;

        self.credential_store.update_password(&user_id, new_password).await?;
        self.credential_store.revoke_reset_tokens(&user_id).await?;

        tracing::info!(user_id = %user_id, "Password reset completed");

        Ok(())
    }
}

#[async_trait]
impl SessionProvider for AuthService {
    fn current_session(&self) -> Session {
        self.session.borrow().clone()
    }

    fn observe_session(&self) -> SessionStream {
        WatchStream::new(self.session.subscribe()).boxed()
    }

    async fn register(&self, credentials: Credentials) -> Result<UserId, AuthError> {
        let email = normalize_email(&credentials.email);
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }

        self.password_validator
            .validate(&credentials.password, Some(&email))
            .map_err(|e| AuthError::WeakPassword(e.to_string()))?;

        let user_id = self
            .credential_store
            .add_user(&email, &credentials.password)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Registration failed"))?;

        tracing::info!(user_id = %user_id, "User registered");
        self.set_session(Session::Authenticated(user_id.clone()));

        Ok(user_id)
    }

    async fn login(&self, credentials: Credentials) -> Result<UserId, AuthError> {
        let user_id = self
            .credential_store
            .verify_credentials(&credentials.email, &credentials.password)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;

        self.set_session(Session::Authenticated(user_id.clone()));

        Ok(user_id)
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.set_session(Session::Anonymous);
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }

        let user_id = self
            .credential_store
            .find_user_id_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = generate_reset_token();
        let expires_at = self.reset_token_expiry()?;
        self.credential_store
            .store_reset_token(sha256_hex(token.as_str()), &user_id, expires_at)
            .await?;

        self.reset_notifier.deliver(&email, &token).await?;

        tracing::info!(user_id = %user_id, "Password reset token issued");

        Ok(())
    }
}

/// Syntactic email check equivalent to a typical form validator
///
/// One `@`, a non-empty local part, and a domain of non-empty dot-separated labels.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.split('.').all(|label| !label.is_empty())
}
