use async_trait::async_trait;

use crate::errors::InternalError;
use crate::types::ResetToken;

/// Out-of-band delivery of password reset tokens (email, SMS, ...)
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn deliver(&self, email: &str, token: &ResetToken) -> Result<(), InternalError>;
}

/// Notifier used when no delivery channel is configured
///
/// Records the request in the log. The token itself is never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingResetNotifier;

#[async_trait]
impl ResetNotifier for LoggingResetNotifier {
    async fn deliver(&self, email: &str, token: &ResetToken) -> Result<(), InternalError> {
        tracing::info!(email, token = %token, "Password reset requested; no delivery channel configured");
        Ok(())
    }
}
