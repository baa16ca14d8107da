use crate::config::BackendSettings;

/// Shortest email local part that is checked for inside passwords
const MIN_CHECKED_LOCAL_PART: usize = 3;

/// Password policy applied on registration and password reset
///
/// Rules, checked in order:
/// 1. Length within `min_length..=max_length` characters
/// 2. Must not contain the local part of the account email
#[derive(Debug, Clone)]
pub struct PasswordValidator {
    min_length: usize,
    max_length: usize,
}

impl PasswordValidator {
    pub fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            min_length,
            max_length,
        }
    }

    pub fn from_settings(settings: &BackendSettings) -> Self {
        Self::new(settings.min_password_length(), settings.max_password_length())
    }

    /// Validate a password against all configured rules
    ///
    /// # Arguments
    /// * `password` - The password to validate
    /// * `email` - Account email, when known, for the local-part check
    pub fn validate(&self, password: &str, email: Option<&str>) -> Result<(), PasswordValidationError> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(PasswordValidationError::TooShort(self.min_length));
        }
        if length > self.max_length {
            return Err(PasswordValidationError::TooLong(self.max_length));
        }

        if let Some(local_part) = email.and_then(|e| e.trim().split('@').next()) {
            let local_part = local_part.to_lowercase();
            if local_part.chars().count() >= MIN_CHECKED_LOCAL_PART
                && password.to_lowercase().contains(&local_part)
            {
                return Err(PasswordValidationError::ContainsEmail);
            }
        }

        Ok(())
    }
}

/// Errors that can occur during password validation
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PasswordValidationError {
    /// Password is shorter than the minimum required length
    #[error("Password must be at least {0} characters")]
    TooShort(usize),

    /// Password exceeds the maximum allowed length
    #[error("Password must not exceed {0} characters")]
    TooLong(usize),

    /// Password contains the account's email name
    #[error("Password must not contain your email address")]
    ContainsEmail,
}
