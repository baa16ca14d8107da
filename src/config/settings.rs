use std::fmt;
use std::str::FromStr;

use crate::config::errors::ConfigError;
use crate::config::EnvironmentProvider;

const DEFAULT_DATABASE_URL: &str = "sqlite://tasks.db?mode=rwc";
const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;
const MAX_PASSWORD_LENGTH: usize = 128;
const MIN_PEPPER_LENGTH: usize = 16;
const DEFAULT_RESET_TOKEN_TTL_MINUTES: i64 = 60;
const MAX_RESET_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;
const DEFAULT_TASK_FEED_CAPACITY: usize = 64;

/// Settings for the local auth and task backend
#[derive(Clone)]
pub struct BackendSettings {
    database_url: String,
    password_pepper: String,
    min_password_length: usize,
    reset_token_ttl_minutes: i64,
    task_feed_capacity: usize,
}

impl BackendSettings {
    /// Settings with defaults for everything except the database and pepper
    pub fn new(database_url: impl Into<String>, password_pepper: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            password_pepper: password_pepper.into(),
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            reset_token_ttl_minutes: DEFAULT_RESET_TOKEN_TTL_MINUTES,
            task_feed_capacity: DEFAULT_TASK_FEED_CAPACITY,
        }
    }

    /// Load settings from the given environment provider
    ///
    /// | Variable                  | Default                      | Rule            |
    /// |---------------------------|------------------------------|-----------------|
    /// | `DATABASE_URL`            | `sqlite://tasks.db?mode=rwc` | non-empty       |
    /// | `PASSWORD_PEPPER`         | (required)                   | >= 16 chars     |
    /// | `MIN_PASSWORD_LENGTH`     | `6`                          | 6..=128         |
    /// | `RESET_TOKEN_TTL_MINUTES` | `60`                         | 1..=525600      |
    /// | `TASK_FEED_CAPACITY`      | `64`                         | > 0             |
    pub fn from_env_provider(env: &dyn EnvironmentProvider) -> Result<Self, ConfigError> {
        let database_url = env
            .get_var("DATABASE_URL")
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        if database_url.trim().is_empty() {
            return Err(ConfigError::invalid("DATABASE_URL", "cannot be empty"));
        }

        let password_pepper = env
            .get_var("PASSWORD_PEPPER")
            .ok_or_else(|| ConfigError::missing("PASSWORD_PEPPER"))?;
        if password_pepper.len() < MIN_PEPPER_LENGTH {
            return Err(ConfigError::invalid(
                "PASSWORD_PEPPER",
                format!("must be at least {} characters long", MIN_PEPPER_LENGTH),
            ));
        }

        let min_password_length =
            parse_var(env, "MIN_PASSWORD_LENGTH", DEFAULT_MIN_PASSWORD_LENGTH)?;
        if !(DEFAULT_MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&min_password_length) {
            return Err(ConfigError::invalid(
                "MIN_PASSWORD_LENGTH",
                format!(
                    "must be between {} and {}",
                    DEFAULT_MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH
                ),
            ));
        }

        let reset_token_ttl_minutes =
            parse_var(env, "RESET_TOKEN_TTL_MINUTES", DEFAULT_RESET_TOKEN_TTL_MINUTES)?;
        if reset_token_ttl_minutes <= 0 {
            return Err(ConfigError::invalid("RESET_TOKEN_TTL_MINUTES", "must be positive"));
        }
        if reset_token_ttl_minutes > MAX_RESET_TOKEN_TTL_MINUTES {
            return Err(ConfigError::invalid(
                "RESET_TOKEN_TTL_MINUTES",
                format!("must be at most {} (one year)", MAX_RESET_TOKEN_TTL_MINUTES),
            ));
        }

        let task_feed_capacity = parse_var(env, "TASK_FEED_CAPACITY", DEFAULT_TASK_FEED_CAPACITY)?;
        if task_feed_capacity == 0 {
            return Err(ConfigError::invalid("TASK_FEED_CAPACITY", "must be positive"));
        }

        Ok(Self {
            database_url,
            password_pepper,
            min_password_length,
            reset_token_ttl_minutes,
            task_feed_capacity,
        })
    }

    /// Convenience method that uses the system environment provider
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_provider(&crate::config::SystemEnvironment)
    }

    pub fn with_min_password_length(mut self, min_password_length: usize) -> Self {
        self.min_password_length = min_password_length;
        self
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn password_pepper(&self) -> &str {
        &self.password_pepper
    }

    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }

    pub fn max_password_length(&self) -> usize {
        MAX_PASSWORD_LENGTH
    }

    pub fn reset_token_ttl_minutes(&self) -> i64 {
        self.reset_token_ttl_minutes
    }

    pub fn task_feed_capacity(&self) -> usize {
        self.task_feed_capacity
    }
}

fn parse_var<T: FromStr>(
    env: &dyn EnvironmentProvider,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match env.get_var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, format!("'{}' is not a valid number", raw))),
    }
}

impl fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSettings")
            .field("database_url", &self.database_url)
            .field("password_pepper", &"<redacted>")
            .field("min_password_length", &self.min_password_length)
            .field("reset_token_ttl_minutes", &self.reset_token_ttl_minutes)
            .field("task_feed_capacity", &self.task_feed_capacity)
            .finish()
    }
}
