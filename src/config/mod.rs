mod database;
mod env_provider;
mod errors;
mod logging;
mod settings;

pub use database::{connect_database, init_database, migrate_database};
pub use env_provider::{EnvironmentProvider, SystemEnvironment};
#[cfg(test)]
pub use env_provider::MockEnvironment;
pub use errors::ConfigError;
pub use logging::{init_logging, init_logging_with, LoggingConfig, LoggingError};
pub use settings::BackendSettings;
