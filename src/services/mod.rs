// Services layer - Local auth and task backends
pub mod auth_service;
pub mod crypto;
pub mod password_validator;
pub mod reset_notifier;
pub mod task_service;

pub use auth_service::AuthService;
pub use password_validator::{PasswordValidationError, PasswordValidator};
pub use reset_notifier::{LoggingResetNotifier, ResetNotifier};
pub use task_service::TaskService;
