use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::{init_database, BackendSettings};
use crate::coordinators::TaskCoordinator;
use crate::errors::InternalError;
use crate::services::{AuthService, LoggingResetNotifier, PasswordValidator, ResetNotifier, TaskService};
use crate::stores::{CredentialStore, TaskStore};

/// Centralized application data following the main-owned stores pattern
///
/// Everything is created once and shared through `Arc`s. The coordinator is
/// started separately so callers decide when the driver task begins.
///
/// # Architecture
///
/// ```text
/// AppData::init(settings)
///   ↓ creates once
///   ├─ db (DatabaseConnection)
///   ├─ credential_store (Arc<CredentialStore>)
///   ├─ auth (Arc<AuthService>)      session provider
///   └─ tasks (Arc<TaskService>)     task provider, reads the session from `auth`
///   ↓
///   └─ task_coordinator() → TaskCoordinator::start(auth, tasks)
/// ```
pub struct AppData {
    pub db: DatabaseConnection,
    pub settings: BackendSettings,
    pub credential_store: Arc<CredentialStore>,
    pub auth: Arc<AuthService>,
    pub tasks: Arc<TaskService>,
}

impl AppData {
    /// Connect, migrate and wire the local backends with a logging reset notifier
    ///
    /// # Errors
    ///
    /// Returns `InternalError` when the database cannot be opened or migrated
    pub async fn init(settings: BackendSettings) -> Result<Self, InternalError> {
        tracing::info!("Initializing AppData...");

        let db = init_database(&settings).await?;
        let app_data = Self::from_connection(db, settings, Arc::new(LoggingResetNotifier));

        tracing::info!("AppData initialization complete");
        Ok(app_data)
    }

    /// Wire the backends over an already migrated connection
    pub fn from_connection(
        db: DatabaseConnection,
        settings: BackendSettings,
        reset_notifier: Arc<dyn ResetNotifier>,
    ) -> Self {
        let credential_store = Arc::new(CredentialStore::new(
            db.clone(),
            settings.password_pepper().to_string(),
        ));

        let auth = Arc::new(AuthService::new(
            credential_store.clone(),
            PasswordValidator::from_settings(&settings),
            reset_notifier,
            settings.reset_token_ttl_minutes(),
        ));

        let tasks = Arc::new(TaskService::new(
            TaskStore::new(db.clone()),
            auth.clone(),
            settings.task_feed_capacity(),
        ));

        tracing::debug!("Backends wired");

        Self {
            db,
            settings,
            credential_store,
            auth,
            tasks,
        }
    }

    /// Start a coordinator bound to this backend's session and tasks
    ///
    /// Must be called from within a Tokio runtime.
    pub fn task_coordinator(&self) -> TaskCoordinator {
        TaskCoordinator::start_with_capacity(
            self.auth.clone(),
            self.tasks.clone(),
            self.settings.task_feed_capacity(),
        )
    }
}
