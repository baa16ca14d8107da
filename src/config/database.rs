use sea_orm::{Database, DatabaseConnection};
use migration::{Migrator, MigratorTrait};

use crate::config::BackendSettings;
use crate::errors::InternalError;

/// Connect to the configured database and bring its schema up to date
pub async fn init_database(settings: &BackendSettings) -> Result<DatabaseConnection, InternalError> {
    let db = connect_database(settings.database_url()).await?;
    migrate_database(&db).await?;
    Ok(db)
}

/// Connect to the database without running migrations
pub async fn connect_database(database_url: &str) -> Result<DatabaseConnection, InternalError> {
    let db = Database::connect(database_url)
        .await
        .map_err(|e| InternalError::database("connect_database", e))?;

    tracing::debug!(database_url, "Connected to database");

    Ok(db)
}

/// Run all pending migrations on the given connection
pub async fn migrate_database(db: &DatabaseConnection) -> Result<(), InternalError> {
    Migrator::up(db, None)
        .await
        .map_err(|e| InternalError::database("run_migrations", e))?;

    tracing::debug!("Database migrations completed");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_database_in_memory() {
        let settings = BackendSettings::new("sqlite::memory:", "pepper-for-database-tests");
        let db = init_database(&settings).await.unwrap();

        // Migrations are idempotent
        migrate_database(&db).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_to_invalid_url_fails() {
        let result = connect_database("notadb://nowhere").await;
        assert!(matches!(result, Err(InternalError::Database { ref operation, .. }) if operation == "connect_database"));
    }
}
