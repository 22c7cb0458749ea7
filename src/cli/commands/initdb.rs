use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use model::entities::category;
use sea_orm::{ColumnTrait, Database, EntityTrait, PaginatorTrait, QueryFilter};
use std::path::Path;
use tracing::{debug, error, info, trace};

/// Directory that must exist before SQLite can create the database file.
fn sqlite_parent_dir(database_url: &str) -> Option<&Path> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next()?;
    if path.is_empty() || path.starts_with(':') {
        return None;
    }
    Path::new(path).parent().filter(|parent| !parent.as_os_str().is_empty())
}

/// Applies all pending migrations, which also seed the system categories.
pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");
    debug!("Database URL: {}", database_url);

    if let Some(parent) = sqlite_parent_dir(database_url) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let db = Database::connect(database_url).await.map_err(|e| {
        error!("Failed to connect to database '{}': {}", database_url, e);
        e
    })?;

    info!("Running database migrations");
    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run database migrations: {}", e);
        return Err(e.into());
    }

    let system_categories = category::Entity::find()
        .filter(category::Column::UserId.is_null())
        .count(&db)
        .await?;
    info!(
        "Database initialization completed successfully ({} system categories)",
        system_categories
    );
    Ok(())
}
