//! Embedded schema migrations.

use tracing::info;

use pharmahub_core::error::{AppError, ErrorKind};
use pharmahub_core::result::AppResult;

use crate::connection::DatabasePool;

/// Apply every migration under `migrations/` that has not run yet.
pub async fn run_migrations(db: &DatabasePool) -> AppResult<()> {
    sqlx::migrate!("../../migrations")
        .run(db.pool())
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, format!("Migration failed: {e}"), e)
        })?;

    info!("Notification schema is up to date");
    Ok(())
}
