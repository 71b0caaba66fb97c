use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;

/// Open a pool against the configured database. The handle is passed to the
/// store explicitly; nothing here is process-global.
pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;
    tracing::debug!(max_connections = config.max_connections, "database pool ready");
    Ok(db)
}
