use rpcguard_core::{AppError, AppResult};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Opens a connection pool without touching the schema.
pub async fn connect(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

/// Opens a connection pool and applies the embedded migrations.
pub async fn connect_and_migrate(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    let pool = connect(database_url, max_connections).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;
    info!("database migrations applied");

    Ok(pool)
}
