//! Persistence layer: repository ports plus their Postgres adapters.

pub mod ports;
pub mod postgres;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::Result;

/// Builds the shared connection pool used by every Postgres repository.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Runs the embedded migrations against `pool`. Called once at startup.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| crate::error::FleetError::Fatal(format!("migration failed: {e}")))?;
    Ok(())
}
