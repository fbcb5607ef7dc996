use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::info;

use crate::config::DbConfig;
use crate::error::{ConnectError, StorageError};

pub type DbPool = Pool<Postgres>;

pub const SERVICE_LOG_TABLE: &str = "servicios_registro";

/// Opens a small pool for one pipeline run. The load holds one connection for
/// its advisory lock and uses another for the writes.
pub async fn connect(config: &DbConfig) -> Result<DbPool, ConnectError> {
    let options = config.connect_options()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .map_err(StorageError::from)?;
    info!("database connection established");
    Ok(pool)
}

/// Creates `servicios_registro` when it does not exist yet.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), StorageError> {
    sqlx::query(
        r#"
            CREATE TABLE IF NOT EXISTS servicios_registro (
                c_id BIGINT PRIMARY KEY,
                id TEXT NOT NULL,
                servicios TEXT NOT NULL,
                asunto TEXT,
                tiempo_trabajado INTEGER NOT NULL DEFAULT 0,
                responsable TEXT,
                fecha TEXT NOT NULL,
                descripcion TEXT
            )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
