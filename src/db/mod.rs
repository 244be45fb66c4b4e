//! MySQL persistence layer

pub mod queries;
pub mod store;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use crate::model::DatabaseConfig;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection-level failure; the query layer retries these with a
    /// short backoff before giving up.
    #[error("store connection error: {0}")]
    Connection(#[from] sqlx::Error),

    /// A write that reached the database but failed. Terminal for the
    /// affected unit only.
    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Create the shared connection pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<MySqlPool, StoreError> {
    tracing::debug!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        "connecting to MySQL"
    );

    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(&config.connection_url())
        .await?;

    tracing::info!(host = %config.host, port = config.port, "MySQL connection established");

    Ok(pool)
}
