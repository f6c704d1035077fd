//! PostgreSQL connection pool handling.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use genocat_core::config::DatabaseConfig;
use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;

/// A configured PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Connect to the metadata store.
    pub async fn connect(config: &DatabaseConfig) -> CatalogResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                CatalogError::with_source(
                    genocat_core::error::ErrorKind::Database,
                    format!("Failed to connect to the metadata store: {e}"),
                    e,
                )
            })?;
        Ok(Self { pool })
    }

    /// Borrow the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Consume the wrapper and return the pool.
    pub fn into_pool(self) -> PgPool {
        self.pool
    }
}
