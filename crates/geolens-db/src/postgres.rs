//! `PostgreSQL` (`PostGIS`) connection pool.
//!
//! `PostgreSQL` holds the authoritative `demographics` table: one row per
//! `(layer_type, name, year)` with a `geometry(Geometry, 4326)` column and
//! the demographic attribute columns. The table is written by the
//! ingestion pipeline; this crate only reads it.
//!
//! Pool sizing and the acquire deadline come from [`StoreConfig`]. Queries
//! are built at runtime and parameterized; they live in [`crate::spatial`].

use std::time::Duration;

use geolens_core::config::StoreConfig;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::error::DbError;

/// Pooled connections idle longer than this are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection pool handle to `PostgreSQL`.
///
/// Implements [`SpatialStore`](geolens_core::SpatialStore) (see
/// [`crate::spatial`]).
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Connect to `config.postgres_url` with the configured pool size and
    /// acquire deadline.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Postgres`] if the connection fails.
    pub async fn connect(config: &StoreConfig) -> Result<Self, DbError> {
        let options = connect_options(&config.postgres_url)?;
        let pool = pool_options(config).connect_with(options).await?;

        tracing::info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    /// Create the `demographics` table and its indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if any migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Return a reference to the underlying [`PgPool`].
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}

fn connect_options(url: &str) -> Result<PgConnectOptions, DbError> {
    url.parse()
        .map_err(|e: sqlx::Error| DbError::Config(format!("Invalid database URL: {e}")))
}

fn pool_options(config: &StoreConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout())
        .idle_timeout(IDLE_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_follows_store_config() {
        let config = StoreConfig {
            max_connections: 3,
            connect_timeout_ms: 750,
            ..StoreConfig::default()
        };
        let options = pool_options(&config);
        assert_eq!(options.get_max_connections(), 3);
        assert_eq!(options.get_acquire_timeout(), Duration::from_millis(750));
        assert_eq!(options.get_idle_timeout(), Some(IDLE_TIMEOUT));
    }

    #[test]
    fn unparseable_url_is_a_config_error() {
        assert!(matches!(connect_options("not a url"), Err(DbError::Config(_))));
        assert!(connect_options("postgresql://geolens@localhost:5432/geolens").is_ok());
    }
}
