//! Store and cache construction from configuration.

use std::sync::Arc;

use geolens_core::config::{CacheBackendKind, CacheConfig, StoreBackendKind, StoreConfig};
use geolens_core::memory::MemoryStore;
use geolens_core::{CacheLayer, MemoryCache, SpatialStore};
use geolens_db::{DragonflyPool, PostgresPool};
use tracing::{info, warn};

use crate::error::GeolensError;

/// Build the configured spatial store.
///
/// # Errors
///
/// Returns [`GeolensError`] if `PostgreSQL` cannot be reached, a migration
/// fails, or the memory seed file cannot be loaded.
pub async fn build_store(config: &StoreConfig) -> Result<Arc<dyn SpatialStore>, GeolensError> {
    match config.backend {
        StoreBackendKind::Postgres => {
            let pool = PostgresPool::connect(config).await?;
            if config.run_migrations {
                pool.run_migrations().await?;
            }
            Ok(Arc::new(pool))
        }
        StoreBackendKind::Memory => {
            let store = match &config.seed_path {
                Some(path) => MemoryStore::from_geojson_file(path)?,
                None => {
                    warn!("Memory store has no seed file, every lookup will be not found");
                    MemoryStore::new(Vec::new())
                }
            };
            info!(rows = store.len(), "Memory store loaded");
            Ok(Arc::new(store))
        }
    }
}

/// Build the configured cache.
///
/// An unreachable `Dragonfly` at startup disables the cache rather than
/// failing startup; lookups then go straight to the store.
pub async fn build_cache(config: &CacheConfig) -> CacheLayer {
    match config.backend {
        CacheBackendKind::Disabled => {
            info!("Cache disabled by configuration");
            CacheLayer::disabled()
        }
        CacheBackendKind::Memory => {
            info!("Using in-process memory cache");
            CacheLayer::new(Arc::new(MemoryCache::new()), config.ttl(), config.op_timeout())
        }
        CacheBackendKind::Dragonfly => match DragonflyPool::connect(&config.dragonfly_url).await {
            Ok(pool) => CacheLayer::new(Arc::new(pool), config.ttl(), config.op_timeout()),
            Err(e) => {
                warn!(error = %e, "Dragonfly unreachable, running without cache");
                CacheLayer::disabled()
            }
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use geolens_core::GeoConfig;

    use super::*;

    #[tokio::test]
    async fn cache_kind_selects_layer() {
        let mut config = GeoConfig::default().cache;
        config.backend = CacheBackendKind::Disabled;
        assert!(!build_cache(&config).await.is_enabled());

        config.backend = CacheBackendKind::Memory;
        assert!(build_cache(&config).await.is_enabled());
    }

    #[tokio::test]
    async fn unseeded_memory_store_is_empty_but_healthy() {
        let mut config = GeoConfig::default().store;
        config.backend = StoreBackendKind::Memory;
        config.seed_path = None;
        let store = build_store(&config).await.unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn missing_seed_file_fails_startup() {
        let mut config = GeoConfig::default().store;
        config.backend = StoreBackendKind::Memory;
        config.seed_path = Some("does/not/exist.geojson".into());
        assert!(matches!(
            build_store(&config).await,
            Err(GeolensError::Store { .. })
        ));
    }
}
