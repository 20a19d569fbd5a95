//! The composed lookup service.
//!
//! [`GeoService`] owns the store and cache handles and the resolvers built
//! over them. Its lifecycle is explicit: [`GeoService::init`] once before
//! serving, [`GeoService::shutdown`] once after.

use std::sync::Arc;

use geolens_types::HealthResponse;

use crate::cache::CacheLayer;
use crate::config::GeoConfig;
use crate::containment::ContainmentResolver;
use crate::error::StoreError;
use crate::proximity::ProximityEngine;
use crate::read_through::Backends;
use crate::resolver::FeatureResolver;
use crate::store::SpatialStore;
use crate::trend::TrendService;

/// Feature lookup, proximity, containment, and trends over one store and
/// one cache.
pub struct GeoService {
    backends: Backends,
    features: FeatureResolver,
    proximity: ProximityEngine,
    containment: ContainmentResolver,
    trends: TrendService,
    flush_on_start: bool,
}

impl GeoService {
    /// Compose the service from its backends. Limits and deadlines come
    /// from `config`.
    pub fn new(store: Arc<dyn SpatialStore>, cache: CacheLayer, config: &GeoConfig) -> Self {
        let backends = Backends::new(store, cache, config.store.query_timeout());
        let features = FeatureResolver::new(backends.clone(), config.search.max_features);
        let proximity =
            ProximityEngine::new(backends.clone(), features.clone(), config.search.clone());
        let containment = ContainmentResolver::new(backends.clone(), features.clone());
        let trends = TrendService::new(backends.clone());
        Self {
            backends,
            features,
            proximity,
            containment,
            trends,
            flush_on_start: config.cache.flush_on_start,
        }
    }

    /// Check the store and, if configured, flush the cache.
    ///
    /// A cache that cannot be flushed is logged and tolerated.
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] of a failed or timed-out store ping.
    pub async fn init(&self) -> Result<(), StoreError> {
        self.backends.ping_store().await?;
        tracing::info!("Spatial store reachable");

        let cache = self.backends.cache();
        if !cache.is_enabled() {
            tracing::info!("Cache disabled, every lookup goes to the store");
        } else if self.flush_on_start {
            if !cache.invalidate_all().await {
                tracing::warn!("Cache flush on start failed, continuing with existing entries");
            }
        } else if !cache.ping().await {
            tracing::warn!("Cache unreachable at startup, lookups will fall back to the store");
        }
        Ok(())
    }

    /// Release store and cache connections.
    pub async fn shutdown(&self) {
        self.backends.store().close().await;
        self.backends.cache().close().await;
        tracing::info!("Geo service shut down");
    }

    /// Store and cache reachability. The store decides the overall status.
    pub async fn health(&self) -> HealthResponse {
        let store = match self.backends.ping_store().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "store health check failed");
                false
            }
        };
        let cache = self.backends.cache().ping().await;
        HealthResponse {
            status: if store { "ok" } else { "degraded" }.to_owned(),
            store,
            cache,
        }
    }

    /// Feature lookup.
    pub const fn features(&self) -> &FeatureResolver {
        &self.features
    }

    /// Nearby and border search.
    pub const fn proximity(&self) -> &ProximityEngine {
        &self.proximity
    }

    /// Enclosing-region lookup.
    pub const fn containment(&self) -> &ContainmentResolver {
        &self.containment
    }

    /// Demographic trends.
    pub const fn trends(&self) -> &TrendService {
        &self.trends
    }

    /// Shared store and cache handles.
    pub const fn backends(&self) -> &Backends {
        &self.backends
    }
}
