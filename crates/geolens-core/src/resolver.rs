//! Feature lookup by layer and name.

use geolens_types::{Feature, FeatureCollection, GeoPoint, GeometryError, LayerType};

use crate::error::CoreError;
use crate::keys::CacheKey;
use crate::read_through::{Backends, Resolved};
use crate::store::FeatureQuery;

/// Answers "get the feature(s) for this layer and name", cache first.
#[derive(Clone)]
pub struct FeatureResolver {
    backends: Backends,
    max_features: usize,
}

impl FeatureResolver {
    /// Create a resolver returning at most `max_features` features.
    pub const fn new(backends: Backends, max_features: usize) -> Self {
        Self {
            backends,
            max_features,
        }
    }

    /// Resolve `name` on `layer`, optionally scoped to `year`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] for a blank name, before any cache or
    ///   store access.
    /// - [`CoreError::NotFound`] when the store has no match (not cached).
    /// - [`CoreError::Backend`] when the store fails or times out.
    pub async fn resolve(
        &self,
        layer: LayerType,
        name: &str,
        year: Option<i32>,
    ) -> Result<Resolved<FeatureCollection>, CoreError> {
        let name = validate_name(name)?;
        let key = CacheKey::feature(layer, &name, year);
        let backends = self.backends.clone();
        let query = FeatureQuery {
            layer,
            name,
            year,
            limit: self.max_features,
        };
        self.backends
            .read_through(key, async move {
                let collection = backends
                    .query(
                        "fetch_feature_collection",
                        layer,
                        &query.name,
                        backends.store().fetch_feature_collection(&query),
                    )
                    .await?;
                if collection.is_empty() {
                    tracing::info!(%layer, name = %query.name, year = ?query.year, "feature not found");
                    return Err(CoreError::not_found(layer, &query.name));
                }
                Ok(collection)
            })
            .await
    }

    /// Resolve and return the authoritative (first) feature.
    ///
    /// # Errors
    ///
    /// Same as [`FeatureResolver::resolve`].
    pub async fn resolve_first(
        &self,
        layer: LayerType,
        name: &str,
        year: Option<i32>,
    ) -> Result<Feature, CoreError> {
        let resolved = self.resolve(layer, name, year).await?;
        resolved
            .value
            .features
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::not_found(layer, name))
    }
}

/// Trim `name` and reject it when blank.
pub(crate) fn validate_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput(String::from("name must not be empty")));
    }
    Ok(trimmed.to_owned())
}

/// The point a feature is searched around: the point itself, or the true
/// centroid of a polygon.
///
/// # Errors
///
/// Returns [`CoreError::InvalidGeometry`] when the feature has no geometry
/// or its geometry yields no centroid.
pub fn reference_point(feature: &Feature) -> Result<GeoPoint, CoreError> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or(CoreError::InvalidGeometry(GeometryError::Empty))?;
    let point = geometry.centroid()?;
    if !point.is_valid() {
        return Err(CoreError::InvalidGeometry(GeometryError::Malformed(format!(
            "reference point ({}, {}) is out of range",
            point.lon, point.lat
        ))));
    }
    Ok(point)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use geolens_types::{Geometry, Properties};

    use super::*;
    use crate::cache::{CacheLayer, CacheOrigin, MemoryCache};
    use crate::memory::{MemoryStore, StoredFeature};

    fn setup() -> (FeatureResolver, Arc<MemoryStore>, Arc<MemoryCache>) {
        let store = Arc::new(MemoryStore::new(vec![
            StoredFeature::new(
                LayerType::City,
                "Austin",
                Geometry::point(GeoPoint::new(-97.74, 30.27)),
            )
            .with_year(2023),
        ]));
        let cache = Arc::new(MemoryCache::new());
        let backends = Backends::new(
            store.clone(),
            CacheLayer::new(cache.clone(), Some(Duration::from_secs(60)), Duration::from_millis(50)),
            Duration::from_secs(1),
        );
        (FeatureResolver::new(backends, 50), store, cache)
    }

    async fn settle(cache: &MemoryCache) {
        while cache.is_empty().await {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let (resolver, store, cache) = setup();

        let miss = resolver.resolve(LayerType::City, "Austin", None).await.unwrap();
        assert_eq!(miss.origin, CacheOrigin::Miss);
        assert_eq!(miss.value.len(), 1);
        settle(&cache).await;

        let hit = resolver.resolve(LayerType::City, "austin ", None).await.unwrap();
        assert_eq!(hit.origin, CacheOrigin::Hit);
        assert_eq!(hit.bytes, miss.bytes);
        assert_eq!(store.call_counts().fetch_feature_collection, 1);
    }

    #[tokio::test]
    async fn not_found_is_never_cached() {
        let (resolver, store, cache) = setup();
        for _ in 0..2 {
            let err = resolver
                .resolve(LayerType::City, "Atlantis", None)
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::NotFound { .. }));
        }
        tokio::task::yield_now().await;
        assert!(cache.is_empty().await);
        assert_eq!(store.call_counts().fetch_feature_collection, 2);
    }

    #[tokio::test]
    async fn blank_name_is_rejected_before_the_store() {
        let (resolver, store, _) = setup();
        let err = resolver.resolve(LayerType::City, "  ", None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert_eq!(store.call_counts().total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_store_query() {
        let store = Arc::new(
            MemoryStore::new(vec![StoredFeature::new(
                LayerType::City,
                "Austin",
                Geometry::point(GeoPoint::new(-97.74, 30.27)),
            )])
            .with_latency(Duration::from_millis(20)),
        );
        let backends = Backends::new(
            store.clone(),
            CacheLayer::disabled(),
            Duration::from_secs(1),
        );
        let resolver = FeatureResolver::new(backends, 50);

        let (a, b, c) = tokio::join!(
            resolver.resolve(LayerType::City, "Austin", None),
            resolver.resolve(LayerType::City, "Austin", None),
            resolver.resolve(LayerType::City, "AUSTIN", None),
        );
        assert_eq!(a.unwrap().bytes, b.unwrap().bytes);
        assert!(c.is_ok());
        assert_eq!(store.call_counts().fetch_feature_collection, 1);
    }

    #[test]
    fn reference_point_uses_true_centroid() {
        // An L-shape whose first vertex is far from its centroid.
        let polygon = Geometry::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![4.0, 0.0],
            vec![4.0, 1.0],
            vec![1.0, 1.0],
            vec![1.0, 4.0],
            vec![0.0, 4.0],
            vec![0.0, 0.0],
        ]]);
        let feature = Feature::new(Some(polygon), Properties::new());
        let point = reference_point(&feature).unwrap();
        assert!(point.lon > 0.5 && point.lon < 2.0);
        assert!(point.lat > 0.5 && point.lat < 2.0);
        assert!((point.lon - point.lat).abs() < 1e-9);
    }

    #[test]
    fn missing_geometry_is_invalid_geometry() {
        let feature = Feature::new(None, Properties::new());
        assert!(matches!(
            reference_point(&feature),
            Err(CoreError::InvalidGeometry(GeometryError::Empty))
        ));
    }
}
