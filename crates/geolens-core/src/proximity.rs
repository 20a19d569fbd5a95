//! Radius-bounded neighbor search.
//!
//! Two searches share the ranking rules:
//!
//! - [`ProximityEngine::nearby`]: same-layer entities within a radius of a
//!   feature's reference point (the point itself, or its true centroid).
//! - [`ProximityEngine::border_places`]: places within a radius of a
//!   state's boundary that lie outside the state.
//!
//! Results are unique by name, ascending by geodesic distance, and never
//! contain a zero or negative distance, whatever order or duplicates the
//! store hands back.

use std::collections::HashMap;

use geolens_types::{LayerType, ProximityHit};

use crate::config::SearchConfig;
use crate::error::CoreError;
use crate::keys::CacheKey;
use crate::read_through::{Backends, Resolved};
use crate::resolver::{FeatureResolver, reference_point, validate_name};
use crate::store::{RadiusQuery, RegionQuery};

/// Neighbor search over resolved features.
#[derive(Clone)]
pub struct ProximityEngine {
    backends: Backends,
    features: FeatureResolver,
    search: SearchConfig,
}

impl ProximityEngine {
    /// Create an engine resolving base features through `features`.
    pub const fn new(backends: Backends, features: FeatureResolver, search: SearchConfig) -> Self {
        Self {
            backends,
            features,
            search,
        }
    }

    /// Same-layer entities within `radius_km` (default from config) of
    /// `name`, nearest first. The entity itself is excluded.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] for a blank name or a radius that is
    ///   not positive, not finite, or above the configured maximum.
    /// - [`CoreError::NotFound`] when the base feature does not exist.
    /// - [`CoreError::InvalidGeometry`] when it has no usable geometry.
    /// - [`CoreError::Backend`] when the store fails.
    pub async fn nearby(
        &self,
        layer: LayerType,
        name: &str,
        year: Option<i32>,
        radius_km: Option<f64>,
    ) -> Result<Resolved<Vec<ProximityHit>>, CoreError> {
        let name = validate_name(name)?;
        let radius_km = self.radius(radius_km)?;
        let limit = self.search.max_results;
        let key = CacheKey::nearby(layer, &name, year, radius_km, limit);
        let engine = self.clone();
        self.backends
            .read_through(key, async move {
                let feature = engine.features.resolve_first(layer, &name, year).await?;
                let center = reference_point(&feature)?;
                let exclude_name = feature.name().unwrap_or(&name).to_owned();
                let query = RadiusQuery {
                    center,
                    layer,
                    radius_km,
                    exclude_name: Some(exclude_name),
                    limit,
                };
                let hits = engine
                    .backends
                    .query(
                        "find_within_radius",
                        layer,
                        &name,
                        engine.backends.store().find_within_radius(&query),
                    )
                    .await?;
                let ranked = rank(hits, query.exclude_name.as_deref(), limit);
                tracing::debug!(%layer, %name, radius_km, hits = ranked.len(), "nearby search finished");
                Ok(ranked)
            })
            .await
    }

    /// Places within `radius_km` of the boundary of `state` that do not
    /// intersect it, nearest first.
    ///
    /// # Errors
    ///
    /// Same as [`ProximityEngine::nearby`], with the state as base feature.
    pub async fn border_places(
        &self,
        state: &str,
        radius_km: Option<f64>,
    ) -> Result<Resolved<Vec<ProximityHit>>, CoreError> {
        let state = validate_name(state)?;
        let radius_km = self.radius(radius_km)?;
        let limit = self.search.border_max_results;
        let key = CacheKey::border(&state, radius_km, limit);
        let engine = self.clone();
        self.backends
            .read_through(key, async move {
                let feature = engine
                    .features
                    .resolve_first(LayerType::State, &state, None)
                    .await?;
                let Some(region) = feature.geometry else {
                    return Err(CoreError::InvalidGeometry(
                        geolens_types::GeometryError::Empty,
                    ));
                };
                let query = RegionQuery {
                    region,
                    layer: LayerType::Place,
                    radius_km,
                    limit,
                };
                let hits = engine
                    .backends
                    .query(
                        "find_near_region",
                        LayerType::State,
                        &state,
                        engine.backends.store().find_near_region(&query),
                    )
                    .await?;
                Ok(rank(hits, None, limit))
            })
            .await
    }

    fn radius(&self, radius_km: Option<f64>) -> Result<f64, CoreError> {
        let radius_km = radius_km.unwrap_or(self.search.default_radius_km);
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "distance must be a positive number of kilometers, got {radius_km}"
            )));
        }
        if radius_km > self.search.max_radius_km {
            return Err(CoreError::InvalidInput(format!(
                "distance must be at most {} km, got {radius_km}",
                self.search.max_radius_km
            )));
        }
        Ok(radius_km)
    }
}

/// Drop self and degenerate matches, keep the nearest hit per name, sort
/// nearest first (ties by name), and cap at `limit`.
fn rank(hits: Vec<ProximityHit>, exclude: Option<&str>, limit: usize) -> Vec<ProximityHit> {
    let mut nearest: HashMap<String, f64> = HashMap::with_capacity(hits.len());
    for hit in hits {
        if !(hit.distance_m.is_finite() && hit.distance_m > 0.0) {
            continue;
        }
        if exclude.is_some_and(|name| name.eq_ignore_ascii_case(&hit.name)) {
            continue;
        }
        nearest
            .entry(hit.name)
            .and_modify(|d| *d = d.min(hit.distance_m))
            .or_insert(hit.distance_m);
    }
    let mut ranked: Vec<ProximityHit> = nearest
        .into_iter()
        .map(|(name, distance_m)| ProximityHit { name, distance_m })
        .collect();
    ranked.sort_by(|a, b| {
        a.distance_m
            .total_cmp(&b.distance_m)
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use geolens_types::{
        FeatureCollection, GeoPoint, Geometry, GeometryError, TrendField, TrendPoint,
    };

    use super::*;
    use crate::cache::{CacheLayer, CacheOrigin, MemoryCache};
    use crate::error::StoreError;
    use crate::memory::{MemoryStore, StoredFeature};
    use crate::store::{FeatureQuery, SpatialStore};

    fn point(lon: f64, lat: f64) -> Geometry {
        Geometry::point(GeoPoint::new(lon, lat))
    }

    fn texas() -> Vec<StoredFeature> {
        vec![
            StoredFeature::new(LayerType::City, "Austin", point(-97.74, 30.27)),
            StoredFeature::new(LayerType::City, "Round Rock", point(-97.68, 30.51)),
            StoredFeature::new(LayerType::City, "San Marcos", point(-97.94, 29.88)),
            StoredFeature::new(LayerType::City, "Houston", point(-95.37, 29.76)),
            StoredFeature {
                geometry: None,
                ..StoredFeature::new(LayerType::City, "Ghost Town", point(0.0, 0.0))
            },
        ]
    }

    fn engine_over(store: Arc<dyn SpatialStore>, cache: CacheLayer) -> ProximityEngine {
        let backends = Backends::new(store, cache, Duration::from_secs(1));
        let features = FeatureResolver::new(backends.clone(), 50);
        ProximityEngine::new(backends, features, SearchConfig::default())
    }

    #[test]
    fn rank_dedupes_sorts_and_filters() {
        let hit = |name: &str, distance_m: f64| ProximityHit {
            name: name.to_owned(),
            distance_m,
        };
        let ranked = rank(
            vec![
                hit("b", 300.0),
                hit("a", 200.0),
                hit("b", 100.0),
                hit("self", 50.0),
                hit("zero", 0.0),
                hit("nan", f64::NAN),
                hit("c", 200.0),
            ],
            Some("SELF"),
            10,
        );
        let names: Vec<&str> = ranked.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert!((ranked[0].distance_m - 100.0).abs() < f64::EPSILON);
        assert_eq!(rank(ranked, None, 1).len(), 1);
    }

    #[tokio::test]
    async fn nearby_finds_neighbors_within_radius() {
        let store = Arc::new(MemoryStore::new(texas()));
        let engine = engine_over(store, CacheLayer::disabled());
        let result = engine
            .nearby(LayerType::City, "Austin", None, Some(50.0))
            .await
            .unwrap();
        let names: Vec<&str> = result.value.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Round Rock", "San Marcos"]);
        assert!(result.value.windows(2).all(|w| w[0].distance_m <= w[1].distance_m));
    }

    #[tokio::test]
    async fn nearby_is_cached_per_radius() {
        let store = Arc::new(MemoryStore::new(texas()));
        let cache = Arc::new(MemoryCache::new());
        let engine = engine_over(
            store.clone(),
            CacheLayer::new(cache.clone(), None, Duration::from_millis(50)),
        );

        let first = engine.nearby(LayerType::City, "Austin", None, Some(50.0)).await.unwrap();
        while cache.len().await < 2 {
            tokio::task::yield_now().await;
        }
        let again = engine.nearby(LayerType::City, "Austin", None, Some(50.0)).await.unwrap();
        assert_eq!(again.origin, CacheOrigin::Hit);
        assert_eq!(again.bytes, first.bytes);
        assert_eq!(store.call_counts().find_within_radius, 1);

        let wider = engine.nearby(LayerType::City, "Austin", None, Some(300.0)).await.unwrap();
        assert_eq!(wider.origin, CacheOrigin::Miss);
        assert!(wider.value.iter().any(|h| h.name == "Houston"));
        // The base feature came from the cache the second time.
        assert_eq!(store.call_counts().fetch_feature_collection, 1);
    }

    #[tokio::test]
    async fn nearby_rejects_bad_radius_before_the_store() {
        let store = Arc::new(MemoryStore::new(texas()));
        let engine = engine_over(store.clone(), CacheLayer::disabled());
        for radius in [0.0, -5.0, f64::NAN, f64::INFINITY, 501.0] {
            let err = engine
                .nearby(LayerType::City, "Austin", None, Some(radius))
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::InvalidInput(_)), "radius {radius}");
        }
        assert_eq!(store.call_counts().total(), 0);
    }

    #[tokio::test]
    async fn nearby_unknown_feature_is_not_found() {
        let store = Arc::new(MemoryStore::new(texas()));
        let engine = engine_over(store.clone(), CacheLayer::disabled());
        let err = engine
            .nearby(LayerType::City, "Atlantis", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert_eq!(store.call_counts().find_within_radius, 0);
    }

    #[tokio::test]
    async fn nearby_without_geometry_is_invalid_geometry() {
        let store = Arc::new(MemoryStore::new(texas()));
        let engine = engine_over(store, CacheLayer::disabled());
        let err = engine
            .nearby(LayerType::City, "Ghost Town", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidGeometry(GeometryError::Empty)));
    }

    /// Returns a fixed, unordered, duplicated hit list for every radius
    /// search.
    struct SloppyStore(MemoryStore);

    #[async_trait]
    impl SpatialStore for SloppyStore {
        async fn fetch_feature_collection(
            &self,
            query: &FeatureQuery,
        ) -> Result<FeatureCollection, StoreError> {
            self.0.fetch_feature_collection(query).await
        }

        async fn fetch_centroid(
            &self,
            layer: LayerType,
            name: &str,
        ) -> Result<Option<GeoPoint>, StoreError> {
            self.0.fetch_centroid(layer, name).await
        }

        async fn find_containing(
            &self,
            point: GeoPoint,
            layer: LayerType,
        ) -> Result<Vec<String>, StoreError> {
            self.0.find_containing(point, layer).await
        }

        async fn find_within_radius(
            &self,
            _query: &RadiusQuery,
        ) -> Result<Vec<ProximityHit>, StoreError> {
            Ok(vec![
                ProximityHit { name: String::from("Pflugerville"), distance_m: 9_000.0 },
                ProximityHit { name: String::from("Austin"), distance_m: 0.0 },
                ProximityHit { name: String::from("Round Rock"), distance_m: 27_000.0 },
                ProximityHit { name: String::from("Pflugerville"), distance_m: 8_000.0 },
            ])
        }

        async fn find_near_region(
            &self,
            query: &RegionQuery,
        ) -> Result<Vec<ProximityHit>, StoreError> {
            self.0.find_near_region(query).await
        }

        async fn find_by_full_name(
            &self,
            layer: LayerType,
            pattern: &str,
        ) -> Result<Vec<String>, StoreError> {
            self.0.find_by_full_name(layer, pattern).await
        }

        async fn fetch_trend(
            &self,
            layer: LayerType,
            name: &str,
            field: TrendField,
        ) -> Result<Vec<TrendPoint>, StoreError> {
            self.0.fetch_trend(layer, name, field).await
        }
    }

    #[tokio::test]
    async fn nearby_output_is_unique_and_ordered_whatever_the_store_returns() {
        let store = Arc::new(SloppyStore(MemoryStore::new(texas())));
        let engine = engine_over(store, CacheLayer::disabled());
        let hits = engine
            .nearby(LayerType::City, "Austin", None, None)
            .await
            .unwrap()
            .value;
        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Pflugerville", "Round Rock"]);
        assert!((hits[0].distance_m - 8_000.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn border_places_lie_outside_the_state() {
        let square = Geometry::Polygon(vec![vec![
            vec![-106.0, 26.0],
            vec![-95.0, 26.0],
            vec![-95.0, 36.0],
            vec![-106.0, 36.0],
            vec![-106.0, 26.0],
        ]]);
        let store = Arc::new(MemoryStore::new(vec![
            StoredFeature::new(LayerType::State, "Texas", square).with_abbreviation("TX"),
            StoredFeature::new(LayerType::Place, "Dallas", point(-96.8, 32.8)),
            StoredFeature::new(LayerType::Place, "Shreveport", point(-94.5, 32.5)),
            StoredFeature::new(LayerType::Place, "Memphis", point(-90.0, 35.1)),
        ]));
        let engine = engine_over(store, CacheLayer::disabled());
        let hits = engine.border_places("tx", Some(100.0)).await.unwrap().value;
        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Shreveport"]);
    }
}
