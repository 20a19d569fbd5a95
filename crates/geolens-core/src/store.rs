//! Spatial store contract.
//!
//! [`SpatialStore`] abstracts the spatial database behind the handful of
//! query intents the engine needs. Containment and radius search are two
//! separate primitives: containment is an exact boolean predicate, radius
//! search is a ranked, capped top-K.
//!
//! Implementations:
//!
//! - `geolens_db::PostgresPool` -- PostGIS
//! - [`MemoryStore`](crate::memory::MemoryStore) -- in-process, for tests
//!   and local development

use async_trait::async_trait;
use geolens_types::{
    FeatureCollection, GeoPoint, Geometry, LayerType, ProximityHit, TrendField, TrendPoint,
};

use crate::error::StoreError;

/// Parameters of a feature lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureQuery {
    /// Layer to search.
    pub layer: LayerType,
    /// Case-insensitive substring of the entity name. State lookups also
    /// match the postal abbreviation exactly.
    pub name: String,
    /// Attribute year. `None` selects the latest row per entity.
    pub year: Option<i32>,
    /// Maximum number of features to return.
    pub limit: usize,
}

/// Parameters of a radius search.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusQuery {
    /// Search origin.
    pub center: GeoPoint,
    /// Layer of the candidates.
    pub layer: LayerType,
    /// Search radius in kilometers.
    pub radius_km: f64,
    /// Candidate name to leave out (the entity searched around).
    pub exclude_name: Option<String>,
    /// Maximum number of hits.
    pub limit: usize,
}

/// Parameters of a search for features near, but outside, a region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionQuery {
    /// Region boundary.
    pub region: Geometry,
    /// Layer of the candidates.
    pub layer: LayerType,
    /// Maximum distance from the region boundary in kilometers.
    pub radius_km: f64,
    /// Maximum number of hits.
    pub limit: usize,
}

/// Query intents against the spatial database.
///
/// Every method is a read. Implementations must be safe to call from many
/// tasks at once.
#[async_trait]
pub trait SpatialStore: Send + Sync {
    /// Features of `query.layer` whose name contains `query.name`,
    /// case-insensitively. Exact name matches come first. Returns an empty
    /// collection when nothing matches.
    async fn fetch_feature_collection(
        &self,
        query: &FeatureQuery,
    ) -> Result<FeatureCollection, StoreError>;

    /// Centroid of the best name match, or `None` when nothing matches.
    async fn fetch_centroid(
        &self,
        layer: LayerType,
        name: &str,
    ) -> Result<Option<GeoPoint>, StoreError>;

    /// Names of `layer` features whose geometry contains `point`, sorted,
    /// without repeats.
    async fn find_containing(
        &self,
        point: GeoPoint,
        layer: LayerType,
    ) -> Result<Vec<String>, StoreError>;

    /// Features of `query.layer` within `query.radius_km` of
    /// `query.center` by geodesic distance, nearest first. Self matches
    /// and zero-distance matches are excluded.
    async fn find_within_radius(&self, query: &RadiusQuery)
    -> Result<Vec<ProximityHit>, StoreError>;

    /// Features of `query.layer` within `query.radius_km` of the region
    /// boundary that do not intersect the region, nearest first.
    async fn find_near_region(&self, query: &RegionQuery)
    -> Result<Vec<ProximityHit>, StoreError>;

    /// Names of `layer` features whose full name contains `pattern`,
    /// case-insensitively, sorted, without repeats.
    async fn find_by_full_name(
        &self,
        layer: LayerType,
        pattern: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Year-scoped values of `field` for the best name match, ascending
    /// by year. Empty when nothing matches.
    async fn fetch_trend(
        &self,
        layer: LayerType,
        name: &str,
        field: TrendField,
    ) -> Result<Vec<TrendPoint>, StoreError>;

    /// Check connectivity.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Release connections. Called once from
    /// [`GeoService::shutdown`](crate::service::GeoService::shutdown).
    async fn close(&self) {}
}
