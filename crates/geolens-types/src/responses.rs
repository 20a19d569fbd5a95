//! Derived query results and the JSON bodies the HTTP API returns.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One neighbor found by a radius or border search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ProximityHit {
    /// Display name of the neighbor.
    pub name: String,
    /// Geodesic distance in meters. Always positive.
    pub distance_m: f64,
}

/// One year of a demographic trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrendPoint {
    /// Survey year.
    pub year: i32,
    /// The field value for that year; `None` when suppressed.
    pub value: Option<f64>,
}

/// Body of `GET /geojson/nearby_cities/{layer}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NearbyResponse {
    /// Neighbor names, nearest first, without repeats.
    pub cities: Vec<String>,
}

/// Body of `GET /geojson/msas/{layer_type}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RegionsResponse {
    /// Enclosing region names, sorted, without repeats.
    pub regions: Vec<String>,
}

/// Body of `GET /geojson/border_places/{state}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BorderPlacesResponse {
    /// Places outside the state, nearest first.
    pub places: Vec<ProximityHit>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HealthResponse {
    /// `ok` when the store answers, `degraded` otherwise.
    pub status: String,
    /// Whether the spatial store answered a ping.
    pub store: bool,
    /// Whether the cache answered a ping.
    pub cache: bool,
}
