//! REST API endpoint handlers.
//!
//! Every handler parses its path and query before calling the engine, so a
//! malformed layer, field, year, or distance is rejected with 400 before any
//! cache or store access.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/geojson/{layer_type}/{name}` | Boundary `FeatureCollection` |
//! | `GET` | `/geojson/nearby_cities/{layer_type}/{name}` | Same-layer neighbors |
//! | `GET` | `/geojson/border_places/{state}` | Places just outside a state |
//! | `GET` | `/geojson/msas/{layer_type}/{name}` | Enclosing regions |
//! | `GET` | `/demographics/trend/{layer_type}/{name}` | Field values by year |
//! | `GET` | `/health` | Store and cache reachability |

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use geolens_types::{
    BorderPlacesResponse, LayerType, NearbyResponse, RegionsResponse, TrendField, TrendPoint,
};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the feature and region lookups.
///
/// Values are taken as text and parsed by the handler so that a malformed
/// value gets the JSON error body.
#[derive(Debug, Default, serde::Deserialize)]
pub struct YearQuery {
    /// Attribute year (`yyyy`). Latest when absent.
    pub year: Option<String>,
}

/// Query parameters for the proximity searches.
#[derive(Debug, Default, serde::Deserialize)]
pub struct DistanceQuery {
    /// Search radius in kilometers. Configured default when absent.
    pub distance: Option<String>,
    /// Attribute year of the base feature.
    pub year: Option<String>,
}

/// Query parameters for `GET /demographics/trend/...`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct TrendQuery {
    /// One of the allowlisted demographic fields.
    pub field: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_layer(raw: &str) -> Result<LayerType, ApiError> {
    LayerType::from_str(raw).map_err(|e| ApiError::InvalidQuery(e.to_string()))
}

fn parse_year(raw: Option<&str>) -> Result<Option<i32>, ApiError> {
    raw.map(|y| {
        y.trim()
            .parse::<i32>()
            .map_err(|e| ApiError::InvalidQuery(format!("year {y:?} is not a year: {e}")))
    })
    .transpose()
}

fn parse_distance(raw: Option<&str>) -> Result<Option<f64>, ApiError> {
    raw.map(|d| {
        d.trim()
            .parse::<f64>()
            .map_err(|e| ApiError::InvalidQuery(format!("distance {d:?} is not a number: {e}")))
    })
    .transpose()
}

fn parse_field(raw: Option<&str>) -> Result<TrendField, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::InvalidQuery(String::from("field is required")))?;
    TrendField::from_str(raw).map_err(|e| ApiError::InvalidQuery(e.to_string()))
}

/// Render trend points as `{"year": y, "<field>": v}` objects.
fn trend_rows(field: TrendField, points: &[TrendPoint]) -> Vec<Value> {
    points
        .iter()
        .map(|point| {
            let mut row = Map::new();
            row.insert(String::from("year"), Value::from(point.year));
            row.insert(
                field.as_str().to_owned(),
                point.value.map_or(Value::Null, Value::from),
            );
            Value::Object(row)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// GET /geojson/{layer_type}/{name}
// ---------------------------------------------------------------------------

/// Return the boundary `FeatureCollection` for `name`.
///
/// The body is the serialized payload exactly as cached.
pub async fn get_feature_collection(
    State(state): State<Arc<AppState>>,
    Path((layer, name)): Path<(String, String)>,
    Query(params): Query<YearQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let layer = parse_layer(&layer)?;
    let year = parse_year(params.year.as_deref())?;

    let resolved = state.service.features().resolve(layer, &name, year).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], resolved.bytes))
}

// ---------------------------------------------------------------------------
// GET /geojson/nearby_cities/{layer_type}/{name}
// ---------------------------------------------------------------------------

/// Return the names of same-layer entities near `name`, nearest first.
///
/// # Query Parameters
///
/// - `distance`: radius in kilometers (default from config)
/// - `year`: attribute year of the base feature
pub async fn get_nearby(
    State(state): State<Arc<AppState>>,
    Path((layer, name)): Path<(String, String)>,
    Query(params): Query<DistanceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let layer = parse_layer(&layer)?;
    let radius_km = parse_distance(params.distance.as_deref())?;
    let year = parse_year(params.year.as_deref())?;

    let resolved = state
        .service
        .proximity()
        .nearby(layer, &name, year, radius_km)
        .await?;
    Ok(Json(NearbyResponse {
        cities: resolved.value.into_iter().map(|hit| hit.name).collect(),
    }))
}

// ---------------------------------------------------------------------------
// GET /geojson/border_places/{state}
// ---------------------------------------------------------------------------

/// Return places within `distance` of the state boundary that lie
/// outside the state.
pub async fn get_border_places(
    State(state): State<Arc<AppState>>,
    Path(state_name): Path<String>,
    Query(params): Query<DistanceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let radius_km = parse_distance(params.distance.as_deref())?;

    let resolved = state
        .service
        .proximity()
        .border_places(&state_name, radius_km)
        .await?;
    Ok(Json(BorderPlacesResponse {
        places: resolved.value,
    }))
}

// ---------------------------------------------------------------------------
// GET /geojson/msas/{layer_type}/{name}
// ---------------------------------------------------------------------------

/// Return the regions enclosing `name`: counties for a city or place,
/// MSAs for a county, the state's counties for a state.
pub async fn get_regions(
    State(state): State<Arc<AppState>>,
    Path((layer, name)): Path<(String, String)>,
    Query(params): Query<YearQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let layer = parse_layer(&layer)?;
    let year = parse_year(params.year.as_deref())?;

    let resolved = state
        .service
        .containment()
        .regions(layer, &name, year)
        .await?;
    Ok(Json(RegionsResponse {
        regions: resolved.value,
    }))
}

// ---------------------------------------------------------------------------
// GET /demographics/trend/{layer_type}/{name}
// ---------------------------------------------------------------------------

/// Return `field` for `name` across every year on record.
///
/// # Query Parameters
///
/// - `field`: one of the allowlisted demographic fields (required)
pub async fn get_trend(
    State(state): State<Arc<AppState>>,
    Path((layer, name)): Path<(String, String)>,
    Query(params): Query<TrendQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let layer = parse_layer(&layer)?;
    let field = parse_field(params.field.as_deref())?;

    let resolved = state.service.trends().trend(layer, &name, field).await?;
    Ok(Json(serde_json::json!({
        "trend": trend_rows(field, &resolved.value),
    })))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Report store and cache reachability. Always 200; `status` says
/// whether the store answered.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.health().await)
}
