//! Axum router construction.
//!
//! Assembles every route into a single [`Router`] with CORS restricted to
//! the configured origin and request tracing enabled.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /geojson/{layer_type}/{name}` -- boundary lookup
/// - `GET /geojson/nearby_cities/{layer_type}/{name}` -- radius search
/// - `GET /geojson/border_places/{state}` -- places near a state border
/// - `GET /geojson/msas/{layer_type}/{name}` -- enclosing regions
/// - `GET /demographics/trend/{layer_type}/{name}` -- yearly trend
/// - `GET /health` -- store and cache reachability
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allow_origin(&state.allowed_origin))
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/geojson/nearby_cities/{layer_type}/{name}",
            get(handlers::get_nearby),
        )
        .route(
            "/geojson/border_places/{state}",
            get(handlers::get_border_places),
        )
        .route("/geojson/msas/{layer_type}/{name}", get(handlers::get_regions))
        .route(
            "/geojson/{layer_type}/{name}",
            get(handlers::get_feature_collection),
        )
        .route(
            "/demographics/trend/{layer_type}/{name}",
            get(handlers::get_trend),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn allow_origin(origin: &str) -> AllowOrigin {
    if origin == "*" {
        return AllowOrigin::any();
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => AllowOrigin::exact(value),
        Err(e) => {
            tracing::warn!(origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    }
}
