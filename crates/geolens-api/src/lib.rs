//! HTTP API for geolens.
//!
//! This crate provides an Axum HTTP server that exposes the lookup
//! engine in [`geolens_core`]:
//!
//! - **Boundary lookup** (`/geojson/{layer_type}/{name}`) returning a
//!   GeoJSON `FeatureCollection`
//! - **Proximity search** (`/geojson/nearby_cities/...`,
//!   `/geojson/border_places/...`)
//! - **Containment** (`/geojson/msas/...`) listing enclosing regions
//! - **Demographic trends** (`/demographics/trend/...`)
//! - **Health** (`/health`) reporting store and cache reachability
//!
//! # Architecture
//!
//! Handlers parse and validate the path and query, call the shared
//! [`GeoService`](geolens_core::GeoService), and translate
//! [`CoreError`](geolens_core::CoreError) into HTTP status codes at the
//! boundary via [`ApiError`].

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
