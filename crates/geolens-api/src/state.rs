//! Shared application state for the HTTP API.

use std::sync::Arc;

use geolens_core::GeoService;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState {
    /// The lookup engine.
    pub service: Arc<GeoService>,
    /// The single origin allowed by CORS (`*` allows any).
    pub allowed_origin: String,
}

impl AppState {
    /// Create the application state.
    pub fn new(service: Arc<GeoService>, allowed_origin: &str) -> Self {
        Self {
            service,
            allowed_origin: allowed_origin.to_owned(),
        }
    }
}
