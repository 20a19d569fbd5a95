//! Shared type definitions for geolens.
//!
//! This crate is the single source of truth for the types that cross
//! crate boundaries: the layer and field allowlists, the geometry codec,
//! GeoJSON payloads, and HTTP response bodies. Response types flow
//! downstream to `TypeScript` via `ts-rs` for the map frontend.
//!
//! # Modules
//!
//! - [`enums`] -- Layer types and demographic trend fields
//! - [`geometry`] -- GeoJSON geometry codec and geometric predicates
//! - [`feature`] -- `Feature` / `FeatureCollection` payloads
//! - [`responses`] -- Proximity hits, trend points, and response bodies

pub mod enums;
pub mod feature;
pub mod geometry;
pub mod responses;

// Re-export all public types at crate root for convenience.
pub use enums::{LayerType, TrendField, UnknownVariant};
pub use feature::{Feature, FeatureCollection, Properties};
pub use geometry::{GeoPoint, Geometry, GeometryError, GeometryKind, Position};
pub use responses::{
    BorderPlacesResponse, HealthResponse, NearbyResponse, ProximityHit, RegionsResponse,
    TrendPoint,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes the files into `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::enums::LayerType::export_all();
        let _ = crate::enums::TrendField::export_all();
        let _ = crate::responses::ProximityHit::export_all();
        let _ = crate::responses::TrendPoint::export_all();
        let _ = crate::responses::NearbyResponse::export_all();
        let _ = crate::responses::RegionsResponse::export_all();
        let _ = crate::responses::BorderPlacesResponse::export_all();
        let _ = crate::responses::HealthResponse::export_all();
    }
}
