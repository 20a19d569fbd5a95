//! Data layer for geolens (`PostgreSQL`/`PostGIS` + `Dragonfly`).
//!
//! `PostgreSQL` with `PostGIS` is the authoritative spatial store.
//! `Dragonfly` is the optional read-through cache in front of it. This
//! crate implements the engine's [`SpatialStore`](geolens_core::SpatialStore)
//! and [`CacheBackend`](geolens_core::CacheBackend) seams over both.
//!
//! # Architecture
//!
//! ```text
//! GeoService
//!     |
//!     +-- CacheLayer --------> Dragonfly  (DragonflyPool)
//!     |
//!     +-- SpatialStore ------> PostGIS    (PostgresPool)
//! ```
//!
//! # Modules
//!
//! - [`dragonfly`] -- `Dragonfly` cache backend
//! - [`postgres`] -- `PostgreSQL` connection pool
//! - [`spatial`] -- Spatial queries over the `demographics` table
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod postgres;
pub mod spatial;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyPool;
pub use error::DbError;
pub use postgres::PostgresPool;
