//! Error types for the lookup engine.
//!
//! Three layers of error exist:
//!
//! - [`StoreError`] -- what a [`SpatialStore`](crate::store::SpatialStore)
//!   returns. Propagated to callers wrapped in [`CoreError::Backend`].
//! - [`CacheError`] -- what a [`CacheBackend`](crate::cache::CacheBackend)
//!   returns. Never leaves [`CacheLayer`](crate::cache::CacheLayer); a cache
//!   failure degrades to a miss.
//! - [`CoreError`] -- the engine's taxonomy. Translated to HTTP status codes
//!   only at the API boundary.
//!
//! All three are `Clone` so a single coalesced store result can be handed
//! to every waiter.

use std::time::Duration;

use geolens_types::{GeometryError, LayerType};

/// Errors returned by a spatial store implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached (pool exhausted, connection refused).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed the query.
    #[error("store query failed: {0}")]
    Query(String),

    /// The query did not finish inside its deadline.
    #[error("store query timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The store returned a geometry the codec could not decode.
    #[error("store returned an invalid geometry: {0}")]
    Codec(#[from] GeometryError),
}

/// Errors returned by a cache backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The cache could not be reached or rejected the command.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The command did not finish inside the cache deadline.
    #[error("cache operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Errors surfaced by the resolvers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    /// No entity matched the query. Never cached.
    #[error("no {layer} named {name:?}")]
    NotFound {
        /// The layer that was searched.
        layer: LayerType,
        /// The name that was searched for.
        name: String,
    },

    /// The request was rejected before touching the cache or store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The resolved feature has no usable geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),

    /// The spatial store failed.
    #[error("{operation} failed for {layer} {name:?}: {source}")]
    Backend {
        /// The engine operation that issued the store call.
        operation: &'static str,
        /// The layer of the query.
        layer: LayerType,
        /// The name of the query.
        name: String,
        /// What the store reported.
        source: StoreError,
    },

    /// A payload could not be serialized or a cached payload could not be
    /// parsed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Wrap a store error with the context needed to reproduce it.
    pub fn backend(
        operation: &'static str,
        layer: LayerType,
        name: &str,
        source: StoreError,
    ) -> Self {
        Self::Backend {
            operation,
            layer,
            name: name.to_owned(),
            source,
        }
    }

    /// Build a [`CoreError::NotFound`].
    pub fn not_found(layer: LayerType, name: &str) -> Self {
        Self::NotFound {
            layer,
            name: name.to_owned(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
