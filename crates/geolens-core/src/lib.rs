//! Cache-backed geospatial lookup and proximity search for geolens.
//!
//! Every query follows the same read-through path: consult the cache,
//! and on a miss run one coalesced, deadline-bound store query whose
//! result is cached in the background. Cache failures degrade to misses;
//! store failures surface as [`CoreError::Backend`] with the operation,
//! layer, and name that failed.
//!
//! # Modules
//!
//! - [`cache`] -- [`CacheBackend`] trait, error-absorbing [`CacheLayer`],
//!   and the in-process [`MemoryCache`].
//! - [`config`] -- Configuration loading from `geolens-config.yaml`.
//! - [`containment`] -- [`ContainmentResolver`]: counties and MSAs
//!   enclosing a feature.
//! - [`error`] -- Store, cache, and engine error types.
//! - [`keys`] -- Collision-free [`CacheKey`] construction.
//! - [`memory`] -- [`MemoryStore`], an in-process [`SpatialStore`].
//! - [`proximity`] -- [`ProximityEngine`]: nearby and border searches.
//! - [`read_through`] -- The shared cache/single-flight/store path.
//! - [`resolver`] -- [`FeatureResolver`]: lookup by layer and name.
//! - [`service`] -- [`GeoService`], the composed service with explicit
//!   `init`/`shutdown`.
//! - [`singleflight`] -- Per-key coalescing of concurrent misses.
//! - [`store`] -- The [`SpatialStore`] trait and its query types.
//! - [`trend`] -- [`TrendService`]: demographic values by year.
//!
//! [`CacheBackend`]: cache::CacheBackend
//! [`CacheLayer`]: cache::CacheLayer
//! [`MemoryCache`]: cache::MemoryCache
//! [`ContainmentResolver`]: containment::ContainmentResolver
//! [`CoreError::Backend`]: error::CoreError::Backend
//! [`CacheKey`]: keys::CacheKey
//! [`MemoryStore`]: memory::MemoryStore
//! [`SpatialStore`]: store::SpatialStore
//! [`ProximityEngine`]: proximity::ProximityEngine
//! [`FeatureResolver`]: resolver::FeatureResolver
//! [`GeoService`]: service::GeoService
//! [`TrendService`]: trend::TrendService

pub mod cache;
pub mod config;
pub mod containment;
pub mod error;
pub mod keys;
pub mod memory;
pub mod proximity;
pub mod read_through;
pub mod resolver;
pub mod service;
pub mod singleflight;
pub mod store;
pub mod trend;

pub use cache::{CacheBackend, CacheLayer, CacheOrigin, MemoryCache};
pub use config::{ConfigError, GeoConfig};
pub use error::{CacheError, CoreError, StoreError};
pub use read_through::Resolved;
pub use service::GeoService;
pub use store::SpatialStore;
