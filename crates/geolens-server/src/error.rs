//! Error types for the geolens server binary.
//!
//! [`GeolensError`] is the top-level error type that wraps all possible
//! failure modes during startup and serving.

/// Top-level error for the geolens server binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum GeolensError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: geolens_core::ConfigError,
    },

    /// A `PostgreSQL` or `Dragonfly` connection could not be established.
    #[error("database error: {source}")]
    Db {
        /// The underlying data layer error.
        #[from]
        source: geolens_db::DbError,
    },

    /// The spatial store could not be loaded or did not answer at startup.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: geolens_core::StoreError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("http error: {source}")]
    Http {
        /// The underlying server error.
        #[from]
        source: geolens_api::ServerError,
    },

    /// The logging subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },
}
