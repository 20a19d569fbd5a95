//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] and [`fred`] errors. At the trait boundary a [`DbError`]
//! becomes the engine's [`StoreError`] or [`CacheError`].

use geolens_core::{CacheError, StoreError};

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Postgres(
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_),
            )
            | DbError::Dragonfly(_)
            | DbError::Config(_) => Self::Unavailable(e.to_string()),
            DbError::Postgres(_) | DbError::Migration(_) | DbError::Serialization(_) => {
                Self::Query(e.to_string())
            }
        }
    }
}

impl From<DbError> for CacheError {
    fn from(e: DbError) -> Self {
        Self::Unavailable(e.to_string())
    }
}
