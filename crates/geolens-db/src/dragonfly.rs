//! `Dragonfly` (Redis-compatible) lookup cache.
//!
//! Holds serialized lookup results under the keys built by
//! [`geolens_core::keys::CacheKey`]. Payloads are JSON text.
//!
//! # Key Patterns
//!
//! | Pattern | Description |
//! |---------|-------------|
//! | `feature:{layer}:{name}:{year or *}` | Feature collection |
//! | `nearby:{layer}:{name}:{year or *}:{radius_km}:{limit}` | Nearby names |
//! | `border:{state}:{radius_km}:{limit}` | Places near a state border |
//! | `regions:{layer}:{name}:{year or *}` | Enclosing region names |
//! | `trend:{layer}:{name}:{field}` | Trend points |

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fred::prelude::*;
use fred::types::Expiration;
use geolens_core::{CacheBackend, CacheError};

use crate::error::DbError;

/// Key read by [`CacheBackend::ping`]. Never written.
const PING_KEY: &str = "geolens:ping";

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`] and implements [`CacheBackend`].
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Read the JSON text stored at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn get_text(&self, key: &str) -> Result<Option<String>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        Ok(value)
    }

    /// Store `text` at `key`, expiring after `ttl` (never when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_text(&self, key: &str, text: &str, ttl: Option<Duration>) -> Result<(), DbError> {
        let _: () = self
            .client
            .set(key, text, ttl.map(expiration), None, false)
            .await?;
        Ok(())
    }

    /// Flush all keys from the `Dragonfly` instance.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), DbError> {
        let _: () = self.client.flushall(false).await?;
        tracing::info!("Dragonfly cache flushed");
        Ok(())
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

/// Whole seconds when possible, milliseconds otherwise.
fn expiration(ttl: Duration) -> Expiration {
    if ttl.subsec_millis() == 0 {
        Expiration::EX(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
    } else {
        Expiration::PX(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl CacheBackend for DragonflyPool {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(self.get_text(key).await?.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), CacheError> {
        let text = std::str::from_utf8(&value)
            .map_err(|e| CacheError::Unavailable(format!("payload for {key} is not UTF-8: {e}")))?;
        Ok(self.set_text(key, text, ttl).await?)
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        Ok(Self::flush_all(self).await?)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.get_text(PING_KEY).await?;
        Ok(())
    }

    async fn close(&self) {
        match self.client.quit().await {
            Ok(()) => tracing::info!("Dragonfly connection closed"),
            Err(e) => tracing::warn!(error = %e, "Dragonfly quit failed"),
        }
    }
}
