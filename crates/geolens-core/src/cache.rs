//! Read-through cache layer.
//!
//! [`CacheBackend`] is the raw key/value contract a cache server fulfils
//! (Dragonfly in production, [`MemoryCache`] in tests and local runs).
//! [`CacheLayer`] wraps a backend and makes it safe to treat as an
//! optimization:
//!
//! - every call runs under a short deadline;
//! - a failed or timed-out `get` is a miss, logged at `warn`;
//! - a failed `set` is dropped, logged at `warn`;
//! - a layer built with [`CacheLayer::disabled`] misses on every read.
//!
//! No method of [`CacheLayer`] returns an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tokio::time::{Instant, timeout};

use crate::error::CacheError;
use crate::keys::CacheKey;

/// Upper bound for a full flush, which may take longer than a point read.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw key/value operations of a cache server.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Read the value at `key`. `Ok(None)` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Write `value` at `key`, expiring after `ttl` (never when `None`).
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Remove every key.
    async fn flush_all(&self) -> Result<(), CacheError>;

    /// Check connectivity.
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    /// Release connections. Called once from
    /// [`GeoService::shutdown`](crate::service::GeoService::shutdown).
    async fn close(&self) {}
}

/// Whether a payload came from the cache or from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOrigin {
    /// Served from the cache.
    Hit,
    /// Loaded from the store (and handed to the cache).
    Miss,
}

/// Error-absorbing wrapper around a [`CacheBackend`].
#[derive(Clone)]
pub struct CacheLayer {
    backend: Option<Arc<dyn CacheBackend>>,
    ttl: Option<Duration>,
    op_timeout: Duration,
}

impl CacheLayer {
    /// Wrap `backend`. Entries expire after `ttl`; `None` means never,
    /// which is only safe when the store content never changes.
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Option<Duration>, op_timeout: Duration) -> Self {
        if ttl.is_none() {
            tracing::warn!("cache TTL disabled; entries will never expire");
        }
        Self {
            backend: Some(backend),
            ttl,
            op_timeout,
        }
    }

    /// A layer with no backend. Every read misses, every write is dropped.
    pub const fn disabled() -> Self {
        Self {
            backend: None,
            ttl: None,
            op_timeout: Duration::ZERO,
        }
    }

    /// Whether a backend is attached.
    pub const fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// The configured entry TTL.
    pub const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Read `key`. Backend failures and timeouts are reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let backend = self.backend.as_ref()?;
        match timeout(self.op_timeout, backend.get(key.as_str())).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                tracing::warn!(%key, error = %e, "cache read failed, treating as miss");
                None
            }
            Err(_) => {
                tracing::warn!(
                    %key,
                    timeout_ms = self.op_timeout.as_millis(),
                    "cache read timed out, treating as miss"
                );
                None
            }
        }
    }

    /// Write `value` at `key` with the layer TTL. Best-effort.
    pub async fn set(&self, key: &CacheKey, value: Bytes) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        match timeout(self.op_timeout, backend.set(key.as_str(), value, self.ttl)).await {
            Ok(Ok(())) => tracing::debug!(%key, "cache populated"),
            Ok(Err(e)) => tracing::warn!(%key, error = %e, "cache write failed"),
            Err(_) => tracing::warn!(
                %key,
                timeout_ms = self.op_timeout.as_millis(),
                "cache write timed out"
            ),
        }
    }

    /// Write `value` at `key` on a background task.
    ///
    /// The write outlives the caller: it still completes if the request
    /// that triggered it is cancelled.
    pub fn set_detached(&self, key: CacheKey, value: Bytes) {
        if self.backend.is_none() {
            return;
        }
        let layer = self.clone();
        tokio::spawn(async move {
            layer.set(&key, value).await;
        });
    }

    /// Remove every entry. Returns whether the flush succeeded.
    ///
    /// Safe only because every entry can be re-derived from the store.
    pub async fn invalidate_all(&self) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return true;
        };
        match timeout(FLUSH_TIMEOUT, backend.flush_all()).await {
            Ok(Ok(())) => {
                tracing::info!("cache flushed");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "cache flush failed");
                false
            }
            Err(_) => {
                tracing::warn!("cache flush timed out");
                false
            }
        }
    }

    /// Whether the backend answers a ping inside the deadline.
    pub async fn ping(&self) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        matches!(timeout(self.op_timeout, backend.ping()).await, Ok(Ok(())))
    }

    /// Release the backend's connections.
    pub async fn close(&self) {
        if let Some(backend) = self.backend.as_ref() {
            backend.close().await;
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Bytes,
    expires_at: Option<Instant>,
}

/// Process-local [`CacheBackend`] with TTL support.
///
/// Expired entries are dropped lazily on read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Every stored key, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at.is_none_or(|at| at > now) => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at.is_some_and(|at| at <= now))
        {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries
            .write()
            .await
            .insert(key.to_owned(), MemoryEntry { value, expires_at });
        Ok(())
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use geolens_types::LayerType;

    use super::*;

    /// A backend that fails every command.
    struct BrokenCache;

    #[async_trait]
    impl CacheBackend for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
            Err(CacheError::Unavailable(String::from("connection refused")))
        }

        async fn set(&self, _: &str, _: Bytes, _: Option<Duration>) -> Result<(), CacheError> {
            Err(CacheError::Unavailable(String::from("connection refused")))
        }

        async fn flush_all(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable(String::from("connection refused")))
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable(String::from("connection refused")))
        }
    }

    /// A backend that never answers.
    struct HangingCache;

    #[async_trait]
    impl CacheBackend for HangingCache {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
            std::future::pending().await
        }

        async fn set(&self, _: &str, _: Bytes, _: Option<Duration>) -> Result<(), CacheError> {
            std::future::pending().await
        }

        async fn flush_all(&self) -> Result<(), CacheError> {
            std::future::pending().await
        }
    }

    fn key() -> CacheKey {
        CacheKey::feature(LayerType::City, "Austin", None)
    }

    #[tokio::test]
    async fn memory_round_trip() {
        let layer = CacheLayer::new(
            Arc::new(MemoryCache::new()),
            Some(Duration::from_secs(60)),
            Duration::from_millis(50),
        );
        assert!(layer.get(&key()).await.is_none());
        layer.set(&key(), Bytes::from_static(b"{}")).await;
        assert_eq!(layer.get(&key()).await.unwrap(), Bytes::from_static(b"{}"));
    }

    #[tokio::test(start_paused = true)]
    async fn memory_entries_expire() {
        let cache = MemoryCache::new();
        cache
            .set("k", Bytes::from_static(b"v"), Some(Duration::from_secs(10)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get("k").await.unwrap().is_some());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn broken_backend_degrades_to_miss() {
        let layer = CacheLayer::new(
            Arc::new(BrokenCache),
            Some(Duration::from_secs(60)),
            Duration::from_millis(50),
        );
        layer.set(&key(), Bytes::from_static(b"{}")).await;
        assert!(layer.get(&key()).await.is_none());
        assert!(!layer.invalidate_all().await);
        assert!(!layer.ping().await);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_backend_times_out_to_miss() {
        let layer = CacheLayer::new(
            Arc::new(HangingCache),
            Some(Duration::from_secs(60)),
            Duration::from_millis(20),
        );
        assert!(layer.get(&key()).await.is_none());
        layer.set(&key(), Bytes::from_static(b"{}")).await;
    }

    #[tokio::test]
    async fn disabled_layer_always_misses() {
        let layer = CacheLayer::disabled();
        layer.set(&key(), Bytes::from_static(b"{}")).await;
        assert!(layer.get(&key()).await.is_none());
        assert!(layer.invalidate_all().await);
        assert!(!layer.is_enabled());
    }

    #[tokio::test]
    async fn invalidate_all_clears_entries() {
        let cache = Arc::new(MemoryCache::new());
        let layer = CacheLayer::new(cache.clone(), None, Duration::from_millis(50));
        layer.set(&key(), Bytes::from_static(b"{}")).await;
        assert_eq!(cache.len().await, 1);
        assert!(layer.invalidate_all().await);
        assert!(cache.is_empty().await);
    }
}
