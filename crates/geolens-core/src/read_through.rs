//! Shared read-through path.
//!
//! Every resolver answers a query the same way:
//!
//! ```text
//! cache get ─ hit ──────────────────────────────────────────► decoded payload
//!     │
//!     └ miss ─► single-flight(key) ─► store query (deadline) ─┬ Ok  ─► detached cache set
//!                                                              └ Err ─► error, nothing cached
//! ```
//!
//! [`Backends`] carries the store, the cache, the shared in-flight map,
//! and the store deadline. It is cheap to clone and is moved into each
//! coalesced load.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use geolens_types::LayerType;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::{Instant, timeout};

use crate::cache::{CacheLayer, CacheOrigin};
use crate::error::{CoreError, StoreError};
use crate::keys::CacheKey;
use crate::singleflight::SingleFlight;
use crate::store::SpatialStore;

/// A query result together with its serialized form.
///
/// `bytes` is exactly what the cache holds for the key, so a hit and the
/// miss that populated it carry identical payloads.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The decoded value.
    pub value: T,
    /// The serialized payload.
    pub bytes: Bytes,
    /// Where the payload came from.
    pub origin: CacheOrigin,
}

/// Store, cache, and coalescing state shared by the resolvers.
#[derive(Clone)]
pub struct Backends {
    store: Arc<dyn SpatialStore>,
    cache: CacheLayer,
    flights: Arc<SingleFlight<Result<Bytes, CoreError>>>,
    query_timeout: Duration,
}

impl Backends {
    /// Bundle `store` and `cache`. Every store call runs under
    /// `query_timeout`.
    pub fn new(store: Arc<dyn SpatialStore>, cache: CacheLayer, query_timeout: Duration) -> Self {
        Self {
            store,
            cache,
            flights: Arc::new(SingleFlight::new()),
            query_timeout,
        }
    }

    /// The spatial store.
    pub fn store(&self) -> &Arc<dyn SpatialStore> {
        &self.store
    }

    /// The cache layer.
    pub const fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    /// Number of coalesced loads currently running.
    pub fn in_flight(&self) -> usize {
        self.flights.in_flight()
    }

    /// Ping the store under the store deadline.
    pub async fn ping_store(&self) -> Result<(), StoreError> {
        timeout(self.query_timeout, self.store.ping())
            .await
            .unwrap_or(Err(StoreError::Timeout(self.query_timeout)))
    }

    /// Run one store call under the store deadline, wrapping failures
    /// with the operation context.
    pub(crate) async fn query<T, F>(
        &self,
        operation: &'static str,
        layer: LayerType,
        name: &str,
        call: F,
    ) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let started = Instant::now();
        let result = timeout(self.query_timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout(self.query_timeout)));
        let elapsed_ms = started.elapsed().as_millis();
        match result {
            Ok(value) => {
                tracing::debug!(operation, %layer, name, elapsed_ms, "store query finished");
                Ok(value)
            }
            Err(source) => {
                tracing::error!(
                    operation,
                    %layer,
                    name,
                    elapsed_ms,
                    error = %source,
                    "store query failed"
                );
                Err(CoreError::backend(operation, layer, name, source))
            }
        }
    }

    /// Answer `key` from the cache, or run `load` once for every
    /// concurrent caller of the same key and cache its result.
    ///
    /// Errors (including [`CoreError::NotFound`]) are never cached. A
    /// cached payload that no longer decodes is treated as a miss.
    pub(crate) async fn read_through<T, F>(
        &self,
        key: CacheKey,
        load: F,
    ) -> Result<Resolved<T>, CoreError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        if let Some(bytes) = self.cache.get(&key).await {
            match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    tracing::debug!(%key, "cache hit");
                    return Ok(Resolved {
                        value,
                        bytes,
                        origin: CacheOrigin::Hit,
                    });
                }
                Err(e) => tracing::warn!(%key, error = %e, "cached payload unreadable, reloading"),
            }
        }

        tracing::debug!(%key, "cache miss");
        let cache = self.cache.clone();
        let flight_key = key.clone();
        let work = async move {
            let value = load.await?;
            let bytes = Bytes::from(serde_json::to_vec(&value)?);
            cache.set_detached(key, bytes.clone());
            Ok::<_, CoreError>(bytes)
        };
        let bytes = self.flights.run(flight_key.as_str(), work).await?;
        let value = serde_json::from_slice(&bytes)?;
        Ok(Resolved {
            value,
            bytes,
            origin: CacheOrigin::Miss,
        })
    }
}
