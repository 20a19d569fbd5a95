//! Per-key coalescing of concurrent identical work.
//!
//! When several requests miss the cache for the same key at once, only
//! the first one runs the store query; the rest await its result. The
//! in-flight map holds calls weakly, so a call whose waiters have all
//! been dropped is itself dropped, cancelling the underlying query.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};

type Call<T> = Shared<BoxFuture<'static, T>>;

/// Coalesces concurrent calls that share a key.
pub struct SingleFlight<T> {
    calls: Mutex<HashMap<String, WeakShared<BoxFuture<'static, T>>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty coalescer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` under `key`, or join the call already running under it.
    ///
    /// `work` is dropped without being polled when a call is joined.
    pub async fn run<F>(&self, key: &str, work: F) -> T
    where
        F: Future<Output = T> + Send + 'static,
    {
        let call = self.join_or_start(key, work);
        let output = call.clone().await;
        self.finish(key, &call);
        output
    }

    /// Number of calls currently registered.
    pub fn in_flight(&self) -> usize {
        self.lock()
            .values()
            .filter(|weak| weak.upgrade().is_some())
            .count()
    }

    fn join_or_start<F>(&self, key: &str, work: F) -> Call<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let mut calls = self.lock();
        if let Some(call) = calls.get(key).and_then(WeakShared::upgrade) {
            tracing::debug!(key, "joining in-flight call");
            return call;
        }
        calls.retain(|_, weak| weak.upgrade().is_some());
        let call = work.boxed().shared();
        if let Some(weak) = call.downgrade() {
            calls.insert(key.to_owned(), weak);
        }
        call
    }

    fn finish(&self, key: &str, call: &Call<T>) {
        let mut calls = self.lock();
        let same_call = calls
            .get(key)
            .and_then(WeakShared::upgrade)
            .is_none_or(|current| current.ptr_eq(call));
        if same_call {
            calls.remove(key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, WeakShared<BoxFuture<'static, T>>>> {
        // The map holds no invariants a panicking holder could break.
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_share_one_execution() {
        let flight = SingleFlight::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let work = || {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                7
            }
        };

        let (a, b, c) = tokio::join!(
            flight.run("k", work()),
            flight.run("k", work()),
            flight.run("k", work()),
        );

        assert_eq!((a, b, c), (7, 7, 7));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_run_independently() {
        let flight = SingleFlight::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let work = |n: u32| {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                n
            }
        };

        let (a, b) = tokio::join!(flight.run("a", work(1)), flight.run("b", work(2)));
        assert_eq!((a, b), (1, 2));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_calls_rerun() {
        let flight = SingleFlight::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let runs = Arc::clone(&runs);
            flight
                .run("k", async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    1
                })
                .await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_call_is_cancelled() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let dropped = Arc::new(AtomicBool::new(false));

        let task = {
            let flight = Arc::clone(&flight);
            let flag = DropFlag(Arc::clone(&dropped));
            tokio::spawn(async move {
                flight
                    .run("k", async move {
                        let _flag = flag;
                        std::future::pending::<u32>().await
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(flight.in_flight(), 1);

        task.abort();
        let _ = task.await;
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(flight.in_flight(), 0);

        // A fresh call under the same key starts new work.
        assert_eq!(flight.run("k", async { 3 }).await, 3);
    }
}
