//! Single-flight coalescing of concurrent identical requests.
//!
//! Multiple callers asking for the same key while a request is in flight
//! all await one shared execution and observe its one outcome. The key
//! is removed from the registry when the execution settles, success or
//! failure alike.

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

type SharedResult<T> = Shared<BoxFuture<'static, T>>;

/// Registry of in-flight executions keyed by request key.
///
/// Cloning is cheap and shares the same registry.
#[derive(Clone)]
pub struct SingleFlight<T: Clone> {
    in_flight: Arc<Mutex<HashMap<String, SharedResult<T>>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the in-flight execution for `key`, or lead a new one built
    /// from `work`.
    ///
    /// The leader registers the shared future before awaiting any of the
    /// work, so callers arriving during the work's suspension points
    /// still coalesce onto it. The execution is also driven by a
    /// detached task, so it settles even if every caller stops waiting.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(existing) = in_flight.get(key) {
                debug!(key = key, "Joining in-flight request");
                existing.clone()
            } else {
                let registry = Arc::clone(&self.in_flight);
                let owned_key = key.to_string();
                let fut = work();
                let shared: SharedResult<T> = async move {
                    let result = fut.await;
                    // Unconditional cleanup on every settlement path.
                    registry.lock().await.remove(&owned_key);
                    result
                }
                .boxed()
                .shared();

                in_flight.insert(key.to_string(), shared.clone());

                let driver = shared.clone();
                tokio::spawn(async move {
                    let _ = driver.await;
                });

                shared
            }
        };

        shared.await
    }

    /// Number of executions currently in flight.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_execution() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        let executions = Arc::new(AtomicUsize::new(0));

        let run = || {
            let flights = flights.clone();
            let executions = Arc::clone(&executions);
            async move {
                flights
                    .run("/anime/1", move || async move {
                        executions.fetch_add(1, Ordering::SeqCst);
                        sleep(Duration::from_millis(50)).await;
                        42
                    })
                    .await
            }
        };

        let (a, b) = tokio::join!(run(), run());
        assert_eq!(a, 42);
        assert_eq!(b, 42);
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_run_independently() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        let executions = Arc::new(AtomicUsize::new(0));

        let run = |key: &'static str, value: u32| {
            let flights = flights.clone();
            let executions = Arc::clone(&executions);
            async move {
                flights
                    .run(key, move || async move {
                        executions.fetch_add(1, Ordering::SeqCst);
                        value
                    })
                    .await
            }
        };

        let (a, b) = tokio::join!(run("/anime/1", 1), run("/anime/2", 2));
        assert_eq!((a, b), (1, 2));
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_and_key_removed() {
        let flights: SingleFlight<Result<u32, String>> = SingleFlight::new();

        let run = || {
            let flights = flights.clone();
            async move {
                flights
                    .run("/anime/1", || async {
                        sleep(Duration::from_millis(10)).await;
                        Err::<u32, String>("upstream failed".to_string())
                    })
                    .await
            }
        };

        let (a, b) = tokio::join!(run(), run());
        assert_eq!(a, b);
        assert!(a.is_err());
        assert_eq!(flights.in_flight_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_settles_after_caller_drops() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        let executions = Arc::new(AtomicUsize::new(0));

        let slow = {
            let flights = flights.clone();
            let executions = Arc::clone(&executions);
            async move {
                flights
                    .run("/anime/1", move || async move {
                        sleep(Duration::from_millis(50)).await;
                        executions.fetch_add(1, Ordering::SeqCst);
                        1
                    })
                    .await
            }
        };

        // Caller gives up before the work settles.
        tokio::select! {
            _ = slow => {}
            _ = sleep(Duration::from_millis(10)) => {}
        }

        // The detached driver still completes the work and cleans up.
        sleep(Duration::from_millis(100)).await;
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight_count().await, 0);
    }
}
