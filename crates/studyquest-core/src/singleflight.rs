//! Per-key coalescing of concurrent async computations.
//!
//! The first caller for a key starts the computation; callers arriving
//! while it runs await the same shared future and receive a clone of its
//! output. [`SingleFlight::run_fresh`] never joins: it starts a new
//! computation and makes it the one later callers join.
//!
//! Each computation runs on its own Tokio task and clears its entry when
//! it ends. A computation whose waiters all went away still runs to
//! completion, and a finished or superseded computation is never handed to
//! a later caller.

use core::future::Future;
use core::hash::Hash;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

type Flight<V> = Shared<BoxFuture<'static, Result<V, FlightAborted>>>;

struct Entry<V> {
    id: u64,
    flight: Flight<V>,
}

type Registry<K, V> = Arc<Mutex<HashMap<K, Entry<V>>>>;

fn lock<K, V>(registry: &Mutex<HashMap<K, Entry<V>>>) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a computation's entry when its task ends, unless a newer
/// computation has replaced it.
struct ClearOnExit<K: Eq + Hash, V> {
    registry: Registry<K, V>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, V> Drop for ClearOnExit<K, V> {
    fn drop(&mut self) {
        let mut inflight = lock(&self.registry);
        if inflight.get(&self.key).is_some_and(|entry| entry.id == self.id) {
            inflight.remove(&self.key);
        }
    }
}

/// The computation's task ended without producing a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("in-flight computation aborted: {0}")]
pub struct FlightAborted(String);

/// Coalesces concurrent computations that share a key.
pub struct SingleFlight<K, V> {
    inflight: Registry<K, V>,
    next_id: AtomicU64,
}

impl<K, V> core::fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SingleFlight").finish_non_exhaustive()
    }
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

/// What a [`SingleFlight`] caller got back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightResult<V> {
    /// The computation's output.
    pub value: Result<V, FlightAborted>,
    /// `true` if this caller joined a computation started by another.
    pub joined: bool,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Copy + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `start()` for `key`, or join the run already in flight.
    ///
    /// `start` is only invoked when no computation for `key` is running.
    /// Must be called from within a Tokio runtime.
    pub async fn run<F>(&self, key: K, start: impl FnOnce() -> F + Send) -> FlightResult<V>
    where
        F: Future<Output = V> + Send + 'static,
    {
        let (flight, joined) = {
            let mut inflight = lock(&self.inflight);
            let existing = inflight.get(&key).map(|entry| entry.flight.clone());
            match existing {
                Some(flight) => (flight, true),
                None => (self.launch(&mut inflight, key, start()), false),
            }
        };
        FlightResult {
            value: flight.await,
            joined,
        }
    }

    /// Start `start()` for `key` even if a run is in flight.
    ///
    /// The new run replaces the old one as the run later callers join.
    /// Callers already waiting on the old run keep waiting on it.
    pub async fn run_fresh<F>(&self, key: K, start: impl FnOnce() -> F + Send) -> FlightResult<V>
    where
        F: Future<Output = V> + Send + 'static,
    {
        let flight = {
            let mut inflight = lock(&self.inflight);
            self.launch(&mut inflight, key, start())
        };
        FlightResult {
            value: flight.await,
            joined: false,
        }
    }

    /// Number of keys with a computation in flight.
    pub fn in_flight(&self) -> usize {
        lock(&self.inflight).len()
    }

    fn launch<F>(&self, inflight: &mut HashMap<K, Entry<V>>, key: K, computation: F) -> Flight<V>
    where
        F: Future<Output = V> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let clear = ClearOnExit {
            registry: Arc::clone(&self.inflight),
            key,
            id,
        };
        let task = tokio::spawn(async move {
            let value = computation.await;
            drop(clear);
            value
        });
        let flight = task
            .map(|finished| finished.map_err(|err| FlightAborted(err.to_string())))
            .boxed()
            .shared();
        inflight.insert(
            key,
            Entry {
                id,
                flight: flight.clone(),
            },
        );
        flight
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use tokio::sync::Notify;

    use super::*;

    #[tokio::test]
    async fn concurrent_callers_share_one_run() {
        let flights: Arc<SingleFlight<u32, u64>> = Arc::new(SingleFlight::new());
        let starts = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let flights = Arc::clone(&flights);
            let starts = Arc::clone(&starts);
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                flights
                    .run(7, move || {
                        starts.fetch_add(1, Ordering::SeqCst);
                        async move {
                            gate.notified().await;
                            42
                        }
                    })
                    .await
            }));
        }

        // Let every task register before releasing the computation.
        while flights.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        let mut joined = 0;
        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(result.value, Ok(42));
            if result.joined {
                joined += 1;
            }
        }
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(joined, 3);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn sequential_calls_start_fresh() {
        let flights: SingleFlight<u32, u32> = SingleFlight::new();
        let first = flights.run(1, || async { 1 }).await;
        let second = flights.run(1, || async { 2 }).await;
        assert_eq!(first.value, Ok(1));
        assert_eq!(second.value, Ok(2));
        assert!(!second.joined);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let flights: SingleFlight<u32, u32> = SingleFlight::new();
        let (a, b) = tokio::join!(
            flights.run(1, || async { 10 }),
            flights.run(2, || async { 20 })
        );
        assert_eq!((a.value, b.value), (Ok(10), Ok(20)));
        assert!(!a.joined && !b.joined);
    }

    #[tokio::test]
    async fn run_fresh_never_joins_an_older_run() {
        let flights: Arc<SingleFlight<u32, u32>> = Arc::new(SingleFlight::new());
        let gate = Arc::new(Notify::new());

        let slow = {
            let flights = Arc::clone(&flights);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                flights
                    .run(7, move || async move {
                        gate.notified().await;
                        1
                    })
                    .await
            })
        };
        while flights.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        let fresh = flights.run_fresh(7, || async { 2 }).await;
        assert_eq!(fresh.value, Ok(2));
        assert!(!fresh.joined);

        // The superseded run is no longer joinable.
        let after = flights.run(7, || async { 3 }).await;
        assert_eq!(after.value, Ok(3));
        assert!(!after.joined);

        gate.notify_one();
        assert_eq!(slow.await.unwrap().value, Ok(1));
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn abandoned_run_completes_and_clears_itself() {
        let flights: Arc<SingleFlight<u32, u32>> = Arc::new(SingleFlight::new());
        let gate = Arc::new(Notify::new());
        let finished = Arc::new(AtomicBool::new(false));

        let caller = {
            let flights = Arc::clone(&flights);
            let gate = Arc::clone(&gate);
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                flights
                    .run(7, move || async move {
                        gate.notified().await;
                        finished.store(true, Ordering::SeqCst);
                        1
                    })
                    .await
            })
        };
        while flights.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        gate.notify_one();
        while flights.in_flight() > 0 {
            tokio::task::yield_now().await;
        }
        assert!(finished.load(Ordering::SeqCst));

        let next = flights.run(7, || async { 2 }).await;
        assert_eq!(next.value, Ok(2));
        assert!(!next.joined);
    }
}
