//! Keyed snapshot cache with single-flight fetches and generation checks.
//!
//! Invariants:
//! - at most one fetch per key is in flight; concurrent callers share it
//! - a fetch commits only if it is still the most recent request for its key
//! - a failed fetch never evicts the last good value

use super::clock::Clock;
use crate::datasource::DataSourceError;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// A committed value and the time it was fetched.
#[derive(Debug)]
pub struct Cached<V> {
    pub value: Arc<V>,
    pub fetched_at: DateTime<Utc>,
}

impl<V> Clone for Cached<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
        }
    }
}

pub type FetchResult<V> = Result<Cached<V>, DataSourceError>;
pub type SharedFetch<V> = Shared<BoxFuture<'static, FetchResult<V>>>;

struct InFlight<V> {
    generation: u64,
    future: SharedFetch<V>,
}

struct Slot<V> {
    value: Option<Cached<V>>,
    generation: u64,
    inflight: Option<InFlight<V>>,
    last_error: Option<DataSourceError>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            value: None,
            generation: 0,
            inflight: None,
            last_error: None,
        }
    }
}

pub struct SnapshotCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> std::fmt::Debug for SnapshotCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache").finish_non_exhaustive()
    }
}

impl<K, V> SnapshotCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Last committed value, regardless of age.
    pub fn cached(&self, key: &K) -> Option<Cached<V>> {
        self.lock().get(key).and_then(|s| s.value.clone())
    }

    /// Last committed value if fetched no more than `max_staleness` ago.
    pub fn fresh(&self, key: &K, max_staleness: std::time::Duration) -> Option<Cached<V>> {
        let now = self.clock.now();
        self.cached(key)
            .filter(|c| super::clock::elapsed_since(now, c.fetched_at) <= max_staleness)
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.lock().get(key).is_some_and(|s| s.inflight.is_some())
    }

    pub fn last_error(&self, key: &K) -> Option<DataSourceError> {
        self.lock().get(key).and_then(|s| s.last_error.clone())
    }

    pub fn keys(&self) -> Vec<K> {
        self.lock().keys().cloned().collect()
    }

    /// Supersede any in-flight fetch for `key`. Its result will be discarded
    /// and the next request starts a fresh fetch. The committed value stays.
    pub fn invalidate(&self, key: &K) {
        let mut slots = self.lock();
        let slot = slots.entry(key.clone()).or_default();
        slot.generation += 1;
        slot.inflight = None;
    }

    /// Join the in-flight fetch for `key`, or start one with `start`.
    ///
    /// The fetch runs on its own task: dropping every waiter does not cancel
    /// it, and its result is committed (or discarded) when it completes.
    pub fn join_or_start<F>(self: &Arc<Self>, key: &K, start: F) -> SharedFetch<V>
    where
        F: FnOnce() -> BoxFuture<'static, Result<V, DataSourceError>>,
    {
        let mut slots = self.lock();
        let slot = slots.entry(key.clone()).or_default();
        if let Some(inflight) = &slot.inflight {
            debug!(key = ?key, "Joining in-flight fetch");
            return inflight.future.clone();
        }

        slot.generation += 1;
        let generation = slot.generation;
        let cache = Arc::clone(self);
        let task_key = key.clone();
        let fetch = start();
        let handle = tokio::spawn(async move {
            let result = fetch.await;
            cache.complete(&task_key, generation, result)
        });

        let future = async move {
            handle.await.unwrap_or_else(|e| {
                Err(DataSourceError::Network(format!("fetch task aborted: {}", e)))
            })
        }
        .boxed()
        .shared();

        slot.inflight = Some(InFlight {
            generation,
            future: future.clone(),
        });
        future
    }

    fn complete(&self, key: &K, generation: u64, result: Result<V, DataSourceError>) -> FetchResult<V> {
        let now = self.clock.now();
        let mut slots = self.lock();
        let slot = slots.entry(key.clone()).or_default();
        if slot
            .inflight
            .as_ref()
            .is_some_and(|f| f.generation == generation)
        {
            slot.inflight = None;
        }
        let current = slot.generation == generation;

        match result {
            Ok(value) => {
                let cached = Cached {
                    value: Arc::new(value),
                    fetched_at: now,
                };
                let newer_exists = slot
                    .value
                    .as_ref()
                    .is_some_and(|existing| existing.fetched_at > now);
                if current && !newer_exists {
                    slot.value = Some(cached.clone());
                    slot.last_error = None;
                } else {
                    debug!(key = ?key, generation, "Discarding superseded fetch result");
                }
                Ok(cached)
            }
            Err(err) => {
                if current {
                    slot.last_error = Some(err.clone());
                }
                Err(err)
            }
        }
    }
}
