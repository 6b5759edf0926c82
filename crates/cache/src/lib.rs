//! # Result Cache
//!
//! A small in-process memoisation layer shared by the provider client and the
//! analytics engine.
//!
//! - **Single-flight:** concurrent callers asking for the same key await one
//!   shared computation instead of each hitting the upstream.
//! - **TTL:** finished values are served until they are older than the
//!   configured time-to-live, then treated as misses.
//! - **Failures are never stored:** the next caller retries from scratch.
//! - **Cancellation:** the shared computation lives only as long as someone is
//!   waiting on it. When every waiter is dropped the computation is dropped
//!   with it, and the next caller starts a fresh one.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

type Computation<V, E> = BoxFuture<'static, Result<V, E>>;

enum Slot<V, E> {
    Ready { value: V, created_at: DateTime<Utc> },
    Pending(WeakShared<Computation<V, E>>),
}

enum Lookup<V, E> {
    Hit(V),
    Join(Shared<Computation<V, E>>),
    Miss,
}

/// A concurrent, TTL-bounded, single-flight memo table.
pub struct ResultCache<K, V, E> {
    slots: Arc<Mutex<HashMap<K, Slot<V, E>>>>,
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl<K, V, E> Clone for ResultCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            ttl: self.ttl,
            max_entries: self.max_entries,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<K, V, E> ResultCache<K, V, E>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// A cache that keeps at most `max_entries` finished values for `ttl` each.
    pub fn new(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            max_entries: max_entries.max(1),
            clock,
        }
    }

    /// Deduplicates concurrent work without retaining any result.
    pub fn single_flight(clock: Arc<dyn Clock>) -> Self {
        Self::new(Duration::ZERO, 1, clock)
    }

    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.get_or_compute_if(key, compute, |_| true).await
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but a successful value is
    /// only stored when `retain` approves it. Waiters that joined the
    /// computation still receive the value either way.
    pub async fn get_or_compute_if<F, Fut, R>(&self, key: K, compute: F, retain: R) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        R: FnOnce(&V) -> bool + Send + 'static,
    {
        let shared = {
            let mut slots = self.slots.lock().await;
            let now = self.clock.now();

            let lookup = match slots.get(&key) {
                Some(Slot::Ready { value, created_at }) if is_fresh(self.ttl, *created_at, now) => {
                    Lookup::Hit(value.clone())
                }
                Some(Slot::Pending(weak)) => weak.upgrade().map_or(Lookup::Miss, Lookup::Join),
                _ => Lookup::Miss,
            };

            match lookup {
                Lookup::Hit(value) => {
                    tracing::debug!(?key, "Cache hit.");
                    return Ok(value);
                }
                Lookup::Join(shared) => {
                    tracing::debug!(?key, "Joining in-flight computation.");
                    shared
                }
                Lookup::Miss => {
                    tracing::debug!(?key, "Cache miss, starting computation.");
                    let shared = self.share(key.clone(), compute(), retain);
                    if let Some(weak) = shared.downgrade() {
                        slots.insert(key, Slot::Pending(weak));
                    }
                    shared
                }
            }
        };

        shared.await
    }

    /// Number of finished, unexpired values currently held.
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| match slot {
                Slot::Ready { created_at, .. } => is_fresh(self.ttl, *created_at, now),
                Slot::Pending(_) => false,
            })
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Wraps the computation so that, once finished, it files its own result.
    fn share<Fut, R>(&self, key: K, computation: Fut, retain: R) -> Shared<Computation<V, E>>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        R: FnOnce(&V) -> bool + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let clock = Arc::clone(&self.clock);
        let ttl = self.ttl;
        let max_entries = self.max_entries;

        async move {
            let result = computation.await;

            let mut slots = slots.lock().await;
            match &result {
                Ok(value) if !ttl.is_zero() => {
                    if retain(value) {
                        let now = clock.now();
                        slots.insert(
                            key,
                            Slot::Ready {
                                value: value.clone(),
                                created_at: now,
                            },
                        );
                        evict(&mut slots, ttl, max_entries, now);
                    } else {
                        tracing::debug!(?key, "Result not retained.");
                        slots.remove(&key);
                    }
                }
                _ => {
                    slots.remove(&key);
                }
            }

            result
        }
        .boxed()
        .shared()
    }
}

fn is_fresh(ttl: Duration, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    // A clock that went backwards counts as age zero.
    (now - created_at)
        .to_std()
        .map(|age| age < ttl)
        .unwrap_or(true)
}

/// Drops expired values and abandoned computations, then the oldest values
/// beyond capacity.
fn evict<K, V, E>(
    slots: &mut HashMap<K, Slot<V, E>>,
    ttl: Duration,
    max_entries: usize,
    now: DateTime<Utc>,
) where
    K: Eq + Hash + Clone + Debug,
{
    slots.retain(|_, slot| match slot {
        Slot::Ready { created_at, .. } => is_fresh(ttl, *created_at, now),
        Slot::Pending(weak) => weak.upgrade().is_some(),
    });

    let mut ready: Vec<(K, DateTime<Utc>)> = slots
        .iter()
        .filter_map(|(key, slot)| match slot {
            Slot::Ready { created_at, .. } => Some((key.clone(), *created_at)),
            Slot::Pending(_) => None,
        })
        .collect();

    if ready.len() > max_entries {
        ready.sort_by_key(|(_, created_at)| *created_at);
        let excess = ready.len() - max_entries;
        for (key, _) in ready.into_iter().take(excess) {
            tracing::debug!(?key, "Evicting cache entry over capacity.");
            slots.remove(&key);
        }
    }
}
