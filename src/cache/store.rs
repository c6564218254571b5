//! Keyed query store with request de-duplication, invalidation and
//! change subscriptions.

use chrono::{Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, trace};

use super::entry::{CacheEntry, FetchError, Status};
use super::key::QueryKey;

/// Outcome of a single fetch.
pub type FetchResult = Result<Value, FetchError>;

/// Factory producing the request future for a key. Called once per fetch.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;

/// Change callback registered through [`QueryCache::subscribe`].
pub type Listener = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

type InFlight = Shared<BoxFuture<'static, FetchResult>>;

/// Wrap an async closure as a [`Fetcher`].
pub fn fetcher<F, Fut>(f: F) -> Fetcher
where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: std::future::Future<Output = FetchResult> + Send + 'static,
{
  Arc::new(move || f().boxed())
}

struct Slot {
  entry: CacheEntry,
  /// Bumped every time a fetch starts or a write lands; a response is only
  /// applied if its generation is still current.
  generation: u64,
  in_flight: Option<InFlight>,
  fetcher: Option<Fetcher>,
  listeners: Vec<(u64, Listener)>,
}

impl Slot {
  fn new(key: QueryKey) -> Self {
    Self {
      entry: CacheEntry::idle(key),
      generation: 0,
      in_flight: None,
      fetcher: None,
      listeners: Vec::new(),
    }
  }

  fn listeners(&self) -> Vec<Listener> {
    self.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
  }
}

struct Inner {
  slots: Mutex<HashMap<QueryKey, Slot>>,
  next_listener: AtomicU64,
  /// Source of `CacheEntry::version`, shared by all keys so versions never
  /// repeat after `clear`
  next_version: AtomicU64,
  stale_time: Option<Duration>,
}

impl Inner {
  fn slots(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot>> {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Stamp a changed entry. Must be called with the slot lock held so that
  /// versions follow the order of changes.
  fn touch(&self, entry: &mut CacheEntry) {
    entry.version = self.next_version.fetch_add(1, Ordering::Relaxed);
  }
}

/// Listener calls collected under the lock and delivered after releasing it,
/// so listeners may call back into the cache. Deliveries from different
/// tasks can interleave; receivers order snapshots by `CacheEntry::version`.
type Batch = Vec<(Vec<Listener>, CacheEntry)>;

fn deliver(batch: Batch) {
  for (listeners, entry) in batch {
    for listener in listeners {
      listener(&entry);
    }
  }
}

/// Process-wide query cache.
///
/// Cloning is cheap and every clone addresses the same entries. There is no
/// global instance: create one at startup and hand it to whoever needs it.
///
/// Fetches are spawned onto the current tokio runtime, so [`read`](Self::read)
/// and friends must be called from within one.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<Inner>,
}

impl QueryCache {
  /// Create an empty cache. Entries only become stale through invalidation.
  pub fn new() -> Self {
    Self::build(None)
  }

  /// Create an empty cache whose successful entries also go stale once they
  /// are older than `stale_time`.
  pub fn with_stale_time(stale_time: Duration) -> Self {
    Self::build(Some(stale_time))
  }

  fn build(stale_time: Option<Duration>) -> Self {
    Self {
      inner: Arc::new(Inner {
        slots: Mutex::new(HashMap::new()),
        next_listener: AtomicU64::new(1),
        next_version: AtomicU64::new(1),
        stale_time,
      }),
    }
  }

  /// Return the entry for `key`, starting a fetch if it is missing or stale.
  ///
  /// At most one request per key is ever in flight: reads made while one is
  /// pending get the current (loading) snapshot and share its result.
  pub fn read(&self, key: &QueryKey, fetcher: Fetcher) -> CacheEntry {
    self.ensure(key, Some(fetcher), false).0
  }

  /// Read `key` and wait for it to settle.
  ///
  /// Resolves with the result of the request it waited on, unless that
  /// request was superseded (refetch, write or invalidation), in which case
  /// it follows the newer state of the key.
  pub async fn fetch(&self, key: &QueryKey, fetcher: Fetcher) -> FetchResult {
    let (mut entry, mut pending) = self.ensure(key, Some(fetcher), false);
    while let Some((generation, in_flight)) = pending {
      // The shared future settles the entry before resolving.
      let result = in_flight.await;
      match self.generation(key) {
        Some(current) if current != generation => {
          (entry, pending) = self.ensure(key, None, false);
        }
        // Still current, or the cache was cleared meanwhile.
        _ => return result,
      }
    }
    entry.outcome()
  }

  /// Start a new fetch for `key` with its last fetcher, superseding any
  /// request still in flight.
  pub fn refetch(&self, key: &QueryKey) -> CacheEntry {
    self.ensure(key, None, true).0
  }

  /// Snapshot of `key` without fetching.
  pub fn peek(&self, key: &QueryKey) -> Option<CacheEntry> {
    self.inner.slots().get(key).map(|slot| slot.entry.clone())
  }

  /// Replace the data of `key` without a network round trip.
  ///
  /// A fetch still in flight for the key is superseded and its response
  /// dropped on arrival.
  pub fn write(&self, key: &QueryKey, data: Value) -> CacheEntry {
    let (entry, listeners) = {
      let mut slots = self.inner.slots();
      let slot = slots
        .entry(key.clone())
        .or_insert_with(|| Slot::new(key.clone()));
      slot.generation += 1;
      slot.in_flight = None;

      let entry = &mut slot.entry;
      entry.status = Status::Success;
      entry.data = Some(data);
      entry.error = None;
      entry.updated_at = Some(Utc::now());
      entry.stale = false;
      self.inner.touch(entry);
      (entry.clone(), slot.listeners())
    };
    debug!(key = %key, "entry written");
    deliver(vec![(listeners, entry.clone())]);
    entry
  }

  /// Mark every entry matched by `prefix` stale and tell its subscribers.
  ///
  /// Nothing is refetched here; the next read of a stale key does that. A
  /// request in flight for a matched key is detached, so its (possibly
  /// pre-mutation) response is discarded. Returns the number of entries
  /// that changed.
  pub fn invalidate(&self, prefix: &QueryKey) -> usize {
    let batch: Batch = {
      let mut slots = self.inner.slots();
      slots
        .values_mut()
        .filter(|slot| prefix.matches(&slot.entry.key))
        .filter_map(|slot| {
          let detached = slot.in_flight.take().is_some();
          if detached {
            slot.generation += 1;
          }
          if slot.entry.stale && !detached {
            return None;
          }
          slot.entry.stale = true;
          self.inner.touch(&mut slot.entry);
          Some((slot.listeners(), slot.entry.clone()))
        })
        .collect()
    };
    let changed = batch.len();
    debug!(prefix = %prefix, changed, "invalidated");
    deliver(batch);
    changed
  }

  /// Register `listener` for changes to `key`.
  ///
  /// The listener runs on whichever task changed the entry, after the cache
  /// lock is released.
  pub fn subscribe<F>(&self, key: &QueryKey, listener: F) -> Subscription
  where
    F: Fn(&CacheEntry) + Send + Sync + 'static,
  {
    let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
    let mut slots = self.inner.slots();
    slots
      .entry(key.clone())
      .or_insert_with(|| Slot::new(key.clone()))
      .listeners
      .push((id, Arc::new(listener)));
    trace!(key = %key, id, "subscribed");

    Subscription {
      cache: Arc::downgrade(&self.inner),
      key: key.clone(),
      id,
    }
  }

  /// Drop every entry and listener.
  ///
  /// Responses still in flight find nothing to update and are discarded.
  pub fn clear(&self) {
    let mut slots = self.inner.slots();
    debug!(entries = slots.len(), "cache cleared");
    slots.clear();
  }

  pub fn len(&self) -> usize {
    self.inner.slots().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn generation(&self, key: &QueryKey) -> Option<u64> {
    self.inner.slots().get(key).map(|slot| slot.generation)
  }

  /// Start a fetch if needed. Returns the entry and, if a request is in
  /// flight, its generation and shared future.
  fn ensure(
    &self,
    key: &QueryKey,
    fetcher: Option<Fetcher>,
    force: bool,
  ) -> (CacheEntry, Option<(u64, InFlight)>) {
    let (entry, pending, listeners) = {
      let mut slots = self.inner.slots();
      let slot = slots
        .entry(key.clone())
        .or_insert_with(|| Slot::new(key.clone()));
      if fetcher.is_some() {
        slot.fetcher = fetcher;
      }

      let started = (force || self.needs_fetch(slot)) && self.start_fetch(slot);
      let listeners = if started {
        slot.listeners()
      } else {
        Vec::new()
      };
      let pending = slot
        .in_flight
        .clone()
        .map(|in_flight| (slot.generation, in_flight));
      (slot.entry.clone(), pending, listeners)
    };
    deliver(vec![(listeners, entry.clone())]);
    (entry, pending)
  }

  fn needs_fetch(&self, slot: &Slot) -> bool {
    if slot.in_flight.is_some() {
      return false;
    }
    let entry = &slot.entry;
    match entry.status {
      Status::Idle | Status::Loading => true,
      Status::Success => entry.stale || self.is_expired(entry),
      // Errors are retried only after invalidation or an explicit refetch.
      Status::Error => entry.stale,
    }
  }

  fn is_expired(&self, entry: &CacheEntry) -> bool {
    match (self.inner.stale_time, entry.updated_at) {
      (Some(stale_time), Some(updated_at)) => Utc::now() - updated_at > stale_time,
      _ => false,
    }
  }

  fn start_fetch(&self, slot: &mut Slot) -> bool {
    let Some(fetcher) = slot.fetcher.clone() else {
      debug!(key = %slot.entry.key, "no fetcher registered, cannot fetch");
      return false;
    };

    slot.generation += 1;
    let generation = slot.generation;
    let key = slot.entry.key.clone();
    let cache = Arc::downgrade(&self.inner);
    let request = fetcher();

    let in_flight = async move {
      let result = request.await;
      if let Some(inner) = cache.upgrade() {
        QueryCache { inner }.settle(&key, generation, &result);
      }
      result
    }
    .boxed()
    .shared();

    slot.in_flight = Some(in_flight.clone());
    slot.entry.status = Status::Loading;
    self.inner.touch(&mut slot.entry);
    debug!(key = %slot.entry.key, generation, "fetch started");

    // Drive the request even if nobody awaits it.
    tokio::spawn(in_flight);
    true
  }

  fn settle(&self, key: &QueryKey, generation: u64, result: &FetchResult) {
    let (entry, listeners) = {
      let mut slots = self.inner.slots();
      let Some(slot) = slots.get_mut(key) else {
        debug!(key = %key, "entry cleared before response arrived");
        return;
      };
      if slot.generation != generation {
        debug!(
          key = %key,
          generation,
          current = slot.generation,
          "discarding superseded response"
        );
        return;
      }
      slot.in_flight = None;

      let entry = &mut slot.entry;
      match result {
        Ok(data) => {
          entry.status = Status::Success;
          entry.data = Some(data.clone());
          entry.error = None;
          entry.updated_at = Some(Utc::now());
        }
        Err(error) => {
          // Previous data stays in place.
          debug!(key = %key, error = %error, "fetch failed");
          entry.status = Status::Error;
          entry.error = Some(error.clone());
        }
      }
      entry.stale = false;
      self.inner.touch(entry);
      (entry.clone(), slot.listeners())
    };
    deliver(vec![(listeners, entry)]);
  }

  fn unsubscribe(inner: &Inner, key: &QueryKey, id: u64) {
    if let Some(slot) = inner.slots().get_mut(key) {
      slot.listeners.retain(|(listener_id, _)| *listener_id != id);
    }
  }
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for QueryCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryCache")
      .field("entries", &self.len())
      .field("stale_time", &self.inner.stale_time)
      .finish_non_exhaustive()
  }
}

/// Live registration of a listener. Dropping it unsubscribes.
///
/// Unsubscribing never cancels a request in flight; its response is still
/// cached for other readers.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
  cache: Weak<Inner>,
  key: QueryKey,
  id: u64,
}

impl Subscription {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(inner) = self.cache.upgrade() {
      QueryCache::unsubscribe(&inner, &self.key, self.id);
      trace!(key = %self.key, id = self.id, "unsubscribed");
    }
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("key", &self.key)
      .field("id", &self.id)
      .finish()
  }
}
