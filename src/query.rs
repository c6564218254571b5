//! Live query handles over the [`QueryCache`].
//!
//! Inspired by TanStack Query, a `Query<T>` is what a screen holds while it
//! shows some remote data: it subscribes to one cache key, projects the raw
//! response into `T`, and always has something to render.
//!
//! # Example
//!
//! ```ignore
//! let mut estimates = client.estimates().list(&ListQuery::default());
//!
//! // Renders the empty collection straight away, never "nothing".
//! render(estimates.data());
//!
//! // In event loop tick
//! if estimates.poll() {
//!     // Entry changed (loaded, failed, or invalidated and refetched)
//!     render(estimates.data());
//! }
//! ```

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

use crate::cache::{CacheEntry, FetchError, Fetcher, QueryCache, QueryKey, Status, Subscription};

/// Projection from a raw response body into the shape a consumer renders.
pub type Select<T> = Arc<dyn Fn(&Value) -> serde_json::Result<T> + Send + Sync>;

/// A subscribed read of one cache key.
///
/// Dropping the handle unsubscribes; a request it started keeps running and
/// its result stays cached.
pub struct Query<T> {
  cache: QueryCache,
  key: QueryKey,
  fetcher: Fetcher,
  select: Select<T>,
  /// Returned by `data()` until a response has been projected
  placeholder: T,
  entry: CacheEntry,
  selected: Option<T>,
  select_error: Option<FetchError>,
  receiver: mpsc::UnboundedReceiver<CacheEntry>,
  _subscription: Subscription,
}

impl<T> Query<T> {
  /// Subscribe to `key` and read it, starting a fetch if needed.
  pub fn new(
    cache: &QueryCache,
    key: QueryKey,
    fetcher: Fetcher,
    select: Select<T>,
    placeholder: T,
  ) -> Self {
    let (tx, receiver) = mpsc::unbounded_channel();
    let subscription = cache.subscribe(&key, move |entry| {
      // Ignore send errors - the handle may be going away
      let _ = tx.send(entry.clone());
    });
    let entry = cache.read(&key, fetcher.clone());

    let mut query = Self {
      cache: cache.clone(),
      key,
      fetcher,
      select,
      placeholder,
      entry: entry.clone(),
      selected: None,
      select_error: None,
      receiver,
      _subscription: subscription,
    };
    query.apply(entry);
    query
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Projected data, or the placeholder if nothing has loaded yet.
  pub fn data(&self) -> &T {
    self.selected.as_ref().unwrap_or(&self.placeholder)
  }

  /// Whether `data()` holds a projected response rather than the placeholder.
  pub fn has_data(&self) -> bool {
    self.selected.is_some()
  }

  pub fn status(&self) -> Status {
    self.entry.status
  }

  pub fn is_loading(&self) -> bool {
    self.entry.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.entry.is_success() && self.select_error.is_none()
  }

  pub fn is_error(&self) -> bool {
    self.entry.is_error() || self.select_error.is_some()
  }

  pub fn is_stale(&self) -> bool {
    self.entry.stale
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.entry.error.as_ref().or(self.select_error.as_ref())
  }

  pub fn updated_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
    self.entry.updated_at
  }

  /// Apply pending notifications without blocking.
  ///
  /// Returns `true` if the entry changed. Call this in your event loop tick
  /// handler.
  pub fn poll(&mut self) -> bool {
    match self.receiver.try_recv() {
      Ok(entry) => {
        let latest = self.drain(entry);
        self.update(latest);
        true
      }
      Err(_) => false,
    }
  }

  /// Wait for the next change to the entry.
  ///
  /// Returns `false` once the cache has been cleared and no further changes
  /// can arrive.
  pub async fn changed(&mut self) -> bool {
    match self.receiver.recv().await {
      Some(entry) => {
        let latest = self.drain(entry);
        self.update(latest);
        true
      }
      None => false,
    }
  }

  /// Wait until the entry is neither loading nor stale, then return the data.
  pub async fn settled(&mut self) -> &T {
    self.poll();
    while self.entry.is_loading() || self.entry.stale {
      if !self.changed().await {
        break;
      }
    }
    self.data()
  }

  /// Force a new request, superseding any one in flight.
  pub fn refetch(&mut self) {
    let entry = self.cache.refetch(&self.key);
    self.apply(entry);
  }

  /// Newest of `first` and everything already queued behind it.
  fn drain(&mut self, first: CacheEntry) -> CacheEntry {
    let mut latest = first;
    while let Ok(entry) = self.receiver.try_recv() {
      if entry.version >= latest.version {
        latest = entry;
      }
    }
    latest
  }

  fn update(&mut self, entry: CacheEntry) {
    // Notifications from different tasks may arrive out of order.
    if entry.version < self.entry.version {
      return;
    }
    let stale = entry.stale;
    self.apply(entry);
    // An invalidated entry refetches on the next read by a live subscriber;
    // this handle is that subscriber. Reads are de-duplicated by the cache.
    if stale {
      let entry = self.cache.read(&self.key, self.fetcher.clone());
      self.apply(entry);
    }
  }

  fn apply(&mut self, entry: CacheEntry) {
    if entry.version < self.entry.version {
      return;
    }
    let fresh_data = entry.updated_at != self.entry.updated_at || self.selected.is_none();
    if let (true, Some(data)) = (fresh_data, &entry.data) {
      match (self.select)(data) {
        Ok(value) => {
          self.selected = Some(value);
          self.select_error = None;
        }
        Err(e) => {
          warn!(key = %self.key, error = %e, "response did not match expected shape");
          self.select_error = Some(FetchError::new(
            None,
            format!("Unexpected response shape: {}", e),
          ));
        }
      }
    }
    self.entry = entry;
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("status", &self.entry.status)
      .field("stale", &self.entry.stale)
      .field("data", self.data())
      .finish_non_exhaustive()
  }
}
