//! Client-side query cache.
//!
//! This module provides a resource-agnostic keyed store that:
//! - Serves entries from memory until they are invalidated (or expire)
//! - Keeps at most one request in flight per key
//! - Drops responses superseded by a newer request for the same key
//! - Notifies subscribers whenever an entry changes

mod entry;
mod key;
mod store;

pub use entry::{CacheEntry, FetchError, Status};
pub use key::{QueryKey, QueryParams};
pub use store::{fetcher, FetchResult, Fetcher, Listener, QueryCache, Subscription};
