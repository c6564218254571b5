//! Cache entries and the failure descriptor stored in them.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;

use super::key::QueryKey;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
  /// Known to the cache (e.g. subscribed) but never fetched
  #[default]
  Idle,
  /// A fetch is pending; `data` may still hold the previous value
  Loading,
  /// The last applied fetch or write succeeded
  Success,
  /// The last applied fetch failed
  Error,
}

/// Failure recorded on an entry when a fetch fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
  /// HTTP status returned by the server, `None` for network-level failures
  pub http_status: Option<u16>,
  pub message: String,
}

impl FetchError {
  pub fn new(http_status: Option<u16>, message: impl Into<String>) -> Self {
    Self {
      http_status,
      message: message.into(),
    }
  }
}

impl fmt::Display for FetchError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.http_status {
      Some(status) => write!(f, "{} ({})", self.message, status),
      None => write!(f, "{}", self.message),
    }
  }
}

impl std::error::Error for FetchError {}

/// Snapshot of one keyed entry.
///
/// The cache owns the authoritative copy; callers only ever see clones.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub key: QueryKey,
  pub status: Status,
  /// Raw response body of the last successful fetch or write
  pub data: Option<Value>,
  pub error: Option<FetchError>,
  /// When `data` was last replaced
  pub updated_at: Option<DateTime<Utc>>,
  /// Set by invalidation, cleared when a fresh response is applied
  pub stale: bool,
  /// Increases with every change; a snapshot with a lower version than one
  /// already seen is out of date.
  pub version: u64,
}

impl CacheEntry {
  pub(crate) fn idle(key: QueryKey) -> Self {
    Self {
      key,
      status: Status::Idle,
      data: None,
      error: None,
      updated_at: None,
      stale: false,
      version: 0,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.status == Status::Loading
  }

  pub fn is_success(&self) -> bool {
    self.status == Status::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == Status::Error
  }

  /// Result view of a settled entry.
  pub(crate) fn outcome(&self) -> Result<Value, FetchError> {
    match (&self.status, &self.error, &self.data) {
      (Status::Error, Some(error), _) => Err(error.clone()),
      (_, _, Some(data)) => Ok(data.clone()),
      _ => Err(FetchError::new(None, format!("No data cached for {}", self.key))),
    }
  }
}
