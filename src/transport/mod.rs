//! Request/response transport to the remote API.
//!
//! The transport knows nothing about caching: it turns a resource path,
//! query parameters and an optional JSON payload into a parsed response body
//! or a [`TransportError`]. It never retries.

mod error;
mod http;

#[cfg(test)]
pub(crate) mod fake;

pub use error::{FieldError, Result, TransportError};
pub use http::HttpTransport;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::QueryParams;

/// HTTP verbs the API surface uses.
#[async_trait]
pub trait Transport: Send + Sync {
  /// `GET path?params`
  async fn get(&self, path: &str, params: &QueryParams) -> Result<Value>;

  /// `POST path` with an optional JSON body
  async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value>;

  /// `DELETE path?params`
  async fn delete(&self, path: &str, params: &QueryParams) -> Result<Value>;
}
