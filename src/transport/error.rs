//! Transport error types.

use serde::Deserialize;
use thiserror::Error;

use crate::cache::FetchError;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// One field-level rejection reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldError {
  /// Machine-readable error type, e.g. `ESTIMATE.NUMBER.IS.NOT.UNQIUE`
  #[serde(rename = "type", default)]
  pub kind: String,
  #[serde(default)]
  pub code: Option<i64>,
  #[serde(default)]
  pub message: Option<String>,
}

/// Errors that can occur while talking to the API.
#[derive(Error, Debug)]
pub enum TransportError {
  #[error("Server returned {status}: {message}")]
  Http { status: u16, message: String },

  #[error("Request rejected ({status}): {message}")]
  Validation {
    status: u16,
    message: String,
    errors: Vec<FieldError>,
  },

  #[error("Network error: {0}")]
  Network(String),

  #[error("Invalid response body: {0}")]
  Decode(String),

  #[error("Invalid request: {0}")]
  InvalidRequest(String),
}

impl TransportError {
  /// HTTP status of the failed response, if one was received.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Http { status, .. } | Self::Validation { status, .. } => Some(*status),
      Self::Network(_) | Self::Decode(_) | Self::InvalidRequest(_) => None,
    }
  }

  /// Human-readable message, as the server phrased it where possible.
  pub fn message(&self) -> String {
    match self {
      Self::Http { message, .. } | Self::Validation { message, .. } => message.clone(),
      other => other.to_string(),
    }
  }

  /// Field-level errors of a validation failure.
  pub fn field_errors(&self) -> &[FieldError] {
    match self {
      Self::Validation { errors, .. } => errors,
      _ => &[],
    }
  }
}

impl From<reqwest::Error> for TransportError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      Self::Decode(e.to_string())
    } else {
      Self::Network(e.to_string())
    }
  }
}

impl From<url::ParseError> for TransportError {
  fn from(e: url::ParseError) -> Self {
    Self::InvalidRequest(e.to_string())
  }
}

impl From<&TransportError> for FetchError {
  fn from(e: &TransportError) -> Self {
    FetchError::new(e.status(), e.message())
  }
}

impl From<TransportError> for FetchError {
  fn from(e: TransportError) -> Self {
    FetchError::from(&e)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fetch_error_carries_status_and_message() {
    let err = TransportError::Http {
      status: 404,
      message: "Estimate not found".to_string(),
    };
    let fetch = FetchError::from(&err);
    assert_eq!(fetch.http_status, Some(404));
    assert_eq!(fetch.message, "Estimate not found");
  }

  #[test]
  fn test_network_error_has_no_status() {
    let fetch = FetchError::from(TransportError::Network("connection refused".to_string()));
    assert_eq!(fetch.http_status, None);
    assert_eq!(fetch.message, "Network error: connection refused");
  }
}
