//! reqwest-backed transport.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::{FieldError, Result, TransportError};
use super::Transport;
use crate::cache::QueryParams;
use crate::config::ApiConfig;

/// HTTP client for the accounting API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpTransport {
  /// Build a client that sends the token, organization and locale headers the
  /// API expects on every request.
  pub fn new(api: &ApiConfig, token: Option<&str>) -> Result<Self> {
    let mut base = api.url.clone();
    if !base.ends_with('/') {
      base.push('/');
    }
    let base_url = Url::parse(&base)?;

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT_LANGUAGE, header_value(&api.locale)?);
    if let Some(token) = token {
      headers.insert("x-access-token", header_value(token)?);
    }
    if let Some(organization) = &api.organization_id {
      headers.insert("organization-id", header_value(organization)?);
    }

    let client = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(api.timeout_secs))
      .build()?;

    Ok(Self { client, base_url })
  }

  /// Get the base URL.
  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Build a URL for a resource path.
  fn url(&self, path: &str, params: &QueryParams) -> Result<Url> {
    let mut url = self.base_url.join(path.trim_start_matches('/'))?;
    if !params.is_empty() {
      url.query_pairs_mut().extend_pairs(params.iter());
    }
    Ok(url)
  }

  async fn handle_response(&self, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.bytes().await?;

    if status.is_success() {
      if body.is_empty() {
        return Ok(Value::Null);
      }
      return serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()));
    }

    Err(error_from_body(
      status.as_u16(),
      status.canonical_reason(),
      &body,
    ))
  }
}

fn header_value(value: &str) -> Result<HeaderValue> {
  HeaderValue::from_str(value)
    .map_err(|e| TransportError::InvalidRequest(format!("Invalid header value: {}", e)))
}

/// Error envelope the API returns on failures.
#[derive(Debug, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  message: Option<String>,
  #[serde(default)]
  errors: Vec<FieldError>,
}

fn error_from_body(status: u16, reason: Option<&str>, body: &[u8]) -> TransportError {
  let fallback = || reason.unwrap_or("Unknown error").to_string();

  match serde_json::from_slice::<ErrorBody>(body) {
    Ok(parsed) => {
      let message = parsed
        .message
        .or_else(|| {
          parsed
            .errors
            .first()
            .map(|e| e.message.clone().unwrap_or_else(|| e.kind.clone()))
        })
        .unwrap_or_else(fallback);

      if parsed.errors.is_empty() {
        TransportError::Http { status, message }
      } else {
        TransportError::Validation {
          status,
          message,
          errors: parsed.errors,
        }
      }
    }
    Err(_) => {
      let text = String::from_utf8_lossy(body).trim().to_string();
      let message = if text.is_empty() { fallback() } else { text };
      TransportError::Http { status, message }
    }
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn get(&self, path: &str, params: &QueryParams) -> Result<Value> {
    let url = self.url(path, params)?;
    debug!(method = "GET", url = %url, "request");
    let response = self.client.get(url).send().await?;
    self.handle_response(response).await
  }

  async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
    let url = self.url(path, &QueryParams::new())?;
    debug!(method = "POST", url = %url, "request");
    let request = self.client.post(url);
    let request = match body {
      Some(body) => request.json(body),
      None => request,
    };
    let response = request.send().await?;
    self.handle_response(response).await
  }

  async fn delete(&self, path: &str, params: &QueryParams) -> Result<Value> {
    let url = self.url(path, params)?;
    debug!(method = "DELETE", url = %url, "request");
    let response = self.client.delete(url).send().await?;
    self.handle_response(response).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_json, header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn transport(server: &MockServer) -> HttpTransport {
    let api = ApiConfig {
      url: server.uri(),
      organization_id: Some("org_1".to_string()),
      locale: "en".to_string(),
      timeout_secs: 5,
    };
    HttpTransport::new(&api, Some("secret")).unwrap()
  }

  #[tokio::test]
  async fn test_get_sends_params_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/sales/estimates"))
      .and(query_param("page", "2"))
      .and(query_param("page_size", "12"))
      .and(header("x-access-token", "secret"))
      .and(header("organization-id", "org_1"))
      .and(header("accept-language", "en"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sales_estimates": [] })))
      .expect(1)
      .mount(&server)
      .await;

    let params = QueryParams::new().with("page", 2).with("page_size", 12);
    let body = transport(&server)
      .get("sales/estimates", &params)
      .await
      .unwrap();
    assert_eq!(body, json!({ "sales_estimates": [] }));
  }

  #[tokio::test]
  async fn test_post_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/sales/estimates/3"))
      .and(body_json(json!({ "reference": "PO-9" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 3 })))
      .expect(1)
      .mount(&server)
      .await;

    let body = transport(&server)
      .post("/sales/estimates/3", Some(&json!({ "reference": "PO-9" })))
      .await
      .unwrap();
    assert_eq!(body["id"], 3);
  }

  #[tokio::test]
  async fn test_empty_success_body_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/expenses/4"))
      .respond_with(ResponseTemplate::new(204))
      .mount(&server)
      .await;

    let body = transport(&server)
      .delete("expenses/4", &QueryParams::new())
      .await
      .unwrap();
    assert_eq!(body, Value::Null);
  }

  #[tokio::test]
  async fn test_field_errors_become_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/sales/estimates"))
      .respond_with(ResponseTemplate::new(400).set_body_json(json!({
        "errors": [{ "type": "ESTIMATE.NUMBER.IS.NOT.UNQIUE", "code": 300 }]
      })))
      .mount(&server)
      .await;

    let err = transport(&server)
      .post("sales/estimates", Some(&json!({})))
      .await
      .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.message(), "ESTIMATE.NUMBER.IS.NOT.UNQIUE");
    assert_eq!(err.field_errors().len(), 1);
    assert_eq!(err.field_errors()[0].code, Some(300));
  }

  #[tokio::test]
  async fn test_plain_text_failure_keeps_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/sales/invoices/9"))
      .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
      .mount(&server)
      .await;

    let err = transport(&server)
      .get("sales/invoices/9", &QueryParams::new())
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      TransportError::Http { status: 500, ref message } if message == "database unavailable"
    ));
  }

  #[test]
  fn test_base_url_keeps_api_prefix() {
    let api = ApiConfig {
      url: "https://books.example.com/api".to_string(),
      organization_id: None,
      locale: "en".to_string(),
      timeout_secs: 5,
    };
    let transport = HttpTransport::new(&api, None).unwrap();
    let url = transport
      .url("sales/receipts", &QueryParams::new().with("page", 1))
      .unwrap();
    assert_eq!(url.as_str(), "https://books.example.com/api/sales/receipts?page=1");
  }
}
