//! In-memory transport for tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{Result, Transport, TransportError};
use crate::cache::QueryParams;

/// A request the fake received.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
  pub method: &'static str,
  pub path: String,
  pub params: QueryParams,
  pub body: Option<Value>,
}

#[derive(Debug, Clone)]
enum Reply {
  Ok(Value),
  Err(u16, String),
}

/// Scripted transport: each route answers with its queued replies in order,
/// repeating the last one once the queue is down to a single reply.
#[derive(Default)]
pub struct FakeTransport {
  routes: Mutex<HashMap<(&'static str, String), VecDeque<Reply>>>,
  calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, method: &'static str, path: &str, body: Value) -> &Self {
    self.push(method, path, Reply::Ok(body))
  }

  pub fn fail(&self, method: &'static str, path: &str, status: u16, message: &str) -> &Self {
    self.push(method, path, Reply::Err(status, message.to_string()))
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn count(&self, method: &str, path: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| c.method == method && c.path == path)
      .count()
  }

  fn push(&self, method: &'static str, path: &str, reply: Reply) -> &Self {
    self
      .routes
      .lock()
      .unwrap()
      .entry((method, path.to_string()))
      .or_default()
      .push_back(reply);
    self
  }

  async fn answer(
    &self,
    method: &'static str,
    path: &str,
    params: &QueryParams,
    body: Option<&Value>,
  ) -> Result<Value> {
    self.calls.lock().unwrap().push(Call {
      method,
      path: path.to_string(),
      params: params.clone(),
      body: body.cloned(),
    });

    let reply = {
      let mut routes = self.routes.lock().unwrap();
      match routes.get_mut(&(method, path.to_string())) {
        Some(queue) if queue.len() > 1 => queue.pop_front(),
        Some(queue) => queue.front().cloned(),
        None => None,
      }
    };

    // Suspend like a real request would.
    tokio::task::yield_now().await;

    match reply {
      Some(Reply::Ok(body)) => Ok(body),
      Some(Reply::Err(status, message)) => Err(TransportError::Http { status, message }),
      None => Err(TransportError::Http {
        status: 404,
        message: format!("no route for {} {}", method, path),
      }),
    }
  }
}

#[async_trait]
impl Transport for FakeTransport {
  async fn get(&self, path: &str, params: &QueryParams) -> Result<Value> {
    self.answer("GET", path, params, None).await
  }

  async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
    self.answer("POST", path, &QueryParams::new(), body).await
  }

  async fn delete(&self, path: &str, params: &QueryParams) -> Result<Value> {
    self.answer("DELETE", path, params, None).await
  }
}
