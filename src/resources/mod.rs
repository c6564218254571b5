//! Resource hook set: what to fetch and mutate for each document type, and
//! which cache keys each mutation makes stale.
//!
//! Every resource is a marker type implementing [`Resource`]. Reads return
//! live [`Query`] handles; mutations go straight to the transport and, on
//! success, invalidate exactly the keys the resource enumerates in
//! [`Resource::invalidates`].

pub mod api_types;
mod estimates;
mod expenses;
mod invoices;
mod receipts;
pub mod types;

pub use estimates::{Estimate, EstimateAction, Estimates};
pub use expenses::{Expense, ExpenseAction, Expenses};
pub use invoices::{Invoice, InvoiceAction, Invoices};
pub use receipts::{DepositAccount, Receipt, ReceiptAction, Receipts};
pub use types::{Collection, Contact, FilterMeta, ListQuery, MutationOutcome, Pagination, Sort, SortOrder};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{fetcher, FetchError, QueryCache, QueryKey, QueryParams};
use crate::notify::{Notification, Notifier};
use crate::query::Query;
use crate::transport::{Transport, TransportError};

/// A status transition a resource supports (deliver, approve, publish, ...).
pub trait Action: Copy + Debug + Send + Sync + 'static {
  /// Path segment after `/{path}/{id}/`
  fn segment(&self) -> &'static str;

  fn success_message(&self) -> &'static str;
}

/// A successful write, as far as invalidation is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<A> {
  Create,
  Update { id: u64 },
  Delete { id: u64 },
  BulkDelete { ids: Vec<u64> },
  Transition { id: u64, action: A },
}

/// One document type of the API.
pub trait Resource: Send + Sync + 'static {
  type Record: DeserializeOwned + Serialize + Default + Clone + Debug + Send + Sync + 'static;
  type Action: Action;

  /// Singular noun used in notifications
  const LABEL: &'static str;
  /// Collection path, e.g. `sales/estimates`
  const PATH: &'static str;
  const LIST_TAG: &'static str;
  const DETAIL_TAG: &'static str;
  /// Field holding the records in a list response
  const LIST_FIELD: &'static str;
  /// Field holding the record in a detail response
  const DETAIL_FIELD: &'static str;

  /// What a list renders before its first response arrives.
  fn empty_list() -> Collection<Self::Record>;

  /// Keys a successful `mutation` makes stale.
  fn invalidates(mutation: &Mutation<Self::Action>) -> Vec<QueryKey>;

  /// Prefix covering every list of this resource.
  fn lists() -> QueryKey {
    QueryKey::new(Self::LIST_TAG)
  }

  fn list_key(query: &ListQuery) -> QueryKey {
    Self::lists().with_params(query.to_params())
  }

  fn detail_key(id: u64) -> QueryKey {
    QueryKey::new(Self::DETAIL_TAG).with_id(id)
  }
}

/// Entry point tying the cache, the transport and the notification sink
/// together.
#[derive(Clone)]
pub struct Client {
  cache: QueryCache,
  transport: Arc<dyn Transport>,
  notifier: Arc<dyn Notifier>,
}

impl Client {
  pub fn new(cache: QueryCache, transport: Arc<dyn Transport>, notifier: Arc<dyn Notifier>) -> Self {
    Self {
      cache,
      transport,
      notifier,
    }
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  pub fn resource<R: Resource>(&self) -> ResourceClient<R> {
    ResourceClient {
      client: self.clone(),
      _resource: PhantomData,
    }
  }

  pub fn estimates(&self) -> ResourceClient<Estimates> {
    self.resource()
  }

  pub fn invoices(&self) -> ResourceClient<Invoices> {
    self.resource()
  }

  pub fn receipts(&self) -> ResourceClient<Receipts> {
    self.resource()
  }

  pub fn expenses(&self) -> ResourceClient<Expenses> {
    self.resource()
  }
}

impl std::fmt::Debug for Client {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Client")
      .field("cache", &self.cache)
      .finish_non_exhaustive()
  }
}

/// The request half of a mutation.
enum Request<'a> {
  Post {
    path: String,
    body: Option<&'a Value>,
  },
  Delete {
    path: String,
    params: QueryParams,
  },
}

/// Reads and writes of one resource type.
pub struct ResourceClient<R> {
  client: Client,
  _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> ResourceClient<R> {
  /// Live list query. Its data is `R::empty_list()` until the first response.
  pub fn list(&self, query: &ListQuery) -> Query<Collection<R::Record>> {
    let params = query.to_params();
    let key = R::list_key(query);
    let transport = Arc::clone(&self.client.transport);

    let fetch = fetcher(move || {
      let transport = Arc::clone(&transport);
      let params = params.clone();
      async move {
        transport
          .get(R::PATH, &params)
          .await
          .map_err(FetchError::from)
      }
    });

    Query::new(
      &self.client.cache,
      key,
      fetch,
      Arc::new(api_types::select_collection::<R>),
      R::empty_list(),
    )
  }

  /// Live detail query. Its data is the record's zero value until loaded.
  pub fn detail(&self, id: u64) -> Query<R::Record> {
    let path = format!("{}/{}", R::PATH, id);
    let transport = Arc::clone(&self.client.transport);

    let fetch = fetcher(move || {
      let transport = Arc::clone(&transport);
      let path = path.clone();
      async move {
        transport
          .get(&path, &QueryParams::new())
          .await
          .map_err(FetchError::from)
      }
    });

    Query::new(
      &self.client.cache,
      R::detail_key(id),
      fetch,
      Arc::new(api_types::select_record::<R>),
      R::Record::default(),
    )
  }

  pub async fn create(&self, values: &Value) -> Result<MutationOutcome, TransportError> {
    let request = Request::Post {
      path: R::PATH.to_string(),
      body: Some(values),
    };
    self.mutate(Mutation::Create, request).await
  }

  /// Edit a record. When the response carries the updated record it is
  /// written straight into the detail entry.
  pub async fn update(&self, id: u64, values: &Value) -> Result<MutationOutcome, TransportError> {
    let request = Request::Post {
      path: format!("{}/{}", R::PATH, id),
      body: Some(values),
    };
    self.mutate(Mutation::Update { id }, request).await
  }

  pub async fn delete(&self, id: u64) -> Result<MutationOutcome, TransportError> {
    let request = Request::Delete {
      path: format!("{}/{}", R::PATH, id),
      params: QueryParams::new(),
    };
    self.mutate(Mutation::Delete { id }, request).await
  }

  /// Delete several records in one request (`DELETE {path}?ids=1,2,3`).
  pub async fn delete_bulk(&self, ids: &[u64]) -> Result<MutationOutcome, TransportError> {
    if ids.is_empty() {
      return Err(TransportError::InvalidRequest(
        "bulk delete needs at least one id".to_string(),
      ));
    }
    let joined: Vec<String> = ids.iter().map(u64::to_string).collect();
    let request = Request::Delete {
      path: R::PATH.to_string(),
      params: QueryParams::new().with("ids", joined.join(",")),
    };
    self
      .mutate(Mutation::BulkDelete { ids: ids.to_vec() }, request)
      .await
  }

  /// Run a status transition (`POST {path}/{id}/{action}`).
  pub async fn transition(&self, id: u64, action: R::Action) -> Result<MutationOutcome, TransportError> {
    let request = Request::Post {
      path: format!("{}/{}/{}", R::PATH, id, action.segment()),
      body: None,
    };
    self.mutate(Mutation::Transition { id, action }, request).await
  }

  async fn mutate(
    &self,
    mutation: Mutation<R::Action>,
    request: Request<'_>,
  ) -> Result<MutationOutcome, TransportError> {
    let transport = &self.client.transport;
    let response = match request {
      Request::Post { path, body } => transport.post(&path, body).await,
      Request::Delete { path, params } => transport.delete(&path, &params).await,
    };

    let body = match response {
      Ok(body) => body,
      Err(e) => {
        warn!(resource = R::LABEL, mutation = ?mutation, error = %e, "mutation failed");
        return Err(e);
      }
    };

    // A record written from the response is already fresh and is not
    // invalidated again.
    let written = match &mutation {
      Mutation::Update { id } if self.write_returned_record(*id, &body) => Some(R::detail_key(*id)),
      _ => None,
    };
    let stale: Vec<QueryKey> = R::invalidates(&mutation)
      .into_iter()
      .filter(|key| Some(key) != written.as_ref())
      .collect();
    for key in &stale {
      self.client.cache.invalidate(key);
    }
    info!(resource = R::LABEL, mutation = ?mutation, invalidated = stale.len(), "mutation succeeded");

    self
      .client
      .notifier
      .notify(Notification::success(success_message::<R>(&mutation)));
    Ok(MutationOutcome::from_body(body))
  }

  /// Write the record carried by an update response into its detail entry.
  /// Returns whether there was one.
  fn write_returned_record(&self, id: u64, body: &Value) -> bool {
    let Some(record) = body.get(R::DETAIL_FIELD).filter(|v| v.is_object()) else {
      return false;
    };
    let mut envelope = Map::new();
    envelope.insert(R::DETAIL_FIELD.to_string(), record.clone());
    self
      .client
      .cache
      .write(&R::detail_key(id), Value::Object(envelope));
    true
  }
}

fn success_message<R: Resource>(mutation: &Mutation<R::Action>) -> String {
  match mutation {
    Mutation::Create => format!("The {} has been created successfully.", R::LABEL),
    Mutation::Update { id } => format!("The {} #{} has been edited successfully.", R::LABEL, id),
    Mutation::Delete { id } => format!("The {} #{} has been deleted successfully.", R::LABEL, id),
    Mutation::BulkDelete { ids } => format!(
      "{} {}s have been deleted successfully.",
      ids.len(),
      R::LABEL
    ),
    Mutation::Transition { action, .. } => action.success_message().to_string(),
  }
}
