//! Sale estimates: quotes sent to customers that can be approved, rejected
//! and later converted into invoices.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{Collection, Contact, MutationOutcome, Pagination};
use super::{Action, Mutation, Resource, ResourceClient};
use crate::cache::QueryKey;
use crate::transport::TransportError;

pub struct Estimates;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Estimate {
  pub id: u64,
  pub estimate_number: String,
  pub customer_id: u64,
  pub customer: Option<Contact>,
  pub estimate_date: String,
  pub expiration_date: String,
  pub reference: String,
  pub note: String,
  pub amount: f64,
  pub currency_code: String,
  pub is_delivered: bool,
  pub is_approved: bool,
  pub is_rejected: bool,
  pub is_expired: bool,
  pub is_converted_to_invoice: bool,
}

impl Estimate {
  /// Display status, most advanced state first.
  pub fn status(&self) -> &'static str {
    if self.is_converted_to_invoice {
      "converted"
    } else if self.is_approved {
      "approved"
    } else if self.is_rejected {
      "rejected"
    } else if self.is_expired {
      "expired"
    } else if self.is_delivered {
      "delivered"
    } else {
      "draft"
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateAction {
  Deliver,
  Approve,
  Reject,
}

impl Action for EstimateAction {
  fn segment(&self) -> &'static str {
    match self {
      Self::Deliver => "deliver",
      Self::Approve => "approve",
      Self::Reject => "reject",
    }
  }

  fn success_message(&self) -> &'static str {
    match self {
      Self::Deliver => "The estimate has been delivered successfully.",
      Self::Approve => "The estimate has been approved successfully.",
      Self::Reject => "The estimate has been rejected successfully.",
    }
  }
}

impl Resource for Estimates {
  type Record = Estimate;
  type Action = EstimateAction;

  const LABEL: &'static str = "estimate";
  const PATH: &'static str = "sales/estimates";
  const LIST_TAG: &'static str = "SALE_ESTIMATES";
  const DETAIL_TAG: &'static str = "SALE_ESTIMATE";
  const LIST_FIELD: &'static str = "sales_estimates";
  const DETAIL_FIELD: &'static str = "estimate";

  fn empty_list() -> Collection<Estimate> {
    Collection {
      items: vec![],
      pagination: Pagination {
        page: 1,
        page_size: 12,
        total: 0,
      },
      filter_meta: BTreeMap::new(),
    }
  }

  fn invalidates(mutation: &Mutation<EstimateAction>) -> Vec<QueryKey> {
    match mutation {
      Mutation::Create => vec![Self::lists()],
      Mutation::Update { id } | Mutation::Delete { id } => {
        vec![Self::lists(), Self::detail_key(*id)]
      }
      Mutation::BulkDelete { ids } => std::iter::once(Self::lists())
        .chain(ids.iter().map(|id| Self::detail_key(*id)))
        .collect(),
      // Transitions only change what the list shows; an open detail keeps
      // its data until it is invalidated by an edit.
      Mutation::Transition { .. } => vec![Self::lists()],
    }
  }
}

impl ResourceClient<Estimates> {
  pub async fn deliver(&self, id: u64) -> Result<MutationOutcome, TransportError> {
    self.transition(id, EstimateAction::Deliver).await
  }

  pub async fn approve(&self, id: u64) -> Result<MutationOutcome, TransportError> {
    self.transition(id, EstimateAction::Approve).await
  }

  pub async fn reject(&self, id: u64) -> Result<MutationOutcome, TransportError> {
    self.transition(id, EstimateAction::Reject).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::Status;
  use crate::notify::{Intent, Notification};
  use crate::resources::testing::{client, ids};
  use crate::resources::ListQuery;
  use crate::transport::fake::FakeTransport;
  use serde_json::json;
  use std::sync::Arc;

  fn page(ids: &[u64]) -> serde_json::Value {
    let items: Vec<_> = ids
      .iter()
      .map(|id| json!({ "id": id, "estimate_number": format!("EST-{}", id) }))
      .collect();
    json!({
      "sales_estimates": items,
      "pagination": { "page": 1, "page_size": 12, "total": ids.len() },
      "filter_meta": {}
    })
  }

  #[tokio::test]
  async fn test_cold_list_renders_empty_collection() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond("GET", "sales/estimates", page(&[1]));
    let (client, _) = client(&transport);

    let list = client.estimates().list(&ListQuery::default());
    assert!(list.is_loading());
    assert_eq!(
      list.data(),
      &Collection {
        items: vec![],
        pagination: Pagination {
          page: 1,
          page_size: 12,
          total: 0
        },
        filter_meta: BTreeMap::new(),
      }
    );
  }

  #[tokio::test]
  async fn test_delete_refreshes_subscribed_list() {
    let transport = Arc::new(FakeTransport::new());
    transport
      .respond("GET", "sales/estimates", page(&[41, 42]))
      .respond("GET", "sales/estimates", page(&[41]))
      .respond("DELETE", "sales/estimates/42", json!({ "id": 42 }));
    let (client, notifier) = client(&transport);

    let mut list = client.estimates().list(&ListQuery::default());
    assert_eq!(ids(list.settled().await, |e| e.id), vec![41, 42]);

    let outcome = client.estimates().delete(42).await.unwrap();
    assert_eq!(outcome.id, Some(42));

    assert_eq!(ids(list.settled().await, |e| e.id), vec![41]);
    assert_eq!(transport.count("GET", "sales/estimates"), 2);
    assert_eq!(
      notifier.notifications(),
      vec![Notification {
        message: "The estimate #42 has been deleted successfully.".to_string(),
        intent: Intent::Success,
      }]
    );
  }

  #[tokio::test]
  async fn test_approve_invalidates_list_but_not_detail() {
    let transport = Arc::new(FakeTransport::new());
    transport
      .respond("GET", "sales/estimates", page(&[7]))
      .respond("GET", "sales/estimates/7", json!({ "estimate": { "id": 7 } }))
      .respond("POST", "sales/estimates/7/approve", json!({ "id": 7 }));
    let (client, notifier) = client(&transport);
    let estimates = client.estimates();

    let mut list = estimates.list(&ListQuery::default());
    let mut detail = estimates.detail(7);
    list.settled().await;
    detail.settled().await;

    estimates.approve(7).await.unwrap();

    let calls = transport.calls();
    let approve = calls.last().unwrap();
    assert_eq!((approve.method, approve.path.as_str()), ("POST", "sales/estimates/7/approve"));
    assert_eq!(approve.body, None);

    let cache = client.cache();
    assert!(cache.peek(list.key()).unwrap().stale);
    let detail_entry = cache.peek(&Estimates::detail_key(7)).unwrap();
    assert!(!detail_entry.stale);
    assert_eq!(detail_entry.status, Status::Success);
    assert_eq!(
      notifier.notifications()[0].message,
      "The estimate has been approved successfully."
    );
  }

  #[tokio::test]
  async fn test_failed_mutation_invalidates_nothing() {
    let transport = Arc::new(FakeTransport::new());
    transport
      .respond("GET", "sales/estimates", page(&[3]))
      .fail("DELETE", "sales/estimates/3", 400, "Estimate is converted");
    let (client, notifier) = client(&transport);

    let mut list = client.estimates().list(&ListQuery::default());
    list.settled().await;

    let err = client.estimates().delete(3).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(notifier.notifications().is_empty());
    assert!(!client.cache().peek(list.key()).unwrap().stale);
  }

  #[tokio::test]
  async fn test_update_writes_returned_record() {
    let transport = Arc::new(FakeTransport::new());
    transport
      .respond("GET", "sales/estimates/5", json!({ "estimate": { "id": 5, "reference": "old" } }))
      .respond(
        "POST",
        "sales/estimates/5",
        json!({ "id": 5, "estimate": { "id": 5, "reference": "new" } }),
      );
    let (client, _) = client(&transport);

    let mut detail = client.estimates().detail(5);
    assert_eq!(detail.settled().await.reference, "old");

    client
      .estimates()
      .update(5, &json!({ "reference": "new" }))
      .await
      .unwrap();

    assert!(detail.poll());
    assert!(!detail.is_stale());
    assert_eq!(detail.data().reference, "new");
    assert_eq!(transport.count("GET", "sales/estimates/5"), 1);
  }

  #[tokio::test]
  async fn test_waiting_detail_takes_written_record_without_refetch() {
    let transport = Arc::new(FakeTransport::new());
    transport
      .respond("GET", "sales/estimates/5", json!({ "estimate": { "id": 5, "reference": "old" } }))
      .respond(
        "POST",
        "sales/estimates/5",
        json!({ "id": 5, "estimate": { "id": 5, "reference": "new" } }),
      );
    let (client, _) = client(&transport);

    let mut detail = client.estimates().detail(5);
    detail.settled().await;

    let estimates = client.estimates();
    let update = tokio::spawn(async move {
      let body = json!({ "reference": "new" });
      estimates.update(5, &body).await
    });

    assert!(detail.changed().await);
    update.await.unwrap().unwrap();
    assert_eq!(detail.settled().await.reference, "new");
    assert!(!client.cache().peek(&Estimates::detail_key(5)).unwrap().stale);
    assert_eq!(transport.count("GET", "sales/estimates/5"), 1);
  }

  #[test]
  fn test_bulk_delete_invalidates_each_detail() {
    let keys = Estimates::invalidates(&Mutation::BulkDelete { ids: vec![1, 2] });
    assert_eq!(
      keys,
      vec![
        QueryKey::new("SALE_ESTIMATES"),
        QueryKey::new("SALE_ESTIMATE").with_id(1),
        QueryKey::new("SALE_ESTIMATE").with_id(2),
      ]
    );
  }

  #[test]
  fn test_status_prefers_most_advanced_state() {
    let estimate = Estimate {
      is_delivered: true,
      is_approved: true,
      ..Estimate::default()
    };
    assert_eq!(estimate.status(), "approved");
    assert_eq!(Estimate::default().status(), "draft");
  }
}
