//! Sale receipts: paid-on-the-spot sales that are drafted and then closed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{Collection, Contact, MutationOutcome, Pagination};
use super::{Action, Mutation, Resource, ResourceClient};
use crate::cache::QueryKey;
use crate::transport::TransportError;

pub struct Receipts;

/// Account the receipt's money was deposited to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepositAccount {
  pub id: u64,
  pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Receipt {
  pub id: u64,
  pub receipt_number: String,
  pub customer_id: u64,
  pub customer: Option<Contact>,
  pub receipt_date: String,
  pub closed_at: Option<String>,
  pub deposit_account: Option<DepositAccount>,
  pub reference_no: String,
  pub amount: f64,
  pub total_formatted: String,
  pub currency_code: String,
  pub is_closed: bool,
}

impl Receipt {
  pub fn status(&self) -> &'static str {
    if self.is_closed {
      "closed"
    } else {
      "draft"
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptAction {
  Close,
}

impl Action for ReceiptAction {
  fn segment(&self) -> &'static str {
    match self {
      Self::Close => "close",
    }
  }

  fn success_message(&self) -> &'static str {
    match self {
      Self::Close => "The receipt has been closed successfully.",
    }
  }
}

impl Resource for Receipts {
  type Record = Receipt;
  type Action = ReceiptAction;

  const LABEL: &'static str = "receipt";
  const PATH: &'static str = "sales/receipts";
  const LIST_TAG: &'static str = "SALE_RECEIPTS";
  const DETAIL_TAG: &'static str = "SALE_RECEIPT";
  const LIST_FIELD: &'static str = "sale_receipts";
  const DETAIL_FIELD: &'static str = "sale_receipt";

  fn empty_list() -> Collection<Receipt> {
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

  fn invalidates(mutation: &Mutation<ReceiptAction>) -> Vec<QueryKey> {
    match mutation {
      Mutation::Create => vec![Self::lists()],
      Mutation::Update { id }
      | Mutation::Delete { id }
      | Mutation::Transition {
        id,
        action: ReceiptAction::Close,
      } => vec![Self::lists(), Self::detail_key(*id)],
      Mutation::BulkDelete { ids } => std::iter::once(Self::lists())
        .chain(ids.iter().map(|id| Self::detail_key(*id)))
        .collect(),
    }
  }
}

impl ResourceClient<Receipts> {
  pub async fn close(&self, id: u64) -> Result<MutationOutcome, TransportError> {
    self.transition(id, ReceiptAction::Close).await
  }
}
