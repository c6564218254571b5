//! Sale invoices. Creating one from an estimate converts that estimate, so
//! invoice writes also reach into the estimate lists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::estimates::Estimates;
use super::types::{Collection, Contact, MutationOutcome, Pagination};
use super::{Action, Mutation, Resource, ResourceClient};
use crate::cache::QueryKey;
use crate::transport::TransportError;

pub struct Invoices;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Invoice {
  pub id: u64,
  pub invoice_no: String,
  pub customer_id: u64,
  pub customer: Option<Contact>,
  pub invoice_date: String,
  pub due_date: String,
  pub reference_no: String,
  pub balance: f64,
  pub payment_amount: f64,
  pub due_amount: f64,
  pub currency_code: String,
  /// Estimate this invoice was converted from
  pub from_estimate_id: Option<u64>,
  pub is_delivered: bool,
  pub is_overdue: bool,
  pub is_fully_paid: bool,
  pub is_partially_paid: bool,
}

impl Invoice {
  pub fn status(&self) -> &'static str {
    if self.is_fully_paid {
      "paid"
    } else if self.is_partially_paid {
      "partially paid"
    } else if self.is_overdue {
      "overdue"
    } else if self.is_delivered {
      "delivered"
    } else {
      "draft"
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceAction {
  Deliver,
}

impl Action for InvoiceAction {
  fn segment(&self) -> &'static str {
    match self {
      Self::Deliver => "deliver",
    }
  }

  fn success_message(&self) -> &'static str {
    match self {
      Self::Deliver => "The invoice has been delivered successfully.",
    }
  }
}

impl Resource for Invoices {
  type Record = Invoice;
  type Action = InvoiceAction;

  const LABEL: &'static str = "invoice";
  const PATH: &'static str = "sales/invoices";
  const LIST_TAG: &'static str = "SALE_INVOICES";
  const DETAIL_TAG: &'static str = "SALE_INVOICE";
  const LIST_FIELD: &'static str = "sales_invoices";
  const DETAIL_FIELD: &'static str = "sale_invoice";

  fn empty_list() -> Collection<Invoice> {
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

  fn invalidates(mutation: &Mutation<InvoiceAction>) -> Vec<QueryKey> {
    match mutation {
      Mutation::Create => vec![Self::lists(), Estimates::lists()],
      Mutation::Update { id } => vec![Self::lists(), Self::detail_key(*id)],
      Mutation::Delete { id } => vec![Self::lists(), Self::detail_key(*id), Estimates::lists()],
      Mutation::BulkDelete { ids } => std::iter::once(Self::lists())
        .chain(ids.iter().map(|id| Self::detail_key(*id)))
        .chain(std::iter::once(Estimates::lists()))
        .collect(),
      Mutation::Transition {
        id,
        action: InvoiceAction::Deliver,
      } => vec![Self::lists(), Self::detail_key(*id)],
    }
  }
}

impl ResourceClient<Invoices> {
  pub async fn deliver(&self, id: u64) -> Result<MutationOutcome, TransportError> {
    self.transition(id, InvoiceAction::Deliver).await
  }
}
